//! Maven POM parsing
//!
//! Only the subset needed for dependency resolution is read: identity, packaging, parent,
//! properties, `dependencies` and `dependencyManagement`. Resolving the parent chain and
//! `import` BOMs needs repository access and lives in the resolver; this module only provides
//! the pure merge and expansion steps.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::ResolveResult;

/// Marker Gradle leaves in POMs of modules that also publish module metadata
pub const GRADLE_METADATA_MARKER: &str = "do_not_remove: published-with-gradle-metadata";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

/// Passes of placeholder expansion, enough for properties defined in terms of other properties
const MAX_EXPANSION_PASSES: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomParent {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
    pub classifier: Option<String>,
    pub type_: Option<String>,
}

impl PomDependency {
    pub fn is_import(&self) -> bool {
        self.scope.as_deref() == Some("import")
    }

    fn same_artifact(&self, other: &PomDependency) -> bool {
        self.group_id == other.group_id && self.artifact_id == other.artifact_id
    }
}

/// A parsed POM
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub parent: Option<PomParent>,
    pub properties: BTreeMap<String, String>,
    pub dependency_management: Vec<PomDependency>,
    pub dependencies: Vec<PomDependency>,
}

/// Whether a POM text carries [`GRADLE_METADATA_MARKER`], i.e. Gradle module metadata was
/// published next to it
pub fn publishes_gradle_metadata(pom_text: &str) -> bool {
    pom_text.contains(GRADLE_METADATA_MARKER)
}

impl Project {
    pub fn parse(text: &str) -> ResolveResult<Self> {
        let doc = roxmltree::Document::parse(text)?;
        let project = doc.root_element();

        let mut pom = Project {
            group_id: child_text(&project, "groupId"),
            artifact_id: child_text(&project, "artifactId"),
            version: child_text(&project, "version"),
            packaging: child_text(&project, "packaging"),
            ..Default::default()
        };

        if let Some(parent) = child_element(&project, "parent") {
            if let (Some(group_id), Some(artifact_id), Some(version)) = (
                child_text(&parent, "groupId"),
                child_text(&parent, "artifactId"),
                child_text(&parent, "version"),
            ) {
                pom.parent = Some(PomParent {
                    group_id,
                    artifact_id,
                    version,
                });
            }
        }

        if let Some(properties) = child_element(&project, "properties") {
            for child in properties.children().filter(|n| n.is_element()) {
                let value = child.text().map(str::trim).unwrap_or_default();
                pom.properties
                    .insert(child.tag_name().name().to_string(), value.to_string());
            }
        }

        if let Some(dependencies) = child_element(&project, "dependencies") {
            pom.dependencies = parse_dependencies(&dependencies);
        }

        if let Some(management) = child_element(&project, "dependencyManagement") {
            if let Some(dependencies) = child_element(&management, "dependencies") {
                pom.dependency_management = parse_dependencies(&dependencies);
            }
        }

        Ok(pom)
    }

    pub fn display_name(&self) -> String {
        format!(
            "{}:{}:{}",
            self.group_id.as_deref().unwrap_or("?"),
            self.artifact_id.as_deref().unwrap_or("?"),
            self.version.as_deref().unwrap_or("?")
        )
    }

    /// Merge a resolved parent into this project. Own values win; dependency lists are
    /// concatenated with own entries first.
    pub fn inherit(self, parent: &Project) -> Project {
        let mut properties = parent.properties.clone();
        properties.extend(self.properties);

        let mut dependencies = self.dependencies;
        dependencies.extend(parent.dependencies.iter().cloned());

        let mut dependency_management = self.dependency_management;
        dependency_management.extend(parent.dependency_management.iter().cloned());

        Project {
            group_id: self.group_id.or_else(|| parent.group_id.clone()),
            artifact_id: self.artifact_id.or_else(|| parent.artifact_id.clone()),
            version: self.version.or_else(|| parent.version.clone()),
            packaging: self.packaging,
            parent: self.parent,
            properties,
            dependency_management,
            dependencies,
        }
    }

    /// Take missing identity fields from the `<parent>` reference when the parent POM itself
    /// is unavailable
    pub fn inherit_identity(mut self) -> Project {
        if let Some(parent) = &self.parent {
            self.group_id = self.group_id.or_else(|| Some(parent.group_id.clone()));
            self.version = self.version.or_else(|| Some(parent.version.clone()));
        }
        self
    }

    fn template_values(&self) -> BTreeMap<String, String> {
        let mut values = self.properties.clone();
        let builtins = [
            ("project.groupId", self.group_id.as_ref()),
            ("project.artifactId", self.artifact_id.as_ref()),
            ("project.version", self.version.as_ref()),
            ("pom.groupId", self.group_id.as_ref()),
            ("pom.version", self.version.as_ref()),
            ("version", self.version.as_ref()),
            ("project.parent.groupId", self.parent.as_ref().map(|p| &p.group_id)),
            ("project.parent.version", self.parent.as_ref().map(|p| &p.version)),
        ];
        for (key, value) in builtins {
            if let Some(value) = value {
                values.entry(key.to_string()).or_insert_with(|| value.clone());
            }
        }
        values
    }

    /// Substitute `${...}` placeholders; unknown placeholders are left as they are
    pub fn expand(&self, text: &str) -> String {
        expand_with(text, &self.template_values())
    }

    /// Expand placeholders in every dependency of this project
    pub fn expand_templates(mut self) -> Project {
        let values = self.template_values();
        for dependency in self
            .dependencies
            .iter_mut()
            .chain(self.dependency_management.iter_mut())
        {
            expand_dependency(dependency, &values);
        }
        self
    }

    /// Fill versions of dependencies that declare none from `dependencyManagement`
    pub fn apply_dependency_management(mut self) -> Project {
        for dependency in self.dependencies.iter_mut().filter(|d| d.version.is_none()) {
            if let Some(managed) = self
                .dependency_management
                .iter()
                .find(|m| m.same_artifact(dependency))
            {
                dependency.version = managed.version.clone();
            }
        }
        self
    }
}

fn expand_dependency(dependency: &mut PomDependency, values: &BTreeMap<String, String>) {
    dependency.group_id = expand_with(&dependency.group_id, values);
    dependency.artifact_id = expand_with(&dependency.artifact_id, values);
    for field in [
        &mut dependency.version,
        &mut dependency.scope,
        &mut dependency.classifier,
        &mut dependency.type_,
    ] {
        if let Some(value) = field.as_mut() {
            *value = expand_with(value, values);
        }
    }
}

fn expand_with(text: &str, values: &BTreeMap<String, String>) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_EXPANSION_PASSES {
        if !current.contains("${") {
            break;
        }
        let next = PLACEHOLDER
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                values
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn parse_dependencies(node: &roxmltree::Node<'_, '_>) -> Vec<PomDependency> {
    node.children()
        .filter(|n| n.is_element() && n.has_tag_name("dependency"))
        .filter_map(|dependency| {
            Some(PomDependency {
                group_id: child_text(&dependency, "groupId")?,
                artifact_id: child_text(&dependency, "artifactId")?,
                version: child_text(&dependency, "version"),
                scope: child_text(&dependency, "scope"),
                optional: child_text(&dependency, "optional").as_deref() == Some("true"),
                classifier: child_text(&dependency, "classifier"),
                type_: child_text(&dependency, "type"),
            })
        })
        .collect()
}

fn child_element<'a>(
    node: &'a roxmltree::Node<'a, 'a>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: &roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    child_element(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
