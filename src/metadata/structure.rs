//! Kotlin multiplatform project-structure metadata
//!
//! Shipped inside the common metadata artifact at [`PROJECT_STRUCTURE_ENTRY`]. It maps the
//! library's platform variants to the source sets they are built from, and lists the
//! inter-library dependencies of every source set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::ResolveResult;

pub const PROJECT_STRUCTURE_ENTRY: &str = "META-INF/kotlin-project-structure-metadata.json";

const PUBLISHED_SUFFIX: &str = "-published";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KotlinProjectStructureMetadata {
    pub project_structure: ProjectStructure,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStructure {
    #[serde(default)]
    pub format_version: Option<String>,
    #[serde(default)]
    pub variants: Vec<StructureVariant>,
    #[serde(default)]
    pub source_sets: Vec<SourceSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureVariant {
    pub name: String,
    #[serde(default)]
    pub source_set: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSet {
    pub name: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// `group:module` of libraries this source set depends on
    #[serde(default)]
    pub module_dependency: Vec<String>,
    #[serde(default)]
    pub binary_layout: Option<String>,
}

/// Variant name with the `-published` suffix Gradle adds to some variants removed
pub fn unpublished_name(name: &str) -> &str {
    name.strip_suffix(PUBLISHED_SUFFIX).unwrap_or(name)
}

impl KotlinProjectStructureMetadata {
    pub fn parse(text: &str) -> ResolveResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Source sets shared by every listed module variant
    ///
    /// Structure variants are matched against the module variant names both as published and
    /// without the `-published` suffix. Empty when no variant matches.
    pub fn source_set_intersection<'a, I>(&self, module_variant_names: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: BTreeSet<&str> = module_variant_names
            .into_iter()
            .flat_map(|name| [name, unpublished_name(name)])
            .collect();

        self.project_structure
            .variants
            .iter()
            .filter(|variant| names.contains(variant.name.as_str()))
            .map(|variant| variant.source_set.iter().cloned().collect::<BTreeSet<_>>())
            .reduce(|acc, next| acc.intersection(&next).cloned().collect())
            .unwrap_or_default()
    }

    /// Names of structure variants declaring the given source set
    pub fn variants_declaring(&self, source_set: &str) -> Vec<&str> {
        self.project_structure
            .variants
            .iter()
            .filter(|variant| variant.source_set.iter().any(|s| s == source_set))
            .map(|variant| variant.name.as_str())
            .collect()
    }

    pub fn source_sets_in<'a>(
        &'a self,
        names: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a SourceSet> + 'a {
        self.project_structure
            .source_sets
            .iter()
            .filter(move |source_set| names.contains(&source_set.name))
    }
}
