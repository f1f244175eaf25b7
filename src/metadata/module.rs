//! Gradle Module Metadata (`.module` files)

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::coordinates::{Coordinate, VersionRequirement};
use crate::core::platform::{
    PlatformType, CATEGORY_ATTRIBUTE, PLATFORM_TYPE_ATTRIBUTE, USAGE_ATTRIBUTE,
};
use crate::core::ResolveResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadata {
    #[serde(default)]
    pub format_version: String,
    pub component: Component,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl ModuleMetadata {
    pub fn parse(text: &str) -> ResolveResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub group: String,
    pub module: String,
    pub version: String,
    #[serde(default, deserialize_with = "attributes")]
    pub attributes: BTreeMap<String, String>,
}

impl Component {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.group, &self.module, &self.version)
    }
}

/// One published configuration of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub name: String,
    #[serde(default, deserialize_with = "attributes")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, rename = "available-at")]
    pub available_at: Option<AvailableAt>,
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,
    #[serde(default)]
    pub dependency_constraints: Vec<ModuleDependency>,
    #[serde(default)]
    pub files: Vec<VariantFile>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl Variant {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Javadoc/sources variants and the Kotlin common API variant. They never contribute
    /// children and are ignored when deciding whether a filter left anything usable.
    pub fn is_documentation_or_metadata(&self) -> bool {
        self.attribute(CATEGORY_ATTRIBUTE) == Some("documentation")
            || (self.attribute(USAGE_ATTRIBUTE) == Some("kotlin-api")
                && self.attribute(PLATFORM_TYPE_ATTRIBUTE) == Some(PlatformType::Common.value()))
    }

    /// The variant carrying the multiplatform metadata library for `platform_type`
    pub fn is_kotlin_metadata(&self, platform_type: PlatformType) -> bool {
        self.attribute(USAGE_ATTRIBUTE) == Some("kotlin-metadata") && platform_type.matches(self)
    }

    /// Number of attributes outside the set used for variant matching
    pub fn unused_attribute_count(&self, used: &[&str]) -> usize {
        self.attributes
            .keys()
            .filter(|k| !used.contains(&k.as_str()))
            .count()
    }
}

/// Redirect of a variant to another coordinate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableAt {
    #[serde(default)]
    pub url: String,
    pub group: String,
    pub module: String,
    pub version: String,
}

impl AvailableAt {
    pub fn as_dependency(&self) -> ModuleDependency {
        ModuleDependency {
            group: self.group.clone(),
            module: self.module.clone(),
            version: VersionRequirement::requires(self.version.clone()),
        }
    }
}

/// A dependency or dependency constraint declared by a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub group: String,
    pub module: String,
    #[serde(default)]
    pub version: VersionRequirement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantFile {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub sha512: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl Capability {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn of(coordinate: &Coordinate) -> Self {
        Self::new(&coordinate.group, &coordinate.module, &coordinate.version)
    }
}

/// Attribute values may be strings, booleans or numbers; all are kept in their string form
fn attributes<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = r#"{
  "formatVersion": "1.1",
  "component": {
    "group": "org.jetbrains.kotlinx",
    "module": "kotlinx-coroutines-core",
    "version": "1.7.3",
    "attributes": { "org.gradle.status": "release" }
  },
  "variants": [
    {
      "name": "jvmApiElements-published",
      "attributes": {
        "org.gradle.category": "library",
        "org.gradle.jvm.version": 8,
        "org.gradle.libraryelements": "jar",
        "org.gradle.usage": "java-api",
        "org.jetbrains.kotlin.platform.type": "jvm"
      },
      "available-at": {
        "url": "../../kotlinx-coroutines-core-jvm/1.7.3/kotlinx-coroutines-core-jvm-1.7.3.module",
        "group": "org.jetbrains.kotlinx",
        "module": "kotlinx-coroutines-core-jvm",
        "version": "1.7.3"
      }
    },
    {
      "name": "metadataApiElements",
      "attributes": {
        "org.gradle.category": "library",
        "org.gradle.usage": "kotlin-metadata",
        "org.jetbrains.kotlin.platform.type": "common"
      },
      "dependencies": [
        {
          "group": "org.jetbrains.kotlin",
          "module": "kotlin-stdlib",
          "version": { "requires": "1.8.20" }
        }
      ],
      "files": [
        {
          "name": "kotlinx-coroutines-core-metadata-1.7.3-all.jar",
          "url": "kotlinx-coroutines-core-1.7.3-all.jar",
          "size": 1024,
          "sha1": "0123456789abcdef0123456789abcdef01234567"
        }
      ]
    },
    {
      "name": "commonSourcesElements",
      "attributes": {
        "org.gradle.category": "documentation",
        "org.gradle.docstype": "sources"
      }
    }
  ]
}"#;

    #[test]
    fn test_parse_module_metadata() {
        let module = ModuleMetadata::parse(MODULE).unwrap();
        assert_eq!(
            module.component.coordinate().to_string(),
            "org.jetbrains.kotlinx:kotlinx-coroutines-core:1.7.3"
        );
        assert_eq!(module.variants.len(), 3);

        let jvm = &module.variants[0];
        assert_eq!(jvm.attribute("org.gradle.jvm.version"), Some("8"));
        let redirect = jvm.available_at.as_ref().unwrap().as_dependency();
        assert_eq!(redirect.module, "kotlinx-coroutines-core-jvm");
        assert_eq!(redirect.version.resolve(), Some("1.7.3"));
    }

    #[test]
    fn test_variant_classification() {
        let module = ModuleMetadata::parse(MODULE).unwrap();
        assert!(!module.variants[0].is_documentation_or_metadata());
        assert!(module.variants[1].is_kotlin_metadata(PlatformType::Common));
        assert!(!module.variants[1].is_kotlin_metadata(PlatformType::Jvm));
        assert!(module.variants[2].is_documentation_or_metadata());
        assert_eq!(
            module.variants[1].files[0].sha1.as_deref(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
    }
}
