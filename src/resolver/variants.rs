//! Variant selection
//!
//! Pure functions over the variants of one module: given the requested scope and a single
//! platform they narrow the published variants down to the one(s) to consume.

use crate::coordinates::Coordinate;
use crate::core::platform::{
    CATEGORY_ATTRIBUTE, JVM_ENVIRONMENT_ATTRIBUTE, NATIVE_TARGET_ATTRIBUTE,
    PLATFORM_TYPE_ATTRIBUTE, USAGE_ATTRIBUTE,
};
use crate::core::{PlatformType, ResolutionPlatform, ResolutionScope};
use crate::metadata::{Capability, Variant};

/// Attributes taken into account by the filters; any other attribute makes a variant less
/// preferable in the final tie-break
pub const USED_ATTRIBUTES: [&str; 4] = [
    CATEGORY_ATTRIBUTE,
    USAGE_ATTRIBUTE,
    NATIVE_TARGET_ATTRIBUTE,
    PLATFORM_TYPE_ATTRIBUTE,
];

/// Outcome of [`select_variants`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantSelection {
    pub variants: Vec<Variant>,
}

impl VariantSelection {
    /// Selected variants that may contribute files and children
    pub fn usable(&self) -> impl Iterator<Item = &Variant> {
        self.variants
            .iter()
            .filter(|v| !v.is_documentation_or_metadata())
    }

    pub fn is_ambiguous(&self) -> bool {
        self.usable().count() > 1
    }

    pub fn names(&self) -> String {
        self.usable()
            .map(|v| v.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Select the variants of `coordinate` to consume for one platform
pub fn select_variants(
    variants: &[Variant],
    coordinate: &Coordinate,
    scope: ResolutionScope,
    platform: ResolutionPlatform,
) -> VariantSelection {
    let candidates: Vec<&Variant> = variants
        .iter()
        .filter(|v| capabilities_match(v, coordinate))
        .filter(|v| native_target_matches(v, platform))
        .collect();

    let candidates = filter_by_platform(candidates, platform.platform_type());
    let candidates = filter_by_scope(candidates, scope);
    let candidates = prefer_fewest_unused_attributes(candidates);

    VariantSelection {
        variants: candidates.into_iter().cloned().collect(),
    }
}

fn has_usable(variants: &[&Variant]) -> bool {
    variants.iter().any(|v| !v.is_documentation_or_metadata())
}

fn filter_by_platform(variants: Vec<&Variant>, platform_type: PlatformType) -> Vec<&Variant> {
    let filtered: Vec<&Variant> = variants
        .iter()
        .copied()
        .filter(|v| platform_type.matches(v))
        .collect();
    match platform_type.fallback() {
        Some(fallback) if !has_usable(&filtered) => {
            variants.into_iter().filter(|v| fallback.matches(v)).collect()
        }
        _ => filtered,
    }
}

fn filter_by_scope(variants: Vec<&Variant>, scope: ResolutionScope) -> Vec<&Variant> {
    let mut current = Some(scope);
    while let Some(scope) = current {
        let filtered: Vec<&Variant> = variants
            .iter()
            .copied()
            .filter(|v| scope.matches(v))
            .collect();
        if has_usable(&filtered) {
            return filtered;
        }
        current = scope.fallback();
    }
    variants
}

// Narrows to the fewest-unused subset only when that singles out one usable variant
fn prefer_fewest_unused_attributes(variants: Vec<&Variant>) -> Vec<&Variant> {
    let usable_count = variants
        .iter()
        .filter(|v| !v.is_documentation_or_metadata())
        .count();
    if usable_count <= 1 {
        return variants;
    }

    let fewest = variants
        .iter()
        .filter(|v| !v.is_documentation_or_metadata())
        .map(|v| v.unused_attribute_count(&USED_ATTRIBUTES))
        .min()
        .unwrap_or(0);
    let narrowed: Vec<&Variant> = variants
        .iter()
        .copied()
        .filter(|v| {
            v.is_documentation_or_metadata()
                || v.unused_attribute_count(&USED_ATTRIBUTES) == fewest
        })
        .collect();
    let narrowed_usable = narrowed
        .iter()
        .filter(|v| !v.is_documentation_or_metadata())
        .count();
    if narrowed_usable == 1 {
        narrowed
    } else {
        variants
    }
}

/// A variant whose native target differs from the requested one is never consumable
pub fn native_target_matches(variant: &Variant, platform: ResolutionPlatform) -> bool {
    if platform.platform_type() != PlatformType::Native {
        return true;
    }
    match variant.attribute(NATIVE_TARGET_ATTRIBUTE) {
        Some(target) => Some(target) == platform.native_target(),
        None => true,
    }
}

/// Whether a variant's capabilities are compatible with the coordinate it was published for
pub fn capabilities_match(variant: &Variant, coordinate: &Coordinate) -> bool {
    let own = Capability::of(coordinate);
    variant.capabilities.is_empty()
        || variant.capabilities == [own.clone()]
        || is_kotlin_test_framework_exception(variant, coordinate, &own)
        || is_guava_exception(variant, coordinate, &own)
}

fn sorted_by_name(capabilities: &[Capability]) -> Vec<Capability> {
    let mut sorted = capabilities.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

// kotlin-test-junit(5) additionally provide the framework implementation capability
fn is_kotlin_test_framework_exception(
    variant: &Variant,
    coordinate: &Coordinate,
    own: &Capability,
) -> bool {
    coordinate.group == "org.jetbrains.kotlin"
        && (coordinate.module == "kotlin-test-junit" || coordinate.module == "kotlin-test-junit5")
        && sorted_by_name(&variant.capabilities)
            == sorted_by_name(&[
                Capability::new(&coordinate.group, "kotlin-test-framework-impl", &coordinate.version),
                own.clone(),
            ])
}

// Guava claims the old google-collections capability; its android and jre flavours are told
// apart by the JVM environment attribute matching the version suffix
fn is_guava_exception(variant: &Variant, coordinate: &Coordinate, own: &Capability) -> bool {
    if coordinate.group != "com.google.guava" || coordinate.module != "guava" {
        return false;
    }
    let expected_capabilities = sorted_by_name(&[
        Capability::new("com.google.collections", "google-collections", &coordinate.version),
        own.clone(),
    ]);
    if sorted_by_name(&variant.capabilities) != expected_capabilities {
        return false;
    }

    let environment = match coordinate.version.rsplit_once('-').map(|(_, suffix)| suffix) {
        Some("android") => Some("android"),
        Some("jre") => Some("standard-jvm"),
        _ => None,
    };
    variant.attribute(JVM_ENVIRONMENT_ATTRIBUTE) == environment
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn variant(name: &str, attributes: &[(&str, &str)]) -> Variant {
        Variant {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            available_at: None,
            dependencies: Vec::new(),
            dependency_constraints: Vec::new(),
            files: Vec::new(),
            capabilities: Vec::new(),
        }
    }

    fn jvm_api() -> Variant {
        variant(
            "jvmApiElements-published",
            &[
                (CATEGORY_ATTRIBUTE, "library"),
                (USAGE_ATTRIBUTE, "java-api"),
                (PLATFORM_TYPE_ATTRIBUTE, "jvm"),
            ],
        )
    }

    fn jvm_runtime() -> Variant {
        variant(
            "jvmRuntimeElements-published",
            &[
                (CATEGORY_ATTRIBUTE, "library"),
                (USAGE_ATTRIBUTE, "java-runtime"),
                (PLATFORM_TYPE_ATTRIBUTE, "jvm"),
            ],
        )
    }

    fn documentation(name: &str) -> Variant {
        variant(
            name,
            &[
                (CATEGORY_ATTRIBUTE, "documentation"),
                (USAGE_ATTRIBUTE, "java-runtime"),
                (PLATFORM_TYPE_ATTRIBUTE, "jvm"),
            ],
        )
    }

    fn coordinate() -> Coordinate {
        Coordinate::new("com.example", "lib", "1.0")
    }

    #[test]
    fn test_documentation_variants_never_selected() {
        let orders = [
            vec![documentation("javadocElements"), jvm_api(), documentation("sourcesElements")],
            vec![jvm_api(), documentation("javadocElements"), documentation("sourcesElements")],
            vec![documentation("sourcesElements"), documentation("javadocElements"), jvm_api()],
        ];
        for variants in orders {
            let selection = select_variants(
                &variants,
                &coordinate(),
                ResolutionScope::Compile,
                ResolutionPlatform::Jvm,
            );
            let usable: Vec<&str> = selection.usable().map(|v| v.name.as_str()).collect();
            assert_eq!(usable, vec!["jvmApiElements-published"]);
            assert!(!selection.is_ambiguous());
        }
    }

    #[test]
    fn test_runtime_scope_falls_back_to_compile() {
        let variants = vec![jvm_api(), documentation("sourcesElements")];
        let selection = select_variants(
            &variants,
            &coordinate(),
            ResolutionScope::Runtime,
            ResolutionPlatform::Jvm,
        );
        assert_eq!(selection.names(), "jvmApiElements-published");

        let variants = vec![jvm_api(), jvm_runtime()];
        let selection = select_variants(
            &variants,
            &coordinate(),
            ResolutionScope::Runtime,
            ResolutionPlatform::Jvm,
        );
        assert_eq!(selection.names(), "jvmRuntimeElements-published");
    }

    #[test]
    fn test_android_falls_back_to_jvm() {
        let variants = vec![jvm_api()];
        let selection = select_variants(
            &variants,
            &coordinate(),
            ResolutionScope::Compile,
            ResolutionPlatform::Android,
        );
        assert_eq!(selection.names(), "jvmApiElements-published");
    }

    #[test]
    fn test_native_target_must_match() {
        let arm = variant(
            "iosArm64ApiElements-published",
            &[
                (USAGE_ATTRIBUTE, "kotlin-api"),
                (PLATFORM_TYPE_ATTRIBUTE, "native"),
                (NATIVE_TARGET_ATTRIBUTE, "ios_arm64"),
            ],
        );
        let x64 = variant(
            "iosX64ApiElements-published",
            &[
                (USAGE_ATTRIBUTE, "kotlin-api"),
                (PLATFORM_TYPE_ATTRIBUTE, "native"),
                (NATIVE_TARGET_ATTRIBUTE, "ios_x64"),
            ],
        );
        let selection = select_variants(
            &[arm, x64],
            &coordinate(),
            ResolutionScope::Compile,
            ResolutionPlatform::IosX64,
        );
        assert_eq!(selection.names(), "iosX64ApiElements-published");
    }

    #[test]
    fn test_fewest_unused_attributes_wins() {
        let mut extra = jvm_api();
        extra.name = "jvmApiElementsWithExtra".to_string();
        extra
            .attributes
            .insert("org.gradle.jvm.version".to_string(), "17".to_string());

        let selection = select_variants(
            &[extra, jvm_api()],
            &coordinate(),
            ResolutionScope::Compile,
            ResolutionPlatform::Jvm,
        );
        assert_eq!(selection.names(), "jvmApiElements-published");

        let mut twin = jvm_api();
        twin.name = "jvmApiTwin".to_string();
        let selection = select_variants(
            &[twin, jvm_api()],
            &coordinate(),
            ResolutionScope::Compile,
            ResolutionPlatform::Jvm,
        );
        assert!(selection.is_ambiguous());
    }

    #[test]
    fn test_tied_fewest_unused_keeps_all_candidates() {
        let mut twin = jvm_api();
        twin.name = "jvmApiTwin".to_string();
        let mut extra = jvm_api();
        extra.name = "jvmApiElementsWithExtra".to_string();
        extra
            .attributes
            .insert("org.gradle.jvm.version".to_string(), "17".to_string());

        let selection = select_variants(
            &[jvm_api(), twin, extra],
            &coordinate(),
            ResolutionScope::Compile,
            ResolutionPlatform::Jvm,
        );
        assert_eq!(selection.usable().count(), 3);
        assert!(selection.is_ambiguous());
    }

    #[test]
    fn test_foreign_capabilities_are_dropped() {
        let mut foreign = jvm_api();
        foreign.capabilities = vec![Capability::new("com.example", "lib-test-fixtures", "1.0")];
        let mut own = jvm_api();
        own.name = "own".to_string();
        own.capabilities = vec![Capability::of(&coordinate())];

        let selection = select_variants(
            &[foreign, own],
            &coordinate(),
            ResolutionScope::Compile,
            ResolutionPlatform::Jvm,
        );
        assert_eq!(selection.names(), "own");
    }

    #[test]
    fn test_guava_capability_exception() {
        let coordinate = Coordinate::new("com.google.guava", "guava", "32.1.2-jre");
        let capabilities = vec![
            Capability::of(&coordinate),
            Capability::new("com.google.collections", "google-collections", "32.1.2-jre"),
        ];
        let mut jre = jvm_api();
        jre.name = "jreApiElements".to_string();
        jre.capabilities = capabilities.clone();
        jre.attributes
            .insert(JVM_ENVIRONMENT_ATTRIBUTE.to_string(), "standard-jvm".to_string());
        let mut android = jvm_api();
        android.name = "androidApiElements".to_string();
        android.capabilities = capabilities;
        android
            .attributes
            .insert(JVM_ENVIRONMENT_ATTRIBUTE.to_string(), "android".to_string());

        assert!(capabilities_match(&jre, &coordinate));
        assert!(!capabilities_match(&android, &coordinate));
    }

    #[test]
    fn test_kotlin_test_junit_capability_exception() {
        let coordinate = Coordinate::new("org.jetbrains.kotlin", "kotlin-test-junit", "1.9.20");
        let mut api = jvm_api();
        api.capabilities = vec![
            Capability::of(&coordinate),
            Capability::new("org.jetbrains.kotlin", "kotlin-test-framework-impl", "1.9.20"),
        ];
        assert!(capabilities_match(&api, &coordinate));
    }
}
