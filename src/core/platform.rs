//! Target platforms, resolution scopes and resolution levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{ResolveError, ResolveResult};
use crate::metadata::module::Variant;
use crate::metadata::pom::PomDependency;

pub const PLATFORM_TYPE_ATTRIBUTE: &str = "org.jetbrains.kotlin.platform.type";
pub const NATIVE_TARGET_ATTRIBUTE: &str = "org.jetbrains.kotlin.native.target";
pub const USAGE_ATTRIBUTE: &str = "org.gradle.usage";
pub const CATEGORY_ATTRIBUTE: &str = "org.gradle.category";
pub const JVM_ENVIRONMENT_ATTRIBUTE: &str = "org.gradle.jvm.environment";

/// Kotlin platform type as published in `org.jetbrains.kotlin.platform.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlatformType {
    Common,
    Jvm,
    AndroidJvm,
    Js,
    Wasm,
    Native,
}

impl PlatformType {
    pub fn value(self) -> &'static str {
        match self {
            PlatformType::Common => "common",
            PlatformType::Jvm => "jvm",
            PlatformType::AndroidJvm => "androidJvm",
            PlatformType::Js => "js",
            PlatformType::Wasm => "wasm",
            PlatformType::Native => "native",
        }
    }

    /// Platform type whose variants are acceptable when none match this one
    pub fn fallback(self) -> Option<PlatformType> {
        match self {
            PlatformType::AndroidJvm => Some(PlatformType::Jvm),
            _ => None,
        }
    }

    pub fn matches(self, variant: &Variant) -> bool {
        match variant.attribute(PLATFORM_TYPE_ATTRIBUTE) {
            Some(value) => value == self.value(),
            // Plain Java libraries published with Gradle metadata carry no Kotlin attributes.
            None => self == PlatformType::Jvm,
        }
    }
}

macro_rules! platforms {
    ($($variant:ident => $name:literal, $kind:ident, $target:expr;)*) => {
        /// A concrete (or the abstract common) target platform of a resolution request
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum ResolutionPlatform {
            $(#[serde(rename = $name)] $variant,)*
        }

        impl ResolutionPlatform {
            pub const ALL: &'static [ResolutionPlatform] = &[$(ResolutionPlatform::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(ResolutionPlatform::$variant => $name,)*
                }
            }

            pub fn platform_type(self) -> PlatformType {
                match self {
                    $(ResolutionPlatform::$variant => PlatformType::$kind,)*
                }
            }

            /// Value of `org.jetbrains.kotlin.native.target` for native platforms
            pub fn native_target(self) -> Option<&'static str> {
                match self {
                    $(ResolutionPlatform::$variant => $target,)*
                }
            }
        }
    };
}

platforms! {
    Common => "common", Common, None;
    Jvm => "jvm", Jvm, None;
    Android => "android", AndroidJvm, None;
    Js => "js", Js, None;
    Wasm => "wasm", Wasm, None;
    LinuxX64 => "linuxX64", Native, Some("linux_x64");
    LinuxArm64 => "linuxArm64", Native, Some("linux_arm64");
    MingwX64 => "mingwX64", Native, Some("mingw_x64");
    MacosX64 => "macosX64", Native, Some("macos_x64");
    MacosArm64 => "macosArm64", Native, Some("macos_arm64");
    IosArm64 => "iosArm64", Native, Some("ios_arm64");
    IosX64 => "iosX64", Native, Some("ios_x64");
    IosSimulatorArm64 => "iosSimulatorArm64", Native, Some("ios_simulator_arm64");
    TvosArm64 => "tvosArm64", Native, Some("tvos_arm64");
    TvosX64 => "tvosX64", Native, Some("tvos_x64");
    TvosSimulatorArm64 => "tvosSimulatorArm64", Native, Some("tvos_simulator_arm64");
    WatchosArm32 => "watchosArm32", Native, Some("watchos_arm32");
    WatchosArm64 => "watchosArm64", Native, Some("watchos_arm64");
    WatchosDeviceArm64 => "watchosDeviceArm64", Native, Some("watchos_device_arm64");
    WatchosSimulatorArm64 => "watchosSimulatorArm64", Native, Some("watchos_simulator_arm64");
    AndroidNativeArm32 => "androidNativeArm32", Native, Some("android_arm32");
    AndroidNativeArm64 => "androidNativeArm64", Native, Some("android_arm64");
    AndroidNativeX86 => "androidNativeX86", Native, Some("android_x86");
    AndroidNativeX64 => "androidNativeX64", Native, Some("android_x64");
}

impl ResolutionPlatform {
    pub fn is_ios(self) -> bool {
        matches!(
            self,
            ResolutionPlatform::IosArm64
                | ResolutionPlatform::IosX64
                | ResolutionPlatform::IosSimulatorArm64
        )
    }
}

impl fmt::Display for ResolutionPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResolutionPlatform {
    type Err = ResolveError;

    fn from_str(s: &str) -> ResolveResult<Self> {
        ResolutionPlatform::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ResolveError::config(format!("Unknown platform: {}", s)))
    }
}

/// Which classpath is being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionScope {
    #[default]
    Compile,
    Runtime,
}

impl ResolutionScope {
    /// Scope whose variants are acceptable when none match this one
    pub fn fallback(self) -> Option<ResolutionScope> {
        match self {
            ResolutionScope::Compile => None,
            ResolutionScope::Runtime => Some(ResolutionScope::Compile),
        }
    }

    pub fn matches(self, variant: &Variant) -> bool {
        let Some(usage) = variant.attribute(USAGE_ATTRIBUTE) else {
            return false;
        };
        match self {
            ResolutionScope::Compile => usage.ends_with("-api"),
            ResolutionScope::Runtime => usage.ends_with("-runtime"),
        }
    }

    /// Whether a POM dependency with the given `<scope>` belongs to this classpath
    pub fn matches_pom(self, dependency: &PomDependency) -> bool {
        let scope = dependency.scope.as_deref().unwrap_or("compile");
        match self {
            ResolutionScope::Compile => scope == "compile",
            ResolutionScope::Runtime => scope == "compile" || scope == "runtime",
        }
    }
}

impl fmt::Display for ResolutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionScope::Compile => f.write_str("compile"),
            ResolutionScope::Runtime => f.write_str("runtime"),
        }
    }
}

impl FromStr for ResolutionScope {
    type Err = ResolveError;

    fn from_str(s: &str) -> ResolveResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "compile" => Ok(ResolutionScope::Compile),
            "runtime" => Ok(ResolutionScope::Runtime),
            other => Err(ResolveError::config(format!("Unknown scope: {}", other))),
        }
    }
}

/// How far a dependency has been resolved. Never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ResolutionState {
    Initial = 0,
    Partial = 1,
    Resolved = 2,
}

impl ResolutionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ResolutionState::Initial,
            1 => ResolutionState::Partial,
            _ => ResolutionState::Resolved,
        }
    }
}

/// How far a caller wants resolution to go
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolutionLevel {
    /// Local caches only, no network access
    Partial,
    /// Network fallback permitted
    Network,
}

impl ResolutionLevel {
    pub fn state(self) -> ResolutionState {
        match self {
            ResolutionLevel::Partial => ResolutionState::Partial,
            ResolutionLevel::Network => ResolutionState::Resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform_names() {
        assert_eq!("jvm".parse::<ResolutionPlatform>().unwrap(), ResolutionPlatform::Jvm);
        assert_eq!(
            "iosSimulatorArm64".parse::<ResolutionPlatform>().unwrap(),
            ResolutionPlatform::IosSimulatorArm64
        );
        assert!("symbian".parse::<ResolutionPlatform>().is_err());
    }

    #[test]
    fn test_native_targets() {
        assert_eq!(ResolutionPlatform::IosArm64.native_target(), Some("ios_arm64"));
        assert_eq!(ResolutionPlatform::Jvm.native_target(), None);
        assert_eq!(ResolutionPlatform::Android.platform_type(), PlatformType::AndroidJvm);
        assert_eq!(PlatformType::AndroidJvm.fallback(), Some(PlatformType::Jvm));
    }

    #[test]
    fn test_level_state_ordering() {
        assert!(ResolutionState::Initial < ResolutionState::Partial);
        assert!(ResolutionLevel::Partial.state() < ResolutionLevel::Network.state());
    }
}
