//! Wire formats describing published libraries
//!
//! - [`pom`]: Maven POM XML (project, parent chain, dependency management)
//! - [`module`]: Gradle Module Metadata JSON (variants, capabilities, files)
//! - [`structure`]: Kotlin multiplatform project-structure metadata JSON

pub mod module;
pub mod pom;
pub mod structure;

pub use module::{AvailableAt, Capability, ModuleDependency, ModuleMetadata, Variant, VariantFile};
pub use pom::{PomDependency, PomParent, Project};
pub use structure::{KotlinProjectStructureMetadata, PROJECT_STRUCTURE_ENTRY};
