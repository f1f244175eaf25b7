//! mpresolve - multiplatform dependency resolution
//!
//! Resolves Maven coordinates into a per-platform dependency graph using POMs and Gradle module
//! metadata, repackages Kotlin Multiplatform source sets and keeps downloaded artifacts in a
//! concurrency-safe on-disk cache.

pub mod cache;
pub mod cli;
pub mod coordinates;
pub mod core;
pub mod metadata;
pub mod registry;
pub mod resolver;

pub use crate::coordinates::Coordinate;
pub use crate::core::{
    Config, Context, Message, ResolutionLevel, ResolutionPlatform, ResolutionScope, ResolveError,
    ResolveResult, Settings, Severity,
};
pub use crate::resolver::Resolver;
