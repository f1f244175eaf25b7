//! Core module for mpresolve
//!
//! This module contains configuration, the resolution context, platform/scope
//! definitions and error types.

pub mod config;
pub mod context;
pub mod error;
pub mod platform;

pub use config::Config;
pub use context::{Context, Message, NetworkSettings, Settings, SettingsBuilder, Severity};
pub use error::{ResolveError, ResolveResult};
pub use platform::{
    PlatformType, ResolutionLevel, ResolutionPlatform, ResolutionScope, ResolutionState,
};
