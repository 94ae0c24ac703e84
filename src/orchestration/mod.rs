//! Orchestration layer for image publishing
//!
//! This module provides the high-level components that turn a validated
//! configuration and release metadata into a sequence of registry operations.

pub mod image_publisher;
pub mod tag_resolver;

// Re-export main types for convenience
pub use image_publisher::{ImagePublisher, PublishOptions, PublishReport};
pub use tag_resolver::{resolve_tag, resolve_tags};
