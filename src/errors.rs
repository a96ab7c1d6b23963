//! Error Types
//!
//! This module defines the error types used throughout the scene crate.
//!
//! # Overview
//!
//! Per-system failures (missing entities, dangling parents, empty samplers) are
//! never errors: the tick handles them locally. Only scene-level operations
//! surface a [`SceneError`]:
//! - Archive decoding / encoding (save, load, undo snapshots, clipboard)
//! - Version mismatches between an archive and this build
//! - Explicit "try" variants of component creation
//! - Settings parsing
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_scene::errors::{SceneError, Result};
//!
//! fn restore(scene: &mut Scene, archive: &mut Archive) -> Result<()> {
//!     scene.load(archive)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::ecs::Entity;

/// The main error type for scene operations.
#[derive(Error, Debug)]
pub enum SceneError {
    // ========================================================================
    // Archive Errors
    // ========================================================================
    /// The stream does not start with the scene archive magic bytes.
    #[error("Not a scene archive (bad magic bytes)")]
    ArchiveMagic,

    /// The archive was written by an incompatible format version.
    #[error("Archive version mismatch: found {found}, supported {supported}")]
    VersionMismatch {
        /// Version stored in the archive header
        found: u32,
        /// Version this build reads and writes
        supported: u32,
    },

    /// The archive is in the wrong mode for the requested operation.
    #[error("Archive is not in {0} mode")]
    ArchiveMode(&'static str),

    /// Payload encoding failed.
    #[error("Archive encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Payload decoding failed (truncated or malformed stream).
    #[error("Archive decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// A component table in the stream lists the same entity twice.
    #[error("Duplicate entity {0} in component table")]
    DuplicateEntity(Entity),

    /// A component table in the stream has mismatched column lengths.
    #[error("Malformed component table: {components} components, {entities} entities")]
    TableShape {
        /// Number of component rows
        components: usize,
        /// Number of entity rows
        entities: usize,
    },

    // ========================================================================
    // Component Errors
    // ========================================================================
    /// The entity already owns a component of this type.
    #[error("Entity {entity} already owns a {component}")]
    ComponentExists {
        /// Offending entity
        entity: Entity,
        /// Component type name
        component: &'static str,
    },

    /// `Entity::INVALID` was passed where a live entity is required.
    #[error("Invalid entity")]
    InvalidEntity,

    /// The entity has no components in this scene.
    #[error("Entity not found: {0}")]
    EntityNotFound(Entity),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings JSON could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Alias for `Result<T, SceneError>`.
pub type Result<T> = std::result::Result<T, SceneError>;
