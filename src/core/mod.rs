//! Core module - the sync engine and its supporting types

pub mod cache;
pub mod config;
pub mod file_meta;
pub mod frontmatter;
pub mod project;
pub mod remote;
pub mod sync;

pub use cache::{EntityCache, EntityKind, SyncStats};
pub use config::{Config, ProjectFallback, ResyncPolicy};
pub use file_meta::FileMetadata;
pub use project::{Project, ProjectError};
pub use remote::{LinkError, LinkValidator, RemoteLink, RemoteLinkRepository};
pub use sync::{EntitySync, SyncError, SyncRecord};
