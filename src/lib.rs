//! Roadmap: a file-backed issue and milestone tracker
//!
//! Markdown files with YAML frontmatter under `.roadmap/` are the source of
//! truth. A SQLite cache mirrors them for fast queries and records links
//! from issues to external trackers.

pub mod cli;
pub mod core;
pub mod yaml;
