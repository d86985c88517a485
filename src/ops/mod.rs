//! High-level operations.
//!
//! This module contains the implementation of Flotilla commands. Each
//! operation loads what it needs from a [`Workspace`](crate::core::Workspace),
//! returns a serializable report, and offers text and JSON formatting.

pub mod build;
pub mod graph;
pub mod import;
pub mod resolve;

pub use build::{build, BuildOptions, BuildReport};
pub use graph::{graph, GraphReport};
pub use import::{import, ImportOptions, ImportReport};
pub use resolve::{resolve, ResolveOptions, ResolveReport};

use serde::Serialize;

/// Render any report as pretty JSON.
pub fn format_json<T: Serialize + ?Sized>(report: &T) -> String {
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize report: {}"}}"#, e))
}

