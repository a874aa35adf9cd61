//! Data types named by the spec that have no ready-made equivalent in
//! `tower_lsp::lsp_types`. Wire types that do map 1:1 onto `lsp_types`
//! (Location, DocumentSymbol, FoldingRange, Hover, WorkspaceSymbol,
//! TypeHierarchyItem) are used directly from that crate rather than
//! reinvented here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The small JSON document that advertises a running daemon, written at
/// `<project_root>/.clangd-query.lock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    #[serde(rename = "socketPath")]
    pub socket_path: PathBuf,
    /// Unix seconds.
    #[serde(rename = "buildTime")]
    pub build_time: u64,
    #[serde(rename = "projectRoot")]
    pub project_root: PathBuf,
}

/// Parsed result of `clangd`'s markdown hover payload (spec.md §3, §4.F).
///
/// Every field is optional and filled opportunistically: `clangd` versions
/// differ in exactly what they emit, so the parser degrades gracefully
/// rather than guessing when a field is absent.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocumentation {
    pub description: Option<String>,
    pub inheritance: Option<String>,
    pub access_level: Option<AccessLevel>,
    pub signature: Option<String>,
    pub r#type: Option<String>,
    pub default_value: Option<String>,
    pub return_type: Option<String>,
    pub parameters_text: Option<String>,
    pub modifiers: Vec<String>,
    pub template_params: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Public,
    Private,
    Protected,
}

/// Daemon-wide counters, reported by the `status` method.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub pid: u32,
    #[serde(rename = "projectRoot")]
    pub project_root: PathBuf,
    /// Seconds since daemon start.
    pub uptime: u64,
    #[serde(rename = "totalRequests")]
    pub total_requests: u64,
    pub connections: u64,
    #[serde(rename = "idleTimeout")]
    pub idle_timeout: u64,
}
