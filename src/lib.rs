//! # clangd-query
//!
//! A code-intelligence CLI for C++ codebases. Drives `clangd` over LSP from a
//! per-project background daemon and renders terse, location-anchored text
//! answers to structured questions: search for a symbol, show its
//! declaration and definition, list its usages, render its inheritance tree,
//! print its signature, or list the public interface of a class.
//!
//! ## Layout
//!
//! - [`transport`]: framed JSON-RPC over a child process's stdio.
//! - [`lsp_client`]: typed LSP operations on top of the transport, specialized
//!   for talking to `clangd`.
//! - [`hover_parser`]: turns clangd's markdown hover payloads into structured
//!   records.
//! - [`paths`] / [`lock`]: per-project socket/lock/log/build-cache layout and
//!   single-instance coordination.
//! - [`daemon`]: the background server (accept loop, request dispatch, idle
//!   shutdown, file watching).
//! - [`commands`]: the seven semantic commands built on the LSP client.
//! - [`client`]: the thin client that discovers/starts the daemon, sends one
//!   request, and prints the response.
//! - [`logging`]: shared stderr + rotating-file log sink with an in-memory
//!   ring buffer for the `logs` daemon method.
//! - [`compiledb`]: compile-database discovery/generation.

pub mod client;
pub mod commands;
pub mod compiledb;
pub mod daemon;
pub mod hover_parser;
pub mod lock;
pub mod logging;
pub mod lsp_client;
pub mod paths;
pub mod transport;
pub mod types;
pub mod watcher;
