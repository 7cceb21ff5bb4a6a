//! CLI-side plumbing: the `kubectl` backend, the status-driven controllers,
//! the graph walker/orchestrator glue, and the `debug` formatters. The data
//! model itself (status lattice, templates, resource graph) lives in
//! `drydock_core`.

/// A thin `kubectl` subprocess wrapper.
pub mod backend;
/// `clap` argument definitions for every verb.
pub mod cli;
/// Status-driven create/delete/update/upgrade/wait/logs actions.
pub mod controllers;
/// Regex-based resource-group filter for `debug --filter-group`.
pub mod filters;
/// Console/yaml/tree/config renderers for `debug`.
pub mod formatters;
/// Binds walker strategies to controller actions for each verb.
pub mod orchestrator;
/// Graph BFS with readiness gating and the wait-gate race.
pub mod walker;
