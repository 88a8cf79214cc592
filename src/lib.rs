//! Declarative reconciliation of conversations and user groups in a
//! Slack-like workspace.
//!
//! - [`remote`] - the workspace capability set and its HTTP / in-memory clients
//! - [`retry`] - error classification and the rate-aware retry executor
//! - [`core`] - resolver, membership, conversation and user group reconcilers
//! - [`app`] - the [`Reconciler`](app::Reconciler) entry point and manifests

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod remote;
pub mod retry;

pub use crate::config::{ConfigError, ProviderConfig};
pub use crate::core::ReconcileError;
pub use crate::remote::RemoteError;
