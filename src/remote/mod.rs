//! Remote workspace capability set: client trait, records, errors, and the
//! HTTP and in-memory implementations.
mod client;
mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use client::WorkspaceClient;
pub use error::{ErrorCode, RemoteError};
pub use http::SlackHttpClient;
pub use memory::MemoryWorkspace;
