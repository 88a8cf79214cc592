//! Application layer over the reconciliation core.
//!
//! - [`Reconciler`] - owns a client and a retry executor, one method per
//!   logical operation
//! - [`Manifest`] / [`apply`] - desired-state documents applied in order
//!
//! ```ignore
//! use slack_reconcile::app::Reconciler;
//!
//! let reconciler = Reconciler::new(Arc::new(client), RetryConfig::default());
//! let state = reconciler.reconcile_conversation(&desired).await?;
//! ```

mod manifest;
mod reconciler;

pub use manifest::{apply, ApplyReport, EntityReport, Manifest, Outcome};
pub use reconciler::Reconciler;
