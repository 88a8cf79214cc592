//! Desired-state documents and sequential application.
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::app::reconciler::Reconciler;
use crate::core::{
    ConversationState, DesiredConversation, DesiredGroup, GroupState, ReconcileError, Reconciled,
};
use crate::remote::WorkspaceClient;

/// A set of conversations and user groups to converge, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub conversations: Vec<DesiredConversation>,
    #[serde(default)]
    pub usergroups: Vec<DesiredGroup>,
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty() && self.usergroups.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum Outcome<T> {
    Present(T),
    Gone,
    Failed(String),
}

impl<T> From<Result<Reconciled<T>, ReconcileError>> for Outcome<T> {
    fn from(result: Result<Reconciled<T>, ReconcileError>) -> Self {
        match result {
            Ok(Reconciled::Present(state)) => Outcome::Present(state),
            Ok(Reconciled::Gone) => Outcome::Gone,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityReport<T> {
    pub name: String,
    pub outcome: Outcome<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub conversations: Vec<EntityReport<ConversationState>>,
    pub usergroups: Vec<EntityReport<GroupState>>,
}

impl ApplyReport {
    pub fn failures(&self) -> usize {
        let conversations = self
            .conversations
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
            .count();
        let groups = self
            .usergroups
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
            .count();
        conversations + groups
    }
}

/// Reconcile every entity of `manifest`, one after another.
///
/// A failure is recorded and the next entity is attempted. Cancellation
/// stops the run and is returned as an error.
pub async fn apply<C: WorkspaceClient>(
    reconciler: &Reconciler<C>,
    manifest: &Manifest,
) -> Result<ApplyReport, ReconcileError> {
    let mut report = ApplyReport::default();

    for desired in &manifest.conversations {
        let result = reconciler.reconcile_conversation(desired).await;
        let result = stop_if_cancelled(result)?;
        log_result("conversation", &desired.name, &result);
        report.conversations.push(EntityReport {
            name: desired.name.clone(),
            outcome: result.into(),
        });
    }

    for desired in &manifest.usergroups {
        let result = reconciler.reconcile_group(desired).await;
        let result = stop_if_cancelled(result)?;
        log_result("usergroup", &desired.name, &result);
        report.usergroups.push(EntityReport {
            name: desired.name.clone(),
            outcome: result.into(),
        });
    }

    info!(
        "Applied {} conversation(s) and {} usergroup(s), {} failure(s)",
        report.conversations.len(),
        report.usergroups.len(),
        report.failures()
    );
    Ok(report)
}

fn stop_if_cancelled<T>(
    result: Result<T, ReconcileError>,
) -> Result<Result<T, ReconcileError>, ReconcileError> {
    match result {
        Err(e) if e.is_cancelled() => Err(e),
        other => Ok(other),
    }
}

fn log_result<T>(kind: &str, name: &str, result: &Result<Reconciled<T>, ReconcileError>) {
    match result {
        Ok(Reconciled::Present(_)) => info!("{kind} {name}: present"),
        Ok(Reconciled::Gone) => info!("{kind} {name}: gone remotely, forget it"),
        Err(e) => error!("{kind} {name}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_sections_are_optional() {
        let manifest = Manifest::from_json(r#"{"usergroups": [{"name": "Oncall"}]}"#).unwrap();
        assert!(manifest.conversations.is_empty());
        assert_eq!(manifest.usergroups[0].name, "Oncall");
        assert!(Manifest::from_json("{}").unwrap().is_empty());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome: Outcome<()> = Outcome::Failed("could not archive conversation C1: x".into());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["detail"], "could not archive conversation C1: x");

        let gone: Outcome<()> = Outcome::from(Ok::<_, ReconcileError>(Reconciled::Gone));
        assert_eq!(serde_json::to_value(&gone).unwrap()["status"], "gone");
    }
}
