use std::{sync::Arc, time::Duration};

use slack_reconcile::{
    app::{apply, Manifest, Outcome, Reconciler},
    remote::{
        memory::{MemoryWorkspace, Op},
        types::RemoteConversation,
        RemoteError,
    },
    retry::RetryConfig,
};

const MANIFEST: &str = r#"{
    "conversations": [
        {"name": "eng", "is_private": false, "topic": "Shipping", "members": ["U1", "U2"]},
        {"name": "taken", "is_private": false},
        {"name": "secret", "is_private": true, "members": ["U2"], "enforcement": "none"}
    ],
    "usergroups": [
        {"name": "Oncall", "handle": "oncall", "members": ["U1"]}
    ]
}"#;

fn workspace() -> MemoryWorkspace {
    let ws = MemoryWorkspace::new("UAPI");
    ws.add_conversation(
        RemoteConversation {
            name: "taken".into(),
            ..Default::default()
        },
        &[],
    );
    ws
}

#[tokio::test]
async fn failures_are_reported_and_later_entities_still_run() {
    let reconciler = Reconciler::new(Arc::new(workspace()), RetryConfig::from_secs(60));
    let manifest = Manifest::from_json(MANIFEST).unwrap();

    let report = apply(&reconciler, &manifest).await.unwrap();

    assert_eq!(report.failures(), 1);
    assert_eq!(report.conversations.len(), 3);
    match &report.conversations[0].outcome {
        Outcome::Present(state) => {
            assert_eq!(state.conversation.topic, "Shipping");
            assert_eq!(state.members, vec!["UAPI", "U1", "U2"]);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(
        report.conversations[1].outcome,
        Outcome::Failed("could not create conversation taken: name_taken".into())
    );
    assert!(matches!(report.conversations[2].outcome, Outcome::Present(_)));
    assert!(matches!(report.usergroups[0].outcome, Outcome::Present(_)));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["conversations"][1]["outcome"]["status"], "failed");
    assert_eq!(json["usergroups"][0]["name"], "Oncall");
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_run() {
    let ws = workspace();
    ws.fail_next(
        Op::CreateConversation,
        RemoteError::RateLimited {
            retry_after: Duration::from_secs(45),
        },
    );
    let reconciler = Reconciler::new(Arc::new(ws), RetryConfig::from_secs(60));
    let token = reconciler.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        token.cancel();
    });

    let manifest = Manifest::from_json(MANIFEST).unwrap();
    let err = apply(&reconciler, &manifest).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(reconciler.client().count(Op::CreateGroup), 0);
}
