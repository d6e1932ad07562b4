mod common;

use common::{dispatcher_with_session, within};
use proptest::prelude::*;
use serde_json::json;
use turnstile::dispatch::{Ast, Dispatcher, QueueItem, ValueCategory};

/// Issue one producer operation, tagging it with `seq` where the record allows.
fn dispatch_kind(dispatcher: &Dispatcher, kind: u8, seq: usize) -> &'static str {
    let _handle = match kind {
        0 => dispatcher.dispatch_notify(Some(format!("app-{seq}")), None, None, json!(seq)),
        1 => dispatcher.dispatch_notify_error(
            Some(format!("app-{seq}")),
            None,
            anyhow::anyhow!("failure {seq}"),
        ),
        2 => dispatcher.dispatch_ask_question(
            Some(format!("app-{seq}")),
            None,
            ValueCategory::Number,
            format!("question {seq}"),
        ),
        3 => dispatcher.dispatch_ask_for_permission(
            format!("principal-{seq}"),
            "phone:+15555555555",
            Ast::new("now => notify"),
        ),
        4 => dispatcher.dispatch_interactive_configure(Some(format!("kind-{seq}"))),
        _ => dispatcher.dispatch_run_program(Ast::new("now => notify"), format!("run-{seq}"), "me"),
    };
    match kind {
        0 => "notification",
        1 => "error",
        2 => "question",
        3 => "permission-request",
        4 => "interactive-configure",
        _ => "run-program",
    }
}

fn sequence_tag(item: &QueueItem) -> String {
    match item {
        QueueItem::Notification { source_id, .. }
        | QueueItem::Error { source_id, .. }
        | QueueItem::Question { source_id, .. } => source_id.clone().unwrap_or_default(),
        QueueItem::PermissionRequest { principal, .. } => principal.clone(),
        QueueItem::InteractiveConfigure { kind } => kind.clone().unwrap_or_default(),
        QueueItem::RunProgram { run_id, .. } => run_id.clone(),
        QueueItem::UserInput { .. } => String::new(),
    }
}

proptest! {
    #[test]
    fn idle_loop_observes_dispatches_in_order(kinds in prop::collection::vec(0u8..6, 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (dispatcher, _session) = dispatcher_with_session();
            let expected: Vec<(&str, String)> = kinds
                .iter()
                .enumerate()
                .map(|(seq, kind)| {
                    let name = dispatch_kind(&dispatcher, *kind, seq);
                    let tag = match kind {
                        0..=2 => format!("app-{seq}"),
                        3 => format!("principal-{seq}"),
                        4 => format!("kind-{seq}"),
                        _ => format!("run-{seq}"),
                    };
                    (name, tag)
                })
                .collect();

            assert_eq!(dispatcher.pending_events(), kinds.len());
            for (name, tag) in expected {
                let work = within(dispatcher.next_queue_item()).await.unwrap();
                assert_eq!(work.item.kind(), name);
                assert_eq!(sequence_tag(&work.item), tag);
            }
            assert_eq!(dispatcher.pending_events(), 0);
        });
    }
}

#[tokio::test]
async fn next_queue_item_suspends_until_notified() {
    let (dispatcher, _session) = dispatcher_with_session();

    let mut pop = Box::pin(dispatcher.next_queue_item());
    assert!(futures::poll!(&mut pop).is_pending());

    let _handle =
        dispatcher.dispatch_notify(Some("com.example.app".to_string()), None, None, json!("hi"));
    let work = within(pop).await.unwrap();

    match work.item {
        QueueItem::Notification {
            source_id,
            icon,
            output_type,
            output_value,
        } => {
            assert_eq!(source_id.as_deref(), Some("com.example.app"));
            assert_eq!(icon, None);
            assert_eq!(output_type, None);
            assert_eq!(output_value, json!("hi"));
        }
        other => panic!("expected a notification, got {other:?}"),
    }
}

#[tokio::test]
async fn notification_keeps_its_place_behind_pending_dispatches() {
    let (dispatcher, _session) = dispatcher_with_session();

    let _configure = dispatcher.dispatch_interactive_configure(None);
    let _notify =
        dispatcher.dispatch_notify(Some("com.example.app".to_string()), None, None, json!("hi"));

    let first = within(dispatcher.next_queue_item()).await.unwrap();
    let second = within(dispatcher.next_queue_item()).await.unwrap();
    assert_eq!(first.item.kind(), "interactive-configure");
    assert_eq!(second.item.kind(), "notification");
}

#[tokio::test]
async fn records_round_trip_field_for_field() {
    let (dispatcher, _session) = dispatcher_with_session();
    let program = Ast::new("monitor @weather => notify");

    let _notify = dispatcher.dispatch_notify(
        Some("com.example.weather".to_string()),
        Some("weather-icon".to_string()),
        Some("forecast".to_string()),
        json!({ "temperature": 21.5, "summary": "sunny" }),
    );
    let _error = dispatcher.dispatch_notify_error(
        Some("com.example.weather".to_string()),
        Some("weather-icon".to_string()),
        anyhow::anyhow!("service unavailable"),
    );
    let _question = dispatcher.dispatch_ask_question(
        Some("com.example.weather".to_string()),
        None,
        ValueCategory::Location,
        "Where are you?",
    );
    let _permission =
        dispatcher.dispatch_ask_for_permission("alice", "email:alice@example.com", program.clone());
    let _configure = dispatcher.dispatch_interactive_configure(Some("thermostat".to_string()));
    let _run = dispatcher.dispatch_run_program(program.clone(), "run-7", "bob");

    match within(dispatcher.next_queue_item()).await.unwrap().item {
        QueueItem::Notification {
            source_id,
            icon,
            output_type,
            output_value,
        } => {
            assert_eq!(source_id.as_deref(), Some("com.example.weather"));
            assert_eq!(icon.as_deref(), Some("weather-icon"));
            assert_eq!(output_type.as_deref(), Some("forecast"));
            assert_eq!(output_value, json!({ "temperature": 21.5, "summary": "sunny" }));
        }
        other => panic!("expected a notification, got {other:?}"),
    }

    match within(dispatcher.next_queue_item()).await.unwrap().item {
        QueueItem::Error {
            source_id,
            icon,
            error,
        } => {
            assert_eq!(source_id.as_deref(), Some("com.example.weather"));
            assert_eq!(icon.as_deref(), Some("weather-icon"));
            assert_eq!(error.to_string(), "service unavailable");
        }
        other => panic!("expected an error, got {other:?}"),
    }

    match within(dispatcher.next_queue_item()).await.unwrap().item {
        QueueItem::Question {
            source_id,
            icon,
            answer_type,
            prompt,
        } => {
            assert_eq!(source_id.as_deref(), Some("com.example.weather"));
            assert_eq!(icon, None);
            assert_eq!(answer_type, ValueCategory::Location);
            assert_eq!(prompt, "Where are you?");
        }
        other => panic!("expected a question, got {other:?}"),
    }

    match within(dispatcher.next_queue_item()).await.unwrap().item {
        QueueItem::PermissionRequest {
            principal,
            identity,
            program: requested,
        } => {
            assert_eq!(principal, "alice");
            assert_eq!(identity, "email:alice@example.com");
            assert_eq!(requested, program);
        }
        other => panic!("expected a permission request, got {other:?}"),
    }

    match within(dispatcher.next_queue_item()).await.unwrap().item {
        QueueItem::InteractiveConfigure { kind } => {
            assert_eq!(kind.as_deref(), Some("thermostat"));
        }
        other => panic!("expected interactive configuration, got {other:?}"),
    }

    match within(dispatcher.next_queue_item()).await.unwrap().item {
        QueueItem::RunProgram {
            program: requested,
            run_id,
            identity,
        } => {
            assert_eq!(requested, program);
            assert_eq!(run_id, "run-7");
            assert_eq!(identity, "bob");
        }
        other => panic!("expected a program run, got {other:?}"),
    }
}

#[tokio::test]
async fn unprocessed_records_abandon_their_handles() {
    let (dispatcher, _session) = dispatcher_with_session();
    let handle = dispatcher.dispatch_interactive_configure(None);

    let work = within(dispatcher.next_queue_item()).await.unwrap();
    drop(work);

    assert!(matches!(
        within(handle).await,
        Err(turnstile::dispatch::DialogError::Abandoned)
    ));
}
