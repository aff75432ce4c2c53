//! The panic hook is process-wide, so these run in their own binary and in a
//! single runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use tether_core::{ChatMessage, ErrorOrigin, ErrorReport, Event, EventDispatcher, EventKind, User};
use tether_runtime::{RuntimeError, UncaughtExceptionGuard, shielded_publish};

async fn next_report(reports: &mut mpsc::UnboundedReceiver<ErrorReport>) -> ErrorReport {
    timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("no error event within 5s")
        .expect("error subscriber dropped")
}

#[test]
fn test_install_needs_a_runtime() {
    let err = UncaughtExceptionGuard::install(Arc::new(EventDispatcher::new())).unwrap_err();
    assert!(matches!(err, RuntimeError::NoAsyncRuntime));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panics_and_failures_become_error_events() {
    let dispatcher = Arc::new(EventDispatcher::new());
    let (tx, mut reports) = mpsc::unbounded_channel();
    dispatcher.subscribe(
        EventKind::Error,
        move |event, _| {
            let _ = tx.send(event.as_error().unwrap().clone());
            Ok(())
        },
        Vec::new(),
    );

    assert!(UncaughtExceptionGuard::install(Arc::clone(&dispatcher)).unwrap());
    assert!(UncaughtExceptionGuard::is_installed());
    assert!(!UncaughtExceptionGuard::install(Arc::clone(&dispatcher)).unwrap());

    // A panic in a detached task.
    let task = tokio::spawn(async { panic!("task blew up") });
    assert!(task.await.unwrap_err().is_panic());

    let report = next_report(&mut reports).await;
    assert_eq!(report.origin, ErrorOrigin::Panic);
    assert_eq!(report.message, "task blew up");
    assert!(report.location.unwrap().contains("guard.rs"));

    // A panicking subscriber does not unwind into the publisher.
    dispatcher.subscribe(
        EventKind::Message,
        |_, _| panic!("subscriber blew up"),
        Vec::new(),
    );
    let message = ChatMessage::new("m1", "c1", User::new("u1", "ash"), "!raid");
    assert_eq!(shielded_publish(&dispatcher, &Event::Message(message)), None);

    let report = next_report(&mut reports).await;
    assert_eq!(report.origin, ErrorOrigin::Panic);
    assert_eq!(report.message, "subscriber blew up");

    // A subscriber returning an error.
    dispatcher.subscribe(
        EventKind::Debug,
        |_, _| Err(anyhow::anyhow!("bad heartbeat")),
        Vec::new(),
    );
    assert_eq!(
        shielded_publish(&dispatcher, &Event::Debug("heartbeat".into())),
        None
    );

    let report = next_report(&mut reports).await;
    assert_eq!(report.origin, ErrorOrigin::Callback);
    assert!(report.message.contains("bad heartbeat"));
    assert!(reports.try_recv().is_err());
}
