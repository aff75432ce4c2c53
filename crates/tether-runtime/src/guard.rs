//! Process-wide interception of panics and failing subscribers.
//!
//! A bot favours uptime over fail-fast: a panic in a subscriber or in any
//! spawned task is logged and republished as an [`Event::Error`] instead of
//! being left to take the bot down.
//!
//! Two paths feed the same event:
//!
//! - the panic hook installed by [`UncaughtExceptionGuard::install`] reports
//!   every panic in the process, wherever it happens;
//! - [`shielded_publish`] wraps a dispatcher publish, turning a subscriber's
//!   `Err` into a report and stopping a subscriber's panic from unwinding into
//!   the caller.
//!
//! Failures while publishing an `Error` event are logged and go no further, so
//! a broken error subscriber cannot feed itself.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::{Arc, Once};

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use tether_core::{ErrorReport, Event, EventDispatcher};

use crate::error::{RuntimeError, RuntimeResult};

static HOOK: Once = Once::new();
static SINK: RwLock<Option<UnboundedSender<ErrorReport>>> = RwLock::new(None);

thread_local! {
    static PUBLISHING_ERROR: Cell<bool> = const { Cell::new(false) };
}

/// Installer for the process-wide panic hook.
pub struct UncaughtExceptionGuard;

impl UncaughtExceptionGuard {
    /// Installs the panic hook and routes its reports to `dispatcher`.
    ///
    /// The hook is registered once per process, chained in front of whatever
    /// hook was there before. Later calls register nothing and return
    /// `Ok(false)`; they only re-point the reports at `dispatcher` if the
    /// previous forwarding task is gone (its runtime shut down).
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoAsyncRuntime`] outside a Tokio runtime, since reports
    /// are published from a forwarding task.
    pub fn install(dispatcher: Arc<EventDispatcher>) -> RuntimeResult<bool> {
        let handle = Handle::try_current().map_err(|_| RuntimeError::NoAsyncRuntime)?;

        let mut first = false;
        HOOK.call_once(|| {
            install_hook();
            first = true;
        });

        let mut sink = SINK.write();
        if first || sink.as_ref().is_none_or(UnboundedSender::is_closed) {
            let (tx, rx) = mpsc::unbounded_channel();
            handle.spawn(forward_reports(rx, dispatcher));
            *sink = Some(tx);
        }
        drop(sink);

        if first {
            info!("Uncaught exception guard installed");
        } else {
            debug!("Uncaught exception guard already installed");
        }
        Ok(first)
    }

    /// Whether the panic hook has been registered.
    pub fn is_installed() -> bool {
        HOOK.is_completed()
    }
}

fn install_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let report = report_from_hook(info);
        error!(
            location = report.location.as_deref().unwrap_or("unknown"),
            "Uncaught panic: {}", report.message
        );

        if !PUBLISHING_ERROR.with(Cell::get) {
            if let Some(sink) = SINK.read().as_ref() {
                let _ = sink.send(report);
            }
        }

        previous(info);
    }));
}

async fn forward_reports(mut reports: UnboundedReceiver<ErrorReport>, dispatcher: Arc<EventDispatcher>) {
    while let Some(report) = reports.recv().await {
        shielded_publish(&dispatcher, &Event::Error(report));
    }
    debug!("Panic report forwarder stopped");
}

/// Publishes `event`, intercepting whatever its subscribers throw.
///
/// Returns the number of subscribers invoked, or `None` when one of them
/// failed. A failure is logged; unless `event` is itself an `Error` it is
/// also published as [`Event::Error`]. Panics are reported by the hook when it
/// is installed and directly otherwise.
pub fn shielded_publish(dispatcher: &EventDispatcher, event: &Event) -> Option<usize> {
    let is_error = matches!(event, Event::Error(_));
    let outcome = {
        let _scope = is_error.then(ErrorScope::enter);
        panic::catch_unwind(AssertUnwindSafe(|| dispatcher.publish(event)))
    };

    let report = match outcome {
        Ok(Ok(invoked)) => return Some(invoked),
        Ok(Err(err)) => {
            let report = ErrorReport::callback(error_chain(&err));
            error!(kind = %event.kind(), error = %report, "Subscriber failed");
            report
        }
        Err(_) if UncaughtExceptionGuard::is_installed() => return None,
        Err(payload) => {
            let report = ErrorReport::panic(panic_message(payload.as_ref()), None);
            error!(kind = %event.kind(), error = %report, "Subscriber panicked");
            report
        }
    };

    if !is_error {
        shielded_publish(dispatcher, &Event::Error(report));
    }
    None
}

/// Marks the current thread as publishing an `Error` event.
struct ErrorScope {
    outer: bool,
}

impl ErrorScope {
    fn enter() -> Self {
        Self {
            outer: PUBLISHING_ERROR.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for ErrorScope {
    fn drop(&mut self) {
        PUBLISHING_ERROR.with(|flag| flag.set(self.outer));
    }
}

fn report_from_hook(info: &PanicHookInfo<'_>) -> ErrorReport {
    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
    ErrorReport::panic(panic_message(info.payload()), location)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
