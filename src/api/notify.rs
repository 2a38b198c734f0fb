//! User-facing error reporting.
//!
//! Expected conditions never reach the user as a generic toast: billing
//! errors go to the billing surface, and not-found errors are dropped when
//! the caller said the resource may be absent.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::FlowdeckError;

/// Where user-visible notifications end up (toasts, billing dialog).
pub trait Notifier: Send + Sync {
    /// Generic error toast.
    fn error(
        &self,
        message: &str,
    );

    /// Billing limit reached; `detail` is the server's structured payload.
    fn billing(
        &self,
        message: &str,
        detail: Option<&Value>,
    );
}

/// Notifier that only logs. Used when no UI is attached.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(
        &self,
        message: &str,
    ) {
        error!(text = message, "error notification");
    }

    fn billing(
        &self,
        message: &str,
        _detail: Option<&Value>,
    ) {
        warn!(text = message, "billing notification");
    }
}

/// What the failing call was doing.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub operation: String,
    pub expect_not_found: bool,
}

impl ReportContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            expect_not_found: false,
        }
    }

    /// Not-found is a normal outcome for this call.
    pub fn expect_not_found(mut self) -> Self {
        self.expect_not_found = true;
        self
    }
}

#[derive(Clone)]
pub struct ErrorReporter {
    notifier: Arc<dyn Notifier>,
}

impl ErrorReporter {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
        }
    }

    /// Logs the error and notifies the user if appropriate.
    /// Returns true when a generic error toast was emitted.
    pub fn report(
        &self,
        err: &FlowdeckError,
        context: &ReportContext,
    ) -> bool {
        match err {
            FlowdeckError::Billing {
                message,
                detail,
            } => {
                warn!(operation = %context.operation, message = %message, "billing error");
                self.notifier.billing(message, detail.as_ref());
                false
            }
            err if err.is_not_found() && context.expect_not_found => {
                debug!(operation = %context.operation, error = %err, "expected not found");
                false
            }
            err => {
                error!(operation = %context.operation, error = %err, "request failed");
                self.notifier.error(&user_message(err, context));
                true
            }
        }
    }
}

fn user_message(
    err: &FlowdeckError,
    context: &ReportContext,
) -> String {
    match err {
        FlowdeckError::Http {
            message, ..
        }
        | FlowdeckError::Auth(message)
        | FlowdeckError::NotFound(message) => message.clone(),
        other if context.operation.is_empty() => other.to_string(),
        other => format!("Error {}: {}", context.operation, other),
    }
}
