//! REST surface of the agent platform backend.
//!
//! `ApiClient` wraps reqwest with bearer-token injection and turns every
//! non-success response into a classified [`FlowdeckError`]. Endpoint groups
//! live in their own files as inherent methods on the client.

mod agent;
mod client;
mod notify;
mod sandbox;
mod workflow;

pub use agent::AgentStartOptions;
pub use client::{ApiClient, StaticToken, TokenProvider, classify_status, status_message};
pub use notify::{ErrorReporter, Notifier, ReportContext, TracingNotifier};
pub use sandbox::FileInfo;

