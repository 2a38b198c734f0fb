//! Classification of agent-run stream frames.
//!
//! Frames are inspected in priority order: pings, error statuses, unknown
//! runs, completion, and finally everything else, which is passed through
//! untouched for the caller to interpret.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

const RUN_NOT_FOUND_PATTERN: &str = r"Agent run \S* ?not found in active runs";
const COMPLETED_PATTERN: &str = r"Run data not available for streaming|Stream ended with status: completed|Agent run completed successfully";

static RUN_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| Regex::new(RUN_NOT_FOUND_PATTERN).expect("run not found pattern"));
static COMPLETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(COMPLETED_PATTERN).expect("completed pattern"));

#[derive(Debug, Clone, PartialEq, strum::AsRefStr)]
pub enum Frame {
    /// keep-alive, dropped
    Ping,
    /// The run reported an error; it may keep going.
    Error(String),
    /// The server has no such run.
    RunNotFound(String),
    /// Last frame of a finished run.
    Completed(String),
    Message(String),
}

pub fn classify(raw: &str) -> Frame {
    let json: Option<Value> = serde_json::from_str(raw.trim()).ok();
    let field = |key: &str| json.as_ref().and_then(|v| v.get(key)).and_then(Value::as_str);

    if field("type") == Some("ping") {
        return Frame::Ping;
    }

    if field("status") == Some("error") {
        return Frame::Error(field("message").unwrap_or(raw).to_string());
    }

    if RUN_NOT_FOUND.is_match(raw) {
        let message = field("message").or(field("detail")).unwrap_or(raw);
        return Frame::RunNotFound(message.to_string());
    }

    let completed = field("type") == Some("status") && field("status") == Some("completed") && COMPLETED.is_match(field("message").unwrap_or(raw));
    if completed || field("status_type") == Some("thread_run_end") {
        return Frame::Completed(raw.to_string());
    }

    Frame::Message(raw.to_string())
}
