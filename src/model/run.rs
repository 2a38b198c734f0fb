use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// agent run id
pub type RunId = String;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentRunStatus {
    #[default]
    Running,
    Completed,
    Stopped,
    #[serde(alias = "failed")]
    Error,
}

/// One execution of an agent against a thread.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AgentRun {
    pub id: RunId,
    #[serde(default)]
    pub thread_id: String,
    pub status: AgentRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentRun {
    pub fn is_running(&self) -> bool {
        self.status == AgentRunStatus::Running
    }
}
