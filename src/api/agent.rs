use reqwest::{Method, Response, header::ACCEPT};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    Result,
    api::ApiClient,
    model::{AgentRun, RunId},
};

/// Optional knobs for starting an agent on a thread.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AgentStartOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_thinking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

#[derive(Deserialize)]
struct StartResponse {
    agent_run_id: RunId,
}

#[derive(Deserialize)]
struct RunsResponse {
    #[serde(default)]
    agent_runs: Vec<AgentRun>,
}

impl ApiClient {
    /// Starts an agent on a thread and returns the new run id.
    pub async fn start_agent(
        &self,
        thread_id: &str,
        options: &AgentStartOptions,
    ) -> Result<RunId> {
        let request = self.request(Method::POST, &format!("/thread/{}/agent/start", thread_id)).await?.json(options);
        let response: StartResponse = self.send_json(request).await?;
        info!(thread_id, run_id = %response.agent_run_id, "agent started");
        Ok(response.agent_run_id)
    }

    pub async fn stop_agent(
        &self,
        run_id: &str,
    ) -> Result<()> {
        let request = self.request(Method::POST, &format!("/agent-run/{}/stop", run_id)).await?;
        self.send(request).await?;
        info!(run_id, "agent stop requested");
        Ok(())
    }

    pub async fn get_agent_status(
        &self,
        run_id: &str,
    ) -> Result<AgentRun> {
        let request = self.request(Method::GET, &format!("/agent-run/{}", run_id)).await?;
        self.send_json(request).await
    }

    pub async fn get_agent_runs(
        &self,
        thread_id: &str,
    ) -> Result<Vec<AgentRun>> {
        let request = self.request(Method::GET, &format!("/thread/{}/agent-runs", thread_id)).await?;
        let response: RunsResponse = self.send_json(request).await?;
        Ok(response.agent_runs)
    }

    /// Opens the run's event stream. The token travels as a query parameter
    /// since event-stream endpoints are consumed without custom headers.
    pub async fn open_agent_stream(
        &self,
        run_id: &str,
    ) -> Result<Response> {
        let token = self.token().await?;
        let request = self
            .http
            .get(self.url(&format!("/agent-run/{}/stream", run_id)))
            .query(&[("token", token.as_str())])
            .header(ACCEPT, "text/event-stream");
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_options_skip_unset() {
        let options = AgentStartOptions {
            model_name: Some("claude".to_string()),
            stream: Some(true),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&options).unwrap(), serde_json::json!({"model_name": "claude", "stream": true}));
    }

    #[test]
    fn test_runs_response() {
        let response: RunsResponse = serde_json::from_str(
            r#"{"agent_runs": [{"id": "r1", "thread_id": "t1", "status": "completed"}, {"id": "r2", "status": "failed"}]}"#,
        )
        .unwrap();
        assert_eq!(response.agent_runs.len(), 2);
        assert!(!response.agent_runs[0].is_running());
        assert_eq!(response.agent_runs[1].status, crate::model::AgentRunStatus::Error);
    }
}
