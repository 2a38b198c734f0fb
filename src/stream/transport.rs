use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tracing::debug;

use crate::{
    Result,
    api::ApiClient,
    model::AgentRun,
    stream::sse::decode_events,
};

/// Event payloads of one open stream connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// How the stream manager reaches the backend.
#[async_trait]
pub trait RunTransport: Send + Sync {
    /// Current status of a run.
    async fn run_status(
        &self,
        run_id: &str,
    ) -> Result<AgentRun>;

    /// Opens a new event-stream connection for a run.
    async fn open_stream(
        &self,
        run_id: &str,
    ) -> Result<FrameStream>;
}

/// [`RunTransport`] over the backend's REST and event-stream endpoints.
#[derive(Clone)]
pub struct HttpTransport {
    api: ApiClient,
}

impl HttpTransport {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
        }
    }
}

#[async_trait]
impl RunTransport for HttpTransport {
    async fn run_status(
        &self,
        run_id: &str,
    ) -> Result<AgentRun> {
        self.api.get_agent_status(run_id).await
    }

    async fn open_stream(
        &self,
        run_id: &str,
    ) -> Result<FrameStream> {
        let response = self.api.open_agent_stream(run_id).await?;
        debug!(run_id, "event stream opened");
        Ok(decode_events(response.bytes_stream()))
    }
}
