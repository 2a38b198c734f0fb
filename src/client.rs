//! Client - the main entry point for Flowdeck.
//!
//! The client bundles everything one signed-in session needs:
//! - The REST api wrapper with error classification
//! - The stream manager following agent runs
//! - The workflow store and builder sessions with autosave
//! - User-facing error reporting

use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};
use tracing::info;

use crate::{
    Config, Result,
    api::{AgentStartOptions, ApiClient, ErrorReporter, ReportContext},
    editor::{Autosave, BuilderSession},
    model::{AgentRun, ConditionalStep, RunId, WorkflowModel},
    store::WorkflowCollection,
    stream::{StreamCallbacks, StreamHandle, StreamManager},
    utils,
};

/// One signed-in session against the agent platform.
///
/// # Example
///
/// ```rust,ignore
/// let client = ClientBuilder::new().config(Config::create("flowdeck.toml")?).build()?;
///
/// let run_id = client.start_agent("thread-1", &AgentStartOptions::default()).await?;
/// let handle = client.stream_agent(
///     &run_id,
///     StreamCallbacks::new().on_message(|raw| println!("{}", raw)).on_close(|| println!("done")),
/// );
///
/// // later
/// handle.cancel();
/// ```
pub struct Client {
    config: Config,
    api: ApiClient,
    streams: Arc<StreamManager>,
    workflows: Arc<dyn WorkflowCollection>,
    reporter: ErrorReporter,
    runtime: Handle,
    /// Runtime started by the builder, kept alive with the client.
    _rt: Option<Arc<Runtime>>,
}

impl Client {
    pub(crate) fn new(
        config: Config,
        api: ApiClient,
        streams: Arc<StreamManager>,
        workflows: Arc<dyn WorkflowCollection>,
        reporter: ErrorReporter,
        runtime: Handle,
        rt: Option<Arc<Runtime>>,
    ) -> Self {
        Self {
            config,
            api,
            streams,
            workflows,
            reporter,
            runtime,
            _rt: rt,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn streams(&self) -> Arc<StreamManager> {
        self.streams.clone()
    }

    pub fn workflows(&self) -> Arc<dyn WorkflowCollection> {
        self.workflows.clone()
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    /// Starts an agent on a thread and returns the run id.
    pub async fn start_agent(
        &self,
        thread_id: &str,
        options: &AgentStartOptions,
    ) -> Result<RunId> {
        let run_id = self.api.start_agent(thread_id, options).await.inspect_err(|err| {
            self.reporter.report(err, &ReportContext::new("starting agent"));
        })?;
        self.streams.registry().clear_non_running(&run_id);
        Ok(run_id)
    }

    /// Closes the run's stream and asks the backend to stop it.
    pub async fn stop_agent(
        &self,
        run_id: &str,
    ) -> Result<()> {
        self.streams.stop(run_id);
        self.api.stop_agent(run_id).await.inspect_err(|err| {
            self.reporter.report(err, &ReportContext::new("stopping agent").expect_not_found());
        })
    }

    /// Current run status. Finished or unknown runs are remembered so no
    /// stream is opened for them later.
    pub async fn get_agent_status(
        &self,
        run_id: &str,
    ) -> Result<AgentRun> {
        match self.api.get_agent_status(run_id).await {
            Ok(run) => {
                if !run.is_running() {
                    self.streams.registry().mark_non_running(run_id);
                }
                Ok(run)
            }
            Err(err) => {
                if err.is_not_found() {
                    self.streams.registry().mark_non_running(run_id);
                }
                self.reporter.report(&err, &ReportContext::new("getting agent status").expect_not_found());
                Err(err)
            }
        }
    }

    pub async fn get_agent_runs(
        &self,
        thread_id: &str,
    ) -> Result<Vec<AgentRun>> {
        self.api.get_agent_runs(thread_id).await.inspect_err(|err| {
            self.reporter.report(err, &ReportContext::new("loading agent runs"));
        })
    }

    /// See [`StreamManager::stream_agent`].
    pub fn stream_agent(
        &self,
        run_id: &str,
        callbacks: StreamCallbacks,
    ) -> StreamHandle {
        self.streams.stream_agent(run_id, callbacks)
    }

    /// Opens a stored workflow in the builder, autosaving every edit.
    pub async fn open_workflow(
        &self,
        id: &str,
    ) -> Result<BuilderSession> {
        let workflow = self.workflows.find(id).await.inspect_err(|err| {
            self.reporter.report(err, &ReportContext::new("loading workflow"));
        })?;
        info!(workflow_id = id, "workflow opened");
        Ok(BuilderSession::open(workflow, self.config.layout)?.with_autosave(self.autosave()))
    }

    /// Starts a new workflow in the builder.
    pub fn new_workflow(
        &self,
        name: &str,
        steps: Vec<ConditionalStep>,
    ) -> Result<BuilderSession> {
        let workflow = WorkflowModel {
            id: utils::step_id(),
            name: name.to_string(),
            ..Default::default()
        };
        Ok(BuilderSession::new(workflow, steps, self.config.layout)?.with_autosave(self.autosave()))
    }

    fn autosave(&self) -> Autosave {
        Autosave::start(self.workflows.clone(), self.reporter.clone(), &self.config.autosave, &self.runtime)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{ClientBuilder, model::ConditionKind, store::MemStore};

    #[tokio::test]
    async fn test_new_workflow_is_autosaved_and_reopened() {
        let store = Arc::new(MemStore::new());
        let mut config = Config::default();
        config.autosave.debounce_ms = 10;
        let client = ClientBuilder::new().config(config).store(store.clone()).build().unwrap();

        let mut session = client.new_workflow("Triage", vec![ConditionalStep::instruction("a", "Classify")]).unwrap();
        session
            .apply(crate::editor::EditCommand::InsertConditional {
                after: "a".to_string(),
                expression: Some("urgent".to_string()),
            })
            .unwrap();
        let id = session.workflow().id;

        tokio::time::sleep(Duration::from_millis(100)).await;
        let reopened = client.open_workflow(&id).await.unwrap();
        assert_eq!(reopened.steps().len(), 3);
        assert_eq!(reopened.steps()[1].condition_kind(), Some(ConditionKind::If));
        assert_eq!(reopened.steps()[1].expression(), Some("urgent"));
    }

    #[tokio::test]
    async fn test_stop_agent_marks_non_running_without_token() {
        let client = ClientBuilder::new().build().unwrap();
        // no token configured: the rest call fails, the run is still closed locally
        let err = client.stop_agent("r1").await.unwrap_err();
        assert!(err.is_auth());
        assert!(client.streams().is_non_running("r1"));
    }
}
