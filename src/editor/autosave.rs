//! Debounced persistence of the workflow being edited.
//!
//! Every edit queues a snapshot; the background task waits until edits stop
//! for the debounce period and then stores only the newest snapshot.

use std::{sync::Arc, time::Duration};

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::{
    AutosaveConfig,
    api::{ErrorReporter, ReportContext},
    common::{Queue, Shutdown},
    model::WorkflowModel,
    store::{self, WorkflowCollection},
};

pub struct Autosave {
    queue: Arc<Queue<WorkflowModel>>,
    shutdown: Arc<Shutdown>,
    done: Arc<Shutdown>,
}

impl Autosave {
    /// Starts the background saver on `runtime`.
    pub fn start(
        store: Arc<dyn WorkflowCollection>,
        reporter: ErrorReporter,
        config: &AutosaveConfig,
        runtime: &Handle,
    ) -> Self {
        let queue = Queue::new(config.queue_size.max(1));
        let shutdown = Arc::new(Shutdown::new());
        let done = Arc::new(Shutdown::new());

        let saver = Saver {
            queue: queue.clone(),
            store,
            reporter,
            debounce: Duration::from_millis(config.debounce_ms),
            shutdown: shutdown.clone(),
        };
        let finished = done.clone();
        runtime.spawn(async move {
            saver.run().await;
            finished.shutdown();
        });

        Self {
            queue,
            shutdown,
            done,
        }
    }

    /// Queues a snapshot for saving.
    pub fn schedule(
        &self,
        workflow: WorkflowModel,
    ) {
        if self.shutdown.is_shutdown() {
            return;
        }
        if let Err(err) = self.queue.try_send(workflow) {
            // the saver is busy; the next edit carries the newer state anyway
            warn!(error = %err, "autosave queue full, snapshot dropped");
        }
    }

    /// Saves whatever is pending, then stops the saver.
    pub async fn close(&self) {
        self.shutdown.shutdown();
        self.done.wait().await;
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        // pending snapshot is still flushed by the saver
        self.shutdown.shutdown();
    }
}

struct Saver {
    queue: Arc<Queue<WorkflowModel>>,
    store: Arc<dyn WorkflowCollection>,
    reporter: ErrorReporter,
    debounce: Duration,
    shutdown: Arc<Shutdown>,
}

impl Saver {
    async fn run(self) {
        loop {
            let first = tokio::select! {
                _ = self.shutdown.wait() => None,
                next = self.queue.next_async() => next,
            };
            let Some(mut latest) = first.or_else(|| self.queue.try_next()) else {
                return;
            };

            let mut stopping = false;
            loop {
                tokio::select! {
                    _ = self.shutdown.wait() => {
                        stopping = true;
                        break;
                    }
                    next = self.queue.next_async() => match next {
                        Some(workflow) => latest = workflow,
                        None => break,
                    },
                    _ = tokio::time::sleep(self.debounce) => break,
                }
            }
            while let Some(workflow) = self.queue.try_next() {
                latest = workflow;
            }

            self.save(&latest).await;
            if stopping {
                return;
            }
        }
    }

    async fn save(
        &self,
        workflow: &WorkflowModel,
    ) {
        debug!(workflow_id = %workflow.id, "autosave");
        match store::upsert(self.store.as_ref(), workflow).await {
            Ok(_) => info!(workflow_id = %workflow.id, "workflow saved"),
            Err(err) => {
                self.reporter.report(&err, &ReportContext::new("saving workflow"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        LayoutConfig,
        api::TracingNotifier,
        editor::{BuilderSession, EditCommand},
        model::ConditionalStep,
        store::MemStore,
    };

    #[derive(Clone)]
    struct CountingStore {
        inner: MemStore,
        writes: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl WorkflowCollection for CountingStore {
        async fn exists(
            &self,
            id: &str,
        ) -> crate::Result<bool> {
            self.inner.exists(id).await
        }

        async fn find(
            &self,
            id: &str,
        ) -> crate::Result<WorkflowModel> {
            self.inner.find(id).await
        }

        async fn query(
            &self,
            query: &store::Query,
        ) -> crate::Result<store::PageData<WorkflowModel>> {
            self.inner.query(query).await
        }

        async fn create(
            &self,
            data: &WorkflowModel,
        ) -> crate::Result<bool> {
            self.writes.lock().unwrap().push(data.name.clone());
            self.inner.create(data).await
        }

        async fn update(
            &self,
            data: &WorkflowModel,
        ) -> crate::Result<bool> {
            self.writes.lock().unwrap().push(data.name.clone());
            self.inner.update(data).await
        }

        async fn delete(
            &self,
            id: &str,
        ) -> crate::Result<bool> {
            self.inner.delete(id).await
        }
    }

    fn workflow(name: &str) -> WorkflowModel {
        WorkflowModel {
            id: "w1".to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn start(store: &CountingStore) -> Autosave {
        let config = AutosaveConfig {
            debounce_ms: 50,
            queue_size: 16,
        };
        Autosave::start(Arc::new(store.clone()), ErrorReporter::new(Arc::new(TracingNotifier)), &config, &Handle::current())
    }

    fn counting_store() -> CountingStore {
        CountingStore {
            inner: MemStore::new(),
            writes: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_burst_saves_latest_once() {
        let store = counting_store();
        let autosave = start(&store);
        for name in ["one", "two", "three"] {
            autosave.schedule(workflow(name));
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*store.writes.lock().unwrap(), vec!["three".to_string()]);
        assert_eq!(store.inner.find("w1").await.unwrap().name, "three");
        autosave.close().await;
    }

    #[tokio::test]
    async fn test_close_flushes_pending() {
        let store = counting_store();
        let autosave = start(&store);
        autosave.schedule(workflow("pending"));
        autosave.close().await;

        assert_eq!(*store.writes.lock().unwrap(), vec!["pending".to_string()]);
        // nothing is accepted after close
        autosave.schedule(workflow("late"));
        assert_eq!(store.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_edits_are_saved() {
        let store = counting_store();
        let session = BuilderSession::new(workflow("Flow"), vec![ConditionalStep::instruction("a", "A")], LayoutConfig::default()).unwrap();
        let mut session = session.with_autosave(start(&store));

        session
            .apply(EditCommand::AddStep {
                parent: None,
                index: None,
                step: ConditionalStep::instruction("b", "B"),
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let saved = store.inner.find("w1").await.unwrap();
        assert_eq!(saved.definition.nodes.len(), 2);
        assert_eq!(saved.steps().len(), 2);
    }
}
