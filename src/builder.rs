use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::{
    Client, Config, Result, StoreType,
    api::{ApiClient, ErrorReporter, Notifier, StaticToken, TokenProvider, TracingNotifier},
    store::{ApiStore, MemStore, WorkflowCollection},
    stream::{HttpTransport, RunTransport, StreamManager},
};

pub struct ClientBuilder {
    config: Config,
    async_worker_thread_number: u16,
    rt: Option<Arc<Runtime>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    notifier: Option<Arc<dyn Notifier>>,
    store: Option<Arc<dyn WorkflowCollection>>,
    transport: Option<Arc<dyn RunTransport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            async_worker_thread_number: 4,
            rt: None,
            tokens: None,
            notifier: None,
            store: None,
            transport: None,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    /// Worker threads of the runtime built when none is available.
    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn token_provider(
        mut self,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn notifier(
        mut self,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Overrides the store selected by `store.store_type`.
    pub fn store(
        mut self,
        store: Arc<dyn WorkflowCollection>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the HTTP transport used for agent-run streams.
    pub fn transport(
        mut self,
        transport: Arc<dyn RunTransport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client. Uses the given runtime, else the current one, else
    /// starts a dedicated multi-threaded runtime owned by the client.
    pub fn build(self) -> Result<Client> {
        let (handle, owned) = match &self.rt {
            Some(rt) => (rt.handle().clone(), Some(rt.clone())),
            None => match Handle::try_current() {
                Ok(handle) => (handle, None),
                Err(_) => {
                    let rt = Arc::new(Builder::new_multi_thread().worker_threads(self.async_worker_thread_number.max(1).into()).enable_all().build()?);
                    (rt.handle().clone(), Some(rt))
                }
            },
        };

        let tokens = self.tokens.unwrap_or_else(|| Arc::new(StaticToken::new(self.config.api.access_token.clone())));
        let api = ApiClient::new(&self.config.api, tokens)?;

        let transport = self.transport.unwrap_or_else(|| Arc::new(HttpTransport::new(api.clone())));
        let streams = StreamManager::new(transport, self.config.stream.clone(), handle.clone());

        let workflows: Arc<dyn WorkflowCollection> = match self.store {
            Some(store) => store,
            None => match self.config.store.store_type {
                StoreType::Mem => Arc::new(MemStore::new()),
                StoreType::Api => Arc::new(ApiStore::new(api.clone())),
            },
        };

        let reporter = ErrorReporter::new(self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)));

        Ok(Client::new(self.config, api, Arc::new(streams), workflows, reporter, handle, owned))
    }
}
