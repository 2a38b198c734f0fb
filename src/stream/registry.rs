//! Session-wide bookkeeping of agent runs.
//!
//! Two registries live here: the runs known to be finished, so nobody tries
//! to reconnect to them, and the single live stream per run id.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::trace;

use crate::{ShareLock, common::MemCache, common::Shutdown, model::RunId};

/// Registry entry of a live stream.
#[derive(Clone)]
pub struct ActiveStream {
    /// distinguishes a stream from a later one for the same run
    pub generation: u64,
    /// raised to make the stream task stop
    pub shutdown: Arc<Shutdown>,
    /// raised by the stream task once it has closed
    pub done: Arc<Shutdown>,
}

impl ActiveStream {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            shutdown: Arc::new(Shutdown::new()),
            done: Arc::new(Shutdown::new()),
        }
    }
}

pub struct RunRegistry {
    non_running: MemCache<RunId, ()>,
    active: ShareLock<HashMap<RunId, ActiveStream>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            non_running: MemCache::new(),
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn mark_non_running(
        &self,
        run_id: &str,
    ) {
        trace!("registry::mark_non_running({})", run_id);
        self.non_running.set(run_id.to_string(), ());
    }

    pub fn is_non_running(
        &self,
        run_id: &str,
    ) -> bool {
        self.non_running.contains(&run_id.to_string())
    }

    /// Forgets that a run ended, e.g. after it was restarted.
    pub fn clear_non_running(
        &self,
        run_id: &str,
    ) {
        self.non_running.remove(&run_id.to_string());
    }

    /// Registers a stream, handing back the one it replaces.
    pub fn replace(
        &self,
        run_id: &str,
        stream: ActiveStream,
    ) -> Option<ActiveStream> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.insert(run_id.to_string(), stream)
    }

    pub fn take(
        &self,
        run_id: &str,
    ) -> Option<ActiveStream> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.remove(run_id)
    }

    /// Removes the entry only if it still belongs to `generation`.
    pub fn remove_if(
        &self,
        run_id: &str,
        generation: u64,
    ) -> bool {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        match active.get(run_id) {
            Some(stream) if stream.generation == generation => {
                active.remove(run_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_active(
        &self,
        run_id: &str,
    ) -> bool {
        self.active.read().unwrap_or_else(PoisonError::into_inner).contains_key(run_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
