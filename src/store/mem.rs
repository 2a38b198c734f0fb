use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use crate::{
    FlowdeckError, Result, ShareLock,
    model::WorkflowModel,
    store::{PageData, Query, WorkflowCollection},
};

/// Workflows kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    workflows: ShareLock<HashMap<String, WorkflowModel>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&HashMap<String, WorkflowModel>) -> T,
    ) -> Result<T> {
        let workflows = self.workflows.read().map_err(|e| FlowdeckError::Store(e.to_string()))?;
        Ok(f(&workflows))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, WorkflowModel>) -> T,
    ) -> Result<T> {
        let mut workflows = self.workflows.write().map_err(|e| FlowdeckError::Store(e.to_string()))?;
        Ok(f(&mut workflows))
    }
}

#[async_trait]
impl WorkflowCollection for MemStore {
    async fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        self.read(|workflows| workflows.contains_key(id))
    }

    async fn find(
        &self,
        id: &str,
    ) -> Result<WorkflowModel> {
        self.read(|workflows| workflows.get(id).cloned())?.ok_or_else(|| FlowdeckError::NotFound(format!("workflow {}", id)))
    }

    async fn query(
        &self,
        query: &Query,
    ) -> Result<PageData<WorkflowModel>> {
        let mut rows = self.read(|workflows| workflows.values().filter(|w| query.matches(w)).cloned().collect::<Vec<_>>())?;
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(PageData::paginate(rows, query))
    }

    async fn create(
        &self,
        data: &WorkflowModel,
    ) -> Result<bool> {
        self.write(|workflows| {
            if workflows.contains_key(&data.id) {
                return Err(FlowdeckError::Store(format!("workflow {} already exists", data.id)));
            }
            workflows.insert(data.id.clone(), data.clone());
            Ok(true)
        })?
    }

    async fn update(
        &self,
        data: &WorkflowModel,
    ) -> Result<bool> {
        self.write(|workflows| match workflows.get_mut(&data.id) {
            Some(stored) => {
                *stored = data.clone();
                Ok(true)
            }
            None => Err(FlowdeckError::NotFound(format!("workflow {}", data.id))),
        })?
    }

    async fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        self.write(|workflows| workflows.remove(id).is_some())
    }
}
