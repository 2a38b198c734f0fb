//! Storage layer for workflow definitions.
//!
//! Provides an abstraction over different storage backends:
//! - `MemStore`: In-memory storage for offline editing and tests
//! - `ApiStore`: the backend's `/workflows` REST surface

mod api;
mod mem;
mod query;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{FlowdeckError, Result, model::WorkflowModel, utils};

pub use api::ApiStore;
pub use mem::MemStore;
pub use query::Query;

/// Paginated query result.
#[derive(Debug, Deserialize, Serialize)]
pub struct PageData<T> {
    /// Total number of matching records.
    pub count: usize,
    /// Current page number (1-based).
    pub page_num: usize,
    /// Total number of pages.
    pub page_count: usize,
    /// Number of records per page.
    pub page_size: usize,
    /// Records in the current page.
    pub rows: Vec<T>,
}

impl<T> PageData<T> {
    /// Cuts one page out of the full, already filtered result.
    pub fn paginate(
        all: Vec<T>,
        query: &Query,
    ) -> Self {
        let count = all.len();
        let page_size = query.limit.max(1);
        let rows: Vec<T> = all.into_iter().skip(query.offset).take(page_size).collect();

        Self {
            count,
            page_num: query.offset / page_size + 1,
            page_count: count.div_ceil(page_size),
            page_size,
            rows,
        }
    }
}

/// CRUD operations over stored workflows.
#[async_trait]
pub trait WorkflowCollection: Send + Sync {
    /// Checks if a workflow with the given ID exists.
    async fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Finds a workflow by ID.
    async fn find(
        &self,
        id: &str,
    ) -> Result<WorkflowModel>;

    /// Queries workflows with pagination and filtering.
    async fn query(
        &self,
        query: &Query,
    ) -> Result<PageData<WorkflowModel>>;

    /// Creates a new workflow.
    async fn create(
        &self,
        data: &WorkflowModel,
    ) -> Result<bool>;

    /// Updates an existing workflow.
    async fn update(
        &self,
        data: &WorkflowModel,
    ) -> Result<bool>;

    /// Deletes a workflow by ID.
    async fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// Creates the workflow or overwrites the stored one, keeping its creation time.
pub async fn upsert(
    workflows: &dyn WorkflowCollection,
    workflow: &WorkflowModel,
) -> Result<bool> {
    trace!("store::upsert({})", workflow.id);
    if workflow.id.is_empty() {
        return Err(FlowdeckError::Workflow("missing id in workflow".into()));
    }

    let mut data = workflow.clone();
    match workflows.find(&workflow.id).await {
        Ok(stored) => {
            data.created_at = stored.created_at;
            data.updated_at = Some(utils::time::now());
            workflows.update(&data).await
        }
        Err(err) if err.is_not_found() => {
            data.created_at = Some(utils::time::now());
            data.updated_at = None;
            workflows.create(&data).await
        }
        Err(err) => Err(err),
    }
}
