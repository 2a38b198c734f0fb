use async_trait::async_trait;

use crate::{
    Result,
    api::ApiClient,
    model::WorkflowModel,
    store::{PageData, Query, WorkflowCollection},
};

/// Workflows persisted through the backend REST api.
#[derive(Clone)]
pub struct ApiStore {
    api: ApiClient,
}

impl ApiStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
        }
    }
}

#[async_trait]
impl WorkflowCollection for ApiStore {
    async fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        match self.api.get_workflow(id).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn find(
        &self,
        id: &str,
    ) -> Result<WorkflowModel> {
        self.api.get_workflow(id).await
    }

    async fn query(
        &self,
        query: &Query,
    ) -> Result<PageData<WorkflowModel>> {
        // the listing endpoint has no server-side filters
        let rows = self.api.list_workflows().await?.into_iter().filter(|w| query.matches(w)).collect();
        Ok(PageData::paginate(rows, query))
    }

    async fn create(
        &self,
        data: &WorkflowModel,
    ) -> Result<bool> {
        self.api.create_workflow(data).await?;
        Ok(true)
    }

    async fn update(
        &self,
        data: &WorkflowModel,
    ) -> Result<bool> {
        self.api.update_workflow(data).await?;
        Ok(true)
    }

    async fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        match self.api.delete_workflow(id).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
