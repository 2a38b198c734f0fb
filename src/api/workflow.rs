use reqwest::Method;

use crate::{Result, api::ApiClient, model::WorkflowModel};

impl ApiClient {
    pub async fn list_workflows(&self) -> Result<Vec<WorkflowModel>> {
        let request = self.request(Method::GET, "/workflows").await?;
        self.send_json(request).await
    }

    pub async fn get_workflow(
        &self,
        id: &str,
    ) -> Result<WorkflowModel> {
        let request = self.request(Method::GET, &format!("/workflows/{}", id)).await?;
        self.send_json(request).await
    }

    pub async fn create_workflow(
        &self,
        workflow: &WorkflowModel,
    ) -> Result<WorkflowModel> {
        let request = self.request(Method::POST, "/workflows").await?.json(workflow);
        self.send_json(request).await
    }

    pub async fn update_workflow(
        &self,
        workflow: &WorkflowModel,
    ) -> Result<WorkflowModel> {
        let request = self.request(Method::PUT, &format!("/workflows/{}", workflow.id)).await?.json(workflow);
        self.send_json(request).await
    }

    pub async fn delete_workflow(
        &self,
        id: &str,
    ) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("/workflows/{}", id)).await?;
        self.send(request).await?;
        Ok(())
    }
}
