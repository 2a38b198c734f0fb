use crate::model::{WorkflowModel, WorkflowStatus};

const DEFAULT_LIMIT: usize = 100;

/// Filter and page window for workflow queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// case-insensitive substring of the workflow name
    pub name: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            name: None,
            status: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn status(
        mut self,
        status: WorkflowStatus,
    ) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(
        mut self,
        limit: usize,
    ) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(
        mut self,
        offset: usize,
    ) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(
        &self,
        workflow: &WorkflowModel,
    ) -> bool {
        if let Some(status) = self.status {
            if workflow.status != status {
                return false;
            }
        }
        match &self.name {
            Some(name) => workflow.name.to_lowercase().contains(&name.to_lowercase()),
            None => true,
        }
    }
}
