//! Task API client methods

use super::{ApiClient, ApiError, ApiRequest};
use taskboard_core::{NewTask, Task, TaskUpdate};

impl ApiClient {
    /// List all tasks of the authenticated user
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.get("/tasks").await
    }

    /// List the tasks that belong to a project
    pub async fn list_project_tasks(&self, project_id: &str) -> Result<Vec<Task>, ApiError> {
        self.get(&format!("/projects/{project_id}/tasks")).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task, ApiError> {
        self.get(&format!("/tasks/{id}")).await
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        self.post("/tasks", task).await
    }

    pub async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
        self.put(&format!("/tasks/{id}"), update).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(format!("/tasks/{id}")))
            .await
            .map(|_| ())
    }
}
