//! Project API client methods

use super::{ApiClient, ApiError, ApiRequest};
use taskboard_core::{NewProject, Project, ProjectUpdate};

impl ApiClient {
    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.get("/projects").await
    }

    pub async fn get_project(&self, id: &str) -> Result<Project, ApiError> {
        self.get(&format!("/projects/{id}")).await
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project, ApiError> {
        self.post("/projects", project).await
    }

    pub async fn update_project(
        &self,
        id: &str,
        update: &ProjectUpdate,
    ) -> Result<Project, ApiError> {
        self.put(&format!("/projects/{id}"), update).await
    }

    /// Delete a project
    pub async fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(format!("/projects/{id}")))
            .await
            .map(|_| ())
    }
}
