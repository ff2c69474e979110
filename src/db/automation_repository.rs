use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::automation::Automation;
use crate::models::run::{Run, RunStatus};
use crate::models::run_event::{NewRunEvent, RunEvent};

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AutomationRepository: Send + Sync {
    async fn create_automation(
        &self,
        workspace_id: Uuid,
        name: &str,
        flow: Value,
    ) -> Result<Automation, sqlx::Error>;

    async fn list_automations(&self, workspace_id: Uuid) -> Result<Vec<Automation>, sqlx::Error>;

    async fn find_automation(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
    ) -> Result<Option<Automation>, sqlx::Error>;

    /// Lookup without workspace scoping, for the public webhook path. The
    /// caller authenticates via the HMAC token instead.
    async fn find_automation_by_id(
        &self,
        automation_id: Uuid,
    ) -> Result<Option<Automation>, sqlx::Error>;

    async fn update_flow(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
        flow: Value,
    ) -> Result<Option<Automation>, sqlx::Error>;

    async fn delete_automation(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
    ) -> Result<bool, sqlx::Error>;

    async fn create_run(
        &self,
        automation_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<Run, sqlx::Error>;

    async fn complete_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        log: &str,
    ) -> Result<bool, sqlx::Error>;

    async fn find_run(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
        run_id: Uuid,
    ) -> Result<Option<Run>, sqlx::Error>;

    async fn list_runs(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Run>, sqlx::Error>;

    async fn record_run_event(&self, event: NewRunEvent) -> Result<RunEvent, sqlx::Error>;

    async fn list_run_events(
        &self,
        run_id: Uuid,
        after: Option<OffsetDateTime>,
        limit: i64,
    ) -> Result<Vec<RunEvent>, sqlx::Error>;

    async fn purge_runs_older_than(&self, days: i32) -> Result<u64, sqlx::Error>;
}
