use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::automation_repository::AutomationRepository;
use crate::models::automation::Automation;
use crate::models::run::{Run, RunStatus};
use crate::models::run_event::{NewRunEvent, RunEvent};

const AUTOMATION_COLUMNS: &str =
    "id, workspace_id, name, flow, webhook_salt, created_at, updated_at";
const RUN_COLUMNS: &str =
    "id, automation_id, workspace_id, status, log, started_at, finished_at, created_at, updated_at";

pub struct PostgresAutomationRepository {
    pub pool: PgPool,
}

#[async_trait]
impl AutomationRepository for PostgresAutomationRepository {
    async fn create_automation(
        &self,
        workspace_id: Uuid,
        name: &str,
        flow: Value,
    ) -> Result<Automation, sqlx::Error> {
        let result = sqlx::query_as::<_, Automation>(&format!(
            r#"
            INSERT INTO automations (workspace_id, name, flow, created_at, updated_at)
            VALUES ($1, $2, $3, now(), now())
            RETURNING {AUTOMATION_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(name)
        .bind(flow)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_automations(&self, workspace_id: Uuid) -> Result<Vec<Automation>, sqlx::Error> {
        let results = sqlx::query_as::<_, Automation>(&format!(
            r#"
            SELECT {AUTOMATION_COLUMNS}
            FROM automations
            WHERE workspace_id = $1
            ORDER BY updated_at DESC
            "#
        ))
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn find_automation(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
    ) -> Result<Option<Automation>, sqlx::Error> {
        let result = sqlx::query_as::<_, Automation>(&format!(
            r#"
            SELECT {AUTOMATION_COLUMNS}
            FROM automations
            WHERE workspace_id = $1 AND id = $2
            "#
        ))
        .bind(workspace_id)
        .bind(automation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn find_automation_by_id(
        &self,
        automation_id: Uuid,
    ) -> Result<Option<Automation>, sqlx::Error> {
        let result = sqlx::query_as::<_, Automation>(&format!(
            r#"
            SELECT {AUTOMATION_COLUMNS}
            FROM automations
            WHERE id = $1
            "#
        ))
        .bind(automation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn update_flow(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
        flow: Value,
    ) -> Result<Option<Automation>, sqlx::Error> {
        let result = sqlx::query_as::<_, Automation>(&format!(
            r#"
            UPDATE automations
            SET flow = $3,
                updated_at = now()
            WHERE workspace_id = $1 AND id = $2
            RETURNING {AUTOMATION_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(automation_id)
        .bind(flow)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn delete_automation(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM automations
            WHERE workspace_id = $1 AND id = $2
            "#,
        )
        .bind(workspace_id)
        .bind(automation_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_run(
        &self,
        automation_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<Run, sqlx::Error> {
        let result = sqlx::query_as::<_, Run>(&format!(
            r#"
            INSERT INTO automation_runs
                (automation_id, workspace_id, status, log, started_at, created_at, updated_at)
            VALUES ($1, $2, 'RUNNING', '', now(), now(), now())
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(automation_id)
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn complete_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        log: &str,
    ) -> Result<bool, sqlx::Error> {
        // finished_at IS NULL keeps completion idempotent under races.
        let result = sqlx::query(
            r#"
            UPDATE automation_runs
            SET status = $2,
                log = $3,
                finished_at = now(),
                updated_at = now()
            WHERE id = $1 AND finished_at IS NULL
            "#,
        )
        .bind(run_id)
        .bind(status.as_str())
        .bind(log)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_run(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
        run_id: Uuid,
    ) -> Result<Option<Run>, sqlx::Error> {
        let result = sqlx::query_as::<_, Run>(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM automation_runs
            WHERE workspace_id = $1 AND automation_id = $2 AND id = $3
            "#
        ))
        .bind(workspace_id)
        .bind(automation_id)
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_runs(
        &self,
        workspace_id: Uuid,
        automation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Run>, sqlx::Error> {
        let results = sqlx::query_as::<_, Run>(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM automation_runs
            WHERE workspace_id = $1 AND automation_id = $2
            ORDER BY started_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(workspace_id)
        .bind(automation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn record_run_event(&self, event: NewRunEvent) -> Result<RunEvent, sqlx::Error> {
        let result = sqlx::query_as::<_, RunEvent>(
            r#"
            INSERT INTO automation_run_events
                (run_id, node_id, node_type, status, message, path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING id, run_id, node_id, node_type, status, message, path, created_at
            "#,
        )
        .bind(event.run_id)
        .bind(event.node_id)
        .bind(event.node_type)
        .bind(event.status)
        .bind(event.message)
        .bind(event.path)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_run_events(
        &self,
        run_id: Uuid,
        after: Option<OffsetDateTime>,
        limit: i64,
    ) -> Result<Vec<RunEvent>, sqlx::Error> {
        let results = if let Some(after) = after {
            sqlx::query_as::<_, RunEvent>(
                r#"
                SELECT id, run_id, node_id, node_type, status, message, path, created_at
                FROM automation_run_events
                WHERE run_id = $1 AND created_at > $2
                ORDER BY created_at ASC, id ASC
                LIMIT $3
                "#,
            )
            .bind(run_id)
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, RunEvent>(
                r#"
                SELECT id, run_id, node_id, node_type, status, message, path, created_at
                FROM automation_run_events
                WHERE run_id = $1
                ORDER BY created_at ASC, id ASC
                LIMIT $2
                "#,
            )
            .bind(run_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(results)
    }

    async fn purge_runs_older_than(&self, days: i32) -> Result<u64, sqlx::Error> {
        // Events first so the purge never orphans rows if the second
        // statement fails.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM automation_run_events
            WHERE run_id IN (
                SELECT id FROM automation_runs
                WHERE started_at < now() - make_interval(days => $1)
            )
            "#,
        )
        .bind(days)
        .execute(&mut *tx)
        .await?;

        let runs = sqlx::query(
            r#"
            DELETE FROM automation_runs
            WHERE started_at < now() - make_interval(days => $1)
            "#,
        )
        .bind(days)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(runs.rows_affected())
    }
}
