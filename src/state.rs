use std::sync::Arc;

use reqwest::Client;
use sqlx::PgPool;
use tracing::warn;

use crate::config::Config;
use crate::db::automation_repository::AutomationRepository;
use crate::db::postgres_automation_repository::PostgresAutomationRepository;
use crate::services::ai::{AiProvider, HttpAiProvider, ScriptedAiProvider};
use crate::stream::RunStreams;
use crate::utils::jwt::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    pub automation_repo: Arc<dyn AutomationRepository>,
    pub ai: Arc<dyn AiProvider>,
    pub run_streams: RunStreams,
    pub http_client: Arc<Client>,
    pub config: Arc<Config>,
    pub jwt_keys: JwtKeys,
}

impl AppState {
    pub fn build(config: Config, pool: PgPool) -> Self {
        let jwt_keys = JwtKeys::from_secret(&config.jwt_secret)
            .expect("JWT_SECRET failed validation");
        let http_client = Arc::new(Client::new());

        let ai: Arc<dyn AiProvider> = match &config.ai.api_key {
            Some(api_key) => Arc::new(HttpAiProvider::new(
                (*http_client).clone(),
                config.ai.api_url.clone(),
                api_key.clone(),
                config.ai.model.clone(),
            )),
            None => {
                warn!("AI_API_KEY is not set; ai nodes will use the scripted provider");
                Arc::new(ScriptedAiProvider::new())
            }
        };

        AppState {
            automation_repo: Arc::new(PostgresAutomationRepository { pool }),
            ai,
            run_streams: RunStreams::new(),
            http_client,
            config: Arc::new(config),
            jwt_keys,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_state(automation_repo: Arc<dyn AutomationRepository>) -> AppState {
    let config = crate::config::test_config();
    let jwt_keys = JwtKeys::from_secret(&config.jwt_secret).unwrap();
    AppState {
        automation_repo,
        ai: Arc::new(ScriptedAiProvider::new()),
        run_streams: RunStreams::new(),
        http_client: Arc::new(Client::new()),
        config: Arc::new(config),
        jwt_keys,
    }
}
