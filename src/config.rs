use std::env;

pub const DEFAULT_RUN_RETENTION_DAYS: i32 = 30;
pub const DEFAULT_RATE_LIMITER_BURST: u32 = 100;
pub const DEFAULT_RATE_LIMITER_RATE: u64 = 2;

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub backend_url: String,
    pub webhook_secret: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub run_retention_days: i32,
    pub rate_limiter_burst: u32,
    pub rate_limiter_per_second: u64,
    pub port: u16,
    pub ai: AiSettings,
}

pub struct AiSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");
        let webhook_secret = env::var("WEBHOOK_SECRET").expect("WEBHOOK_SECRET must be set");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let backend_url =
            env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "skillify".to_string());
        let jwt_audience = env::var("JWT_AUDIENCE").unwrap_or_else(|_| "skillify-api".to_string());

        let run_retention_days = env::var("RUN_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(DEFAULT_RUN_RETENTION_DAYS);
        let rate_limiter_burst = env::var("RATE_LIMITER_GLOBAL_BURST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RATE_LIMITER_BURST);
        let rate_limiter_per_second = env::var("RATE_LIMITER_GLOBAL_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RATE_LIMITER_RATE);
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        let ai = AiSettings {
            api_url: env::var("AI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/responses".to_string()),
            api_key: env::var("AI_API_KEY").ok().filter(|key| !key.is_empty()),
            model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        };

        Config {
            database_url,
            frontend_origin,
            backend_url,
            webhook_secret,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            run_retention_days,
            rate_limiter_burst,
            rate_limiter_per_second,
            port,
            ai,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/test".into(),
        frontend_origin: "https://app.example.com".into(),
        backend_url: "https://api.example.com".into(),
        webhook_secret: "0123456789abcdef0123456789ABCDEF".into(),
        jwt_secret: "0123456789abcdef0123456789abcdef".into(),
        jwt_issuer: "test-issuer".into(),
        jwt_audience: "test-audience".into(),
        run_retention_days: DEFAULT_RUN_RETENTION_DAYS,
        rate_limiter_burst: DEFAULT_RATE_LIMITER_BURST,
        rate_limiter_per_second: DEFAULT_RATE_LIMITER_RATE,
        port: 8080,
        ai: AiSettings {
            api_url: "http://localhost:9/responses".into(),
            api_key: None,
            model: "test-model".into(),
        },
    }
}
