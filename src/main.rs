use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skillify_backend::config::Config;
use skillify_backend::db::establish_connection;
use skillify_backend::responses::JsonResponse;
use skillify_backend::routes::{automations, health::health};
use skillify_backend::state::AppState;
use skillify_backend::worker::spawn_retention_worker;

#[cfg(feature = "tls")]
use axum_server::tls_rustls::RustlsConfig;

#[tokio::main]
async fn main() {
    // Errors go to Sentry when a DSN is configured; no-op otherwise.
    let _sentry = sentry::init((
        std::env::var("SENTRY_DSN").ok(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let config = Config::from_env();

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limiter_per_second)
            .burst_size(config.rate_limiter_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background task to cleanup old IPs from the limiter map
    let governor_limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let port = config.port;
    let pg_pool = establish_connection(&config.database_url).await;
    let state = AppState::build(config, pg_pool);

    spawn_retention_worker(state.clone());

    let api_routes = automations::protected_routes()
        .merge(automations::public_routes())
        .route("/health", get(health));

    let app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: governor_conf.clone(),
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    #[cfg(feature = "tls")]
    {
        let tls_config = RustlsConfig::from_pem_file(
            std::env::var("DEV_CERT_LOCATION").unwrap(),
            std::env::var("DEV_KEY_LOCATION").unwrap(),
        )
        .await
        .expect("Failed to load TLS certs");

        info!("Running with TLS at https://{}", addr);
        let _ = axum_server::bind_rustls(addr, tls_config)
            .serve(make_service)
            .await;

        return; // Skip the fallback if TLS was used
    }

    let listener = TcpListener::bind(addr).await.unwrap();
    info!("Running without TLS at http://{}", addr);
    axum::serve(listener, make_service).await.unwrap();
}
