use dotenvy::dotenv;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::services::ServeDir;
use tower_http::trace::{TraceLayer, DefaultMakeSpan, DefaultOnResponse};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use std::sync::Arc;

mod handlers {
    pub mod order_handlers;
}
mod api {
    pub mod order_sink;
    pub mod gmail_smtp;
    pub mod google_sheets;
}
mod models {
    pub mod order_models;
}
mod config {
    pub mod app_config;
}

use api::gmail_smtp::GmailNotifier;
use api::google_sheets::SheetsAppender;
use api::order_sink::{OrderSink, SinkError};
use config::app_config::AppConfig;
use handlers::order_handlers::{self, OrderDispatcher};

async fn health_check() -> &'static str {
    "OK"
}

pub struct AppState {
    config: AppConfig,
    dispatcher: OrderDispatcher,
}

/// `Ok(None)` when the credentials are not set at all.
fn email_sink(config: &AppConfig) -> Result<Option<Arc<dyn OrderSink>>, SinkError> {
    match &config.gmail {
        Some(gmail) => Ok(Some(Arc::new(GmailNotifier::new(gmail)?) as Arc<dyn OrderSink>)),
        None => Ok(None),
    }
}

fn ledger_sink(config: &AppConfig) -> Result<Option<Arc<dyn OrderSink>>, SinkError> {
    match &config.sheets {
        Some(sheets) => Ok(Some(Arc::new(SheetsAppender::new(sheets.clone())?) as Arc<dyn OrderSink>)),
        None => Ok(None),
    }
}

/// Builds whichever sinks have credentials. A sink that cannot be built is
/// left out so the shop keeps taking orders.
fn build_dispatcher(config: &AppConfig) -> OrderDispatcher {
    let email = match email_sink(config) {
        Ok(Some(sink)) => Some(sink),
        Ok(None) => {
            tracing::warn!("GMAIL_USER/GMAIL_PASS not set, orders will not be emailed");
            None
        }
        Err(e) => {
            tracing::error!("Email notifications disabled: {}", e);
            None
        }
    };
    let ledger = match ledger_sink(config) {
        Ok(Some(sink)) => Some(sink),
        Ok(None) => {
            tracing::warn!("Google Sheets credentials not set, orders will not be recorded in the sheet");
            None
        }
        Err(e) => {
            tracing::error!("Sheet ledger disabled: {}", e);
            None
        }
    };

    OrderDispatcher {
        email,
        ledger,
        mode: config.dispatch_mode,
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/submit-order", post(order_handlers::submit_order));

    if let Some(dir) = &state.config.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
        )
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_origin(Any)
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .expose_headers([axum::http::header::CONTENT_TYPE])
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    let _guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((dsn, sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        }))
    });

    let dispatcher = build_dispatcher(&config);
    let addr = config.server_addr;
    let state = Arc::new(AppState { config, dispatcher });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app(state).into_make_service()).await?;
    Ok(())
}
