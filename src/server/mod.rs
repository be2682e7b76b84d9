use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use gifify_av::{ConversionPipeline, ScratchSpace, ToolRegistry};
use gifify_core::RequestOptionResolver;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod error;
pub mod middleware;
pub mod routes_convert;

use self::middleware::request_id::request_id_middleware;

/// Built-in upload page, used when no `static_dir` is configured.
const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub pipeline: Arc<ConversionPipeline>,
    pub resolver: Arc<RequestOptionResolver>,
    /// Per-request uploads and outputs are staged here
    pub scratch: ScratchSpace,
    pub max_upload_bytes: u64,
}

impl AppContext {
    /// Build a context around an existing pipeline.
    pub fn new(config: Config, pipeline: ConversionPipeline) -> Result<Self> {
        let scratch = match config.server.scratch_dir {
            Some(ref dir) => ScratchSpace::new(dir)
                .with_context(|| format!("Failed to create scratch directory {:?}", dir))?,
            None => ScratchSpace::system(),
        };

        Ok(Self {
            max_upload_bytes: config.server.max_upload_bytes(),
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            resolver: Arc::new(RequestOptionResolver::new()),
            scratch,
        })
    }

    /// Build a context, discovering ffmpeg and gifsicle from the config.
    pub fn from_config(config: Config) -> Result<Self> {
        let tools = Arc::new(ToolRegistry::discover(&config.tools));
        if tools.get(gifify_av::FFMPEG).is_none() {
            tracing::warn!("ffmpeg not found; conversions will fail until it is installed");
        }
        Self::new(config, ConversionPipeline::new(tools))
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let body_limit = usize::try_from(ctx.max_upload_bytes).unwrap_or(usize::MAX);
    let static_dir = ctx
        .config
        .server
        .static_dir
        .clone()
        .filter(|dir| dir.is_dir());

    let mut app = Router::new()
        .route("/healthz", get(health_check))
        .merge(routes_convert::convert_routes());

    if static_dir.is_none() {
        app = app
            .route("/", get(index))
            .route("/index.html", get(index));
    }

    let mut app = app
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    if let Some(dir) = static_dir {
        tracing::info!("Serving static files from {:?}", dir);
        let index_path = dir.join("index.html");
        app = app.fallback_service(
            ServeDir::new(&dir)
                .append_index_html_on_directories(true)
                .not_found_service(ServeFile::new(index_path)),
        );
    }

    app
}

async fn health_check() -> impl IntoResponse {
    "ok"
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Start the HTTP server and run until Ctrl-C or SIGTERM.
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::from_config(config)?;
    let app = create_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Web UI: http://{}/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
