//! HTTP exposition: the metrics endpoint and a small landing page.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Shared server state.
pub struct ServerState {
    pub registry: Registry,
    pub metrics_path: String,
    pub is_raspberry_pi: bool,
    pub enable_comparison: bool,
}

impl ServerState {
    pub fn powertop_enabled(&self) -> bool {
        !self.is_raspberry_pi || self.enable_comparison
    }
}

/// Gather every registered collector and encode in the text exposition format.
/// Returns the content type alongside the body.
///
/// Collection may block (the firmware collector runs its pass synchronously),
/// so call this from a blocking thread.
pub fn encode_metrics(registry: &Registry) -> prometheus::Result<(String, Vec<u8>)> {
    let encoder = TextEncoder::new();
    let families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

pub fn render_index(state: &ServerState) -> String {
    let system_type = match (state.is_raspberry_pi, state.enable_comparison) {
        (false, _) => "Standard System",
        (true, false) => "Raspberry Pi",
        (true, true) => "Raspberry Pi (with comparison metrics)",
    };

    let mut families = String::new();
    if state.is_raspberry_pi {
        families.push_str("<li>RPI metrics (rpi_*)</li>");
    }
    if state.powertop_enabled() {
        families.push_str("<li>Powertop metrics (powertop_*)</li>");
    }

    format!(
        "<html>\n\
         <head><title>Power Metrics Exporter</title></head>\n\
         <body>\n\
         <h1>Power Metrics Exporter</h1>\n\
         <p>System Type: {system_type}</p>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         <h2>Available Metrics:</h2>\n\
         <ul>{families}</ul>\n\
         </body>\n\
         </html>\n",
        path = state.metrics_path,
    )
}

async fn handle_index(State(state): State<Arc<ServerState>>) -> Html<String> {
    Html(render_index(&state))
}

async fn handle_metrics(State(state): State<Arc<ServerState>>) -> Response {
    let registry = state.registry.clone();
    let encoded = tokio::task::spawn_blocking(move || encode_metrics(&registry)).await;

    match encoded {
        Ok(Ok((content_type, body))) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Ok(Err(e)) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!("Metrics collection task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route(&state.metrics_path, get(handle_metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then stop accepting and drain open requests.
pub async fn serve<F>(listener: TcpListener, state: Arc<ServerState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr().context("Listener has no local address")?;
    info!("Serving metrics on http://{}{}", address, state.metrics_path);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}
