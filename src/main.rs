//! ==============================================================================
//! main.rs - remo widget host entry point
//! ==============================================================================
//!
//! purpose:
//!     polls the nature remo cloud api for one device's readings and serves
//!     them as a small html widget.
//!
//! responsibilities:
//!     - load configuration and set up logging
//!     - start the self-rescheduling poller
//!     - run the redraw loop that keeps the widget frame current
//!     - serve the widget, the snapshot json and the auxiliary channel
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    rust host (this file)                     │
//!     │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//!     │  │ poller      │  │ redraw loop │  │ web server          │  │
//!     │  │ (own timer) │  │ (interval)  │  │ (port 3000)         │  │
//!     │  └──────┬──────┘  └──────┬──────┘  └──────────┬──────────┘  │
//!     │         │ set_devices    │ snapshot           │ set_auxiliary│
//!     │         └────────────────┼────────────────────┘             │
//!     │                    ┌─────┴─────┐                            │
//!     │                    │   store   │ <- store.rs                │
//!     │                    └───────────┘                            │
//!     └─────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

mod companion;
mod config;
mod domain;
mod error;
mod format;
mod host;
mod poller;
mod selector;
mod store;
mod widget;

use crate::domain::{AuxiliaryPayload, Snapshot};
use crate::error::ConfigError;
use crate::host::{Frame, RedrawSignal};
use crate::poller::{HttpDeviceSource, Poller};
use crate::selector::DeviceCriterion;
use crate::store::SnapshotStore;
use crate::widget::{Renderer, WidgetRenderer};

use anyhow::Result;
use axum::{
    extract::State,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

// ==============================================================================
// shared state
// ==============================================================================

#[derive(Clone)]
struct AppState {
    store: SnapshotStore,
    frame: Frame,
}

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration, then logging (the level lives in the config)
    let config = config::HostConfig::load_from_args()?;
    init_logging(&config.logging.level);
    config.print_summary();

    // step 2: store + redraw plumbing
    let signal = Arc::new(RedrawSignal::new());
    let store = SnapshotStore::new(signal.clone());
    let frame: Frame = Arc::default();

    let criterion = config.device_criterion();
    if criterion == DeviceCriterion::Unset {
        tracing::warn!("neither device id nor device name is set, the widget will show no device");
    }
    let renderer: Arc<dyn Renderer> =
        Arc::new(WidgetRenderer::new(config.display.clone(), criterion.clone()));
    host::redraw(&store, renderer.as_ref(), &frame).await;

    // step 3: poller (stops by itself on a bad or missing token)
    match config.validate() {
        Ok(()) => {
            let source = HttpDeviceSource::new(&config.api)?;
            let mut poller = Poller::new(source, store.clone(), &config.api, config.polling.clone());
            if config.server.companion {
                poller = poller.with_companion(companion::spawn(store.clone()));
            }
            if config.logging.show_sensor_data {
                poller = poller.with_sensor_log(criterion, config.display.temperature_unit);
            }
            tokio::spawn(poller.run());
        }
        Err(ConfigError::MissingToken) => {
            tracing::error!("{}, not polling", ConfigError::MissingToken)
        }
        Err(e) => return Err(e.into()),
    }

    // step 4: redraw loop on the normal update cadence
    tokio::spawn(host::run_redraw_loop(
        store.clone(),
        renderer,
        signal,
        frame.clone(),
        config.polling.update_interval(),
    ));

    // step 5: web server until ctrl-c
    let state = AppState { store, frame };
    tokio::select! {
        res = run_server(&config.server.bind, state) => res?,
        _ = tokio::signal::ctrl_c() => tracing::info!("received ctrl-c, shutting down"),
    }
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ==============================================================================
// web server
// ==============================================================================

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(widget_handler))
        .route("/api", get(api_handler))
        .route("/api/notification", post(notification_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn run_server(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("widget live at http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// the widget as a standalone page
async fn widget_handler(State(state): State<AppState>) -> Html<String> {
    let frame = state.frame.read().await;
    Html(format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>remo widget</title></head>
<body style="font-family: system-ui; background: #000; color: #999;">
{}
</body>
</html>"#,
        *frame
    ))
}

/// json api endpoint for programmatic access
async fn api_handler(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.store.snapshot().await)
}

/// auxiliary channel: an outside process pushes a payload with a date
async fn notification_handler(
    State(state): State<AppState>,
    Json(payload): Json<AuxiliaryPayload>,
) -> Json<serde_json::Value> {
    tracing::debug!("auxiliary payload pushed, date {}", payload.date);
    state.store.set_auxiliary(payload).await;
    Json(serde_json::json!({"status": "ok"}))
}
