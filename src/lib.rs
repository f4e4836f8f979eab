pub(crate) mod api;
pub(crate) mod clients;
pub(crate) mod core;
pub(crate) mod model;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::clients::backend::HttpStudyApi;
use crate::clients::evaluation::HttpEvaluator;
use crate::core::{config::Settings, state::AppState, telemetry};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let backend = Arc::new(HttpStudyApi::from_settings(&settings)?);
    let evaluator = Arc::new(HttpEvaluator::from_settings(&settings)?);
    let state = AppState::new(settings, backend, evaluator);

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Englift Scoring API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    Ok(())
}
