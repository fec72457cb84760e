use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior};

use crate::error::ResultOkLogExt;

/// Dockwatch: a Docker telemetry and connectivity engine.
///
/// This library finds a working connection to the container engine (local socket
/// or loopback TCP), polls container state and resource usage, decodes container
/// logs, raises alerts on unexpected state changes, and exposes the results
/// through a small local HTTP API.
pub mod api;
pub mod config;
pub mod container;
pub mod detail;
pub mod engine;
pub mod error;
pub mod health;
pub mod logs;
pub mod poller;
pub mod stats;

/// Runs the Dockwatch monitor.
///
/// Loads the settings, starts the status API and then polls the engine once per
/// refresh interval. Settings are re-read before every cycle and applied live.
///
/// # Errors
///
/// Returns an error only if startup fails:
/// - The settings file is unreadable, malformed or invalid.
/// - The engine url in the settings cannot be parsed.
///
/// An unreachable engine is not an error; cycles keep failing and alerting
/// until it comes back.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = config::settings_path();
    let settings = config::Settings::load(&settings_path)?;
    log::debug!("Loaded settings from {}: {settings:?}", settings_path.display());

    let gateway = Arc::new(engine::Gateway::new(
        engine::HyperTransport::new(),
        settings.candidates()?,
        engine::ResolverConfig::default(),
        engine::DEFAULT_RETRY_BUDGET,
    ));
    let metrics = Arc::new(stats::MetricsStore::default());

    let alert_log = health::AlertLog::open(config::alert_log_path(), health::ALERT_LOG_LEN)
        .ok_log()
        .unwrap_or_else(|| health::AlertLog::new(health::ALERT_LOG_LEN));
    let alerter = Arc::new(health::Alerter::new(
        alert_log,
        health::LogNotifier,
        settings.show_notifications,
    ));

    let poller = Arc::new(poller::Poller::new(
        gateway,
        metrics,
        alerter,
        settings.clone(),
    ));
    let details = Arc::new(detail::DetailTracker::default());

    {
        let api = api::APIServer::new(api::AppState::new(
            Arc::clone(&poller),
            Arc::clone(&details),
        ));
        let addr = config::api_addr();
        tokio::spawn(async move {
            if let Err(err) = api.listen(addr).await {
                log::error!("status API stopped: {err}");
            }
        });
    }

    let mut interval = tokio::time::interval(settings.refresh_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;

        if let Some(next) = config::Settings::load(&settings_path).ok_log() {
            if poller.apply_settings(next).await.ok_log() == Some(true) {
                let period = poller.settings().refresh_interval();
                log::info!("Refresh interval changed to {period:?}");
                interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }
        }

        let before = std::time::Instant::now();
        if poller.poll_once().await.is_err() {
            continue;
        }
        log::trace!("poll_once() took {} ms", before.elapsed().as_millis());

        if let Some(selection) = details.selection() {
            let poller = Arc::clone(&poller);
            let details = Arc::clone(&details);
            tokio::spawn(async move {
                details
                    .refresh(poller.gateway(), poller.metrics(), selection)
                    .await
                    .ok_log();
            });
        }
    }
}
