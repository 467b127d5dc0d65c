//! The closed command surface between the webviews and the shell.
//!
//! Every renderer-to-main channel is a typed Tauri command; unknown
//! channels are unrepresentable. Handlers log and return an `Err` string on
//! bad input, degrading a single feature rather than the application.

use log::{debug, info, warn};
use serde::Deserialize;
use tauri::{AppHandle, Emitter, Manager};
use tauri_plugin_notification::{NotificationExt, PermissionState};

use crate::supervisor::{self, BackendHealthStatus, SupervisorState};
use crate::{tray, windows};

/// One market tick for the tray, as sent by the dashboard poller.
/// All fields arrive as strings straight from the quote feed.
#[derive(Debug, Clone, Deserialize)]
pub struct TrayTickPayload {
    pub change: String,
    pub price: String,
    pub name: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub pre_close: Option<String>,
}

/// Sets the tray tooltip verbatim.
#[tauri::command]
pub fn update_tray(app: AppHandle, tooltip: String) -> Result<(), String> {
    tray::set_tooltip(&app, &tooltip)
}

/// Redraws the tray bar-chart icon and tooltip from a market tick.
#[tauri::command]
pub fn update_tray_icon(app: AppHandle, payload: TrayTickPayload) -> Result<(), String> {
    tray::apply_market_tick(&app, &payload)
}

/// Destroys the floating ticker window if one exists.
#[tauri::command]
pub fn close_float_window(app: AppHandle) -> Result<(), String> {
    debug!("close float window requested");
    windows::close_float_window(&app);
    Ok(())
}

/// Shows an OS notification. Skipped silently when the platform denies
/// notification permission.
#[tauri::command]
pub fn show_notification(app: AppHandle, title: String, body: String) -> Result<(), String> {
    let trimmed_title = title.trim();
    let trimmed_body = body.trim();
    if trimmed_title.is_empty() {
        return Err("title is required".to_string());
    }
    if trimmed_body.is_empty() {
        return Err("body is required".to_string());
    }

    match app.notification().permission_state() {
        Ok(PermissionState::Granted) => {}
        Ok(PermissionState::Denied) | Err(_) => {
            warn!("notifications unavailable; skipping");
            return Ok(());
        }
        Ok(_) => {
            if !matches!(
                app.notification().request_permission(),
                Ok(PermissionState::Granted)
            ) {
                warn!("notification permission not granted; skipping");
                return Ok(());
            }
        }
    }

    app.notification()
        .builder()
        .title(trimmed_title)
        .body(trimmed_body)
        .show()
        .map_err(|e| e.to_string())?;

    info!("notification shown: {}", trimmed_title);
    Ok(())
}

/// Relays condensed ticker data to the floating window.
#[tauri::command]
pub fn push_stock_update(app: AppHandle, payload: serde_json::Value) -> Result<(), String> {
    app.emit_to(windows::FLOAT_WINDOW_LABEL, "stock-data-update", payload)
        .map_err(|e| e.to_string())
}

/// Brings the main window up and asks it to navigate to a stock's detail
/// view (used when the float window is clicked).
#[tauri::command]
pub fn navigate_to_stock(app: AppHandle, code: String) -> Result<(), String> {
    windows::show_main_window(&app);
    app.emit_to(windows::MAIN_WINDOW_LABEL, "navigate-to-stock", code)
        .map_err(|e| e.to_string())
}

/// Reports backend reachability and how often the supervisor relaunched it.
#[tauri::command]
pub fn check_backend_health(app: AppHandle) -> Result<BackendHealthStatus, String> {
    let healthy = supervisor::is_backend_healthy();
    let restart_count = app
        .try_state::<SupervisorState>()
        .map(|s| s.restart_count())
        .unwrap_or(0);
    Ok(BackendHealthStatus {
        healthy,
        restart_count,
    })
}
