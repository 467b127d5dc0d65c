//! System tray: icon, context menu, and in-place updates from market ticks.

use std::sync::atomic::Ordering;

use log::{debug, error, info};
use tauri::image::Image;
use tauri::menu::{MenuBuilder, MenuItemBuilder, PredefinedMenuItem};
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::{AppHandle, Manager};

use crate::ipc::TrayTickPayload;
use crate::{tray_icon, windows, LifecycleState};

pub const TRAY_ID: &str = "main-tray";
const MENU_ID_SHOW: &str = "show_window";
const MENU_ID_SHOW_FLOAT: &str = "show_float_window";
const MENU_ID_QUIT: &str = "quit_app";

/// Creates the tray icon and its menu. A failure to load the bundled icon
/// is logged and leaves the app running without a tray.
pub fn setup_tray(app: &AppHandle) -> tauri::Result<()> {
    let icon = match Image::from_bytes(include_bytes!("../icons/tray-icon.png")) {
        Ok(icon) => icon,
        Err(e) => {
            error!("failed to load tray icon, continuing without a tray: {}", e);
            return Ok(());
        }
    };

    let show_item = MenuItemBuilder::with_id(MENU_ID_SHOW, "Show Main Window").build(app)?;
    let show_float_item =
        MenuItemBuilder::with_id(MENU_ID_SHOW_FLOAT, "Show Float Window").build(app)?;
    let quit_item = MenuItemBuilder::with_id(MENU_ID_QUIT, "Quit").build(app)?;
    let separator = PredefinedMenuItem::separator(app)?;
    let tray_menu = MenuBuilder::new(app)
        .items(&[&show_item, &show_float_item, &separator, &quit_item])
        .build()?;

    TrayIconBuilder::with_id(TRAY_ID)
        .icon(icon)
        .icon_as_template(false)
        .menu(&tray_menu)
        .show_menu_on_left_click(false)
        .tooltip("Stock Monitor")
        .on_menu_event(|app, event| match event.id().as_ref() {
            MENU_ID_SHOW => windows::show_main_window(app),
            MENU_ID_SHOW_FLOAT => {
                if let Some(window) = app.get_webview_window(windows::FLOAT_WINDOW_LABEL) {
                    let _ = window.show();
                } else if let Err(e) = windows::create_float_window(app) {
                    error!("failed to create float window: {}", e);
                }
            }
            MENU_ID_QUIT => {
                app.state::<LifecycleState>()
                    .quitting
                    .store(true, Ordering::Relaxed);
                app.exit(0);
            }
            _ => {}
        })
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                windows::toggle_main_window(tray.app_handle());
            }
        })
        .build(app)?;

    info!("tray icon created");
    Ok(())
}

/// Sets the tray tooltip verbatim.
pub fn set_tooltip(app: &AppHandle, text: &str) -> Result<(), String> {
    let tray = app
        .tray_by_id(TRAY_ID)
        .ok_or_else(|| "tray not available".to_string())?;
    tray.set_tooltip(Some(text)).map_err(|e| e.to_string())
}

/// Redraws the tray bitmap and tooltip from a market tick. The tray handle
/// is mutated in place, never recreated.
pub fn apply_market_tick(app: &AppHandle, tick: &TrayTickPayload) -> Result<(), String> {
    let change: f64 = tick
        .change
        .trim()
        .parse()
        .map_err(|_| format!("invalid change value: {:?}", tick.change))?;

    let tray = app
        .tray_by_id(TRAY_ID)
        .ok_or_else(|| "tray not available".to_string())?;

    tray.set_icon(Some(tray_icon::render_icon(change)))
        .map_err(|e| e.to_string())?;
    tray.set_icon_as_template(false).map_err(|e| e.to_string())?;
    tray.set_tooltip(Some(tray_icon::format_tooltip(
        &tick.name, &tick.price, change,
    )))
    .map_err(|e| e.to_string())?;

    debug!("tray updated: {} {} ({}%)", tick.name, tick.price, change);
    Ok(())
}
