//! Desktop shell for the stock-monitoring app: tray icon, main dashboard
//! window, floating ticker window, notifications, and supervision of the
//! bundled market-data backend process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use tauri::{Emitter, Manager, RunEvent, Runtime};

pub mod ipc;
pub mod supervisor;
pub mod tray;
pub mod tray_icon;
pub mod windows;

use supervisor::SupervisorState;

/// Process-wide lifecycle state, replacing ad-hoc globals.
pub struct LifecycleState {
    /// Distinguishes "close this window" (hide) from "quit the app" (tear
    /// everything down). Monotonic: set once, never reset.
    pub quitting: Arc<AtomicBool>,
}

/// Informational push to a freshly loaded page, carrying a timestamp.
pub(crate) fn emit_page_load_message<R: Runtime>(webview: &tauri::WebviewWindow<R>) {
    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let _ = webview.emit_to(webview.label(), "main-process-message", stamp);
}

fn mark_quitting<R: Runtime>(app: &tauri::AppHandle<R>) {
    if let Some(state) = app.try_state::<LifecycleState>() {
        state.quitting.store(true, Ordering::Relaxed);
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Stock Monitor is starting...");

    let quitting = Arc::new(AtomicBool::new(false));

    tauri::Builder::default()
        // Must be the first plugin: a second launch shows and focuses the
        // running instance's main window, then exits.
        .plugin(tauri_plugin_single_instance::init(|app, _argv, _cwd| {
            info!("second instance blocked; focusing existing main window");
            if let Some(window) = app.get_webview_window(windows::MAIN_WINDOW_LABEL) {
                let _ = window.unminimize();
                let _ = window.show();
                let _ = window.set_focus();
            }
        }))
        .plugin(tauri_plugin_shell::init())
        .plugin(tauri_plugin_notification::init())
        .manage(LifecycleState {
            quitting: quitting.clone(),
        })
        .manage(SupervisorState::new(quitting))
        .setup(|app| {
            let handle = app.handle().clone();
            supervisor::start_backend(&handle);
            tray::setup_tray(&handle)?;
            windows::create_main_window(&handle)?;
            windows::create_float_window(&handle)?;
            info!("application setup completed");
            Ok(())
        })
        .on_window_event(|window, event| windows::handle_window_event(window, event))
        .invoke_handler(tauri::generate_handler![
            ipc::update_tray,
            ipc::update_tray_icon,
            ipc::close_float_window,
            ipc::show_notification,
            ipc::push_stock_update,
            ipc::navigate_to_stock,
            ipc::check_backend_health
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| match event {
            RunEvent::ExitRequested { .. } => {
                mark_quitting(app);
            }
            RunEvent::Exit => {
                mark_quitting(app);
                supervisor::stop_backend(app);
            }
            #[cfg(target_os = "macos")]
            RunEvent::Reopen { .. } => {
                if app.get_webview_window(windows::MAIN_WINDOW_LABEL).is_some() {
                    windows::show_main_window(app);
                } else if let Err(e) = windows::create_main_window(app) {
                    log::error!("failed to recreate main window: {}", e);
                }
            }
            _ => {}
        });
}
