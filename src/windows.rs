//! Main dashboard window and floating ticker window.
//!
//! The main window is a singleton that hides instead of closing while the
//! app is running; the floating window is an always-on-top mini ticker
//! that snaps to screen edges after each drag.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::{debug, error, info, warn};
use tauri::{
    AppHandle, Emitter, Manager, PhysicalPosition, Runtime, WebviewUrl, WebviewWindowBuilder,
    Window, WindowEvent,
};
use tauri_plugin_shell::ShellExt;

use crate::LifecycleState;

pub const MAIN_WINDOW_LABEL: &str = "main";
pub const FLOAT_WINDOW_LABEL: &str = "float";

pub const FLOAT_WIDTH: u32 = 200;
pub const FLOAT_HEIGHT: u32 = 150;
/// Inset from the work-area corner when the float window first spawns.
const FLOAT_SPAWN_INSET: i32 = 20;

/// A window dragged within this distance of a screen edge snaps flush to it.
pub const EDGE_THRESHOLD: i32 = 20;
/// Margin left between a snapped window and the screen edge.
pub const EDGE_MARGIN: i32 = 0;

pub const FOCUSED_OPACITY: f64 = 1.0;
pub const BLURRED_OPACITY: f64 = 0.7;

const DEV_RELOAD_DELAY: Duration = Duration::from_secs(1);

/// Usable rectangle of the primary display, excluding taskbars and docks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkArea {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Snapped position for a window rectangle, or `None` when it is already
/// outside every threshold band (including already flush).
///
/// Each axis is handled independently: the near edge clamps to the screen
/// edge when it is strictly within the threshold, and the far edge clamps
/// to the opposite screen edge likewise. When both rules match on one axis
/// the far-edge clamp wins.
pub fn snapped_position(
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    area: WorkArea,
) -> Option<(i32, i32)> {
    let mut new_x = x;
    let mut new_y = y;

    if x - area.x < EDGE_THRESHOLD {
        new_x = area.x + EDGE_MARGIN;
    }
    if x + width > area.x + area.width - EDGE_THRESHOLD {
        new_x = area.x + area.width - width - EDGE_MARGIN;
    }
    if y - area.y < EDGE_THRESHOLD {
        new_y = area.y + EDGE_MARGIN;
    }
    if y + height > area.y + area.height - EDGE_THRESHOLD {
        new_y = area.y + area.height - height - EDGE_MARGIN;
    }

    if new_x != x || new_y != y {
        Some((new_x, new_y))
    } else {
        None
    }
}

fn primary_work_area(app: &AppHandle) -> Result<WorkArea, String> {
    let monitor = app
        .primary_monitor()
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "primary monitor not found".to_string())?;
    let area = monitor.work_area();
    Ok(WorkArea {
        x: area.position.x,
        y: area.position.y,
        width: area.size.width as i32,
        height: area.size.height as i32,
    })
}

/// Whether a navigation target stays inside the app (packaged assets or the
/// dev server). Anything else is handed to the OS browser.
fn is_app_url(url: &tauri::Url) -> bool {
    match url.scheme() {
        "tauri" => true,
        "http" | "https" => matches!(
            url.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("tauri.localhost")
        ),
        _ => false,
    }
}

/// Creates the main dashboard window. No-op if it already exists.
pub fn create_main_window(app: &AppHandle) -> tauri::Result<()> {
    if app.get_webview_window(MAIN_WINDOW_LABEL).is_some() {
        return Ok(());
    }

    let nav_handle = app.clone();
    let window = WebviewWindowBuilder::new(
        app,
        MAIN_WINDOW_LABEL,
        WebviewUrl::App("index.html".into()),
    )
    .title("Stock Monitor")
    .inner_size(1200.0, 750.0)
    .min_inner_size(1000.0, 600.0)
    .on_navigation(move |url| {
        if is_app_url(url) {
            return true;
        }
        // External links go to the default browser; in-app navigation is denied.
        info!("opening external link in browser: {}", url);
        if let Err(e) = nav_handle.shell().open(url.as_str(), None) {
            error!("failed to open external link: {}", e);
        }
        false
    })
    .on_page_load(|webview, payload| {
        if matches!(payload.event(), tauri::webview::PageLoadEvent::Finished) {
            crate::emit_page_load_message(&webview);
        }
    })
    .build()?;

    // In dev mode the dev server may not be ready yet; retry the load once.
    if let Some(dev_url) = app.config().build.dev_url.clone() {
        if tauri::is_dev() {
            schedule_dev_reload(window.clone(), dev_url);
        }
    }

    info!("main window created");
    Ok(())
}

/// Reloads the main window after a short delay if the dev server was not
/// accepting connections at startup.
fn schedule_dev_reload<R: Runtime>(window: tauri::WebviewWindow<R>, dev_url: tauri::Url) {
    std::thread::Builder::new()
        .name("dev-reload".into())
        .spawn(move || {
            let host = match dev_url.host_str() {
                Some(host) => host.to_string(),
                None => return,
            };
            let port = dev_url.port_or_known_default().unwrap_or(80);
            let addr = match (host.as_str(), port).to_socket_addrs() {
                Ok(mut addrs) => match addrs.next() {
                    Some(addr) => addr,
                    None => return,
                },
                Err(_) => return,
            };
            if TcpStream::connect_timeout(&addr, Duration::from_millis(350)).is_ok() {
                return;
            }
            warn!("dev server not reachable yet; reloading in 1s");
            std::thread::sleep(DEV_RELOAD_DELAY);
            if let Err(e) = window.eval("window.location.reload()") {
                error!("dev reload failed: {}", e);
            }
        })
        .expect("failed to spawn dev reload thread");
}

/// Creates the floating ticker window at the bottom-right of the work
/// area. No-op if it already exists.
pub fn create_float_window(app: &AppHandle) -> tauri::Result<()> {
    if app.get_webview_window(FLOAT_WINDOW_LABEL).is_some() {
        debug!("float window already exists");
        return Ok(());
    }

    let window = WebviewWindowBuilder::new(
        app,
        FLOAT_WINDOW_LABEL,
        WebviewUrl::App("index.html#/float".into()),
    )
    .title("Stock Monitor Float")
    .inner_size(FLOAT_WIDTH as f64, FLOAT_HEIGHT as f64)
    .decorations(false)
    .transparent(true)
    .always_on_top(true)
    .skip_taskbar(true)
    .resizable(false)
    .shadow(false)
    .build()?;

    match primary_work_area(app) {
        Ok(area) => {
            let x = area.x + area.width - FLOAT_WIDTH as i32 - FLOAT_SPAWN_INSET;
            let y = area.y + area.height - FLOAT_HEIGHT as i32 - FLOAT_SPAWN_INSET;
            let _ = window.set_position(PhysicalPosition::new(x, y));
        }
        Err(e) => warn!("cannot position float window: {}", e),
    }

    info!("float window created");
    Ok(())
}

/// Destroys the floating window outright so a later create starts fresh.
pub fn close_float_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(FLOAT_WINDOW_LABEL) {
        if let Err(e) = window.close() {
            error!("failed to close float window: {}", e);
        } else {
            info!("float window closed");
        }
    }
}

pub fn show_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        let _ = window.show();
        let _ = window.unminimize();
        let _ = window.set_focus();
    }
}

pub fn hide_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        let _ = window.hide();
    }
}

pub fn toggle_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        if window.is_visible().unwrap_or(false) {
            let _ = window.hide();
        } else {
            let _ = window.show();
            let _ = window.set_focus();
        }
    }
}

/// Re-applies the snap rule to the float window after a drag.
fn snap_float_window(window: &Window) {
    let (position, size) = match (window.outer_position(), window.outer_size()) {
        (Ok(position), Ok(size)) => (position, size),
        _ => return,
    };
    let area = match primary_work_area(window.app_handle()) {
        Ok(area) => area,
        Err(e) => {
            warn!("cannot snap float window: {}", e);
            return;
        }
    };
    if let Some((x, y)) = snapped_position(
        position.x,
        position.y,
        size.width as i32,
        size.height as i32,
        area,
    ) {
        debug!("snapping float window to ({}, {})", x, y);
        let _ = window.set_position(PhysicalPosition::new(x, y));
    }
}

/// Central window-event policy: hide-instead-of-close for the main window
/// while the app is running, snapping and the opacity affordance for the
/// float window.
pub fn handle_window_event(window: &Window, event: &WindowEvent) {
    match window.label() {
        MAIN_WINDOW_LABEL => match event {
            WindowEvent::CloseRequested { api, .. } => {
                let quitting = window
                    .state::<LifecycleState>()
                    .quitting
                    .load(Ordering::Relaxed);
                if !quitting {
                    let _ = window.hide();
                    api.prevent_close();
                }
            }
            WindowEvent::Resized(_) => {
                // Minimize-to-tray: the OS minimize is followed by a hide.
                if window.is_minimized().unwrap_or(false) {
                    let _ = window.hide();
                }
            }
            _ => {}
        },
        FLOAT_WINDOW_LABEL => match event {
            WindowEvent::Moved(_) => snap_float_window(window),
            WindowEvent::Focused(focused) => {
                let opacity = if *focused {
                    FOCUSED_OPACITY
                } else {
                    BLURRED_OPACITY
                };
                let _ = window.emit_to(FLOAT_WINDOW_LABEL, "float-opacity", opacity);
            }
            WindowEvent::Destroyed => {
                debug!("float window destroyed");
            }
            _ => {}
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AREA: WorkArea = WorkArea {
        x: 0,
        y: 0,
        width: 1000,
        height: 800,
    };

    fn snap(x: i32, y: i32) -> Option<(i32, i32)> {
        snapped_position(x, y, FLOAT_WIDTH as i32, FLOAT_HEIGHT as i32, AREA)
    }

    #[test]
    fn near_left_edge_snaps_flush() {
        assert_eq!(snap(5, 400), Some((0, 400)));
        assert_eq!(snap(19, 400), Some((0, 400)));
    }

    #[test]
    fn at_threshold_distance_does_not_snap() {
        assert_eq!(snap(20, 400), None);
        assert_eq!(snap(400, 20), None);
    }

    #[test]
    fn near_right_edge_snaps_far_edge_flush() {
        // x + 200 > 980 -> clamp to 1000 - 200.
        assert_eq!(snap(790, 400), Some((800, 400)));
    }

    #[test]
    fn near_top_and_bottom_edges_snap() {
        assert_eq!(snap(400, 10), Some((400, 0)));
        assert_eq!(snap(400, 640), Some((400, 650)));
    }

    #[test]
    fn both_axes_snap_independently() {
        assert_eq!(snap(5, 645), Some((0, 650)));
    }

    #[test]
    fn centered_window_is_untouched() {
        assert_eq!(snap(400, 300), None);
    }

    #[test]
    fn snapping_is_idempotent() {
        for (x, y) in [(5, 400), (790, 400), (5, 645), (400, 300)] {
            let once = snap(x, y).unwrap_or((x, y));
            assert_eq!(snap(once.0, once.1), None, "from ({}, {})", x, y);
        }
    }

    #[test]
    fn snapped_edges_never_rest_inside_the_threshold_band() {
        let in_band = |distance: i32| distance > EDGE_MARGIN && distance < EDGE_THRESHOLD;
        for x in (-40..=900).step_by(7) {
            for y in (-40..=700).step_by(7) {
                let (sx, sy) = snap(x, y).unwrap_or((x, y));
                let left = sx - AREA.x;
                let right = AREA.x + AREA.width - (sx + FLOAT_WIDTH as i32);
                let top = sy - AREA.y;
                let bottom = AREA.y + AREA.height - (sy + FLOAT_HEIGHT as i32);
                assert!(!in_band(left), "left edge at {} from ({}, {})", left, x, y);
                assert!(!in_band(right), "right edge at {} from ({}, {})", right, x, y);
                assert!(!in_band(top), "top edge at {} from ({}, {})", top, x, y);
                assert!(
                    !in_band(bottom),
                    "bottom edge at {} from ({}, {})",
                    bottom,
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn offset_work_area_snaps_relative_to_its_origin() {
        let area = WorkArea {
            x: 1920,
            y: 0,
            width: 1000,
            height: 800,
        };
        assert_eq!(
            snapped_position(1925, 400, 200, 150, area),
            Some((1920, 400))
        );
        assert_eq!(snapped_position(2400, 400, 200, 150, area), None);
    }
}
