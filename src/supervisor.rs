//! Lifecycle of the external market-data backend process.
//!
//! The backend is a bundled HTTP server the dashboard talks to directly;
//! this module only spawns it, relays its output to the log, restarts it
//! after unexpected exits, and kills it on shutdown.

use std::io::{BufRead, BufReader, Read};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::Serialize;
use tauri::{AppHandle, Manager};

pub const BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const BACKEND_ADDR: &str = "127.0.0.1:8000";

/// Fixed delay before relaunching a crashed backend. Every retry uses the
/// same delay; there is no backoff.
pub const RESTART_DELAY: Duration = Duration::from_secs(3);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(windows)]
const BACKEND_BINARY: &str = "stock-monitor-backend.exe";
#[cfg(not(windows))]
const BACKEND_BINARY: &str = "stock-monitor-backend";

pub struct SupervisorState {
    process: Mutex<Option<Child>>,
    /// Shared quitting flag; once true, exits no longer trigger restarts
    /// and a pending restart delay aborts.
    quitting: Arc<AtomicBool>,
    restart_count: AtomicU32,
}

impl SupervisorState {
    pub fn new(quitting: Arc<AtomicBool>) -> Self {
        Self {
            process: Mutex::new(None),
            quitting,
            restart_count: AtomicU32::new(0),
        }
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count.load(Ordering::Relaxed)
    }
}

/// Whether an observed backend exit should schedule a relaunch.
///
/// A clean exit (code 0) never restarts; anything else does, unless the
/// application is already quitting. Signal deaths report no code and are
/// treated as unexpected.
pub fn should_restart(exit_code: Option<i32>, quitting: bool) -> bool {
    !quitting && exit_code != Some(0)
}

/// Sleeps for `delay` unless `cancel` becomes true first.
/// Returns true when the full delay elapsed.
pub fn wait_unless_cancelled(delay: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + delay;
    while Instant::now() < deadline {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        std::thread::sleep(CANCEL_POLL_INTERVAL.min(delay));
    }
    !cancel.load(Ordering::Relaxed)
}

/// Quick TCP-level reachability check (used before HTTP is available).
fn is_backend_tcp_reachable() -> bool {
    let addr: SocketAddr = match BACKEND_ADDR.parse() {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    TcpStream::connect_timeout(&addr, Duration::from_millis(350)).is_ok()
}

/// Full HTTP health check against the backend's `/health` route.
pub fn is_backend_healthy() -> bool {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(2))
        .timeout(Duration::from_secs(5))
        .build();
    match agent.get(&format!("{}/health", BACKEND_URL)).call() {
        Ok(resp) => resp.status() == 200,
        Err(_) => false,
    }
}

#[derive(Debug, Serialize)]
pub struct BackendHealthStatus {
    pub healthy: bool,
    pub restart_count: u32,
}

fn resolve_backend_executable(app: &AppHandle) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(resource_dir) = app.path().resource_dir() {
        candidates.push(resource_dir.join("backend").join(BACKEND_BINARY));
        // Tauri bundles resources referenced as `../backend` under `_up_/`.
        candidates.push(resource_dir.join("_up_").join("backend").join(BACKEND_BINARY));
    }
    for candidate in candidates {
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Launches the bundled backend process, if it is not already running.
///
/// No-op in development mode (the backend is started manually there) and
/// when a process handle already exists, so repeated calls are safe.
pub fn start_backend(app: &AppHandle) {
    if tauri::is_dev() {
        info!("dev mode: start the backend manually (uvicorn on {})", BACKEND_ADDR);
        return;
    }

    let state = app.state::<SupervisorState>();
    if let Ok(guard) = state.process.lock() {
        if guard.is_some() {
            debug!("backend already running; ignoring duplicate start request");
            return;
        }
    }
    if is_backend_tcp_reachable() {
        info!(
            "something is already listening on {}; skipping backend launch",
            BACKEND_ADDR
        );
        return;
    }

    let exe = match resolve_backend_executable(app) {
        Some(path) => path,
        None => {
            warn!("backend executable not found under resources; continuing without a local backend");
            return;
        }
    };

    let mut cmd = Command::new(&exe);
    if let Some(dir) = exe.parent() {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    match cmd.spawn() {
        Ok(mut child) => {
            info!("launched backend {} (pid {})", exe.display(), child.id());
            if let Some(stdout) = child.stdout.take() {
                spawn_output_logger("backend-stdout", stdout, false);
            }
            if let Some(stderr) = child.stderr.take() {
                spawn_output_logger("backend-stderr", stderr, true);
            }
            if let Ok(mut guard) = state.process.lock() {
                *guard = Some(child);
            }
            spawn_exit_monitor(app.clone());
        }
        Err(e) => {
            // Not retried; the dashboard's HTTP calls surface the outage.
            error!("failed to launch backend {}: {}", exe.display(), e);
        }
    }
}

fn spawn_output_logger<R: Read + Send + 'static>(name: &str, stream: R, is_stderr: bool) {
    std::thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            for line in BufReader::new(stream).lines() {
                match line {
                    Ok(line) if is_stderr => error!("[backend] {}", line),
                    Ok(line) => info!("[backend] {}", line),
                    Err(_) => break,
                }
            }
        })
        .expect("failed to spawn backend output logger thread");
}

/// Watches for the backend exiting and schedules a relaunch after crashes.
fn spawn_exit_monitor(app: AppHandle) {
    std::thread::Builder::new()
        .name("backend-monitor".into())
        .spawn(move || loop {
            std::thread::sleep(EXIT_POLL_INTERVAL);
            let state = app.state::<SupervisorState>();
            let status = {
                let mut guard = match state.process.lock() {
                    Ok(guard) => guard,
                    Err(_) => break,
                };
                let child = match guard.as_mut() {
                    Some(child) => child,
                    // Handle cleared by stop_backend; nothing left to watch.
                    None => break,
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        guard.take();
                        Some(status)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        error!("failed to poll backend process: {}", e);
                        None
                    }
                }
            };
            if let Some(status) = status {
                let quitting = state.quitting.load(Ordering::Relaxed);
                info!("backend exited with code {:?}", status.code());
                if should_restart(status.code(), quitting) {
                    schedule_restart(app.clone());
                }
                break;
            }
        })
        .expect("failed to spawn backend monitor thread");
}

fn schedule_restart(app: AppHandle) {
    info!(
        "backend exited unexpectedly; restarting in {} seconds",
        RESTART_DELAY.as_secs()
    );
    std::thread::Builder::new()
        .name("backend-restart".into())
        .spawn(move || {
            let quitting = {
                let state = app.state::<SupervisorState>();
                state.quitting.clone()
            };
            if !wait_unless_cancelled(RESTART_DELAY, &quitting) {
                info!("backend restart cancelled by shutdown");
                return;
            }
            app.state::<SupervisorState>()
                .restart_count
                .fetch_add(1, Ordering::Relaxed);
            start_backend(&app);
        })
        .expect("failed to spawn backend restart thread");
}

/// Kills the backend process if one is running. Called once, during the
/// shutdown sequence after the quitting flag is set.
pub fn stop_backend(app: &AppHandle) {
    if let Some(state) = app.try_state::<SupervisorState>() {
        if let Ok(mut guard) = state.process.lock() {
            if let Some(mut child) = guard.take() {
                kill_process_tree(&mut child);
                info!("stopped backend process");
            }
        }
    }
}

#[cfg(windows)]
fn kill_process_tree(child: &mut Child) {
    // No POSIX signals; taskkill tears down the whole tree.
    let _ = Command::new("taskkill")
        .args(["/pid", &child.id().to_string(), "/f", "/t"])
        .status();
    let _ = child.wait();
}

#[cfg(not(windows))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_exit_never_restarts() {
        assert!(!should_restart(Some(0), false));
        assert!(!should_restart(Some(0), true));
    }

    #[test]
    fn crash_restarts_only_while_not_quitting() {
        assert!(should_restart(Some(1), false));
        assert!(!should_restart(Some(1), true));
    }

    #[test]
    fn signal_death_counts_as_unexpected() {
        assert!(should_restart(None, false));
        assert!(!should_restart(None, true));
    }

    #[test]
    fn restart_delay_completes_when_not_cancelled() {
        let cancel = AtomicBool::new(false);
        assert!(wait_unless_cancelled(Duration::from_millis(50), &cancel));
    }

    #[test]
    fn restart_delay_aborts_once_cancelled() {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let handle = std::thread::spawn(move || {
            wait_unless_cancelled(Duration::from_secs(30), &flag)
        });
        std::thread::sleep(Duration::from_millis(50));
        cancel.store(true, Ordering::Relaxed);
        let completed = handle.join().expect("wait thread panicked");
        assert!(!completed);
    }

    #[test]
    fn restart_delay_aborts_immediately_when_already_cancelled() {
        let cancel = AtomicBool::new(true);
        let start = Instant::now();
        assert!(!wait_unless_cancelled(Duration::from_secs(30), &cancel));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
