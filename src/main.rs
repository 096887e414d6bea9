mod config;
mod converter;
mod error;
mod inertia;
mod touchpad;
mod types;
mod units;
mod velocity;
mod virtual_wheel;

use clap::Parser;
use config::Config;
use converter::ScrollConverter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use touchpad::{find_touchpad_device, ReaderState, TouchpadReader, ZoneLayout};
use virtual_wheel::VirtualWheel;

/// Matches `/proc/<pid>/comm` of a running instance.
const PROCESS_NAME: &str = "zonescroll";

static QUIT: AtomicBool = AtomicBool::new(false);
pub(crate) static TOGGLE: AtomicBool = AtomicBool::new(false);

fn main() {
    // Handle the `toggle` / `quit` subcommands before clap parsing.
    // These send a signal to the running instance and exit immediately.
    if let Some(cmd) = std::env::args().nth(1) {
        match cmd.as_str() {
            "toggle" => {
                send_to_running(libc::SIGUSR1, "Toggle");
                return;
            }
            "quit" => {
                send_to_running(libc::SIGTERM, "Quit");
                return;
            }
            _ => {}
        }
    }

    let config = Config::parse();

    let default_filter = if config.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();

    let settings = config.scroll_settings();
    let layout = ZoneLayout {
        vertical_width: config.zone_width.clamp(0.0, 1.0),
        horizontal_height: config.zone_height.clamp(0.0, 1.0),
    };

    println!("{PROCESS_NAME} - touchpad edge scrolling");
    println!("  Speed:       {:.2}", settings.speed);
    println!("  Sensitivity: {:.2}", settings.sensitivity);
    println!(
        "  Invert:      vertical={} horizontal={}",
        settings.invert_vertical, settings.invert_horizontal
    );
    println!("  Inertia:     {}", if config.no_inertia { "off" } else { "on" });
    println!();

    signal_setup();

    let device_path = match &config.device {
        Some(path) => path.clone(),
        None => match find_touchpad_device() {
            Some(p) => {
                let s = p.to_string_lossy().to_string();
                log::info!("Auto-detected touchpad: {}", s);
                s
            }
            None => {
                log::error!("No touchpad found. Are you in the 'input' group?");
                log::error!("Try: sudo usermod -aG input $USER (then re-login)");
                std::process::exit(1);
            }
        },
    };

    let wheel = match VirtualWheel::new() {
        Ok(w) => w,
        Err(e) => {
            log::error!("Failed to create virtual wheel device: {}", e);
            log::error!("Do you have /dev/uinput access? Try: sudo modprobe uinput");
            std::process::exit(1);
        }
    };

    let tick = Duration::from_millis(config.tick_ms.max(1));
    let converter = Arc::new(ScrollConverter::new(wheel, tick));
    let reader_state = Arc::new(ReaderState::new());

    let reader_converter = Arc::clone(&converter);
    let reader_state_clone = Arc::clone(&reader_state);
    let inertia = !config.no_inertia;

    let spawned = std::thread::Builder::new()
        .name("touchpad-reader".into())
        .spawn(move || {
            match TouchpadReader::new(
                &device_path,
                layout,
                Arc::clone(&reader_state_clone),
                reader_converter,
                settings,
                inertia,
            ) {
                Ok(mut reader) => reader.run(),
                Err(e) => {
                    log::error!("Failed to open touchpad: {}", e);
                    log::error!("Check permissions on {}", device_path);
                }
            }
            reader_state_clone.quit.store(true, Ordering::Relaxed);
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn touchpad thread: {}", e);
        std::process::exit(1);
    }

    println!("Toggle: {PROCESS_NAME} toggle");
    println!("Quit:   {PROCESS_NAME} quit");
    println!();

    while !QUIT.load(Ordering::Relaxed) && !reader_state.quit.load(Ordering::Relaxed) {
        spin_sleep::sleep(Duration::from_millis(50));
    }

    log::info!("Shutting down...");
    reader_state.quit.store(true, Ordering::Relaxed);
    converter.reset();
    // The reader may be parked in a blocking read; it goes away with the process.
    log::info!("Done");
}

fn signal_setup() {
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGUSR1, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(sig: libc::c_int) {
    match sig {
        libc::SIGUSR1 => TOGGLE.store(true, Ordering::Relaxed),
        _ => QUIT.store(true, Ordering::Relaxed),
    }
}

/// PID of another running instance, found by scanning /proc.
fn find_running_instance() -> Option<libc::pid_t> {
    let my_pid = std::process::id() as libc::pid_t;
    std::fs::read_dir("/proc")
        .ok()?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let pid: libc::pid_t = entry.file_name().to_str()?.parse().ok()?;
            let comm = std::fs::read_to_string(entry.path().join("comm")).ok()?;
            (pid != my_pid && comm.trim() == PROCESS_NAME).then_some(pid)
        })
        .next()
}

/// Signal the running instance, or exit with an error.
fn send_to_running(sig: libc::c_int, action: &str) {
    let Some(pid) = find_running_instance() else {
        eprintln!("No running {PROCESS_NAME} instance found");
        std::process::exit(1);
    };

    if unsafe { libc::kill(pid, sig) } != 0 {
        let err = std::io::Error::last_os_error();
        eprintln!("Failed to signal {PROCESS_NAME} (pid {pid}): {err}");
        std::process::exit(1);
    }
    eprintln!("{action} sent to {PROCESS_NAME} (pid {pid})");
}
