use clap::Parser;

use crate::inertia::DEFAULT_TICK_MS;
use crate::types::ScrollSettings;

/// Linux touchpad edge-zone scroller (evdev/uinput).
/// Turns finger movement along the pad's edges into wheel events, with momentum.
#[derive(Parser, Debug)]
#[command(name = "zonescroll")]
pub struct Config {
    /// Scroll speed multiplier
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,

    /// Scroll sensitivity multiplier
    #[arg(short, long, default_value_t = 1.0)]
    pub sensitivity: f64,

    /// Invert vertical scrolling
    #[arg(long, default_value_t = false)]
    pub invert_vertical: bool,

    /// Invert horizontal scrolling
    #[arg(long, default_value_t = false)]
    pub invert_horizontal: bool,

    /// Specific evdev touchpad path (e.g. /dev/input/event7)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Width of the right-edge vertical zone, as a fraction of pad width
    #[arg(long, default_value_t = 0.12)]
    pub zone_width: f64,

    /// Height of the bottom-edge horizontal zone, as a fraction of pad height
    #[arg(long, default_value_t = 0.12)]
    pub zone_height: f64,

    /// Don't keep scrolling after the finger lifts
    #[arg(long, default_value_t = false)]
    pub no_inertia: bool,

    /// Inertia tick interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    /// Log every emitted wheel event
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl Config {
    pub fn scroll_settings(&self) -> ScrollSettings {
        ScrollSettings {
            speed: self.speed,
            sensitivity: self.sensitivity,
            invert_vertical: self.invert_vertical,
            invert_horizontal: self.invert_horizontal,
            debug: self.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["zonescroll"]);
        assert_eq!(config.scroll_settings(), ScrollSettings::default());
        assert_eq!(config.tick_ms, 16);
        assert!(!config.no_inertia);
        assert!(config.device.is_none());
    }

    #[test]
    fn flags_reach_settings() {
        let config = Config::parse_from([
            "zonescroll",
            "--speed",
            "2.5",
            "-s",
            "0.5",
            "--invert-vertical",
            "--debug",
            "--device",
            "/dev/input/event7",
            "--tick-ms",
            "8",
        ]);
        let settings = config.scroll_settings();
        assert_eq!(settings.speed, 2.5);
        assert_eq!(settings.sensitivity, 0.5);
        assert!(settings.invert_vertical);
        assert!(!settings.invert_horizontal);
        assert!(settings.debug);
        assert_eq!(config.device.as_deref(), Some("/dev/input/event7"));
        assert_eq!(config.tick_ms, 8);
    }
}
