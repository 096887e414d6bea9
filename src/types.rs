use std::fmt;
use std::time::Duration;

/// Which way a scroll zone scrolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneAxis {
    Horizontal,
    Vertical,
}

impl fmt::Display for ZoneAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ZoneAxis::Horizontal => "horizontal",
            ZoneAxis::Vertical => "vertical",
        })
    }
}

/// Touchpad size snapshot taken by the sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchpadGeometry {
    /// Height in raw device units.
    pub height: f64,
    pub initialized: bool,
}

impl TouchpadGeometry {
    pub fn new(height: f64) -> Self {
        Self {
            height,
            initialized: true,
        }
    }

    pub fn uninitialized() -> Self {
        Self {
            height: 0.0,
            initialized: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSettings {
    pub speed: f64,
    pub sensitivity: f64,
    pub invert_vertical: bool,
    pub invert_horizontal: bool,
    pub debug: bool,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            sensitivity: 1.0,
            invert_vertical: false,
            invert_horizontal: false,
            debug: false,
        }
    }
}

/// One movement report from inside a scroll zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    pub zone: ZoneAxis,
    pub dx: f64,
    pub dy: f64,
    pub geometry: TouchpadGeometry,
    /// Event time; only differences between samples matter.
    pub timestamp: Duration,
}

impl ScrollSample {
    /// Delta along the zone's axis, with the user's inversion applied.
    pub fn axis_delta(&self, settings: &ScrollSettings) -> f64 {
        match self.zone {
            ZoneAxis::Horizontal if settings.invert_horizontal => -self.dx,
            ZoneAxis::Horizontal => self.dx,
            ZoneAxis::Vertical if settings.invert_vertical => -self.dy,
            ZoneAxis::Vertical => self.dy,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite() && self.geometry.height.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(zone: ZoneAxis) -> ScrollSample {
        ScrollSample {
            zone,
            dx: 3.0,
            dy: -5.0,
            geometry: TouchpadGeometry::new(6000.0),
            timestamp: Duration::ZERO,
        }
    }

    #[test]
    fn axis_delta_follows_zone() {
        let settings = ScrollSettings::default();
        assert_eq!(sample(ZoneAxis::Horizontal).axis_delta(&settings), 3.0);
        assert_eq!(sample(ZoneAxis::Vertical).axis_delta(&settings), -5.0);
    }

    #[test]
    fn inversion_only_touches_its_own_axis() {
        let settings = ScrollSettings {
            invert_vertical: true,
            ..Default::default()
        };
        assert_eq!(sample(ZoneAxis::Horizontal).axis_delta(&settings), 3.0);
        assert_eq!(sample(ZoneAxis::Vertical).axis_delta(&settings), 5.0);

        let settings = ScrollSettings {
            invert_horizontal: true,
            ..Default::default()
        };
        assert_eq!(sample(ZoneAxis::Horizontal).axis_delta(&settings), -3.0);
        assert_eq!(sample(ZoneAxis::Vertical).axis_delta(&settings), -5.0);
    }

    #[test]
    fn nan_delta_is_not_finite() {
        let mut s = sample(ZoneAxis::Vertical);
        s.dy = f64::NAN;
        assert!(!s.is_finite());
    }
}
