use crate::types::{ScrollSettings, TouchpadGeometry};

/// Wheel-delta units in one physical notch.
pub const WHEEL_DELTA: f64 = 120.0;

/// A pad this tall needs `REFERENCE_RAW_PER_DETENT` raw units of travel per notch.
const REFERENCE_HEIGHT: f64 = 6000.0;
const REFERENCE_RAW_PER_DETENT: f64 = 40.0;

/// Lower bound for speed and sensitivity so the divisor never reaches zero.
const MIN_FACTOR: f64 = 0.01;

/// Raw touchpad units the finger must travel to produce one wheel notch.
///
/// Scales linearly with pad height so the same physical travel scrolls the same
/// amount on any pad. Never returns less than 1.0.
pub fn raw_units_per_detent(geometry: &TouchpadGeometry, settings: &ScrollSettings) -> f64 {
    let height = if geometry.initialized && geometry.height > 0.0 {
        geometry.height
    } else {
        REFERENCE_HEIGHT
    };

    let raw = REFERENCE_RAW_PER_DETENT * (height / REFERENCE_HEIGHT);
    let speed = settings.speed.max(MIN_FACTOR);
    let sensitivity = settings.sensitivity.max(MIN_FACTOR);

    (raw / (speed * sensitivity)).max(1.0)
}
