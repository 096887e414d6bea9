use evdev::{AbsoluteAxisType, Device, InputEventKind, Key, Synchronization};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::converter::ScrollConverter;
use crate::types::{ScrollSample, ScrollSettings, TouchpadGeometry, ZoneAxis};
use crate::virtual_wheel::VirtualWheel;

pub struct ReaderState {
    pub active: AtomicBool,
    pub quit: AtomicBool,
}

impl ReaderState {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            quit: AtomicBool::new(false),
        }
    }
}

/// Raw coordinate range of the pad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadBounds {
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
}

impl PadBounds {
    pub fn geometry(&self) -> TouchpadGeometry {
        if self.y_max > self.y_min {
            TouchpadGeometry::new(f64::from(self.y_max - self.y_min))
        } else {
            TouchpadGeometry::uninitialized()
        }
    }

    fn normalize(&self, x: i32, y: i32) -> (f64, f64) {
        let norm = |v: i32, min: i32, max: i32| {
            if max > min {
                f64::from(v - min) / f64::from(max - min)
            } else {
                0.5
            }
        };
        (
            norm(x, self.x_min, self.x_max),
            norm(y, self.y_min, self.y_max),
        )
    }
}

/// Where the scroll zones sit on the pad.
#[derive(Debug, Clone, Copy)]
pub struct ZoneLayout {
    /// Right-edge strip width, as a fraction of the pad.
    pub vertical_width: f64,
    /// Bottom-edge strip height, as a fraction of the pad.
    pub horizontal_height: f64,
}

impl ZoneLayout {
    /// The vertical zone wins in the bottom-right corner.
    pub fn classify(&self, x_norm: f64, y_norm: f64) -> Option<ZoneAxis> {
        if x_norm >= 1.0 - self.vertical_width {
            Some(ZoneAxis::Vertical)
        } else if y_norm >= 1.0 - self.horizontal_height {
            Some(ZoneAxis::Horizontal)
        } else {
            None
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ZoneAction {
    TouchDown,
    Scroll(ScrollSample),
    Lift(ZoneAxis),
}

#[derive(Debug, Clone, Copy)]
struct Contact {
    zone: Option<ZoneAxis>,
    last_x: i32,
    last_y: i32,
}

/// Follows a single finger and reports movement of contacts that began inside a zone.
#[derive(Debug)]
pub struct ZoneTracker {
    layout: ZoneLayout,
    bounds: PadBounds,
    x: i32,
    y: i32,
    touching: bool,
    /// BTN_TOUCH went up; the lift is reported at the end of the frame.
    lifting: bool,
    contact: Option<Contact>,
}

impl ZoneTracker {
    pub fn new(layout: ZoneLayout, bounds: PadBounds) -> Self {
        Self {
            layout,
            bounds,
            x: bounds.x_min,
            y: bounds.y_min,
            touching: false,
            lifting: false,
            contact: None,
        }
    }

    pub fn set_x(&mut self, x: i32) {
        self.x = x;
    }

    pub fn set_y(&mut self, y: i32) {
        self.y = y;
    }

    pub fn touch(&mut self, down: bool) -> Option<ZoneAction> {
        if down {
            self.touching = true;
            self.lifting = false;
            self.contact = None;
            return Some(ZoneAction::TouchDown);
        }

        self.lifting = self.touching;
        None
    }

    /// Ends the current frame. Movement in a lift frame comes before the lift.
    pub fn sync(&mut self, timestamp: Duration) -> Vec<ZoneAction> {
        let mut actions = Vec::new();
        if !self.touching {
            return actions;
        }

        if let Some(sample) = self.frame_movement(timestamp) {
            actions.push(ZoneAction::Scroll(sample));
        }

        if self.lifting {
            self.touching = false;
            self.lifting = false;
            if let Some(zone) = self.contact.take().and_then(|c| c.zone) {
                actions.push(ZoneAction::Lift(zone));
            }
        }

        actions
    }

    fn frame_movement(&mut self, timestamp: Duration) -> Option<ScrollSample> {
        if self.contact.is_none() {
            let (x_norm, y_norm) = self.bounds.normalize(self.x, self.y);
            self.contact = Some(Contact {
                zone: self.layout.classify(x_norm, y_norm),
                last_x: self.x,
                last_y: self.y,
            });
            return None;
        }

        let contact = self.contact.as_mut()?;

        let zone = contact.zone?;
        let dx = self.x - contact.last_x;
        let dy = self.y - contact.last_y;
        contact.last_x = self.x;
        contact.last_y = self.y;
        if dx == 0 && dy == 0 {
            return None;
        }

        Some(ScrollSample {
            zone,
            dx: f64::from(dx),
            dy: f64::from(dy),
            geometry: self.bounds.geometry(),
            timestamp,
        })
    }

    /// Forgets the current contact without reporting a lift.
    pub fn release(&mut self) {
        self.touching = false;
        self.lifting = false;
        self.contact = None;
    }
}

fn has_touchpad_caps(device: &Device) -> bool {
    let has_abs = device.supported_absolute_axes().is_some_and(|axes| {
        axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y)
    });
    let has_finger = device.supported_keys().is_some_and(|keys| {
        keys.contains(Key::BTN_TOOL_FINGER) && keys.contains(Key::BTN_TOUCH)
    });
    has_abs && has_finger
}

/// Find a touchpad by enumerating /dev/input/event*.
/// Returns the first device that reports ABS_X, ABS_Y, BTN_TOUCH and BTN_TOOL_FINGER.
pub fn find_touchpad_device() -> Option<PathBuf> {
    for i in 0..64 {
        let path = PathBuf::from(format!("/dev/input/event{}", i));
        if !path.exists() {
            continue;
        }
        if let Ok(device) = Device::open(&path) {
            if has_touchpad_caps(&device) {
                log::info!(
                    "Found touchpad: {} at {}",
                    device.name().unwrap_or("unknown"),
                    path.display()
                );
                return Some(path);
            }
        }
    }
    None
}

fn read_bounds(device: &Device) -> std::io::Result<PadBounds> {
    let abs = device.get_abs_state()?;
    let x = abs[AbsoluteAxisType::ABS_X.0 as usize];
    let y = abs[AbsoluteAxisType::ABS_Y.0 as usize];
    Ok(PadBounds {
        x_min: x.minimum,
        x_max: x.maximum,
        y_min: y.minimum,
        y_max: y.maximum,
    })
}

fn since_epoch(time: SystemTime) -> Duration {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
}

pub struct TouchpadReader {
    device: Device,
    tracker: ZoneTracker,
    state: Arc<ReaderState>,
    converter: Arc<ScrollConverter<VirtualWheel>>,
    settings: ScrollSettings,
    inertia: bool,
}

impl TouchpadReader {
    pub fn new(
        device_path: &str,
        layout: ZoneLayout,
        state: Arc<ReaderState>,
        converter: Arc<ScrollConverter<VirtualWheel>>,
        settings: ScrollSettings,
        inertia: bool,
    ) -> std::io::Result<Self> {
        let device = Device::open(device_path)?;
        if !has_touchpad_caps(&device) {
            log::warn!("{} doesn't look like a touchpad", device_path);
        }

        let bounds = read_bounds(&device)?;
        log::info!(
            "Opened touchpad: {} ({}), x {}..{}, y {}..{}",
            device.name().unwrap_or("unknown"),
            device_path,
            bounds.x_min,
            bounds.x_max,
            bounds.y_min,
            bounds.y_max,
        );

        Ok(Self {
            device,
            tracker: ZoneTracker::new(layout, bounds),
            state,
            converter,
            settings,
            inertia,
        })
    }

    /// Run the blocking event loop. Call from a dedicated thread.
    pub fn run(&mut self) {
        loop {
            if self.state.quit.load(Ordering::Relaxed) {
                break;
            }

            // Check for external toggle signal (SIGUSR1 via `zonescroll toggle`)
            if crate::TOGGLE
                .compare_exchange(true, false, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                let was_active = self.state.active.load(Ordering::Relaxed);
                self.state.active.store(!was_active, Ordering::Relaxed);
                if was_active {
                    self.tracker.release();
                    self.converter.reset();
                    log::info!("Zone scrolling disabled");
                } else {
                    log::info!("Zone scrolling enabled");
                }
            }

            let events: Vec<_> = match self.device.fetch_events() {
                Ok(iter) => iter.collect(),
                Err(e) => {
                    if self.state.quit.load(Ordering::Relaxed) {
                        break;
                    }
                    if e.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }
                    log::error!("Error reading touchpad events: {}", e);
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                }
            };

            if !self.state.active.load(Ordering::Relaxed) {
                continue;
            }

            for ev in &events {
                let actions = match ev.kind() {
                    InputEventKind::AbsAxis(AbsoluteAxisType::ABS_X) => {
                        self.tracker.set_x(ev.value());
                        Vec::new()
                    }
                    InputEventKind::AbsAxis(AbsoluteAxisType::ABS_Y) => {
                        self.tracker.set_y(ev.value());
                        Vec::new()
                    }
                    InputEventKind::Key(Key::BTN_TOUCH) => {
                        self.tracker.touch(ev.value() != 0).into_iter().collect()
                    }
                    InputEventKind::Synchronization(Synchronization::SYN_REPORT) => {
                        self.tracker.sync(since_epoch(ev.timestamp()))
                    }
                    _ => Vec::new(),
                };

                for action in actions {
                    match action {
                        ZoneAction::TouchDown => self.converter.stop_inertia_scroll(),
                        ZoneAction::Scroll(sample) => {
                            self.converter.process_scroll(&sample, &self.settings)
                        }
                        ZoneAction::Lift(ZoneAxis::Vertical) if self.inertia => {
                            self.converter.start_inertia_scroll()
                        }
                        ZoneAction::Lift(_) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: PadBounds = PadBounds {
        x_min: 0,
        x_max: 1000,
        y_min: 0,
        y_max: 600,
    };

    const LAYOUT: ZoneLayout = ZoneLayout {
        vertical_width: 0.1,
        horizontal_height: 0.1,
    };

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn start(tracker: &mut ZoneTracker, x: i32, y: i32) {
        tracker.set_x(x);
        tracker.set_y(y);
        assert_eq!(tracker.touch(true), Some(ZoneAction::TouchDown));
        assert!(tracker.sync(ms(0)).is_empty());
    }

    #[test]
    fn classify_edges() {
        assert_eq!(LAYOUT.classify(0.95, 0.5), Some(ZoneAxis::Vertical));
        assert_eq!(LAYOUT.classify(0.5, 0.95), Some(ZoneAxis::Horizontal));
        assert_eq!(LAYOUT.classify(0.95, 0.95), Some(ZoneAxis::Vertical));
        assert_eq!(LAYOUT.classify(0.5, 0.5), None);
    }

    #[test]
    fn geometry_from_bounds() {
        assert_eq!(BOUNDS.geometry(), TouchpadGeometry::new(600.0));
        let flat = PadBounds { y_max: 0, ..BOUNDS };
        assert!(!flat.geometry().initialized);
    }

    #[test]
    fn vertical_contact_reports_deltas() {
        let mut tracker = ZoneTracker::new(LAYOUT, BOUNDS);
        start(&mut tracker, 950, 100);

        tracker.set_y(112);
        let actions = tracker.sync(ms(8));
        let [ZoneAction::Scroll(sample)] = actions.as_slice() else {
            panic!("expected a scroll sample, got {actions:?}");
        };
        assert_eq!(sample.zone, ZoneAxis::Vertical);
        assert_eq!((sample.dx, sample.dy), (0.0, 12.0));
        assert_eq!(sample.timestamp, ms(8));
        assert_eq!(sample.geometry.height, 600.0);

        // No movement, no sample.
        assert!(tracker.sync(ms(16)).is_empty());

        assert_eq!(tracker.touch(false), None);
        assert_eq!(
            tracker.sync(ms(24)),
            vec![ZoneAction::Lift(ZoneAxis::Vertical)]
        );
        assert!(tracker.sync(ms(32)).is_empty());
    }

    #[test]
    fn lift_frame_movement_comes_before_lift() {
        let mut tracker = ZoneTracker::new(LAYOUT, BOUNDS);
        start(&mut tracker, 950, 100);

        // The kernel may report the last position and BTN_TOUCH 0 in one frame.
        tracker.set_y(130);
        assert_eq!(tracker.touch(false), None);
        let actions = tracker.sync(ms(8));
        assert_eq!(actions.len(), 2);
        let ZoneAction::Scroll(sample) = &actions[0] else {
            panic!("expected a scroll sample first, got {actions:?}");
        };
        assert_eq!(sample.dy, 30.0);
        assert_eq!(actions[1], ZoneAction::Lift(ZoneAxis::Vertical));
    }

    #[test]
    fn contact_keeps_its_zone_after_leaving_it() {
        let mut tracker = ZoneTracker::new(LAYOUT, BOUNDS);
        start(&mut tracker, 500, 580);

        tracker.set_x(520);
        tracker.set_y(300);
        let actions = tracker.sync(ms(8));
        let [ZoneAction::Scroll(sample)] = actions.as_slice() else {
            panic!("expected a scroll sample, got {actions:?}");
        };
        assert_eq!(sample.zone, ZoneAxis::Horizontal);
        assert_eq!(sample.dx, 20.0);
    }

    #[test]
    fn center_contact_is_ignored() {
        let mut tracker = ZoneTracker::new(LAYOUT, BOUNDS);
        start(&mut tracker, 500, 300);

        tracker.set_x(960);
        assert!(tracker.sync(ms(8)).is_empty());
        assert_eq!(tracker.touch(false), None);
        assert!(tracker.sync(ms(16)).is_empty());
    }

    #[test]
    fn release_forgets_contact() {
        let mut tracker = ZoneTracker::new(LAYOUT, BOUNDS);
        start(&mut tracker, 950, 100);
        tracker.release();
        tracker.set_y(200);
        assert!(tracker.sync(ms(8)).is_empty());
        assert_eq!(tracker.touch(false), None);
        assert!(tracker.sync(ms(16)).is_empty());
    }
}
