use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::converter::WheelInjector;
use crate::error::ScrollError;
use crate::types::{ScrollSettings, TouchpadGeometry, ZoneAxis};
use crate::units::{raw_units_per_detent, WHEEL_DELTA};

/// Lift-off speed (raw units/sec) required to start momentum.
pub const ACTIVATION_VELOCITY: f64 = 500.0;

/// Momentum ends once speed drops under this.
pub const STOP_VELOCITY: f64 = 50.0;

/// Fraction of velocity left after one second of coasting.
const DECAY_PER_SECOND: f64 = 0.20;

/// Smaller than the manual threshold so the tail stays smooth.
const SEND_THRESHOLD: f64 = 10.0;

pub const DEFAULT_TICK_MS: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Exhausted,
}

/// A running momentum scroll on the vertical axis.
#[derive(Debug)]
pub struct InertiaSession {
    id: u64,
    velocity: f64,
    geometry: TouchpadGeometry,
    settings: ScrollSettings,
}

impl InertiaSession {
    /// Returns `None` when `velocity` is too slow to coast.
    pub fn start(
        id: u64,
        velocity: f64,
        geometry: TouchpadGeometry,
        settings: ScrollSettings,
    ) -> Option<Self> {
        if !velocity.is_finite() || velocity.abs() < ACTIVATION_VELOCITY {
            return None;
        }

        Some(Self {
            id,
            velocity,
            geometry,
            settings,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Advances the simulation by `frame`, feeding `acc` and emitting through `injector`.
    ///
    /// An injection error ends the session; the caller must not tick it again.
    pub fn tick(
        &mut self,
        frame: Duration,
        acc: &mut f64,
        injector: &mut impl WheelInjector,
    ) -> Result<Tick, ScrollError> {
        let secs = frame.as_secs_f64();
        self.velocity *= DECAY_PER_SECOND.powf(secs);

        if self.velocity.abs() < STOP_VELOCITY {
            return Ok(Tick::Exhausted);
        }

        *acc += self.velocity * secs;

        let raw_per_detent = raw_units_per_detent(&self.geometry, &self.settings);
        let potential = *acc / raw_per_detent * WHEEL_DELTA;
        if potential.abs() < SEND_THRESHOLD {
            return Ok(Tick::Continue);
        }

        let amount = potential.trunc() as i32;
        injector.emit_wheel(ZoneAxis::Vertical, amount)?;
        *acc -= f64::from(amount) * raw_per_detent / WHEEL_DELTA;

        if self.settings.debug {
            log::debug!(
                "inertia: v={:+.1} sent={amount:+} acc={:+.3}",
                self.velocity,
                *acc
            );
        }

        Ok(Tick::Continue)
    }
}

/// Cancellable periodic task on its own thread.
///
/// The callback gets the measured time since the previous tick and returns
/// whether to keep going.
pub struct Ticker {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> std::io::Result<Self>
    where
        F: FnMut(Duration) -> bool + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_clone = Arc::clone(&cancel);

        let handle = std::thread::Builder::new()
            .name("inertia-ticker".into())
            .spawn(move || {
                let mut last = Instant::now();
                loop {
                    let elapsed = last.elapsed();
                    if elapsed < interval {
                        spin_sleep::sleep(interval - elapsed);
                    }
                    if cancel_clone.load(Ordering::Acquire) {
                        break;
                    }

                    let now = Instant::now();
                    let frame = now - last;
                    last = now;

                    if !on_tick(frame) {
                        break;
                    }
                }
            })?;

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Cancels and waits for the thread to exit. Must not be called from the tick thread.
    pub fn join(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("inertia ticker panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}
