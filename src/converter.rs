use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use crate::error::ScrollError;
use crate::inertia::{InertiaSession, Tick, Ticker};
use crate::types::{ScrollSample, ScrollSettings, TouchpadGeometry, ZoneAxis};
use crate::units::{raw_units_per_detent, WHEEL_DELTA};
use crate::velocity::VelocityTracker;

/// Manual scrolling sends nothing smaller than an eighth of a notch.
const MANUAL_SEND_THRESHOLD: f64 = 15.0;

/// Sink for synthetic wheel events, in 1/120-notch units.
pub trait WheelInjector: Send + 'static {
    fn emit_wheel(&mut self, axis: ZoneAxis, amount: i32) -> Result<(), ScrollError>;
}

/// Turns scroll-zone movement into wheel events, with momentum after lift-off.
///
/// All methods take `&self` and may be called from any thread. Faults are logged
/// and swallowed; nothing here is fatal to the caller.
pub struct ScrollConverter<I: WheelInjector> {
    state: Arc<Mutex<State<I>>>,
    tick_interval: Duration,
}

struct State<I> {
    acc_x: f64,
    acc_y: f64,
    velocity: VelocityTracker,
    /// Geometry and settings from the latest sample, used to start momentum.
    context: Option<(TouchpadGeometry, ScrollSettings)>,
    inertia: Option<InertiaSession>,
    ticker: Option<Ticker>,
    next_session: u64,
    injector: I,
}

impl<I: WheelInjector> ScrollConverter<I> {
    /// `tick_interval` is the momentum cadence.
    pub fn new(injector: I, tick_interval: Duration) -> Self {
        let state = State {
            acc_x: 0.0,
            acc_y: 0.0,
            velocity: VelocityTracker::new(),
            context: None,
            inertia: None,
            ticker: None,
            next_session: 0,
            injector,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            tick_interval,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State<I>>, ScrollError> {
        self.state
            .lock()
            .map_err(|_| ScrollError::Processing("scroll state lock poisoned"))
    }

    /// Feeds one live sample. Cancels any momentum first.
    pub fn process_scroll(&self, sample: &ScrollSample, settings: &ScrollSettings) {
        let result = self.lock().and_then(|mut state| state.process(sample, settings));
        match result {
            Ok(()) => (),
            Err(err @ ScrollError::Injection { .. }) => log::warn!("{err}"),
            Err(err) => log::error!("{err}"),
        }
    }

    /// Starts momentum from the current velocity estimate, if fast enough.
    pub fn start_inertia_scroll(&self) {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(err) => {
                log::error!("cannot start inertia: {err}");
                return;
            }
        };

        if state.inertia.is_some() {
            return;
        }

        let Some((geometry, settings)) = state.context else {
            log::debug!("no scroll context yet, not starting inertia");
            return;
        };

        let velocity = state.velocity.velocity_at(Instant::now());
        state.next_session += 1;
        let id = state.next_session;

        let Some(session) = InertiaSession::start(id, velocity, geometry, settings) else {
            if settings.debug {
                log::debug!("velocity {velocity:+.1} too low for inertia");
            }
            return;
        };

        let weak = Arc::downgrade(&self.state);
        match Ticker::spawn(self.tick_interval, move |frame| tick_session(&weak, id, frame)) {
            Ok(ticker) => {
                if settings.debug {
                    log::debug!("inertia started at {velocity:+.1} units/s");
                }
                state.inertia = Some(session);
                state.ticker = Some(ticker);
            }
            Err(err) => log::error!("failed to spawn inertia ticker: {err}"),
        }
    }

    /// Stops momentum and forgets the velocity window, so the next contact starts fresh.
    /// Safe to call when idle.
    pub fn stop_inertia_scroll(&self) {
        match self.lock() {
            Ok(mut state) => {
                state.stop_inertia("stop requested");
                state.velocity.clear();
            }
            Err(err) => log::error!("cannot stop inertia: {err}"),
        }
    }

    /// Zeroes both accumulators and stops momentum. Used on session or device change.
    pub fn reset(&self) {
        match self.lock() {
            Ok(mut state) => {
                state.stop_inertia("reset");
                state.acc_x = 0.0;
                state.acc_y = 0.0;
                state.velocity.clear();
                state.context = None;
            }
            Err(err) => log::error!("cannot reset scroll state: {err}"),
        }
    }
}

impl<I: WheelInjector> Drop for ScrollConverter<I> {
    fn drop(&mut self) {
        // Take the ticker out before joining so its last tick can still lock.
        let ticker = match self.state.lock() {
            Ok(mut state) => {
                state.inertia = None;
                state.ticker.take()
            }
            Err(_) => None,
        };
        if let Some(ticker) = ticker {
            ticker.join();
        }
    }
}

fn tick_session<I: WheelInjector>(
    state: &Weak<Mutex<State<I>>>,
    id: u64,
    frame: Duration,
) -> bool {
    let Some(state) = state.upgrade() else {
        return false;
    };
    let Ok(mut state) = state.lock() else {
        log::error!("scroll state lock poisoned, stopping inertia");
        return false;
    };
    state.inertia_tick(id, frame)
}

impl<I: WheelInjector> State<I> {
    fn process(
        &mut self,
        sample: &ScrollSample,
        settings: &ScrollSettings,
    ) -> Result<(), ScrollError> {
        if !sample.is_finite() {
            return Err(ScrollError::Processing("non-finite movement or geometry"));
        }

        self.stop_inertia("manual input");

        let delta = sample.axis_delta(settings);
        self.context = Some((sample.geometry, *settings));

        let acc = match sample.zone {
            ZoneAxis::Horizontal => &mut self.acc_x,
            ZoneAxis::Vertical => {
                self.velocity.push(delta, sample.timestamp);
                &mut self.acc_y
            }
        };
        *acc += delta;

        let per_unit = WHEEL_DELTA / raw_units_per_detent(&sample.geometry, settings);
        let potential = *acc * per_unit;
        if potential.abs() < MANUAL_SEND_THRESHOLD {
            return Ok(());
        }

        let amount = potential.trunc() as i32;
        let result = self.injector.emit_wheel(sample.zone, amount);
        // Subtracted even when injection fails; a dropped event is not replayed.
        *acc -= f64::from(amount) / per_unit;

        if settings.debug {
            log::debug!(
                "{} scroll: delta={delta:+.1} sent={amount:+} acc={:+.3}",
                sample.zone,
                *acc
            );
        }

        result
    }

    /// Active -> Idle. No-op when already idle.
    fn stop_inertia(&mut self, reason: &str) {
        let Some(session) = self.inertia.take() else {
            return;
        };
        log::debug!(
            "inertia stopped ({reason}) at {:+.1} units/s",
            session.velocity()
        );

        self.velocity.clear();
        // The tick thread may be the caller, so only signal it here.
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    fn inertia_tick(&mut self, id: u64, frame: Duration) -> bool {
        let Some(session) = self.inertia.as_mut().filter(|s| s.id() == id) else {
            return false;
        };

        match session.tick(frame, &mut self.acc_y, &mut self.injector) {
            Ok(Tick::Continue) => true,
            Ok(Tick::Exhausted) => {
                self.stop_inertia("momentum exhausted");
                false
            }
            Err(err) => {
                log::warn!("{err}");
                self.stop_inertia("injection failure");
                false
            }
        }
    }
}
