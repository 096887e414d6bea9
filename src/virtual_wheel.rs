use evdev::uinput::VirtualDeviceBuilder;
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId, Key, RelativeAxisType};

use crate::converter::WheelInjector;
use crate::error::ScrollError;
use crate::types::ZoneAxis;

/// Turns hi-res wheel amounts into whole legacy notches for clients that
/// ignore `REL_WHEEL_HI_RES`.
#[derive(Debug, Default)]
struct NotchTracker {
    last: i32,
    acc: i32,
}

impl NotchTracker {
    fn accumulate(&mut self, amount_v120: i32) -> i32 {
        let changed_direction =
            (self.last > 0 && amount_v120 < 0) || (self.last < 0 && amount_v120 > 0);
        if changed_direction {
            self.acc = 0;
        }

        self.last = amount_v120;
        self.acc = self.acc.saturating_add(amount_v120);

        let notches = self.acc / 120;
        self.acc %= 120;
        notches
    }
}

/// Virtual wheel-only pointer that receives the synthetic scroll events.
pub struct VirtualWheel {
    device: evdev::uinput::VirtualDevice,
    vertical: NotchTracker,
    horizontal: NotchTracker,
}

impl VirtualWheel {
    pub fn new() -> std::io::Result<Self> {
        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);
        axes.insert(RelativeAxisType::REL_HWHEEL);
        axes.insert(RelativeAxisType::REL_WHEEL_HI_RES);
        axes.insert(RelativeAxisType::REL_HWHEEL_HI_RES);

        // Without a button libinput won't treat this as a pointer.
        let mut keys = AttributeSet::<Key>::new();
        keys.insert(Key::BTN_LEFT);

        let device = VirtualDeviceBuilder::new()?
            .name("zonescroll Wheel")
            .input_id(InputId::new(BusType::BUS_VIRTUAL, 0x1234, 0x5679, 1))
            .with_keys(&keys)?
            .with_relative_axes(&axes)?
            .build()?;

        log::info!("Created virtual wheel device");

        Ok(Self {
            device,
            vertical: NotchTracker::default(),
            horizontal: NotchTracker::default(),
        })
    }
}

impl WheelInjector for VirtualWheel {
    fn emit_wheel(&mut self, axis: ZoneAxis, amount: i32) -> Result<(), ScrollError> {
        let (hi_res, legacy, tracker) = match axis {
            ZoneAxis::Vertical => (
                RelativeAxisType::REL_WHEEL_HI_RES,
                RelativeAxisType::REL_WHEEL,
                &mut self.vertical,
            ),
            ZoneAxis::Horizontal => (
                RelativeAxisType::REL_HWHEEL_HI_RES,
                RelativeAxisType::REL_HWHEEL,
                &mut self.horizontal,
            ),
        };

        let notches = tracker.accumulate(amount);
        let mut events = vec![InputEvent::new_now(EventType::RELATIVE, hi_res.0, amount)];
        if notches != 0 {
            events.push(InputEvent::new_now(EventType::RELATIVE, legacy.0, notches));
        }
        events.push(InputEvent::new_now(EventType::SYNCHRONIZATION, 0, 0));

        self.device
            .emit(&events)
            .map_err(|e| ScrollError::injection(axis, amount, &e))
    }
}
