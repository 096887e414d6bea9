use std::fmt;

use crate::types::ZoneAxis;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollError {
    /// The platform refused a synthetic wheel event. `code` is the errno, or -1.
    Injection {
        axis: ZoneAxis,
        amount: i32,
        code: i32,
    },
    /// A sample could not be handled; it was dropped without touching state.
    Processing(&'static str),
}

impl ScrollError {
    pub fn injection(axis: ZoneAxis, amount: i32, err: &std::io::Error) -> Self {
        Self::Injection {
            axis,
            amount,
            code: err.raw_os_error().unwrap_or(-1),
        }
    }
}

impl fmt::Display for ScrollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollError::Injection { axis, amount, code } => write!(
                f,
                "failed to inject {axis} wheel event ({amount:+}): os error {code}"
            ),
            ScrollError::Processing(what) => write!(f, "dropped scroll sample: {what}"),
        }
    }
}

impl std::error::Error for ScrollError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injection_keeps_errno() {
        let io = std::io::Error::from_raw_os_error(libc::ENODEV);
        let err = ScrollError::injection(ZoneAxis::Vertical, 24, &io);
        assert_eq!(
            err,
            ScrollError::Injection {
                axis: ZoneAxis::Vertical,
                amount: 24,
                code: libc::ENODEV,
            }
        );
        assert!(err.to_string().contains("vertical"));
    }

    #[test]
    fn injection_without_errno() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = ScrollError::injection(ZoneAxis::Horizontal, -15, &io);
        assert!(matches!(err, ScrollError::Injection { code: -1, .. }));
    }
}
