//! Kernel-library status taxonomy
//!
//! Every routine the kernel library provides returns either success or one
//! of these statuses. The set is fixed: callers translate a status into
//! their own error types but never extend it.

/// Non-success status reported by a kernel routine.
///
/// Statuses that concern one operand carry the zero-based slot index of
/// the offending argument so callers can report exactly which operand,
/// dimension, increment, or leading dimension was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KernelStatus {
    /// An operand slot does not satisfy the routine's contract
    #[error("operand {slot} is invalid")]
    InvalidOperand { slot: usize },

    /// A dimension argument is missing, mistyped, or out of range
    #[error("dimension argument {slot} is invalid")]
    InvalidDimension { slot: usize },

    /// A matrix operand's leading dimension is smaller than its column count
    #[error("leading dimension of operand {slot} is too small")]
    InvalidLeadingDimension { slot: usize },

    /// A vector operand's increment is zero
    #[error("increment of operand {slot} is zero")]
    InvalidIncrement { slot: usize },

    /// A scalar argument is missing or of the wrong precision
    #[error("scalar argument {slot} is invalid")]
    InvalidScalar { slot: usize },

    /// An operand's buffer is too small for the requested shape
    #[error("buffer of operand {slot} is too small for the requested shape")]
    InsufficientBuffer { slot: usize },

    /// The backend does not provide the named routine
    #[error("routine {0:?} is not provided by this backend")]
    UnsupportedRoutine(&'static str),

    /// The device ran out of execution resources mid-call
    #[error("device resources exhausted during execution")]
    OutOfResources,

    /// Unclassified backend failure
    #[error("backend internal error")]
    InternalError,
}

impl KernelStatus {
    /// Numeric status code, stable across releases.
    ///
    /// Codes are negative, zero being reserved for success, so they can be
    /// forwarded to callers that expect a C-style status integer.
    pub const fn code(&self) -> i32 {
        match self {
            KernelStatus::InvalidScalar { .. } => -3,
            KernelStatus::InvalidOperand { .. } => -4,
            KernelStatus::OutOfResources => -5,
            KernelStatus::InvalidDimension { .. } => -7,
            KernelStatus::InvalidLeadingDimension { .. } => -8,
            KernelStatus::InvalidIncrement { .. } => -9,
            KernelStatus::InsufficientBuffer { .. } => -11,
            KernelStatus::UnsupportedRoutine(_) => -16,
            KernelStatus::InternalError => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_negative() {
        let statuses = [
            KernelStatus::InvalidOperand { slot: 0 },
            KernelStatus::InvalidDimension { slot: 1 },
            KernelStatus::InvalidLeadingDimension { slot: 0 },
            KernelStatus::InvalidIncrement { slot: 2 },
            KernelStatus::InsufficientBuffer { slot: 1 },
            KernelStatus::UnsupportedRoutine("zherk"),
            KernelStatus::OutOfResources,
            KernelStatus::InternalError,
        ];
        for status in statuses {
            assert!(status.code() < 0, "{status} must map to a negative code");
        }
    }

    #[test]
    fn test_status_code_ignores_slot() {
        assert_eq!(
            KernelStatus::InsufficientBuffer { slot: 0 }.code(),
            KernelStatus::InsufficientBuffer { slot: 7 }.code(),
        );
    }

    #[test]
    fn test_status_messages_name_the_slot() {
        let status = KernelStatus::InvalidLeadingDimension { slot: 2 };
        assert_eq!(status.to_string(), "leading dimension of operand 2 is too small");
    }
}
