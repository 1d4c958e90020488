//! Priority translation between the donor and host scales
//!
//! Donor: `0` is the least important priority, `max_priorities - 1` the most.
//! Host: lower numeric value is more important.
//!
//! `host = reversal_base - donor` and `donor = reversal_base - host`, so the
//! mapping is its own inverse and preserves ordering in reverse.

use crate::error::{Error, Result};
use taskshim_common::UBaseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityTranslator {
    max_priorities: u32,
    reversal_base: u32,
}

impl PriorityTranslator {
    /// Build a translator, rejecting parameters that would break the round
    /// trip.
    ///
    /// `max_priorities` must be non-zero, and `reversal_base` must exceed
    /// `max_priorities - 1` and fit a `u8` host priority.
    pub fn new(max_priorities: u32, reversal_base: u32) -> Result<Self> {
        if max_priorities == 0 {
            return Err(Error::InvalidConfig("max_priorities must be non-zero".into()));
        }
        if reversal_base < max_priorities {
            return Err(Error::InvalidConfig(format!(
                "reversal_base {} must exceed the highest priority {}",
                reversal_base,
                max_priorities - 1
            )));
        }
        if reversal_base > u32::from(u8::MAX) {
            return Err(Error::InvalidConfig(format!(
                "reversal_base {} does not fit a host priority",
                reversal_base
            )));
        }

        Ok(Self {
            max_priorities,
            reversal_base,
        })
    }

    #[inline]
    pub fn max_priorities(&self) -> u32 {
        self.max_priorities
    }

    #[inline]
    pub fn reversal_base(&self) -> u32 {
        self.reversal_base
    }

    /// Donor priority to host priority.
    pub fn to_host(&self, donor: UBaseType) -> Result<u8> {
        let out_of_range = || Error::PriorityOutOfRange {
            priority: donor,
            max: self.max_priorities,
        };

        if donor >= self.max_priorities {
            return Err(out_of_range());
        }
        self.reversal_base
            .checked_sub(donor)
            .and_then(|host| u8::try_from(host).ok())
            .ok_or_else(out_of_range)
    }

    /// Host priority to donor priority.
    ///
    /// Host priorities above `reversal_base` cannot come from [`to_host`]
    /// (threads the adapter did not create may still carry them); they
    /// saturate to donor priority `0`.
    ///
    /// [`to_host`]: PriorityTranslator::to_host
    #[inline]
    pub fn to_donor(&self, host: u8) -> UBaseType {
        self.reversal_base.saturating_sub(u32::from(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskshim_common::config;

    fn translator() -> PriorityTranslator {
        PriorityTranslator::new(config::MAX_PRIORITIES, config::REVERSAL_BASE).unwrap()
    }

    #[test]
    fn test_round_trip_all_priorities() {
        let t = translator();
        for p in 0..config::MAX_PRIORITIES {
            let host = t.to_host(p).unwrap();
            assert_eq!(t.to_donor(host), p, "priority {p} did not survive translation");
        }
    }

    #[test]
    fn test_order_is_reversed() {
        let t = translator();
        assert_eq!(t.to_host(0).unwrap(), 64);
        assert_eq!(t.to_host(31).unwrap(), 33);
        assert!(t.to_host(10).unwrap() < t.to_host(9).unwrap());
    }

    #[test]
    fn test_rejects_out_of_range() {
        let t = translator();
        assert_eq!(
            t.to_host(config::MAX_PRIORITIES),
            Err(Error::PriorityOutOfRange { priority: 32, max: 32 })
        );
        assert!(t.to_host(u32::MAX).is_err());
    }

    #[test]
    fn test_tight_reversal_base() {
        // Smallest legal base: every host priority is still >= 1
        let t = PriorityTranslator::new(8, 8).unwrap();
        assert_eq!(t.to_host(7).unwrap(), 1);
        assert_eq!(t.to_host(0).unwrap(), 8);
        assert_eq!(t.to_donor(1), 7);
    }

    #[test]
    fn test_rejects_parameters_that_break_round_trip() {
        // Base above the host's 8-bit range would truncate
        assert!(matches!(
            PriorityTranslator::new(300, 300),
            Err(Error::InvalidConfig(_))
        ));
        // Base below the highest donor priority would underflow
        assert!(matches!(
            PriorityTranslator::new(32, 10),
            Err(Error::InvalidConfig(_))
        ));
        assert!(PriorityTranslator::new(0, 64).is_err());

        // Widest legal base still round-trips at both ends
        let t = PriorityTranslator::new(256, 255);
        assert!(t.is_err(), "base must exceed max_priorities - 1");
        let t = PriorityTranslator::new(255, 255).unwrap();
        for p in [0, 1, 254] {
            assert_eq!(t.to_donor(t.to_host(p).unwrap()), p);
        }
    }

    #[test]
    fn test_to_donor_saturates_for_foreign_host_priorities() {
        let t = translator();
        assert_eq!(t.to_donor(64), 0);
        assert_eq!(t.to_donor(65), 0);
        assert_eq!(t.to_donor(u8::MAX), 0);
    }
}
