//! Tick and delay bridge
//!
//! The tick counter belongs to the host; every read goes back to it. Delays
//! are the only blocking operations in the adapter.

use crate::adapter::TaskAdapter;
use crate::config::Capabilities;
use crate::error::Result;
use crate::host::HostKernel;
use taskshim_common::{SleepModeStatus, TickType, WrappingTick};
use tracing::{debug, trace};

/// Ticks to sleep until `previous + increment`, or `None` if that deadline
/// has already passed.
///
/// The target is "in the future" when the wrapping distance from `now` is
/// less than half the counter range, which keeps the test correct across
/// counter wraparound.
pub fn wake_delay<T: WrappingTick>(previous: T, increment: T, now: T) -> Option<T> {
    let target = previous.wrapping_add(increment);
    let remaining = target.wrapping_sub(now);

    if remaining < T::HALF_RANGE {
        Some(remaining)
    } else {
        None
    }
}

impl<H: HostKernel> TaskAdapter<H> {
    /// Periodic delay.
    ///
    /// Sleeps until `*previous_wake + increment` unless that tick has already
    /// gone by, then stores the tick observed on return in `previous_wake`.
    /// Anchoring on the observed tick rather than the computed target means a
    /// task that overran its period resumes a normal cadence instead of
    /// replaying every missed period back to back.
    pub fn delay_until(&self, previous_wake: &mut TickType, increment: TickType) -> Result<()> {
        self.require("delay_until", Capabilities::DELAY_UNTIL)?;

        let now = self.host().tick_get();
        match wake_delay(*previous_wake, increment, now) {
            Some(ticks) => {
                trace!(previous = *previous_wake, increment, now, ticks, "delay until");
                self.host().thread_delay(ticks);
            }
            None => {
                debug!(previous = *previous_wake, increment, now, "wake time already passed");
            }
        }

        *previous_wake = self.host().tick_get();
        Ok(())
    }

    /// Relative delay. Zero ticks yields.
    pub fn delay(&self, ticks: TickType) -> Result<()> {
        self.require("delay", Capabilities::DELAY)?;

        trace!(ticks, "delay");
        self.host().thread_delay(ticks);
        Ok(())
    }

    #[inline]
    pub fn tick_count(&self) -> TickType {
        self.host().tick_get()
    }

    /// Same source and value as [`tick_count`](Self::tick_count).
    #[inline]
    pub fn tick_count_from_isr(&self) -> TickType {
        self.host().tick_get()
    }

    /// Account for ticks that elapsed while the tick interrupt was
    /// suppressed. Tick hooks are not run for the skipped ticks.
    pub fn step_tick(&self, ticks_to_jump: TickType) -> Result<()> {
        self.require("step_tick", Capabilities::TICKLESS_IDLE)?;

        let now = self.host().tick_get();
        trace!(now, ticks_to_jump, "step tick");
        self.host().tick_set(now.wrapping_add(ticks_to_jump));
        Ok(())
    }

    /// Advance the tick by one. Always reports that a scheduling decision is
    /// required.
    pub fn increment_tick(&self) -> bool {
        self.host().tick_increase();
        true
    }

    /// Reschedule now.
    pub fn switch_context(&self) {
        self.host().schedule();
    }

    /// Tickless-idle hook deciding whether the port may enter low power.
    ///
    /// Idle decisions belong to the host kernel, so the answer is always
    /// [`SleepModeStatus::AbortSleep`].
    pub fn confirm_sleep_mode_status(&self) -> Result<SleepModeStatus> {
        self.require("confirm_sleep_mode_status", Capabilities::TICKLESS_IDLE)?;
        Ok(SleepModeStatus::AbortSleep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Builder;
    use crate::error::Error;
    use crate::testing::Harness;

    #[test]
    fn test_wake_delay_from_wake_point() {
        // Called exactly at the previous wake: sleep the increment if it is
        // representable as "future", otherwise not at all
        for previous in 0..=u8::MAX {
            for increment in 0..=u8::MAX {
                let expected = (increment < 127).then_some(increment);
                assert_eq!(wake_delay(previous, increment, previous), expected);
            }
        }
    }

    #[test]
    fn test_wake_delay_wraparound() {
        // Target 250 + 10 wraps to 4; now = 252 leaves 8 ticks
        assert_eq!(wake_delay(250u8, 10, 252), Some(8));
        // Now has wrapped as well
        assert_eq!(wake_delay(250u8, 10, 1), Some(3));
        assert_eq!(wake_delay(u16::MAX - 2, 5, u16::MAX), Some(3));
    }

    #[test]
    fn test_wake_delay_never_sleeps_for_the_past() {
        for overshoot in 1..=100u8 {
            // Deadline was 110; now is past it, possibly across the wrap
            assert_eq!(wake_delay(100u8, 10, 110u8.wrapping_add(overshoot)), None);
            assert_eq!(wake_delay(240u8, 20, 4u8.wrapping_add(overshoot)), None);
        }
    }

    #[test]
    fn test_delay_until_near_tick_wrap() {
        let h = Harness::new();
        h.sim().spawn_current("periodic", 20);
        h.sim().set_tick(u32::MAX - 5);
        let mut previous = u32::MAX - 5;

        h.adapter.delay_until(&mut previous, 10).unwrap();

        assert_eq!(h.sim().delays(), vec![10]);
        assert_eq!(previous, 4);
        assert_eq!(h.adapter.tick_count(), 4);
    }

    #[test]
    fn test_delay_until_anchors_on_actual_wake() {
        let h = Harness::new();
        h.sim().set_wake_latency(3);
        let mut previous = 0;

        h.adapter.delay_until(&mut previous, 10).unwrap();
        assert_eq!(previous, 13, "anchor is the observed tick, not the target");

        h.adapter.delay_until(&mut previous, 10).unwrap();
        assert_eq!(previous, 26);
        assert_eq!(h.sim().delays(), vec![10, 10]);
    }

    #[test]
    fn test_delay_until_missed_deadline() {
        let h = Harness::new();
        let mut previous = 0;
        h.sim().advance(25);

        h.adapter.delay_until(&mut previous, 10).unwrap();

        assert!(h.sim().delays().is_empty());
        assert_eq!(previous, 25);
    }

    #[test]
    fn test_delay_until_partial_period_left() {
        let h = Harness::new();
        let mut previous = 100;
        h.sim().set_tick(104);

        h.adapter.delay_until(&mut previous, 10).unwrap();
        assert_eq!(h.sim().delays(), vec![6]);
        assert_eq!(previous, 110);
    }

    #[test]
    fn test_delay_zero_is_allowed() {
        let h = Harness::new();
        h.adapter.delay(0).unwrap();
        h.adapter.delay(7).unwrap();
        assert_eq!(h.sim().delays(), vec![0, 7]);
        assert_eq!(h.adapter.tick_count(), 7);
        assert!(h.faults().is_empty());
    }

    #[test]
    fn test_tick_reads_agree() {
        let h = Harness::new();
        h.sim().set_tick(1234);
        assert_eq!(h.adapter.tick_count(), 1234);
        assert_eq!(h.adapter.tick_count_from_isr(), 1234);
    }

    #[test]
    fn test_step_and_increment() {
        let h = Harness::new();
        h.sim().set_tick(u32::MAX);

        assert!(h.adapter.increment_tick());
        assert_eq!(h.adapter.tick_count(), 0);

        h.adapter.step_tick(500).unwrap();
        assert_eq!(h.adapter.tick_count(), 500);
        h.adapter.step_tick(0).unwrap();
        assert_eq!(h.adapter.tick_count(), 500);
    }

    #[test]
    fn test_tickless_capability() {
        let h = Harness::with(Builder::new().without(Capabilities::TICKLESS_IDLE));
        assert_eq!(
            h.adapter.step_tick(5),
            Err(Error::CapabilityDisabled(Capabilities::TICKLESS_IDLE))
        );
        assert!(h.adapter.confirm_sleep_mode_status().is_err());
        assert_eq!(h.adapter.tick_count(), 0);

        let h = Harness::new();
        assert_eq!(
            h.adapter.confirm_sleep_mode_status(),
            Ok(SleepModeStatus::AbortSleep)
        );
    }

    #[test]
    fn test_switch_context_reschedules() {
        let h = Harness::new();
        h.adapter.switch_context();
        assert_eq!(h.sim().reschedule_count(), 1);
    }
}
