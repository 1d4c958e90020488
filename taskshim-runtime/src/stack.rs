//! Stack watermark scanning
//!
//! The host fills every fresh stack with a known byte. The bytes that still
//! hold it at the far end of the growth direction have never been touched,
//! which bounds the deepest the stack has ever reached.

use taskshim_common::{StackGrowth, StackType};

/// Count untouched fill bytes, starting from the end the stack grows toward.
///
/// A downward-growing stack is scanned from its lowest address up; an
/// upward-growing one from its highest address down. The scan stops at the
/// first byte that differs from `fill`.
pub fn untouched_bytes(stack: &[u8], growth: StackGrowth, fill: u8) -> usize {
    match growth {
        StackGrowth::Downward => stack.iter().take_while(|&&b| b == fill).count(),
        StackGrowth::Upward => stack.iter().rev().take_while(|&&b| b == fill).count(),
    }
}

/// Untouched stack in [`StackType`] words, rounded down.
#[inline]
pub fn free_words(stack: &[u8], growth: StackGrowth, fill: u8) -> usize {
    untouched_bytes(stack, growth, fill) / std::mem::size_of::<StackType>()
}

/// Address of the end of the stack that the scan starts from.
pub fn bottom_of_stack(addr: usize, size: usize, growth: StackGrowth) -> usize {
    match growth {
        StackGrowth::Downward => addr,
        StackGrowth::Upward => addr + size.saturating_sub(1),
    }
}
