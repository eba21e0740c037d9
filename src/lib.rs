#![cfg_attr(not(test), no_std)]

pub mod button;
pub mod encoder;
pub mod error;
pub mod event;
pub mod sampling;

#[cfg(feature = "rp2040")]
pub mod rp2040;

pub use crate::button::*;
pub use crate::encoder::*;
pub use crate::error::*;
pub use crate::event::*;
pub use crate::sampling::*;


/// The amount of encoder channels one sampling unit can decode, one per state machine.
pub const MAX_CHANNELS: usize = 4;
/// Worst case length (in PIO cycles) of one pass of the quadrature sampling loop.
pub const ENC_LOOP_CYCLES: u64 = 10;
/// Length (in PIO cycles) of the settle delay of the button program.
pub const BUTTON_SETTLE_CYCLES: u64 = 32 * 32;

/// Largest PIO clock divisor in 16.8 fixed point (65535 + 255/256).
const MAX_DIVISOR_FP: u64 = ((u16::MAX as u64) << 8) | 0xff;
/// Divisor of 1.0 in 16.8 fixed point.
const MIN_DIVISOR_FP: u64 = 1 << 8;


/// Splits a 16.8 fixed point divisor into the integer and fractional parts
/// expected by the PIO clock divider, clamped to the range the hardware supports.
fn split_divisor(divisor_fp: u64) -> (u16, u8) {
	let divisor_fp = divisor_fp.clamp(MIN_DIVISOR_FP, MAX_DIVISOR_FP);

	((divisor_fp >> 8) as u16, (divisor_fp & 0xff) as u8)
}

/// Computes the clock divisor of the quadrature state machines.
///
/// The sampling loop takes at most [`ENC_LOOP_CYCLES`] cycles, so the state
/// machine runs just fast enough to see every step at `max_step_rate`. A rate of
/// `0` runs at the system clock.
///
/// Returns the integer and fractional (1/256) parts of the divisor in a tuple.
pub fn encoder_clock_divisor(sys_hz: u32, max_step_rate: u32) -> (u16, u8) {
	if max_step_rate == 0 {
		return (1, 0);
	}

	split_divisor((u64::from(sys_hz) << 8) / (ENC_LOOP_CYCLES * u64::from(max_step_rate)))
}

/// Computes the clock divisor of the button state machine so that its settle
/// delay lasts `debounce_us` microseconds.
///
/// Returns the integer and fractional (1/256) parts of the divisor in a tuple.
pub fn button_clock_divisor(sys_hz: u32, debounce_us: u32) -> (u16, u8) {
	let cycles_fp = (u64::from(sys_hz) * u64::from(debounce_us)) << 8;

	split_divisor(cycles_fp / (1_000_000 * BUTTON_SETTLE_CYCLES))
}
