//! The contract between the polling core and the hardware sampling unit.
//!
//! A sampling unit is a small co-processor (a PIO block on the RP2040) that
//! watches the GPIO lines on its own clock. The encoder program keeps one
//! free-running 32-bit counter per pin pair and the button program latches
//! every debounced state change until software reads it.

use crate::SamplerError;


/// Sampling unit running the quadrature decoding program, one counter per channel.
pub trait QuadratureSampler {
	/// Installs the decoding program at `offset` and starts one decoder per entry
	/// of `pins`, each reading `pin` and `pin + 1`.
	///
	/// `max_step_rate` is the highest step rate (steps per second) the decoders
	/// must follow, `0` meaning "as fast as possible". It only tunes the sample
	/// clock.
	///
	/// Calling it again with the program already installed must not install it twice.
	fn load_and_start(&mut self, offset: u8, pins: &[u8], max_step_rate: u32) -> Result<(), SamplerError>;

	/// Copies the current raw counter of every started channel into `counts`,
	/// in the order the pins were given to [`QuadratureSampler::load_and_start`].
	///
	/// Must return in bounded time. Each counter is read torn-free.
	fn refresh_counts(&mut self, counts: &mut [i32]);
}


/// Sampling unit running the button debouncing program.
pub trait ButtonSampler {
	/// Installs the debouncing program and starts sampling `pin`.
	fn load_and_start(&mut self, pin: u8, debounce_us: u32) -> Result<(), SamplerError>;

	/// Reads the debounced state. A pending edge is consumed by this call.
	fn read_button(&mut self) -> ButtonReading;
}


/// One read of the button sampler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonReading {
	/// The raw debounced state word.
	pub state: u32,
	/// Whether an edge was latched since the previous read.
	pub edge: bool,
}


/// Depth of the RX FIFO of one state machine, in words.
pub const RX_FIFO_DEPTH: usize = 4;


/// Reads a word pushed after this call started from a FIFO that `read` pops.
///
/// At most [`RX_FIFO_DEPTH`] stale words are discarded, then `read` is polled
/// until the next word arrives. With a program that pushes on every pass this
/// returns after at most `RX_FIFO_DEPTH + 1` successful reads, even when the
/// FIFO refills as fast as it is drained.
pub fn read_fresh_word(mut read: impl FnMut() -> Option<u32>) -> u32 {
	for _ in 0..RX_FIFO_DEPTH {
		if read().is_none() {
			break;
		}
	}

	loop {
		if let Some(word) = read() {
			return word;
		}
	}
}

/// Takes the free state machine out of `slot`, then installs its program.
///
/// Nothing is installed when the slot is empty. If the install fails the state
/// machine is put back, so a later call can try again.
pub fn claim_then_install<T, P, E>(
	slot: &mut Option<T>,
	install: impl FnOnce() -> Result<P, E>,
) -> Result<(T, P), SamplerError> {
	let claimed = slot.take().ok_or(SamplerError::NoStateMachine)?;

	match install() {
		Ok(program) => Ok((claimed, program)),
		Err(_) => {
			*slot = Some(claimed);
			Err(SamplerError::ProgramSpace)
		}
	}
}
