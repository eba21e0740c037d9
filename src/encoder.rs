use core::fmt::Write;

use heapless::Vec;

use crate::*;


/// Instruction memory offset of the quadrature decoding program.
///
/// The program dispatches on the sampled pin state with a computed jump, so it
/// only works when loaded at the very start of the instruction memory.
pub const PROGRAM_OFFSET: u8 = 0;


/// Computes the movement between two raw counter samples.
///
/// The counters are free running and wrap at the `i32` limits. Two's-complement
/// subtraction gives the right signed movement across the wrap, as long as the
/// counter moved less than half its range between the two samples.
#[inline]
pub fn wrapping_delta(old: i32, new: i32) -> i32 {
	new.wrapping_sub(old)
}


/// Describes which pins the encoder group uses and how fast the encoders can spin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncoderGroupConfig {
	slots: [Option<u8>; MAX_CHANNELS],
	max_step_rate: u32,
}

impl EncoderGroupConfig {
	/// Creates a configuration from one optional first-pin per slot, `None`
	/// marking an unused slot.
	///
	/// Active slots must come first, e.g. `[Some(2), Some(14), Some(9), None]`.
	/// This is checked by [`EncoderGroup::initialize`].
	pub fn from_slots(slots: [Option<u8>; MAX_CHANNELS]) -> Self {
		Self { slots, max_step_rate: 0 }
	}

	/// Creates a configuration from the ordered first-pins of the channels.
	pub fn from_pins(pins: &[u8]) -> Result<Self, ConfigError> {
		if pins.len() > MAX_CHANNELS {
			return Err(ConfigError::TooManyChannels { count: pins.len() });
		}

		let mut slots = [None; MAX_CHANNELS];

		for (slot, &pin) in slots.iter_mut().zip(pins) {
			*slot = Some(pin);
		}

		Ok(Self::from_slots(slots))
	}

	/// Sets the highest step rate (steps per second) the encoders are expected to reach.
	///
	/// Default is `0`, which runs the sampler at full speed.
	pub fn with_max_step_rate(mut self, max_step_rate: u32) -> Self {
		self.max_step_rate = max_step_rate;
		self
	}

	/// Highest step rate (steps per second) the decoders must follow, `0` for full speed.
	pub fn max_step_rate(&self) -> u32 {
		self.max_step_rate
	}

	/// Validates the slots and returns the first pin of every active channel, in slot order.
	pub fn active_pins(&self) -> Result<Vec<u8, MAX_CHANNELS>, ConfigError> {
		let mut pins: Vec<u8, MAX_CHANNELS> = Vec::new();
		let mut seen_unused = false;

		for (slot, entry) in self.slots.iter().enumerate() {
			let Some(pin) = *entry else {
				seen_unused = true;
				continue;
			};

			if seen_unused {
				return Err(ConfigError::NonContiguous { slot });
			}

			if pin.checked_add(1).is_none() {
				return Err(ConfigError::PinOutOfRange { pin });
			}

			// Pairs (p, p + 1) and (q, q + 1) overlap when |p - q| <= 1.
			if let Some(&other) = pins.iter().find(|&&other| other.abs_diff(pin) <= 1) {
				let shared = if other == pin { pin } else { other.max(pin) };
				return Err(ConfigError::PinConflict { pin: shared });
			}

			// Cannot overflow, there are as many slots as the vector capacity.
			pins.push(pin).map_err(|_| ConfigError::TooManyChannels { count: MAX_CHANNELS + 1 })?;
		}

		Ok(pins)
	}
}


/// One encoder channel and its counter snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
	pin: u8,
	/// The counter value seen by the previous poll.
	count_old: i32,
	/// The most recent counter value read from the sampler.
	count_new: i32,
}

impl Channel {
	fn new(pin: u8) -> Self {
		Self {
			pin,
			count_old: 0,
			count_new: 0,
		}
	}

	/// Returns pins A and B of the channel in a tuple.
	pub fn pins(&self) -> (u8, u8) {
		(self.pin, self.pin + 1)
	}

	/// The latest raw counter value.
	pub fn position(&self) -> i32 {
		self.count_new
	}

	/// Stores a fresh counter sample and returns the movement since the previous one.
	fn update(&mut self, count: i32) -> i32 {
		self.count_new = count;

		let delta = wrapping_delta(self.count_old, self.count_new);
		self.count_old = self.count_new;

		delta
	}
}


/// Up to [`MAX_CHANNELS`] encoders decoded by one sampling unit.
pub struct EncoderGroup<S> {
	sampler: S,
	channels: Vec<Channel, MAX_CHANNELS>,
}

impl<S: QuadratureSampler> EncoderGroup<S> {
	/// Validates `config`, records the channels and starts the decoding program on `sampler`.
	///
	/// One line per channel is written to `log`. Logging is best effort: a
	/// failing writer doesn't fail the initialization.
	pub fn initialize<W: Write>(
		mut sampler: S,
		config: &EncoderGroupConfig,
		log: &mut W,
	) -> Result<Self, InitError> {
		let pins = config.active_pins()?;
		let mut channels: Vec<Channel, MAX_CHANNELS> = Vec::new();

		for (channel, &pin) in pins.iter().enumerate() {
			let _ = writeln!(log, "{}", ChannelConfigured { channel, pin });

			// Same capacity as `pins`.
			let _ = channels.push(Channel::new(pin));
		}

		sampler.load_and_start(PROGRAM_OFFSET, &pins, config.max_step_rate())?;

		Ok(Self { sampler, channels })
	}

	/// Reads every channel once and reports the ones that moved.
	///
	/// Channels are visited in slot order. A channel whose counter didn't change
	/// since the previous call produces no event.
	pub fn poll_once(&mut self) -> Vec<PositionEvent, MAX_CHANNELS> {
		let mut counts = [0i32; MAX_CHANNELS];
		let active = self.channels.len();
		let mut events = Vec::new();

		self.sampler.refresh_counts(&mut counts[..active]);

		for (channel, (state, &count)) in self.channels.iter_mut().zip(counts.iter()).enumerate() {
			let delta = state.update(count);

			if delta != 0 {
				let _ = events.push(PositionEvent { channel, position: count, delta });
			}
		}

		events
	}

	/// Number of configured channels.
	pub fn active_count(&self) -> usize {
		self.channels.len()
	}

	/// The active channels, in slot order.
	pub fn channels(&self) -> &[Channel] {
		&self.channels
	}

	/// The channel in slot `index`, if that slot is active.
	pub fn channel(&self, index: usize) -> Option<&Channel> {
		self.channels.get(index)
	}

	/// The sampling unit the group reads from.
	pub fn sampler(&self) -> &S {
		&self.sampler
	}

	/// Mutable access to the sampling unit, e.g. to stop it.
	pub fn sampler_mut(&mut self) -> &mut S {
		&mut self.sampler
	}
}
