use core::fmt::Write;

use crate::*;


/// The duration (in microseconds) a new button level must hold before it is reported.
pub const BUTTON_DEBOUNCE_US: u32 = 10_000;


/// Describes the button input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonConfig {
	pin: u8,
	debounce_us: u32,
}

impl ButtonConfig {
	/// Creates a configuration for a button wired to `pin`.
	pub fn new(pin: u8) -> Self {
		Self {
			pin,
			debounce_us: BUTTON_DEBOUNCE_US,
		}
	}

	/// Sets how long (in microseconds) the button must be stable before an edge is reported.
	///
	/// Default is [`BUTTON_DEBOUNCE_US`].
	pub fn with_debounce_us(mut self, debounce_us: u32) -> Self {
		self.debounce_us = debounce_us;
		self
	}

	pub fn pin(&self) -> u8 {
		self.pin
	}

	pub fn debounce_us(&self) -> u32 {
		self.debounce_us
	}
}


/// Turns the latched state of a button sampler into edge events.
pub struct ButtonWatcher<B> {
	sampler: B,
	pin: u8,
	last_state: Option<u32>,
}

impl<B: ButtonSampler> ButtonWatcher<B> {
	/// Starts the debouncing program on `sampler` and logs the pin in use.
	pub fn initialize<W: Write>(mut sampler: B, config: &ButtonConfig, log: &mut W) -> Result<Self, InitError> {
		sampler.load_and_start(config.pin(), config.debounce_us())?;

		let _ = writeln!(log, "button is used in pin {}", config.pin());

		Ok(Self {
			sampler,
			pin: config.pin(),
			last_state: None,
		})
	}

	/// Reports the new state word if an edge was latched since the previous call.
	///
	/// Never blocks. The edge is consumed, so the next call returns `None`
	/// unless the button changed again.
	pub fn poll_button(&mut self) -> Option<ButtonEdge> {
		let reading = self.sampler.read_button();

		if !reading.edge {
			return None;
		}

		self.last_state = Some(reading.state);
		Some(ButtonEdge { state: reading.state })
	}

	/// The state word of the last reported edge, if any.
	pub fn last_state(&self) -> Option<u32> {
		self.last_state
	}

	pub fn pin(&self) -> u8 {
		self.pin
	}

	pub fn sampler_mut(&mut self) -> &mut B {
		&mut self.sampler
	}
}
