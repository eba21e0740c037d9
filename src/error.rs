//! Error types reported while bringing up the encoder group and the button.
//!
//! Every error here is a startup error. Once initialized, the poll loop
//! has no failure path.


/// A rejected encoder group configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
	/// More channels were requested than a sampling unit can serve.
	#[error("{count} encoder channels requested, at most {max} are supported", max = crate::MAX_CHANNELS)]
	TooManyChannels { count: usize },

	/// An active slot follows an unused one. Active slots must be a contiguous prefix.
	#[error("encoder slot {slot} is active but a previous slot is unused")]
	NonContiguous { slot: usize },

	/// Two channels claim the same GPIO.
	#[error("pin {pin} is claimed by more than one encoder channel")]
	PinConflict { pin: u8 },

	/// The second pin of the pair (`pin + 1`) does not exist.
	#[error("pin {pin} cannot start an encoder pin pair")]
	PinOutOfRange { pin: u8 },
}


/// A failure of the sampling unit while loading or starting its program.
///
/// None of these can be recovered from at runtime: the hardware either has the
/// resources for the requested layout or it doesn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SamplerError {
	/// No room left in the instruction memory for the program.
	#[error("no free program memory in the sampling unit")]
	ProgramSpace,

	/// Every state machine of the sampling unit is already in use.
	#[error("no free state machine in the sampling unit")]
	NoStateMachine,

	/// The pin is not part of the GPIO bank the sampling unit can read.
	#[error("pin {pin} is not usable by the sampling unit")]
	InvalidPin { pin: u8 },
}


/// Errors returned by [`crate::EncoderGroup::initialize`] and [`crate::ButtonWatcher::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
	#[error("invalid configuration: {0}")]
	Config(#[from] ConfigError),

	#[error("sampling unit failure: {0}")]
	Sampler(#[from] SamplerError),
}
