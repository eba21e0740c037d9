//! Events produced by the registry and the poll loop.
//!
//! The `Display` output of each event is the line printed on the console.
//! It is meant for people, not for parsers.

use core::fmt;


/// An encoder channel was configured during initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfigured {
	/// Slot index of the channel (0-based).
	pub channel: usize,
	/// First pin of the pair.
	pub pin: u8,
}

impl fmt::Display for ChannelConfigured {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		// Encoders are numbered from 1 on the console.
		write!(f, "encoder{} is used in pin {},{}", self.channel + 1, self.pin, u16::from(self.pin) + 1)
	}
}


/// A channel moved since the previous poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionEvent {
	/// Slot index of the channel (0-based).
	pub channel: usize,
	/// Raw counter value after the move.
	pub position: i32,
	/// Signed movement since the previous poll. Never zero.
	pub delta: i32,
}

impl fmt::Display for PositionEvent {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "position{} {:8}, delta {:6}", self.channel, self.position, self.delta)
	}
}


/// The button sampler latched a new debounced state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonEdge {
	/// The raw state word reported by the sampler.
	pub state: u32,
}

impl fmt::Display for ButtonEdge {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "got a button edge: 0x{:08x}", self.state)
	}
}


/// Splits console text into the chunks written to a serial terminal, turning
/// every `\n` into `\r\n`. Empty chunks are never passed to `write`.
pub fn for_each_console_chunk(text: &str, mut write: impl FnMut(&[u8])) {
	for (i, line) in text.split('\n').enumerate() {
		if i > 0 {
			write(b"\r\n");
		}
		if !line.is_empty() {
			write(line.as_bytes());
		}
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	fn chunks(text: &str) -> Vec<Vec<u8>> {
		let mut out = Vec::new();
		for_each_console_chunk(text, |chunk| out.push(chunk.to_vec()));
		out
	}

	#[test]
	fn console_newlines_become_crlf() {
		assert_eq!(chunks("a\nb\n"), [b"a".to_vec(), b"\r\n".to_vec(), b"b".to_vec(), b"\r\n".to_vec()]);
	}

	#[test]
	fn console_text_without_newline_is_one_chunk() {
		assert_eq!(chunks("booted"), [b"booted".to_vec()]);
		assert!(chunks("").is_empty());
	}

	#[test]
	fn channel_line_names_both_pins() {
		let line = ChannelConfigured { channel: 1, pin: 17 }.to_string();
		assert_eq!(line, "encoder2 is used in pin 17,18");
	}

	#[test]
	fn position_line_pads_values() {
		let line = PositionEvent { channel: 0, position: 7, delta: -2 }.to_string();
		assert_eq!(line, "position0        7, delta     -2");
	}

	#[test]
	fn button_line_is_zero_padded_hex() {
		let line = ButtonEdge { state: 0x1f }.to_string();
		assert_eq!(line, "got a button edge: 0x0000001f");
	}
}
