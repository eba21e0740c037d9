//! Property-based tests for delta extraction.

use pico_pio_encoder::*;
use proptest::prelude::*;


/// Counter that can be moved freely between polls.
struct FreeCounter {
	counts: [i32; MAX_CHANNELS],
}

impl QuadratureSampler for &mut FreeCounter {
	fn load_and_start(&mut self, _offset: u8, _pins: &[u8], _max_step_rate: u32) -> Result<(), SamplerError> {
		Ok(())
	}

	fn refresh_counts(&mut self, counts: &mut [i32]) {
		counts.copy_from_slice(&self.counts[..counts.len()]);
	}
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(500))]

	/// Any movement applied to any starting count comes back out as the delta.
	#[test]
	fn prop_delta_recovers_movement(old: i32, movement: i32) {
		prop_assert_eq!(wrapping_delta(old, old.wrapping_add(movement)), movement);
	}

	/// The delta is the true difference modulo 2^32, reinterpreted as signed.
	#[test]
	fn prop_delta_is_modular_difference(old: i32, new: i32) {
		let expected = (i64::from(new) - i64::from(old)).rem_euclid(1 << 32) as u32 as i32;
		prop_assert_eq!(wrapping_delta(old, new), expected);
	}

	/// Moving one channel never produces an event on another one.
	#[test]
	fn prop_channels_are_isolated(
		start in prop::array::uniform4(any::<i32>()),
		channel in 0usize..MAX_CHANNELS,
		movement in any::<i32>().prop_filter("non-zero", |m| *m != 0),
	) {
		let mut counter = FreeCounter { counts: start };
		let config = EncoderGroupConfig::from_pins(&[0, 4, 8, 12]).unwrap();
		let mut group = EncoderGroup::initialize(&mut counter, &config, &mut String::new()).unwrap();

		group.poll_once();
		group.sampler_mut().counts[channel] = start[channel].wrapping_add(movement);
		let events = group.poll_once();

		prop_assert_eq!(events.len(), 1);
		prop_assert_eq!(events[0].channel, channel);
		prop_assert_eq!(events[0].delta, movement);
	}

	/// A second poll without movement is always silent.
	#[test]
	fn prop_idle_poll_is_silent(start in prop::array::uniform4(any::<i32>())) {
		let mut counter = FreeCounter { counts: start };
		let config = EncoderGroupConfig::from_pins(&[0, 4, 8, 12]).unwrap();
		let mut group = EncoderGroup::initialize(&mut counter, &config, &mut String::new()).unwrap();

		group.poll_once();
		prop_assert!(group.poll_once().is_empty());
	}
}
