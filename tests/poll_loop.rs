//! Drives the encoder group and the button watcher the way the firmware loop
//! does, against a simulated sampling unit.

use std::cell::RefCell;
use std::rc::Rc;

use pico_pio_encoder::*;


/// Hardware side of the simulation: counters and the button latch.
#[derive(Default)]
struct Board {
	counts: [i32; MAX_CHANNELS],
	button_fifo: Vec<u32>,
	started_pins: Vec<u8>,
	refreshes: usize,
}

#[derive(Clone, Default)]
struct SimSampler(Rc<RefCell<Board>>);

impl QuadratureSampler for SimSampler {
	fn load_and_start(&mut self, _offset: u8, pins: &[u8], _max_step_rate: u32) -> Result<(), SamplerError> {
		self.0.borrow_mut().started_pins.extend_from_slice(pins);
		Ok(())
	}

	fn refresh_counts(&mut self, counts: &mut [i32]) {
		let mut board = self.0.borrow_mut();
		board.refreshes += 1;
		counts.copy_from_slice(&board.counts[..counts.len()]);
	}
}

impl ButtonSampler for SimSampler {
	fn load_and_start(&mut self, _pin: u8, _debounce_us: u32) -> Result<(), SamplerError> {
		Ok(())
	}

	fn read_button(&mut self) -> ButtonReading {
		let mut board = self.0.borrow_mut();
		if board.button_fifo.is_empty() {
			ButtonReading { state: 0, edge: false }
		} else {
			ButtonReading { state: board.button_fifo.remove(0), edge: true }
		}
	}
}

fn deltas(events: &[PositionEvent]) -> Vec<(usize, i32)> {
	events.iter().map(|e| (e.channel, e.delta)).collect()
}


#[test]
fn two_channel_scenario() {
	let sim = SimSampler::default();
	let config = EncoderGroupConfig::from_slots([Some(20), Some(17), None, None]);
	let mut log = String::new();
	let mut group = EncoderGroup::initialize(sim.clone(), &config, &mut log).unwrap();

	assert_eq!(sim.0.borrow().started_pins, vec![20, 17]);
	assert_eq!(log.lines().collect::<Vec<_>>(), ["encoder1 is used in pin 20,21", "encoder2 is used in pin 17,18"]);

	sim.0.borrow_mut().counts = [5, -3, 0, 0];
	assert_eq!(deltas(&group.poll_once()), [(0, 5), (1, -3)]);

	assert!(group.poll_once().is_empty());

	sim.0.borrow_mut().counts = [7, -3, 0, 0];
	let events = group.poll_once();
	assert_eq!(events.as_slice(), &[PositionEvent { channel: 0, position: 7, delta: 2 }]);
	assert_eq!(events[0].to_string(), "position0        7, delta      2");
}

#[test]
fn one_refresh_per_poll() {
	let sim = SimSampler::default();
	let config = EncoderGroupConfig::from_pins(&[2, 14, 9]).unwrap();
	let mut group = EncoderGroup::initialize(sim.clone(), &config, &mut String::new()).unwrap();

	for _ in 0..3 {
		group.poll_once();
	}

	assert_eq!(sim.0.borrow().refreshes, 3);
}

#[test]
fn counter_wrap_reports_single_step() {
	let sim = SimSampler::default();
	let config = EncoderGroupConfig::from_pins(&[20]).unwrap();
	let mut group = EncoderGroup::initialize(sim.clone(), &config, &mut String::new()).unwrap();

	sim.0.borrow_mut().counts[0] = i32::MAX;
	group.poll_once();

	sim.0.borrow_mut().counts[0] = i32::MIN;
	assert_eq!(deltas(&group.poll_once()), [(0, 1)]);

	sim.0.borrow_mut().counts[0] = i32::MAX;
	assert_eq!(deltas(&group.poll_once()), [(0, -1)]);
}

#[test]
fn button_edges_follow_encoder_events() {
	let sim = SimSampler::default();
	let config = EncoderGroupConfig::from_pins(&[20]).unwrap();
	let mut group = EncoderGroup::initialize(sim.clone(), &config, &mut String::new()).unwrap();
	let mut button = ButtonWatcher::initialize(sim.clone(), &ButtonConfig::new(2), &mut String::new()).unwrap();

	{
		let mut board = sim.0.borrow_mut();
		board.counts[0] = 1;
		board.button_fifo.extend([0x0, 0x1]);
	}

	let mut lines = Vec::new();

	for _ in 0..3 {
		lines.extend(group.poll_once().iter().map(ToString::to_string));
		lines.extend(button.poll_button().map(|edge| edge.to_string()));
	}

	assert_eq!(
		lines,
		[
			"position0        1, delta      1",
			"got a button edge: 0x00000000",
			"got a button edge: 0x00000001",
		]
	);
	assert_eq!(button.poll_button(), None);
	assert_eq!(button.last_state(), Some(0x1));
}

#[test]
fn misconfiguration_is_reported_not_started() {
	let sim = SimSampler::default();
	let config = EncoderGroupConfig::from_slots([Some(2), Some(14), None, Some(9)]);
	let error = EncoderGroup::initialize(sim.clone(), &config, &mut String::new()).err();

	assert_eq!(error, Some(InitError::Config(ConfigError::NonContiguous { slot: 3 })));
	assert!(sim.0.borrow().started_pins.is_empty());
	assert_eq!(
		error.map(|e| e.to_string()).as_deref(),
		Some("invalid configuration: encoder slot 3 is active but a previous slot is unused")
	);
}
