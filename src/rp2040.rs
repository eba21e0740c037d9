//! RP2040 implementation of the sampling unit traits.
//!
//! Encoders run on PIO0, one state machine per channel, all sharing a single
//! copy of the quadrature program. The button runs on PIO1.
//! Also provides the USB serial console used for diagnostics.

use rp_pico as bsp;

use bsp::hal;
use hal::gpio;
use hal::pac;
use hal::pio;

use heapless::Vec;

use usb_device::bus::UsbBusAllocator;
use usb_device::device::{BuilderError, StringDescriptors, UsbDevice, UsbDeviceBuilder, UsbDeviceState, UsbVidPid};
use usb_device::UsbError;
use usbd_serial::{SerialPort, USB_CLASS_CDC};

use crate::*;


/// The amount of GPIOs in bank 0, the only bank the PIO blocks can read.
pub const BANK0_PIN_COUNT: u8 = 30;
/// Write attempts before console output is dropped.
const CONSOLE_WRITE_ATTEMPTS: usize = 64;


/// Quadrature decoder program, adapted from the Raspberry Pi pico-examples.
///
/// The Y register holds the count. Every loop the previous and the current
/// state of the two pins form a 4 bit index into the jump table at the start
/// of the program, which must therefore sit at address 0. The count is pushed
/// to the RX FIFO (without blocking) on every pass, so the FIFO always holds
/// recent values. One pass takes at most 10 cycles.
fn quadrature_program() -> ::pio::Program<{ ::pio::RP2040_MAX_PROGRAM_SIZE }> {
	pio_proc::pio_asm!(
		".origin 0",
		// 00 state
		"    jmp update",
		"    jmp decrement",
		"    jmp increment",
		"    jmp update",
		// 01 state
		"    jmp increment",
		"    jmp update",
		"    jmp update",
		"    jmp decrement",
		// 10 state
		"    jmp decrement",
		"    jmp update",
		"    jmp update",
		"    jmp increment",
		// 11 state, the last entry falls through into `update`
		"    jmp update",
		"    jmp increment",
		"decrement:",
		"    jmp y-- update",
		".wrap_target",
		"update:",
		"    mov isr, y",
		"    push noblock",
		"    out isr, 2",
		"    in pins, 2",
		"    mov osr, isr",
		"    mov pc, isr",
		"increment:",
		"    mov y, ~y",
		"    jmp y-- increment_cont",
		"increment_cont:",
		"    mov y, ~y",
		".wrap"
	)
	.program
}

/// Button debouncing program.
///
/// Y holds the last reported level. When the pin differs from it, the program
/// waits [`BUTTON_SETTLE_CYCLES`] cycles and samples again. If the new level
/// held, it becomes the reported level and is pushed to the RX FIFO, where it
/// stays until software reads it.
fn button_program() -> ::pio::Program<{ ::pio::RP2040_MAX_PROGRAM_SIZE }> {
	pio_proc::pio_asm!(
		"    mov isr, null",
		"    in pins, 1",
		"    mov y, isr",
		".wrap_target",
		"poll:",
		"    mov isr, null",
		"    in pins, 1",
		"    mov x, isr",
		"    jmp x!=y settle_start",
		"    jmp poll",
		"settle_start:",
		"    set x, 31",
		"settle:",
		"    jmp x-- settle [31]",
		"    mov isr, null",
		"    in pins, 1",
		"    mov x, isr",
		"    jmp x!=y confirm",
		"    jmp poll",
		"confirm:",
		"    mov y, x",
		"    push noblock",
		".wrap"
	)
	.program
}


/// Configures and starts one quadrature state machine reading `pin` and `pin + 1`.
///
/// Returns the running state machine and its receiver in a tuple.
fn start_decoder<SM: pio::StateMachineIndex>(
	program: &pio::InstalledProgram<pac::PIO0>,
	sm: pio::UninitStateMachine<(pac::PIO0, SM)>,
	pin: u8,
	divisor: (u16, u8),
) -> (
	pio::StateMachine<(pac::PIO0, SM), pio::Running>,
	pio::Rx<(pac::PIO0, SM)>,
) {
	// SAFETY: the decoders only read the program, and it is never uninstalled.
	let program = unsafe { program.share() };

	let (mut sm, rx, _) = pio::PIOBuilder::from_installed_program(program)
		.in_pin_base(pin)
		.jmp_pin(pin)
		.autopush(false)
		.autopull(false)
		// `out isr, 2` must take the low bits of the previous sample.
		.out_shift_direction(pio::ShiftDirection::Right)
		.in_shift_direction(pio::ShiftDirection::Left)
		.clock_divisor_fixed_point(divisor.0, divisor.1)
		.build(sm);

	sm.set_pindirs([
		(pin, pio::PinDir::Input),
		(pin + 1, pio::PinDir::Input),
	]);

	(sm.start(), rx)
}

/// Returns a count pushed after this call started.
///
/// Anything already queued may be stale (the program drops pushes while the
/// FIFO is full). At most [`RX_FIFO_DEPTH`] queued words are discarded, then the
/// next push is taken, so the call ends after at most `RX_FIFO_DEPTH + 1` words
/// even at a divisor of 1.0.
fn read_fresh<SM: pio::ValidStateMachine>(rx: &mut pio::Rx<SM>) -> u32 {
	read_fresh_word(|| rx.read())
}


/// A started decoder. Each variant owns a different state machine of PIO0,
/// held only so that nothing else can claim it.
enum Decoder {
	Sm0 { _sm: pio::StateMachine<pio::PIO0SM0, pio::Running>, rx: pio::Rx<pio::PIO0SM0> },
	Sm1 { _sm: pio::StateMachine<pio::PIO0SM1, pio::Running>, rx: pio::Rx<pio::PIO0SM1> },
	Sm2 { _sm: pio::StateMachine<pio::PIO0SM2, pio::Running>, rx: pio::Rx<pio::PIO0SM2> },
	Sm3 { _sm: pio::StateMachine<pio::PIO0SM3, pio::Running>, rx: pio::Rx<pio::PIO0SM3> },
}

impl Decoder {
	fn count(&mut self) -> i32 {
		// The program counts in a 32-bit register, reinterpret it as signed.
		(match self {
			Decoder::Sm0 { rx, .. } => read_fresh(rx),
			Decoder::Sm1 { rx, .. } => read_fresh(rx),
			Decoder::Sm2 { rx, .. } => read_fresh(rx),
			Decoder::Sm3 { rx, .. } => read_fresh(rx),
		}) as i32
	}
}


/// The four state machines of PIO0, before use.
pub type Pio0StateMachines = (
	pio::UninitStateMachine<pio::PIO0SM0>,
	pio::UninitStateMachine<pio::PIO0SM1>,
	pio::UninitStateMachine<pio::PIO0SM2>,
	pio::UninitStateMachine<pio::PIO0SM3>,
);


/// Quadrature sampling unit backed by PIO0.
pub struct Pio0Quadrature {
	pio: pio::PIO<pac::PIO0>,
	program: Option<pio::InstalledProgram<pac::PIO0>>,
	sm0: Option<pio::UninitStateMachine<pio::PIO0SM0>>,
	sm1: Option<pio::UninitStateMachine<pio::PIO0SM1>>,
	sm2: Option<pio::UninitStateMachine<pio::PIO0SM2>>,
	sm3: Option<pio::UninitStateMachine<pio::PIO0SM3>>,
	decoders: Vec<Decoder, MAX_CHANNELS>,
	sys_hz: u32,
}

impl Pio0Quadrature {
	/// Takes ownership of PIO0 and its state machines. `sys_hz` is the system clock frequency.
	pub fn new(pio: pio::PIO<pac::PIO0>, sms: Pio0StateMachines, sys_hz: u32) -> Self {
		Self {
			pio,
			program: None,
			sm0: Some(sms.0),
			sm1: Some(sms.1),
			sm2: Some(sms.2),
			sm3: Some(sms.3),
			decoders: Vec::new(),
			sys_hz,
		}
	}
}

impl QuadratureSampler for Pio0Quadrature {
	fn load_and_start(&mut self, offset: u8, pins: &[u8], max_step_rate: u32) -> Result<(), SamplerError> {
		if let Some(&pin) = pins.iter().find(|&&pin| pin >= BANK0_PIN_COUNT - 1) {
			return Err(SamplerError::InvalidPin { pin });
		}

		if self.decoders.len() + pins.len() > MAX_CHANNELS {
			return Err(SamplerError::NoStateMachine);
		}

		if self.program.is_none() {
			let program = quadrature_program();

			// The jump table only works at the origin the program was assembled for.
			if program.origin != Some(offset) {
				return Err(SamplerError::ProgramSpace);
			}

			let installed = self.pio.install(&program).map_err(|_| SamplerError::ProgramSpace)?;
			self.program = Some(installed);
		}

		let Some(program) = self.program.as_ref() else {
			return Err(SamplerError::ProgramSpace);
		};
		let divisor = encoder_clock_divisor(self.sys_hz, max_step_rate);

		for &pin in pins {
			let decoder = match self.decoders.len() {
				0 => self.sm0.take().map(|sm| {
					let (sm, rx) = start_decoder(program, sm, pin, divisor);
					Decoder::Sm0 { _sm: sm, rx }
				}),
				1 => self.sm1.take().map(|sm| {
					let (sm, rx) = start_decoder(program, sm, pin, divisor);
					Decoder::Sm1 { _sm: sm, rx }
				}),
				2 => self.sm2.take().map(|sm| {
					let (sm, rx) = start_decoder(program, sm, pin, divisor);
					Decoder::Sm2 { _sm: sm, rx }
				}),
				3 => self.sm3.take().map(|sm| {
					let (sm, rx) = start_decoder(program, sm, pin, divisor);
					Decoder::Sm3 { _sm: sm, rx }
				}),
				_ => None,
			}
			.ok_or(SamplerError::NoStateMachine)?;

			self.decoders.push(decoder).map_err(|_| SamplerError::NoStateMachine)?;
		}

		Ok(())
	}

	fn refresh_counts(&mut self, counts: &mut [i32]) {
		for (count, decoder) in counts.iter_mut().zip(self.decoders.iter_mut()) {
			*count = decoder.count();
		}
	}
}


/// Button sampling unit backed by the first state machine of PIO1.
pub struct Pio1Button {
	pio: pio::PIO<pac::PIO1>,
	sm: Option<pio::UninitStateMachine<pio::PIO1SM0>>,
	running: Option<(pio::StateMachine<pio::PIO1SM0, pio::Running>, pio::Rx<pio::PIO1SM0>)>,
	state: u32,
	sys_hz: u32,
}

impl Pio1Button {
	/// Takes ownership of PIO1 and one of its state machines. `sys_hz` is the system clock frequency.
	pub fn new(pio: pio::PIO<pac::PIO1>, sm: pio::UninitStateMachine<pio::PIO1SM0>, sys_hz: u32) -> Self {
		Self {
			pio,
			sm: Some(sm),
			running: None,
			state: 0,
			sys_hz,
		}
	}
}

impl ButtonSampler for Pio1Button {
	fn load_and_start(&mut self, pin: u8, debounce_us: u32) -> Result<(), SamplerError> {
		if pin >= BANK0_PIN_COUNT {
			return Err(SamplerError::InvalidPin { pin });
		}

		let (sm, installed) = claim_then_install(&mut self.sm, || self.pio.install(&button_program()))?;
		let (int, frac) = button_clock_divisor(self.sys_hz, debounce_us);

		let (mut sm, rx, _) = pio::PIOBuilder::from_installed_program(installed)
			.in_pin_base(pin)
			.autopush(false)
			.in_shift_direction(pio::ShiftDirection::Left)
			.clock_divisor_fixed_point(int, frac)
			.build(sm);

		sm.set_pindirs([(pin, pio::PinDir::Input)]);

		self.running = Some((sm.start(), rx));
		Ok(())
	}

	fn read_button(&mut self) -> ButtonReading {
		let pushed = self.running.as_mut().and_then(|(_, rx)| rx.read());

		match pushed {
			Some(state) => {
				self.state = state;
				ButtonReading { state, edge: true }
			}
			None => ButtonReading { state: self.state, edge: false },
		}
	}
}


/// Line oriented console over USB CDC serial.
///
/// Output is dropped while no host has the port configured, so the firmware
/// never stalls on a missing terminal.
pub struct UsbConsole<'a> {
	device: UsbDevice<'a, hal::usb::UsbBus>,
	serial: SerialPort<'a, hal::usb::UsbBus>,
}

impl<'a> UsbConsole<'a> {
	/// Registers a CDC serial class on `bus` and builds the USB device around it.
	pub fn new(bus: &'a UsbBusAllocator<hal::usb::UsbBus>) -> Result<Self, BuilderError> {
		let serial = SerialPort::new(bus);

		let device = UsbDeviceBuilder::new(bus, UsbVidPid(0x16c0, 0x27dd))
			.strings(&[StringDescriptors::default()
				.manufacturer("pico-pio-encoder")
				.product("PIO Quadrature Encoder")
				.serial_number("0000")
			])?
			.device_class(USB_CLASS_CDC)
			.build();

		Ok(Self { device, serial })
	}

	/// Services the USB device. Must be called regularly, at least every 10ms.
	pub fn poll(&mut self) {
		if self.device.poll(&mut [&mut self.serial]) {
			// Nothing is read from the host, discard it so the endpoint doesn't stall.
			let mut buf = [0u8; 64];
			let _ = self.serial.read(&mut buf);
		}
	}

	fn write_bytes(&mut self, mut bytes: &[u8]) {
		let mut attempts = 0;

		while !bytes.is_empty() && attempts < CONSOLE_WRITE_ATTEMPTS {
			if self.device.state() != UsbDeviceState::Configured {
				return;
			}

			match self.serial.write(bytes) {
				Ok(written) => bytes = bytes.get(written..).unwrap_or_default(),
				Err(UsbError::WouldBlock) => {}
				Err(_) => return,
			}

			self.poll();
			attempts += 1;
		}
	}
}

impl core::fmt::Write for UsbConsole<'_> {
	fn write_str(&mut self, s: &str) -> core::fmt::Result {
		for_each_console_chunk(s, |chunk| self.write_bytes(chunk));

		Ok(())
	}
}


/// Type alias for a non-ID pin for use with the PIO0.
pub type DynPio0Pin = gpio::Pin<gpio::DynPinId, gpio::FunctionPio0, gpio::PullUp>;
/// Type alias for a non-ID pin for use with the PIO1.
pub type DynPio1Pin = gpio::Pin<gpio::DynPinId, gpio::FunctionPio1, gpio::PullUp>;
