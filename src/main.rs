#![no_std]
#![no_main]

// Ensures that the program is halted on panic.
extern crate panic_halt;

use core::fmt::Write;

use pico_pio_encoder::*;
use pico_pio_encoder::rp2040::{DynPio0Pin, DynPio1Pin, Pio0Quadrature, Pio1Button, UsbConsole};

// The "rp_pico" crate is a Board Support Package for the RP2040 Hardware Abstraction Layer.
// Whenever the "bsp" alias is used, it is directly referencing the rp_pico crate.
use rp_pico as bsp;

// The macro for the start-up function.
use bsp::entry;

// Shorter alias for the Peripheral Access Crate.
use bsp::hal::pac;

// Shorter alias for the Hardware Abstraction Layer.
use bsp::hal;

use hal::pio::PIOExt;
use hal::Clock;

// These are traits for handling digital pin states.
use embedded_hal::digital::OutputPin;

// USB Device support.
use usb_device::class_prelude::*;


/// First pin of the pair of encoder 1. Must match the GPIO configuration below.
const ENC_1_GPIO: u8 = 20;
/// First pin of the pair of encoder 2. Must match the GPIO configuration below.
const ENC_2_GPIO: u8 = 17;
/// Highest expected step rate of the encoders, `0` samples at full speed.
const ENC_MAX_STEP_RATE: u32 = 0;
/// The button GPIO. Must match the GPIO configuration below.
const BUTTON_GPIO: u8 = 2;
/// Time given to the host to open the serial port before anything is printed.
const BOOT_DELAY_MS: u64 = 3_000;
/// Interval between two prints of a fatal startup error.
const HALT_REPORT_MS: u64 = 1_000;


#[entry]
fn main() -> ! {
	// Get access to the RP2040 peripherals.
	let mut pac = pac::Peripherals::take().unwrap();

	// Set up the watchdog driver - needed by the clock setup code.
	let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

	// Configure the clocks.
	let clocks = hal::clocks::init_clocks_and_plls(
		bsp::XOSC_CRYSTAL_FREQ,
		pac.XOSC,
		pac.CLOCKS,
		pac.PLL_SYS,
		pac.PLL_USB,
		&mut pac.RESETS,
		&mut watchdog,
	)
		.ok()
		.unwrap();

	let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

	// Set up the pins.
	let sio = hal::Sio::new(pac.SIO);
	let pins = bsp::Pins::new(
		pac.IO_BANK0,
		pac.PADS_BANK0,
		sio.gpio_bank0,
		&mut pac.RESETS,
	);

	// Set up the USB driver.
	let usb_bus = UsbBusAllocator::new(hal::usb::UsbBus::new(
		pac.USBCTRL_REGS,
		pac.USBCTRL_DPRAM,
		clocks.usb_clock,
		true,
		&mut pac.RESETS,
	));

	let mut console = UsbConsole::new(&usb_bus).unwrap();

	let boot = timer.get_counter();

	while timer.get_counter()
		.checked_duration_since(boot)
		.map_or(0, |elapsed| elapsed.to_millis()) < BOOT_DELAY_MS
	{
		console.poll();
	}

	let _ = writeln!(console, "booted");

	let mut pico_led_pin = pins.led.into_push_pull_output();

	/* ~~ GPIO/PINOUT CONFIGURATION START ~~ */

	// Each encoder uses two consecutive pins, A on the first one and B on the next.

	// Encoder 1 is connected to pins 20,21.
	let _enc_1_pin_a: DynPio0Pin = pins.gpio20.reconfigure().into_dyn_pin();
	let _enc_1_pin_b: DynPio0Pin = pins.gpio21.reconfigure().into_dyn_pin();

	// Encoder 2 is connected to pins 17,18.
	let _enc_2_pin_a: DynPio0Pin = pins.gpio17.reconfigure().into_dyn_pin();
	let _enc_2_pin_b: DynPio0Pin = pins.gpio18.reconfigure().into_dyn_pin();

	let _button_pin: DynPio1Pin = pins.gpio2.reconfigure().into_dyn_pin();

	/* ~~ GPIO/PINOUT CONFIGURATION END ~~ */

	let sys_hz = clocks.system_clock.freq().to_Hz();
	let (pio0, sm0, sm1, sm2, sm3) = pac.PIO0.split(&mut pac.RESETS);
	let (pio1, button_sm, _, _, _) = pac.PIO1.split(&mut pac.RESETS);

	let encoder_config = EncoderGroupConfig::from_slots([Some(ENC_1_GPIO), Some(ENC_2_GPIO), None, None])
		.with_max_step_rate(ENC_MAX_STEP_RATE);

	let mut encoders = match EncoderGroup::initialize(
		Pio0Quadrature::new(pio0, (sm0, sm1, sm2, sm3), sys_hz),
		&encoder_config,
		&mut console,
	) {
		Ok(encoders) => encoders,
		Err(error) => halt(&mut console, &timer, error),
	};

	let mut button = match ButtonWatcher::initialize(
		Pio1Button::new(pio1, button_sm, sys_hz),
		&ButtonConfig::new(BUTTON_GPIO),
		&mut console,
	) {
		Ok(button) => button,
		Err(error) => halt(&mut console, &timer, error),
	};

	pico_led_pin.set_high().unwrap();

	loop {
		console.poll();

		for event in encoders.poll_once() {
			let _ = writeln!(console, "{}", event);
		}

		if let Some(edge) = button.poll_button() {
			let _ = writeln!(console, "{}", edge);
		}
	}
}


/// Stops the firmware after a startup failure, repeating the error on the console.
fn halt(console: &mut UsbConsole, timer: &hal::Timer, error: InitError) -> ! {
	let mut last_report: Option<hal::timer::Instant> = None;

	loop {
		console.poll();

		let now = timer.get_counter();
		let due = last_report.map_or(true, |last| {
			now.checked_duration_since(last)
				.map_or(false, |elapsed| elapsed.to_millis() >= HALT_REPORT_MS)
		});

		if due {
			let _ = writeln!(console, "fatal: {}", error);
			last_report = Some(now);
		}
	}
}
