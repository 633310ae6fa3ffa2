use core::fmt::Write;

use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_nrf::wdt::WatchdogHandle;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Timer};
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text, TextStyle, TextStyleBuilder};
use heapless::String;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::{DisplayConfig, DisplayRotation, DisplaySize128x64, I2CInterface};
use ssd1306::{I2CDisplayInterface, Ssd1306};

use crate::beacon::channel::TxChannel;
use crate::beacon::shared::BeaconStatus;
use crate::platform::{HEAP, HEAP_SIZE};
use crate::sensor::SharedI2c;
use crate::system_info::SYSTEM_STATE;

const DISPLAY_UPDATE_INTERVAL_MS: u64 = 1000;
pub const DISPLAY_TIMEOUT: Duration = Duration::from_secs(30);
const LINE_HEIGHT: i32 = 10;

type Display = Ssd1306<I2CInterface<SharedI2c>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

#[derive(Clone, Copy, Debug)]
pub enum DisplayCommand {
    /// Turn on if blank and restart the inactivity timeout.
    Wake,
    TurnOff,
}

static DISPLAY_COMMANDS: Channel<CriticalSectionRawMutex, DisplayCommand, 8> = Channel::new();

pub fn send_command(cmd: DisplayCommand) {
    let _ = DISPLAY_COMMANDS.try_send(cmd);
}

/// Status screen. Only reads the shared state.
#[task]
pub async fn display_task(i2c: SharedI2c, mut watchdog: WatchdogHandle) {
    let interface = I2CDisplayInterface::new(i2c);
    let mut display: Display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();

    let available = display.init().is_ok();
    if !available {
        defmt::warn!("Display init failed");
    }

    let mut display_on = available;
    let mut last_activity = Instant::now();

    let text_style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    let text_settings = TextStyleBuilder::new().baseline(Baseline::Top).build();

    loop {
        // A missing display still has to keep its watchdog slot alive.
        if let Either::First(cmd) = select(
            DISPLAY_COMMANDS.receive(),
            Timer::after_millis(DISPLAY_UPDATE_INTERVAL_MS),
        )
        .await
        {
            if available {
                handle_command(cmd, &mut display, &mut display_on, &mut last_activity);
            }
        }

        if available && display_on {
            if Instant::now() - last_activity > DISPLAY_TIMEOUT {
                handle_command(
                    DisplayCommand::TurnOff,
                    &mut display,
                    &mut display_on,
                    &mut last_activity,
                );
            } else {
                let status = SYSTEM_STATE.status();
                render_frame(&mut display, &text_style, text_settings, &status);
            }
        }

        watchdog.pet();
    }
}

fn handle_command(
    cmd: DisplayCommand,
    display: &mut Display,
    display_on: &mut bool,
    last_activity: &mut Instant,
) {
    match cmd {
        DisplayCommand::Wake => {
            *last_activity = Instant::now();
            if !*display_on {
                let _ = display.set_display_on(true);
                *display_on = true;
            }
        }
        DisplayCommand::TurnOff => {
            if !*display_on {
                return;
            }
            let _ = display.clear(BinaryColor::Off);
            let _ = display.flush();
            let _ = display.set_display_on(false);
            *display_on = false;
        }
    }
}

fn render_frame(
    display: &mut Display,
    text_style: &MonoTextStyle<'_, BinaryColor>,
    text_settings: TextStyle,
    status: &BeaconStatus,
) {
    let _ = display.clear(BinaryColor::Off);

    let sample = SYSTEM_STATE.latest_sample();
    let mut lines: [String<32>; 6] = Default::default();

    let _ = write!(lines[0], "Heap: {}/{}KB", HEAP.used() / 1024, HEAP_SIZE / 1024);
    if SYSTEM_STATE.sensor_available() {
        let _ = write!(lines[1], "{:.2}C {:.2}%RH", sample.temperature_c, sample.humidity_pct);
        let _ = write!(lines[2], "{:.1}m {} btdev", sample.altitude_m, SYSTEM_STATE.nearby_devices());
        let _ = write!(lines[3], "{:.2}hPa", sample.pressure_hpa);
    } else {
        let _ = write!(lines[1], "Sensor: N/A");
        let _ = write!(lines[2], "{} btdev", SYSTEM_STATE.nearby_devices());
    }
    let _ = write!(
        lines[4],
        "Iter #{} ({}s)",
        status.iteration,
        status.remaining(Instant::now()).as_secs()
    );
    write_beaconing(&mut lines[5], status);

    for (index, line) in lines.iter().enumerate() {
        Text::with_text_style(
            line,
            Point::new(0, LINE_HEIGHT * index as i32),
            *text_style,
            text_settings,
        )
        .draw(display)
        .ok();
    }

    let _ = display.flush();
}

/// What the current iteration is sending, from its frozen snapshot.
fn write_beaconing(line: &mut String<32>, status: &BeaconStatus) {
    let snapshot = &status.snapshot;
    let _ = match status.channel {
        TxChannel::Temperature => write!(line, "Tx {:.2}C", snapshot.sensor.temperature_c),
        TxChannel::Humidity => write!(line, "Tx {:.2}%RH", snapshot.sensor.humidity_pct),
        TxChannel::Pressure => write!(line, "Tx {:.2}hPa", snapshot.sensor.pressure_hpa),
        TxChannel::Location => write!(line, "Tx location..."),
        TxChannel::DeviceCount => write!(line, "Tx {} btdev", snapshot.nearby_devices),
        TxChannel::Message => write!(line, "Tx message {}", snapshot.message),
    };
}
