use embassy_executor::task;
use embassy_nrf::gpio::Input;
use embassy_nrf::wdt::WatchdogHandle;
use embassy_time::{Duration, Instant, Timer};

use crate::display::{send_command, DisplayCommand, DISPLAY_TIMEOUT};
use crate::system_info::SYSTEM_STATE;

/// Sampling period. Sampling this slowly is also the debounce.
const BUTTON_POLL_INTERVAL_MS: u64 = 100;
/// Holding the button repeats the increment at this rate.
const HOLD_REPEAT: Duration = Duration::from_millis(500);

struct Press {
    since: Instant,
    last_repeat: Instant,
    /// The press that woke the display does not count as a click.
    wake_only: bool,
    repeated: bool,
}

/// Operator input: a click queues the next message value, holding the
/// button keeps incrementing it.
#[task]
pub async fn input_task(button: Input<'static>, mut watchdog: WatchdogHandle) {
    let mut press: Option<Press> = None;
    let mut last_activity: Option<Instant> = None;

    loop {
        let now = Instant::now();

        if button.is_low() {
            match press.as_mut() {
                None => {
                    let idle = last_activity.map_or(true, |at| now - at > DISPLAY_TIMEOUT);
                    press = Some(Press {
                        since: now,
                        last_repeat: now,
                        wake_only: idle,
                        repeated: false,
                    });
                    send_command(DisplayCommand::Wake);
                }
                Some(p) => {
                    if !p.wake_only && now - p.since >= HOLD_REPEAT && now - p.last_repeat >= HOLD_REPEAT {
                        p.last_repeat = now;
                        p.repeated = true;
                        bump_message();
                    }
                }
            }
            last_activity = Some(now);
        } else if let Some(p) = press.take() {
            if !p.wake_only && !p.repeated {
                bump_message();
            }
        }

        watchdog.pet();
        Timer::after_millis(BUTTON_POLL_INTERVAL_MS).await;
    }
}

fn bump_message() {
    let value = SYSTEM_STATE.bump_message();
    defmt::info!("Button: message {} queued", value);
    send_command(DisplayCommand::Wake);
}
