use embassy_nrf::pac;

use crate::beacon::shared::SharedState;

/// Everything the tasks share: sensor readings, census count, pending
/// message and beacon status.
pub static SYSTEM_STATE: SharedState = SharedState::new();

#[derive(Clone, Copy, Debug, Eq, PartialEq, defmt::Format)]
pub enum ResetCause {
    PowerOn,
    ResetPin,
    Watchdog,
    SoftReset,
    Lockup,
    WakeFromOff,
}

/// Reads and clears RESETREAS. Must run before the SoftDevice takes over
/// the POWER peripheral.
pub fn take_reset_cause() -> ResetCause {
    let reasons = pac::POWER.resetreas().read();
    // Write-one-to-clear, otherwise causes accumulate across resets.
    pac::POWER.resetreas().write_value(reasons);

    if reasons.dog() {
        ResetCause::Watchdog
    } else if reasons.sreq() {
        ResetCause::SoftReset
    } else if reasons.lockup() {
        ResetCause::Lockup
    } else if reasons.off() {
        ResetCause::WakeFromOff
    } else if reasons.resetpin() {
        ResetCause::ResetPin
    } else {
        ResetCause::PowerOn
    }
}
