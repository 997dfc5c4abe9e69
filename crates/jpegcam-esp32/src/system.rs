//! Device restart.

use std::fmt::Display;

use esp_idf_hal::delay::FreeRtos;
use log::error;

/// Give the UART time to drain the last log line before resetting.
const LOG_FLUSH_MS: u32 = 100;

/// Cold-reset the chip. All in-memory state is lost.
#[allow(unreachable_code)]
pub fn restart(reason: impl Display) -> ! {
    error!("{} - restarting...", reason);
    FreeRtos::delay_ms(LOG_FLUSH_MS);
    unsafe { esp_idf_svc::sys::esp_restart() };
    loop {
        FreeRtos::delay_ms(1000);
    }
}
