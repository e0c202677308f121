//! Timing and retry configuration

use std::time::Duration;

use crate::types::Safe2Error;

/// Lowest baud rate accepted for the modem AT interface
pub const MIN_BAUD_RATE: u32 = 1200;

/// Reject baud rates the modem AT interface cannot run at
pub fn validate_baud_rate(baud_rate: u32) -> Result<(), Safe2Error> {
    if baud_rate < MIN_BAUD_RATE {
        return Err(Safe2Error::InvalidParameter(format!(
            "Baud rate too low: {} (minimum: {})",
            baud_rate, MIN_BAUD_RATE
        )));
    }
    Ok(())
}

/// Timings used by the engine.
///
/// The defaults match what SIM modems need in practice. Tests and simulators
/// can zero the delays to run without sleeping.
#[derive(Debug, Clone)]
pub struct Safe2Config {
    /// Wait after an `AT` probe before looking for an answer
    pub probe_response_delay: Duration,
    /// Extra wait before the next `AT` probe when the modem stayed silent
    pub probe_retry_interval: Duration,
    /// Pause between reads while draining unsolicited modem output
    pub drain_char_delay: Duration,
    /// Give up probing after this long; `None` probes forever
    pub link_start_timeout: Option<Duration>,
    /// Longest wait for an `OK`/`ERROR` terminated response, or for write room
    pub response_timeout: Duration,
    /// Pause when the transport reports no room for writing
    pub write_retry_delay: Duration,
    /// Pause before each `AT+CREG?` poll
    pub registration_settle_delay: Duration,
    /// Pause after each `AT+CREG?` poll
    pub registration_poll_interval: Duration,
    /// Number of registered observations needed before the link is ready
    pub registration_streak: u8,
    /// Give up after this many polls; `None` polls forever
    pub registration_poll_limit: Option<u32>,
}

impl Default for Safe2Config {
    fn default() -> Self {
        Self {
            probe_response_delay: Duration::from_millis(100),
            probe_retry_interval: Duration::from_millis(300),
            drain_char_delay: Duration::from_millis(10),
            link_start_timeout: Some(Duration::from_secs(60)),
            response_timeout: Duration::from_secs(5),
            write_retry_delay: Duration::from_millis(1),
            registration_settle_delay: Duration::from_millis(500),
            registration_poll_interval: Duration::from_millis(1000),
            registration_streak: 7,
            registration_poll_limit: Some(120),
        }
    }
}

impl Safe2Config {
    /// Check the configuration before any I/O is attempted
    pub fn validate(&self) -> Result<(), Safe2Error> {
        if self.registration_streak == 0 {
            return Err(Safe2Error::InvalidParameter(
                "Registration streak must be at least 1".into(),
            ));
        }
        if self.registration_poll_limit == Some(0) {
            return Err(Safe2Error::InvalidParameter(
                "Registration poll limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
