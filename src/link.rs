//! Modem bring-up: AT probing, echo off and network registration polling

use log::{debug, info, warn};
use std::time::Instant;

use crate::response::{is_registered, parse_creg};
use crate::safe2::{pause, transport_error, Safe2};
use crate::transport::ModemTransport;
use crate::types::{LinkState, Safe2Error};

const MODEM_AT: &[u8] = b"at\r\n";
const MODEM_AT_ECHO_OFF: &[u8] = b"ate0\r\n";
const MODEM_AT_CREG: &[u8] = b"at+creg?\r\n";

impl<T: ModemTransport> Safe2<T> {
    /// Probe with `AT` until the modem answers, then turn command echo off.
    ///
    /// Gives up after `link_start_timeout` when one is configured.
    pub fn wait_for_modem_start(&mut self) -> Result<(), Safe2Error> {
        self.link = LinkState::Probing;
        let start = Instant::now();
        let mut probes = 0u32;

        loop {
            self.at_write(MODEM_AT)?;
            probes += 1;
            pause(self.config.probe_response_delay);

            // the modem may stay silent while it boots
            if self.transport.bytes_available().map_err(transport_error)? > 0 {
                self.drain_input()?;
                break;
            }

            if let Some(timeout) = self.config.link_start_timeout {
                if start.elapsed() >= timeout {
                    warn!("Modem silent after {} probes", probes);
                    return Err(Safe2Error::Timeout("modem start"));
                }
            }
            pause(self.config.probe_retry_interval);
        }
        debug!("Modem answered after {} probes", probes);

        self.link = LinkState::EchoDisabling;
        self.at_write(MODEM_AT_ECHO_OFF)?;
        pause(self.config.probe_response_delay);
        self.drain_input()?;

        self.link = LinkState::PollingRegistration;
        info!("Modem started, echo disabled");
        Ok(())
    }

    /// Poll `AT+CREG?` until the modem has reported itself registered
    /// `registration_streak` times. Returns the number of polls taken.
    ///
    /// The streak is never reset by an unregistered answer, so a modem that
    /// flaps between registered and searching still reaches the target.
    pub fn wait_for_network_registration(&mut self) -> Result<u32, Safe2Error> {
        self.link = LinkState::PollingRegistration;
        let mut streak = 0u8;
        let mut polls = 0u32;

        while streak < self.config.registration_streak {
            if let Some(limit) = self.config.registration_poll_limit {
                if polls >= limit {
                    warn!("Not registered after {} polls (streak {})", polls, streak);
                    return Err(Safe2Error::Timeout("network registration"));
                }
            }

            pause(self.config.registration_settle_delay);
            let len = self.at_command(MODEM_AT_CREG)?;
            polls += 1;

            let stat = parse_creg(&self.buffer[..len]);
            debug!("Registration poll {}: stat {:?}", polls, stat);
            if stat.is_some_and(is_registered) {
                streak += 1;
            }

            pause(self.config.registration_poll_interval);
        }

        self.link = LinkState::Ready;
        info!("Registered on network after {} polls", polls);
        Ok(polls)
    }
}
