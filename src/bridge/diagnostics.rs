//! Diagnostic exchange state
//!
//! Completion of a diagnostic round trip is driven by re-querying the
//! request's pending property, not by a callback. The response/timeout
//! callbacks are still registered and recorded here so the log can explain
//! what the tester layer observed while the request was in flight.

use serde::{Deserialize, Serialize};

/// One diagnostic response from an ECU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagResponse {
    /// Qualifier name of the responding ECU
    pub sender: String,
    /// Positive or negative response
    pub positive: bool,
    /// Service response code (first payload byte of the decoded response)
    pub response_code: u8,
    /// Raw response byte stream
    pub payload: Vec<u8>,
}

impl DiagResponse {
    /// Payload formatted the way the application's trace window shows it
    pub fn payload_hex(&self) -> String {
        let mut out = String::with_capacity(self.payload.len() * 3);
        for (i, b) in self.payload.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{:02X}", b));
        }
        out
    }
}

/// Flags written by the diagnostic callbacks while a request is in flight
#[derive(Debug, Default)]
pub struct DiagnosticState {
    response_received: bool,
    timed_out: bool,
    completed: bool,
    confirmed: bool,
    last_payload: Option<Vec<u8>>,
}

impl DiagnosticState {
    pub fn response_received(&self) -> bool {
        self.response_received
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    /// Raw payload of the most recent response callback
    pub fn last_payload(&self) -> Option<&[u8]> {
        self.last_payload.as_deref()
    }

    /// Clear all flags before sending the next request
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn on_response(&mut self, payload: Vec<u8>) {
        self.response_received = true;
        self.last_payload = Some(payload);
    }

    pub(crate) fn on_timeout(&mut self) {
        self.timed_out = true;
    }

    pub(crate) fn on_completion(&mut self) {
        self.completed = true;
    }

    pub(crate) fn on_confirmation(&mut self) {
        self.confirmed = true;
    }
}
