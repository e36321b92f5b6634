//! Event pump and the bounded condition wait
//!
//! This is the sole synchronization mechanism of the bridge: drain whatever
//! the application has queued, apply it, sleep one quantum, re-check. The
//! collaborator contract is poll-based, so there is no native blocking
//! primitive to select on.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use super::client::AutomationClient;
use super::event::Event;
use super::state::BridgeState;

/// Drains queued events into the bridge state
///
/// Must be driven from a single logical task; the application connection it
/// mirrors does not tolerate concurrent pumping.
pub struct EventPump {
    rx: mpsc::UnboundedReceiver<Event>,
    quantum: Duration,
}

impl EventPump {
    pub fn new(rx: mpsc::UnboundedReceiver<Event>, quantum: Duration) -> Self {
        Self { rx, quantum }
    }

    /// Drain all currently queued events, applying each in delivery order,
    /// then sleep one quantum
    pub async fn pump_once<C>(&mut self, client: &mut C, state: &mut BridgeState)
    where
        C: AutomationClient,
    {
        while let Ok(event) = self.rx.try_recv() {
            state.apply(event, client).await;
        }
        tokio::time::sleep(self.quantum).await;
    }

    /// Pump until the predicate holds or the timeout elapses
    ///
    /// Returns false on timeout after logging a warning naming `label`; never
    /// fails otherwise. The elapsed comparison truncates to whole seconds, an
    /// artifact inherited from the behavior this bridge reproduces.
    pub async fn wait_until<C, F>(
        &mut self,
        client: &mut C,
        state: &mut BridgeState,
        predicate: F,
        timeout: Duration,
        label: &str,
    ) -> bool
    where
        C: AutomationClient,
        F: Fn(&BridgeState) -> bool,
    {
        let begin = tokio::time::Instant::now();
        loop {
            if predicate(state) {
                return true;
            }
            self.pump_once(client, state).await;
            if begin.elapsed().as_secs() > timeout.as_secs() {
                warn!(label, timeout_secs = timeout.as_secs(), "wait timed out");
                return false;
            }
        }
    }

    /// Pump until the predicate holds, with no bound
    ///
    /// Used only where an unbounded wait is the contract: test module
    /// completion, which may legitimately run for hours.
    pub async fn wait_until_unbounded<C, F>(
        &mut self,
        client: &mut C,
        state: &mut BridgeState,
        predicate: F,
    ) where
        C: AutomationClient,
        F: Fn(&BridgeState) -> bool,
    {
        while !predicate(state) {
            self.pump_once(client, state).await;
        }
    }
}
