use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info};

use crate::errors::Result;
use crate::geo::GeoPoint;
use crate::transport::{OutboundMessage, Transport};


#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperatingState {
    /// Whether the vehicle is authorized to act on commands.
    pub active: bool,
    /// Name of the current helm behavior.
    pub helm_mode: String,
}


/**
 * Publishes commands to the vehicle. Sends are fire-and-forget: nothing
 * here waits for an acknowledgement or retries.
 */
pub struct CommandPublisher {
    transport: Arc<dyn Transport>,
    state: Mutex<OperatingState>,
}


impl CommandPublisher {
    pub fn new(transport: Arc<dyn Transport>) -> CommandPublisher {
        CommandPublisher {
            transport,
            state: Mutex::new(OperatingState::default()),
        }
    }

    pub fn send_waypoints(&self, waypoints: &[GeoPoint]) -> Result<()> {
        info!("Sending {} waypoints", waypoints.len());
        self.publish(OutboundMessage::Waypoints(waypoints.to_vec()))
    }

    pub fn send_loiter(&self, location: GeoPoint) -> Result<()> {
        info!("Sending loiter at {}", location);
        self.publish(OutboundMessage::Loiter(location))
    }

    pub fn send_goto(&self, location: GeoPoint) -> Result<()> {
        info!("Sending goto {}", location);
        self.publish(OutboundMessage::Goto(location))
    }

    /// Updates the local state, then publishes it. Publishes on every call.
    pub fn set_active(&self, active: bool) -> Result<()> {
        self.lock_state().active = active;
        self.publish(OutboundMessage::Active(active))
    }

    pub fn set_helm_mode(&self, helm_mode: &str) -> Result<()> {
        self.lock_state().helm_mode = helm_mode.to_string();
        self.publish(OutboundMessage::HelmMode(helm_mode.to_string()))
    }

    /// Replaces the local state without publishing, e.g. when loading a saved link.
    pub fn restore(&self, state: OperatingState) {
        *self.lock_state() = state;
    }

    pub fn operating_state(&self) -> OperatingState {
        self.lock_state().clone()
    }

    pub fn active(&self) -> bool {
        self.lock_state().active
    }

    pub fn helm_mode(&self) -> String {
        self.lock_state().helm_mode.clone()
    }

    fn publish(&self, message: OutboundMessage) -> Result<()> {
        self.transport.publish(message).map_err(|e| {
            error!("Unable to publish command: {}", e);
            e
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, OperatingState> {
        // Plain data, still usable after a poisoning panic
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
