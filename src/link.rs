use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;

use log::{error, info};

use crate::command::{CommandPublisher, OperatingState};
use crate::config::LinkConfig;
use crate::dispatcher::{spawn_dispatcher, Ingress, ProjectHandle, SharedSnapshot};
use crate::document::LinkDocument;
use crate::errors::{LinkError, Result};
use crate::fused_state::Snapshot;
use crate::geo::GeoPoint;
use crate::telemetry_message::{InboundMessage, LinkEvent};
use crate::transport::Transport;


/**
 * One link session with a vehicle. Owns the dispatcher thread and the
 * command publisher; hand `ingress()` to the transport's subscriptions and
 * read fused state with `snapshot()`.
 */
pub struct VehicleLink {
    ingress: Ingress,
    snapshot: SharedSnapshot,
    event_rx: Mutex<Receiver<LinkEvent>>,
    publisher: CommandPublisher,
    transport: Arc<dyn Transport>,
    dispatcher: Option<JoinHandle<()>>,
}


impl VehicleLink {
    pub fn connect(
        config: &LinkConfig,
        transport: Arc<dyn Transport>,
        project: Option<Weak<dyn ProjectHandle>>,
    ) -> Result<VehicleLink> {
        let (event_tx, event_rx) = channel();
        let (ingress, snapshot, handle) = spawn_dispatcher(config, event_tx, project)?;
        info!("Vehicle link started");
        Ok(VehicleLink {
            ingress,
            snapshot,
            event_rx: Mutex::new(event_rx),
            publisher: CommandPublisher::new(Arc::clone(&transport)),
            transport,
            dispatcher: Some(handle),
        })
    }

    pub fn ingress(&self) -> Ingress {
        self.ingress.clone()
    }

    pub fn deliver(&self, message: InboundMessage) -> Result<()> {
        self.ingress.deliver(message)
    }

    /// Waits until every message delivered so far is reflected in `snapshot()`.
    pub fn flush(&self) -> Result<()> {
        if self.dispatcher.is_none() {
            return Err(LinkError::LinkClosed);
        }
        self.ingress.flush()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        let current = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*current)
    }

    /// Notifications queued since the last call.
    pub fn poll_events(&self) -> Vec<LinkEvent> {
        let event_rx = self.event_rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        event_rx.try_iter().collect()
    }

    pub fn connected(&self) -> bool {
        self.snapshot().connected()
    }

    pub fn send_waypoints(&self, waypoints: &[GeoPoint]) -> Result<()> {
        self.publisher.send_waypoints(waypoints)
    }

    pub fn send_loiter(&self, location: GeoPoint) -> Result<()> {
        self.publisher.send_loiter(location)
    }

    pub fn send_goto(&self, location: GeoPoint) -> Result<()> {
        self.publisher.send_goto(location)
    }

    pub fn set_active(&self, active: bool) -> Result<()> {
        self.publisher.set_active(active)
    }

    pub fn set_helm_mode(&self, helm_mode: &str) -> Result<()> {
        self.publisher.set_helm_mode(helm_mode)
    }

    pub fn active(&self) -> bool {
        self.publisher.active()
    }

    pub fn helm_mode(&self) -> String {
        self.publisher.helm_mode()
    }

    pub fn operating_state(&self) -> OperatingState {
        self.publisher.operating_state()
    }

    pub fn write(&self) -> LinkDocument {
        let state = self.publisher.operating_state();
        LinkDocument {
            active: state.active,
            helm_mode: state.helm_mode,
            origin: self.snapshot().origin,
        }
    }

    /**
     * Restores a saved link. The operating state is not republished; the
     * origin goes through the ingress like any announcement.
     */
    pub fn read(&self, document: &LinkDocument) -> Result<()> {
        self.publisher.restore(OperatingState {
            active: document.active,
            helm_mode: document.helm_mode.clone(),
        });
        match document.origin {
            Some(origin) => self.ingress.deliver(InboundMessage::Origin(origin)),
            None => Ok(()),
        }
    }

    /// Unsubscribes, stops the dispatcher and waits for it. Safe to call twice.
    pub fn shutdown(&mut self) {
        let handle = match self.dispatcher.take() {
            Some(handle) => handle,
            None => return,
        };
        self.transport.unsubscribe_all();
        if let Err(e) = self.ingress.quit() {
            error!("Unable to send quit message: {}", e);
        }
        match handle.join() {
            Ok(_) => info!("Vehicle link shut down"),
            Err(_) => error!("Unable to join dispatcher thread, it panicked"),
        }
    }
}


impl Drop for VehicleLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}
