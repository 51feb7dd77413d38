/*!
 * Funnels inbound messages from the transport's delivery threads into a
 * single dispatcher thread, which owns the fused state. After every mutation
 * the dispatcher publishes a fresh immutable snapshot for readers, so no
 * reader ever sees a half applied update or an origin change in progress.
 */
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::{Arc, RwLock, Weak};
use std::thread::{Builder, JoinHandle};
use std::time::{self, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::config::LinkConfig;
use crate::errors::{LinkError, Result};
use crate::fused_state::{FusedState, Snapshot};
use crate::geo::GeoPoint;
use crate::telemetry_message::{InboundMessage, LinkEvent};
use crate::view::OverlayKind;

pub type SharedSnapshot = Arc<RwLock<Arc<Snapshot>>>;


/// Non-owning view of the project that owns the link.
pub trait ProjectHandle: Send + Sync {
    /// Called on the dispatcher thread after every origin change.
    fn origin_updated(&self, origin: GeoPoint);
}


pub(crate) enum Envelope {
    Message { message: InboundMessage, received: DateTime<Utc>, arrived: Instant },
    Flush(Sender<()>),
    Quit,
}


/**
 * Entry point for transport callbacks. Cheap to clone, one per subscription
 * if needed. Delivery never blocks.
 */
#[derive(Clone)]
pub struct Ingress {
    inbound_tx: SyncSender<Envelope>,
}


impl Ingress {
    /// Queues a message, stamped with the local receive time on both clocks.
    pub fn deliver(&self, message: InboundMessage) -> Result<()> {
        let kind = message.kind();
        let envelope = Envelope::Message { message, received: Utc::now(), arrived: Instant::now() };
        match self.inbound_tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("Ingress queue full, dropping {} message", kind);
                Err(LinkError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(LinkError::LinkClosed),
        }
    }

    /// Blocks until everything queued before this call has been applied.
    pub(crate) fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = std::sync::mpsc::channel();
        self.inbound_tx.send(Envelope::Flush(ack_tx)).map_err(|_| LinkError::LinkClosed)?;
        ack_rx.recv().map_err(|_| LinkError::LinkClosed)
    }

    pub(crate) fn quit(&self) -> Result<()> {
        self.inbound_tx.send(Envelope::Quit).map_err(|_| LinkError::LinkClosed)
    }
}


pub struct Dispatcher {
    state: FusedState,
    snapshot: SharedSnapshot,
    event_tx: Sender<LinkEvent>,
    project: Option<Weak<dyn ProjectHandle>>,
    period: time::Duration,
}


impl Dispatcher {
    pub fn new(
        config: &LinkConfig,
        event_tx: Sender<LinkEvent>,
        project: Option<Weak<dyn ProjectHandle>>,
    ) -> Result<Dispatcher> {
        let state = FusedState::new(config)?;
        let snapshot = Arc::new(RwLock::new(Arc::new(state.snapshot())));
        Ok(Dispatcher {
            state,
            snapshot,
            event_tx,
            project,
            period: config.watchdog_period(),
        })
    }

    pub fn shared_snapshot(&self) -> SharedSnapshot {
        Arc::clone(&self.snapshot)
    }

    /**
     * Applies queued messages in order and runs the watchdog every period,
     * whether or not anything arrives. Should be run in its own thread.
     */
    pub(crate) fn run(&mut self, inbound_rx: Receiver<Envelope>) {
        let mut next_tick = Instant::now() + self.period;
        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            match inbound_rx.recv_timeout(timeout) {
                Ok(Envelope::Message { message, received, arrived }) => self.apply(message, received, arrived),
                Ok(Envelope::Flush(ack_tx)) => {
                    // The caller may have given up waiting
                    let _ = ack_tx.send(());
                }
                Ok(Envelope::Quit) => {
                    info!("Dispatcher shutting down");
                    return;
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => {
                    info!("All ingress handles dropped, dispatcher shutting down");
                    return;
                }
            }

            let now = Instant::now();
            if now >= next_tick {
                self.tick(Utc::now(), now);
                next_tick += self.period;
                if next_tick < now {
                    next_tick = now + self.period;
                }
            }
        }
    }

    fn apply(&mut self, message: InboundMessage, received: DateTime<Utc>, arrived: Instant) {
        let mut new_origin = None;
        match message {
            InboundMessage::Position { source, location } => {
                new_origin = self.state.update_position(source, location);
            }
            InboundMessage::Heading { source, heading } => self.state.update_heading(source, heading),
            InboundMessage::Origin(origin) => {
                if self.state.set_origin(origin) {
                    new_origin = Some(origin);
                }
            }
            InboundMessage::Contact(report) => self.state.add_contact(report, received),
            InboundMessage::Heartbeat(timestamp) => self.state.record_heartbeat(timestamp, received, arrived),
            InboundMessage::ViewPoint(descriptor) => self.state.update_view(OverlayKind::Point, &descriptor),
            InboundMessage::ViewPolygon(descriptor) => self.state.update_view(OverlayKind::Polygon, &descriptor),
            InboundMessage::ViewSeglist(descriptor) => self.state.update_view(OverlayKind::Seglist, &descriptor),
            InboundMessage::MapScale(scale) => self.state.update_map_scale(scale),
        }
        self.publish();

        if let Some(origin) = new_origin {
            self.notify(LinkEvent::OriginUpdated(origin));
            if let Some(project) = self.project.as_ref().and_then(Weak::upgrade) {
                project.origin_updated(origin);
            }
        }
    }

    fn tick(&mut self, now: DateTime<Utc>, monotonic_now: Instant) {
        let change = self.state.tick(now, monotonic_now);
        self.publish();
        if let Some(connected) = change {
            self.notify(LinkEvent::ConnectivityChanged(connected));
        }
    }

    fn publish(&self) {
        let snapshot = Arc::new(self.state.snapshot());
        let mut current = self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = snapshot;
    }

    fn notify(&self, event: LinkEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("Nobody is listening for link events");
        }
    }
}


/// Starts the dispatcher thread and returns the handles to feed and read it.
pub(crate) fn spawn_dispatcher(
    config: &LinkConfig,
    event_tx: Sender<LinkEvent>,
    project: Option<Weak<dyn ProjectHandle>>,
) -> Result<(Ingress, SharedSnapshot, JoinHandle<()>)> {
    let (inbound_tx, inbound_rx) = sync_channel(config.queue_capacity.max(1));
    let mut dispatcher = Dispatcher::new(config, event_tx, project)?;
    let snapshot = dispatcher.shared_snapshot();
    let handle = Builder::new()
        .name("vehicle-link-dispatch".to_string())
        .spawn(move || dispatcher.run(inbound_rx))?;
    Ok((Ingress { inbound_tx }, snapshot, handle))
}
