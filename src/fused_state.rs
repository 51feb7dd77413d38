use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::LinkConfig;
use crate::contacts::{Contact, ContactRegistry};
use crate::errors::Result;
use crate::geo::{Degrees, GeoPoint, Projector};
use crate::telemetry::{ChannelState, TelemetrySource};
use crate::telemetry_message::ContactReport;
use crate::view::{OverlayKind, ViewGeometry, ViewOverlay};
use crate::watchdog::{LinkHealth, Watchdog};


/**
 * Everything the renderer reads, copied out after each mutation. The local
 * points in a snapshot were all computed against `origin`.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub origin: Option<GeoPoint>,
    pub vehicle: ChannelState,
    pub reference: ChannelState,
    pub base: ChannelState,
    pub contacts: Vec<Contact>,
    pub link: LinkHealth,
    pub view: ViewGeometry,
    pub map_scale: Option<f64>,
}


impl Snapshot {
    pub fn channel(&self, source: TelemetrySource) -> &ChannelState {
        match source {
            TelemetrySource::Vehicle => &self.vehicle,
            TelemetrySource::ReferenceSystem => &self.reference,
            TelemetrySource::Base => &self.base,
        }
    }

    pub fn connected(&self) -> bool {
        self.link.connected()
    }
}


/**
 * The mutable fused state of one link. Only the dispatcher thread owns one;
 * every origin change recomputes all stored local points before returning.
 */
pub struct FusedState {
    projector: Projector,
    vehicle: ChannelState,
    reference: ChannelState,
    base: ChannelState,
    contacts: ContactRegistry,
    watchdog: Watchdog,
    view: ViewGeometry,
    map_scale: Option<f64>,
}


impl FusedState {
    /// Fails if the config does not validate.
    pub fn new(config: &LinkConfig) -> Result<FusedState> {
        config.validate()?;
        Ok(FusedState {
            projector: Projector::new(),
            vehicle: ChannelState::new(TelemetrySource::Vehicle, config.history_capacity),
            reference: ChannelState::new(TelemetrySource::ReferenceSystem, config.history_capacity),
            base: ChannelState::new(TelemetrySource::Base, config.history_capacity),
            contacts: ContactRegistry::new(config.contact_history_limit, config.contact_max_age()?),
            watchdog: Watchdog::new(config.watchdog_timeout()),
            view: ViewGeometry::default(),
            map_scale: None,
        })
    }

    /// Returns true if the origin changed, in which case everything was reprojected.
    pub fn set_origin(&mut self, origin: GeoPoint) -> bool {
        if !self.projector.set_origin(origin) {
            return false;
        }
        info!("Origin set to {}", origin);
        let projector = self.projector;
        for source in TelemetrySource::ALL {
            self.channel_mut(source).reproject(&projector);
        }
        self.contacts.reproject(&projector);
        self.view.reproject(&projector);
        true
    }

    /**
     * Records a fix. The first vehicle fix establishes the origin when none
     * was announced; that origin is returned so it can be broadcast.
     */
    pub fn update_position(&mut self, source: TelemetrySource, location: GeoPoint) -> Option<GeoPoint> {
        let mut new_origin = None;
        if source == TelemetrySource::Vehicle && !self.projector.has_origin() && self.set_origin(location) {
            new_origin = Some(location);
        }
        let projector = self.projector;
        self.channel_mut(source).update_position(location, &projector);
        new_origin
    }

    pub fn update_heading(&mut self, source: TelemetrySource, heading: Degrees) {
        self.channel_mut(source).update_heading(heading);
    }

    pub fn add_contact(&mut self, report: ContactReport, received: DateTime<Utc>) {
        self.contacts.add_report(report, received, &self.projector);
        self.contacts.prune(received);
    }

    pub fn record_heartbeat(&mut self, timestamp: DateTime<Utc>, received: DateTime<Utc>, arrived: Instant) {
        self.watchdog.record_heartbeat(timestamp, received, arrived);
    }

    pub fn update_view(&mut self, kind: OverlayKind, descriptor: &str) {
        match ViewOverlay::decode(kind, descriptor, &self.projector) {
            Some(overlay) => self.view.replace(overlay),
            None => debug!("{:?} overlay unavailable", kind),
        }
    }

    pub fn update_map_scale(&mut self, scale: f64) {
        self.map_scale = Some(scale);
    }

    /// Periodic evaluation. Returns the new connectivity on a transition.
    pub fn tick(&mut self, now: DateTime<Utc>, monotonic_now: Instant) -> Option<bool> {
        self.contacts.prune(now);
        self.watchdog.evaluate(monotonic_now)
    }

    pub fn origin(&self) -> Option<GeoPoint> {
        self.projector.origin()
    }

    pub fn channel(&self, source: TelemetrySource) -> &ChannelState {
        match source {
            TelemetrySource::Vehicle => &self.vehicle,
            TelemetrySource::ReferenceSystem => &self.reference,
            TelemetrySource::Base => &self.base,
        }
    }

    fn channel_mut(&mut self, source: TelemetrySource) -> &mut ChannelState {
        match source {
            TelemetrySource::Vehicle => &mut self.vehicle,
            TelemetrySource::ReferenceSystem => &mut self.reference,
            TelemetrySource::Base => &mut self.base,
        }
    }

    pub fn contacts(&self) -> &ContactRegistry {
        &self.contacts
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            origin: self.projector.origin(),
            vehicle: self.vehicle.clone(),
            reference: self.reference.clone(),
            base: self.base.clone(),
            contacts: self.contacts.current_reports().cloned().collect(),
            link: self.watchdog.health(),
            view: self.view.clone(),
            map_scale: self.map_scale,
        }
    }
}
