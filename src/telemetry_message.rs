use chrono::{DateTime, Utc};

use crate::geo::{Degrees, GeoPoint};
use crate::telemetry::TelemetrySource;

/// Stable identity of a traffic contact (an MMSI for AIS).
pub type ContactId = u32;


/// Distances from the reporting antenna to the hull extremes, in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Dimensions {
    pub to_bow: f32,
    pub to_stern: f32,
    pub to_port: f32,
    pub to_starboard: f32,
}


#[derive(Clone, Debug, PartialEq)]
pub struct ContactReport {
    pub id: ContactId,
    pub name: String,
    pub location: GeoPoint,
    pub heading: Degrees,
    pub dimensions: Dimensions,
}


/**
 * Decoded inbound messages, as handed to the ingress by the transport.
 * Overlay descriptors stay as text; the dispatcher decodes them.
 */
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    Position { source: TelemetrySource, location: GeoPoint },
    Heading { source: TelemetrySource, heading: Degrees },
    Origin(GeoPoint),
    Contact(ContactReport),
    /// Peer timestamp of a heartbeat. The receive time is stamped on delivery.
    Heartbeat(DateTime<Utc>),
    ViewPoint(String),
    ViewPolygon(String),
    ViewSeglist(String),
    MapScale(f64),
}


impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Position { .. } => "position",
            InboundMessage::Heading { .. } => "heading",
            InboundMessage::Origin(_) => "origin",
            InboundMessage::Contact(_) => "contact",
            InboundMessage::Heartbeat(_) => "heartbeat",
            InboundMessage::ViewPoint(_) => "view_point",
            InboundMessage::ViewPolygon(_) => "view_polygon",
            InboundMessage::ViewSeglist(_) => "view_seglist",
            InboundMessage::MapScale(_) => "map_scale",
        }
    }
}


/// Notifications for the consumer. Only sent on an actual change.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkEvent {
    ConnectivityChanged(bool),
    OriginUpdated(GeoPoint),
}
