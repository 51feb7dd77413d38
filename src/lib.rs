pub mod command;
pub mod config;
pub mod contacts;
pub mod dispatcher;
pub mod document;
pub mod errors;
pub mod fused_state;
pub mod geo;
pub mod link;
pub mod telemetry;
pub mod telemetry_message;
pub mod telemetry_provider;
pub mod transport;
pub mod view;
pub mod watchdog;

pub use config::LinkConfig;
pub use errors::{LinkError, Result};
pub use fused_state::Snapshot;
pub use geo::{GeoPoint, LocalPoint, Projector};
pub use link::VehicleLink;
pub use telemetry::TelemetrySource;
pub use telemetry_message::{InboundMessage, LinkEvent};
