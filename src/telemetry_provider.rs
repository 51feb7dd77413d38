/*!
 * Replays recorded telemetry into a link, one inbound message per line:
 *
 *   position vehicle 43.0712 -70.7112
 *   heading base 271.5
 *   origin 43.07 -70.71
 *   contact 367001234 43.08 -70.70 90 20 5 3 3 SOME VESSEL
 *   heartbeat 2024-05-01T12:00:00Z
 *   view_polygon pts=0,0 10,0 10,10;active=true
 *
 * Blank lines and lines starting with `#` are skipped.
 */
use std::io::BufRead;
use std::str::{FromStr, SplitWhitespace};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::dispatcher::Ingress;
use crate::errors::{parse_error, LinkError, Result};
use crate::geo::GeoPoint;
use crate::telemetry_message::{ContactReport, Dimensions, InboundMessage};

/// Back off while the dispatcher drains a full queue.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(1);


/// Parses one replay line. Returns `None` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<InboundMessage>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (kind, rest) = match line.split_once(char::is_whitespace) {
        Some((kind, rest)) => (kind, rest.trim()),
        None => (line, ""),
    };
    let mut fields = rest.split_whitespace();
    let message = match kind {
        "position" => InboundMessage::Position {
            source: next_field(&mut fields, "source")?,
            location: parse_geo_point(&mut fields)?,
        },
        "heading" => InboundMessage::Heading {
            source: next_field(&mut fields, "source")?,
            heading: next_field(&mut fields, "heading")?,
        },
        "origin" => InboundMessage::Origin(parse_geo_point(&mut fields)?),
        "contact" => {
            let id = next_field(&mut fields, "contact id")?;
            let location = GeoPoint::new(
                next_field(&mut fields, "latitude")?,
                next_field(&mut fields, "longitude")?,
            );
            let heading = next_field(&mut fields, "heading")?;
            let dimensions = Dimensions {
                to_bow: next_field(&mut fields, "to_bow")?,
                to_stern: next_field(&mut fields, "to_stern")?,
                to_port: next_field(&mut fields, "to_port")?,
                to_starboard: next_field(&mut fields, "to_starboard")?,
            };
            let name = fields.collect::<Vec<&str>>().join(" ");
            InboundMessage::Contact(ContactReport { id, name, location, heading, dimensions })
        }
        "heartbeat" => {
            let stamp = fields.next().ok_or_else(|| parse_error!("missing heartbeat timestamp"))?;
            let timestamp = DateTime::parse_from_rfc3339(stamp)
                .map_err(|e| parse_error!("bad heartbeat timestamp '{}': {}", stamp, e))?;
            InboundMessage::Heartbeat(timestamp.with_timezone(&Utc))
        }
        "view_point" => InboundMessage::ViewPoint(rest.to_string()),
        "view_polygon" => InboundMessage::ViewPolygon(rest.to_string()),
        "view_seglist" => InboundMessage::ViewSeglist(rest.to_string()),
        "map_scale" => InboundMessage::MapScale(next_field(&mut fields, "scale")?),
        _ => return Err(parse_error!("unknown message type '{}'", kind)),
    };
    Ok(Some(message))
}


fn next_field<T>(fields: &mut SplitWhitespace<'_>, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let field = fields.next().ok_or_else(|| parse_error!("missing {}", name))?;
    field.parse().map_err(|e| parse_error!("bad {} '{}': {}", name, field, e))
}


fn parse_geo_point(fields: &mut SplitWhitespace<'_>) -> Result<GeoPoint> {
    let latitude = next_field(fields, "latitude")?;
    let longitude = next_field(fields, "longitude")?;
    Ok(match fields.next() {
        Some(altitude) => GeoPoint::with_altitude(
            latitude,
            longitude,
            altitude.parse().map_err(|e| parse_error!("bad altitude '{}': {}", altitude, e))?,
        ),
        None => GeoPoint::new(latitude, longitude),
    })
}


#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub delivered: usize,
    pub skipped: usize,
}


/// Feeds parsed lines into the link's ingress, like a transport subscription would.
pub struct TelemetryProvider {
    ingress: Ingress,
}


impl TelemetryProvider {
    pub fn new(ingress: Ingress) -> TelemetryProvider {
        TelemetryProvider { ingress }
    }

    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<ReplayStats> {
        let mut stats = ReplayStats::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let message = match parse_line(&line) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping line {}: {}", index + 1, e);
                    stats.skipped += 1;
                    continue;
                }
            };
            self.deliver(message)?;
            stats.delivered += 1;
        }
        debug!("Replay done, {} delivered, {} skipped", stats.delivered, stats.skipped);
        Ok(stats)
    }

    fn deliver(&self, message: InboundMessage) -> Result<()> {
        loop {
            match self.ingress.deliver(message.clone()) {
                Err(LinkError::QueueFull) => thread::sleep(QUEUE_FULL_BACKOFF),
                other => return other,
            }
        }
    }
}
