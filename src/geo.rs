/*!
 * Conversion between geographic coordinates and the local tangent plane.
 *
 * The local frame is an equirectangular approximation around the origin:
 * x points east, y points north, both in meters. Longitude distances are
 * scaled by the cosine of the origin latitude. This is good for tens of
 * kilometers around the origin; it is not globally accurate and degrades
 * quickly close to the poles.
 */
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{LinkError, Result};

pub type Degrees = f64;
pub type Meter = f64;

/// Mean earth radius.
const EARTH_RADIUS_M: Meter = 6_371_000.0;

/// Smallest cosine we divide by when going back to longitude.
const MIN_LATITUDE_SCALE: f64 = 1e-9;


#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: Degrees,
    pub longitude: Degrees,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<Meter>,
}


impl GeoPoint {
    pub fn new(latitude: Degrees, longitude: Degrees) -> GeoPoint {
        GeoPoint { latitude, longitude, altitude: None }
    }

    pub fn with_altitude(latitude: Degrees, longitude: Degrees, altitude: Meter) -> GeoPoint {
        GeoPoint { latitude, longitude, altitude: Some(altitude) }
    }
}


impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.7},{:.7}", self.latitude, self.longitude)?;
        if let Some(altitude) = self.altitude {
            write!(f, ",{:.1}m", altitude)?;
        }
        Ok(())
    }
}


/// A position in the local frame, meters east (x) and north (y) of the origin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LocalPoint {
    pub x: Meter,
    pub y: Meter,
}


impl LocalPoint {
    pub fn new(x: Meter, y: Meter) -> LocalPoint {
        LocalPoint { x, y }
    }
}


/**
 * Holds the origin of the local frame. Until an origin is set every
 * projection fails with `LinkError::NoOrigin`.
 */
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Projector {
    origin: Option<GeoPoint>,
}


impl Projector {
    pub fn new() -> Projector {
        Projector { origin: None }
    }

    pub fn with_origin(origin: GeoPoint) -> Projector {
        Projector { origin: Some(origin) }
    }

    pub fn origin(&self) -> Option<GeoPoint> {
        self.origin
    }

    pub fn has_origin(&self) -> bool {
        self.origin.is_some()
    }

    /**
     * Establishes or replaces the origin. Returns false if the origin was
     * already exactly this point, in which case nothing needs recomputing.
     */
    pub fn set_origin(&mut self, origin: GeoPoint) -> bool {
        if self.origin == Some(origin) {
            return false;
        }
        self.origin = Some(origin);
        true
    }

    pub fn project(&self, point: &GeoPoint) -> Result<LocalPoint> {
        let origin = self.origin.ok_or(LinkError::NoOrigin)?;
        let delta_longitude = wrap_longitude(point.longitude - origin.longitude);
        let delta_latitude = point.latitude - origin.latitude;
        Ok(LocalPoint {
            x: EARTH_RADIUS_M * delta_longitude.to_radians() * latitude_scale(&origin),
            y: EARTH_RADIUS_M * delta_latitude.to_radians(),
        })
    }

    /// Inverse of `project`. The altitude is not known in the local frame.
    pub fn unproject(&self, point: &LocalPoint) -> Result<GeoPoint> {
        let origin = self.origin.ok_or(LinkError::NoOrigin)?;
        let scale = latitude_scale(&origin).max(MIN_LATITUDE_SCALE);
        let latitude = origin.latitude + (point.y / EARTH_RADIUS_M).to_degrees();
        let longitude = origin.longitude + (point.x / (EARTH_RADIUS_M * scale)).to_degrees();
        Ok(GeoPoint::new(latitude, wrap_longitude(longitude)))
    }
}


fn latitude_scale(origin: &GeoPoint) -> f64 {
    origin.latitude.to_radians().cos()
}


/// Wraps a longitude (or longitude difference) into [-180, 180).
fn wrap_longitude(degrees: Degrees) -> Degrees {
    if (-180.0..180.0).contains(&degrees) {
        return degrees;
    }
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}
