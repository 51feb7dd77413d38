/*!
 * Decodes the textual overlay descriptors published by the vehicle.
 *
 * A descriptor is a list of `key=value` pairs separated by `;`, e.g.
 * `x=10.5;y=-3;active=true` for a point, or `pts=0,0 10,0 10,10;active=true`
 * for a polygon or seglist. Coordinates are in the vehicle's local map frame.
 *
 * Overlays are advisory, so decoding never fails: a malformed descriptor
 * yields an empty map and malformed points are skipped individually.
 */
use std::collections::HashMap;

use log::debug;

use crate::geo::{GeoPoint, LocalPoint, Projector};

const PAIR_DELIMITER: char = ';';


pub fn parse_key_value(text: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for segment in text.split(PAIR_DELIMITER) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match segment.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => {
                debug!("Malformed view string '{}'", text);
                return HashMap::new();
            }
        }
    }
    values
}


/// Parses whitespace separated `x,y` pairs, skipping the ones that don't parse.
pub fn parse_point_list(text: &str) -> Vec<LocalPoint> {
    text.split_whitespace()
        .filter_map(|token| {
            let point = parse_point(token);
            if point.is_none() {
                debug!("Skipping malformed point '{}'", token);
            }
            point
        })
        .collect()
}


fn parse_point(token: &str) -> Option<LocalPoint> {
    let (x, y) = token.split_once(',')?;
    Some(LocalPoint::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayKind {
    Point,
    Polygon,
    Seglist,
}


/**
 * A decoded overlay. The geographic points are kept so the local points can
 * be recomputed when the origin moves.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct ViewOverlay {
    pub kind: OverlayKind,
    pub active: bool,
    pub points: Vec<GeoPoint>,
    pub local: Vec<LocalPoint>,
}


impl ViewOverlay {
    /// Returns None when there is no origin to place the overlay with.
    pub fn decode(kind: OverlayKind, text: &str, projector: &Projector) -> Option<ViewOverlay> {
        if !projector.has_origin() {
            debug!("No origin yet, dropping {:?} overlay", kind);
            return None;
        }
        let values = parse_key_value(text);
        let active = values.get("active").map_or(false, |v| v == "true" || v == "1");
        let local = match kind {
            OverlayKind::Point => {
                let coordinate = |key: &str| values.get(key).and_then(|v| v.parse::<f64>().ok());
                match (coordinate("x"), coordinate("y")) {
                    (Some(x), Some(y)) => vec![LocalPoint::new(x, y)],
                    _ => Vec::new(),
                }
            }
            OverlayKind::Polygon | OverlayKind::Seglist => {
                values.get("pts").map(|pts| parse_point_list(pts)).unwrap_or_default()
            }
        };
        let points = local.iter().filter_map(|p| projector.unproject(p).ok()).collect();
        Some(ViewOverlay { kind, active, points, local })
    }

    pub fn reproject(&mut self, projector: &Projector) {
        self.local = self.points.iter().filter_map(|p| projector.project(p).ok()).collect();
    }
}


/// The current overlay of each kind. Each new descriptor replaces its slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewGeometry {
    pub point: Option<ViewOverlay>,
    pub polygon: Option<ViewOverlay>,
    pub seglist: Option<ViewOverlay>,
}


impl ViewGeometry {
    pub fn replace(&mut self, overlay: ViewOverlay) {
        let slot = match overlay.kind {
            OverlayKind::Point => &mut self.point,
            OverlayKind::Polygon => &mut self.polygon,
            OverlayKind::Seglist => &mut self.seglist,
        };
        *slot = Some(overlay);
    }

    pub fn reproject(&mut self, projector: &Projector) {
        for overlay in [&mut self.point, &mut self.polygon, &mut self.seglist].into_iter().flatten() {
            overlay.reproject(projector);
        }
    }
}


#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{parse_key_value, parse_point_list, OverlayKind, ViewGeometry, ViewOverlay};
    use crate::geo::{GeoPoint, LocalPoint, Projector};

    fn assert_close(a: &LocalPoint, b: &LocalPoint) {
        assert!((a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_parse_key_value() {
        let values = parse_key_value("k1=v1;k2=v2");
        assert_eq!(values.len(), 2);
        assert_eq!(values["k1"], "v1");
        assert_eq!(values["k2"], "v2");
    }

    #[rstest]
    #[case("garbage")]
    #[case("k1=v1;garbage")]
    #[case("=v1")]
    #[case("")]
    #[case(";;")]
    fn test_parse_key_value_malformed(#[case] text: &str) {
        assert!(parse_key_value(text).is_empty());
    }

    #[rstest]
    #[case(" a = 1 ; b=2;", vec![("a", "1"), ("b", "2")])]
    #[case("pts=1,2 3,4;active=true", vec![("pts", "1,2 3,4"), ("active", "true")])]
    #[case("label=a=b", vec![("label", "a=b")])]
    fn test_parse_key_value_lenient(#[case] text: &str, #[case] expected: Vec<(&str, &str)>) {
        let values = parse_key_value(text);
        assert_eq!(values.len(), expected.len());
        for (key, value) in expected {
            assert_eq!(values[key], value);
        }
    }

    #[rstest]
    #[case("1.0,2.0 3.0,4.0", vec![(1.0, 2.0), (3.0, 4.0)])]
    #[case("1.0,2.0 oops 3.0,4.0", vec![(1.0, 2.0), (3.0, 4.0)])]
    #[case("1.0,x 5,6 7", vec![(5.0, 6.0)])]
    #[case("-1.5,2e1\t\n8,9", vec![(-1.5, 20.0), (8.0, 9.0)])]
    #[case("", vec![])]
    fn test_parse_point_list(#[case] text: &str, #[case] expected: Vec<(f64, f64)>) {
        let expected: Vec<LocalPoint> = expected.into_iter().map(|(x, y)| LocalPoint::new(x, y)).collect();
        assert_eq!(parse_point_list(text), expected);
    }

    #[test]
    fn test_decode_needs_origin() {
        let projector = Projector::new();
        assert!(ViewOverlay::decode(OverlayKind::Point, "x=1;y=2;active=true", &projector).is_none());
    }

    #[test]
    fn test_decode_point() {
        let projector = Projector::with_origin(GeoPoint::new(43.0, -70.0));
        let overlay = ViewOverlay::decode(OverlayKind::Point, "x=100;y=-50;active=true", &projector).unwrap();
        assert!(overlay.active);
        assert_eq!(overlay.local, vec![LocalPoint::new(100.0, -50.0)]);
        assert_eq!(overlay.points.len(), 1);
        assert_close(&projector.project(&overlay.points[0]).unwrap(), &LocalPoint::new(100.0, -50.0));

        let broken = ViewOverlay::decode(OverlayKind::Point, "x=abc;y=1", &projector).unwrap();
        assert!(!broken.active);
        assert!(broken.local.is_empty());
    }

    #[test]
    fn test_decode_polygon_partial() {
        let projector = Projector::with_origin(GeoPoint::new(43.0, -70.0));
        let overlay =
            ViewOverlay::decode(OverlayKind::Polygon, "pts=0,0 10,0 bad 10,10;active=false", &projector).unwrap();
        assert!(!overlay.active);
        assert_eq!(overlay.local.len(), 3);
        assert_eq!(overlay.points.len(), 3);
    }

    #[test]
    fn test_geometry_replace_and_reproject() {
        let mut projector = Projector::with_origin(GeoPoint::new(43.0, -70.0));
        let mut geometry = ViewGeometry::default();
        geometry.replace(ViewOverlay::decode(OverlayKind::Seglist, "pts=0,0 5,5;active=1", &projector).unwrap());
        geometry.replace(ViewOverlay::decode(OverlayKind::Seglist, "pts=1,1;active=1", &projector).unwrap());
        assert!(geometry.point.is_none());
        let seglist = geometry.seglist.as_ref().unwrap();
        assert_eq!(seglist.local, vec![LocalPoint::new(1.0, 1.0)]);

        let anchor = seglist.points[0];
        projector.set_origin(anchor);
        geometry.reproject(&projector);
        assert_eq!(geometry.seglist.unwrap().local, vec![LocalPoint::new(0.0, 0.0)]);
    }
}
