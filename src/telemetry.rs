use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{parse_error, LinkError};
use crate::geo::{Degrees, GeoPoint, LocalPoint, Projector};


/// The independent position feeds fused by the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TelemetrySource {
    /// The own vehicle GPS. Its first fix bootstraps the origin.
    Vehicle,
    /// The independent inertial/position reference (e.g. a POS MV).
    ReferenceSystem,
    /// The base operator station (ship, shore station, etc).
    Base,
}


impl TelemetrySource {
    pub const ALL: [TelemetrySource; 3] = [
        TelemetrySource::Vehicle,
        TelemetrySource::ReferenceSystem,
        TelemetrySource::Base,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TelemetrySource::Vehicle => "vehicle",
            TelemetrySource::ReferenceSystem => "reference",
            TelemetrySource::Base => "base",
        }
    }
}


impl fmt::Display for TelemetrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}


impl FromStr for TelemetrySource {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<TelemetrySource, LinkError> {
        match s {
            "vehicle" => Ok(TelemetrySource::Vehicle),
            "reference" | "posmv" => Ok(TelemetrySource::ReferenceSystem),
            "base" => Ok(TelemetrySource::Base),
            _ => Err(parse_error!("unknown telemetry source '{}'", s)),
        }
    }
}


/// One position report. `local` is `None` while no origin exists.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fix {
    pub location: GeoPoint,
    pub local: Option<LocalPoint>,
}


impl Fix {
    fn new(location: GeoPoint, projector: &Projector) -> Fix {
        Fix {
            location,
            local: projector.project(&location).ok(),
        }
    }

    fn reproject(&mut self, projector: &Projector) {
        self.local = projector.project(&self.location).ok();
    }
}


/// Fixes per shared chunk of history.
const HISTORY_CHUNK: usize = 64;


/**
 * Bounded oldest-first fix history stored as shared chunks. Cloning only
 * bumps reference counts, and a push after a clone copies at most the
 * chunk it touches, so publishing snapshots stays cheap at any capacity.
 */
#[derive(Clone, Debug)]
pub struct FixHistory {
    chunks: VecDeque<Arc<Vec<Fix>>>,
    len: usize,
    capacity: usize,
}


impl FixHistory {
    fn new(capacity: usize) -> FixHistory {
        FixHistory { chunks: VecDeque::new(), len: 0, capacity }
    }

    fn push(&mut self, fix: Fix) {
        if self.capacity == 0 {
            return;
        }
        while self.len >= self.capacity {
            self.pop_front();
        }
        match self.chunks.back_mut() {
            Some(chunk) if chunk.len() < HISTORY_CHUNK => Arc::make_mut(chunk).push(fix),
            _ => {
                let mut chunk = Vec::with_capacity(HISTORY_CHUNK.min(self.capacity));
                chunk.push(fix);
                self.chunks.push_back(Arc::new(chunk));
            }
        }
        self.len += 1;
    }

    fn pop_front(&mut self) {
        let emptied = match self.chunks.front_mut() {
            Some(chunk) => {
                Arc::make_mut(chunk).remove(0);
                chunk.is_empty()
            }
            None => return,
        };
        if emptied {
            self.chunks.pop_front();
        }
        self.len -= 1;
    }

    fn reproject(&mut self, projector: &Projector) {
        for chunk in self.chunks.iter_mut() {
            for fix in Arc::make_mut(chunk).iter_mut() {
                fix.reproject(projector);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fix> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}


impl PartialEq for FixHistory {
    fn eq(&self, other: &FixHistory) -> bool {
        self.capacity == other.capacity && self.len == other.len && self.iter().eq(other.iter())
    }
}


/**
 * Position and heading of one telemetry source, with a bounded history of
 * fixes. The oldest fix is evicted once the history is at capacity.
 *
 * Heading and position are independent: a fresh position may be paired with
 * a stale heading. There is no plausibility check on incoming fixes (no
 * speed based outlier rejection).
 */
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelState {
    source: TelemetrySource,
    current: Option<Fix>,
    heading: Option<Degrees>,
    history: FixHistory,
}


impl ChannelState {
    pub fn new(source: TelemetrySource, capacity: usize) -> ChannelState {
        ChannelState {
            source,
            current: None,
            heading: None,
            history: FixHistory::new(capacity),
        }
    }

    pub fn update_position(&mut self, location: GeoPoint, projector: &Projector) {
        let fix = Fix::new(location, projector);
        self.history.push(fix);
        self.current = Some(fix);
    }

    pub fn update_heading(&mut self, heading: Degrees) {
        self.heading = Some(wrap_degrees(heading));
    }

    /// Recomputes every stored local point against the projector's origin.
    pub fn reproject(&mut self, projector: &Projector) {
        if let Some(current) = self.current.as_mut() {
            current.reproject(projector);
        }
        self.history.reproject(projector);
    }

    pub fn source(&self) -> TelemetrySource {
        self.source
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.current.map(|fix| fix.location)
    }

    pub fn local(&self) -> Option<LocalPoint> {
        self.current.and_then(|fix| fix.local)
    }

    pub fn heading(&self) -> Option<Degrees> {
        self.heading
    }

    pub fn history(&self) -> impl Iterator<Item = &Fix> + '_ {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity
    }
}


/// Wraps degrees into [0, 360).
pub fn wrap_degrees(degrees: Degrees) -> Degrees {
    if (0.0..360.0).contains(&degrees) {
        return degrees;
    }
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
