use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::geo::{Degrees, GeoPoint, LocalPoint, Projector};
use crate::telemetry_message::{ContactId, ContactReport, Dimensions};


/// One received report for a traffic contact.
#[derive(Clone, Debug, PartialEq)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub location: GeoPoint,
    pub local: Option<LocalPoint>,
    pub heading: Degrees,
    pub dimensions: Dimensions,
    pub received: DateTime<Utc>,
}


/**
 * Traffic contacts keyed by identity, each with its reports in arrival
 * order. The newest report of an identity is the one that is rendered.
 *
 * By default neither the per-identity history nor the set of identities is
 * bounded. `history_limit` caps the reports kept per identity and `max_age`
 * drops identities whose newest report is older than the cutoff.
 */
#[derive(Clone, Debug, Default)]
pub struct ContactRegistry {
    contacts: BTreeMap<ContactId, Vec<Contact>>,
    history_limit: Option<usize>,
    max_age: Option<Duration>,
}


impl ContactRegistry {
    pub fn new(history_limit: Option<usize>, max_age: Option<Duration>) -> ContactRegistry {
        ContactRegistry {
            contacts: BTreeMap::new(),
            history_limit: history_limit.map(|limit| limit.max(1)),
            max_age,
        }
    }

    pub fn add_report(&mut self, report: ContactReport, received: DateTime<Utc>, projector: &Projector) {
        let contact = Contact {
            id: report.id,
            local: projector.project(&report.location).ok(),
            name: report.name,
            location: report.location,
            heading: report.heading,
            dimensions: report.dimensions,
            received,
        };
        let reports = self.contacts.entry(contact.id).or_default();
        reports.push(contact);
        if let Some(limit) = self.history_limit {
            if reports.len() > limit {
                let excess = reports.len() - limit;
                reports.drain(..excess);
            }
        }
    }

    /// Newest report per identity, in identity order. Each call starts a new pass.
    pub fn current_reports(&self) -> impl Iterator<Item = &Contact> + '_ {
        self.contacts.values().filter_map(|reports| reports.last())
    }

    pub fn current(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.get(&id).and_then(|reports| reports.last())
    }

    pub fn history(&self, id: ContactId) -> &[Contact] {
        self.contacts.get(&id).map(|reports| reports.as_slice()).unwrap_or(&[])
    }

    pub fn reproject(&mut self, projector: &Projector) {
        for contact in self.contacts.values_mut().flatten() {
            contact.local = projector.project(&contact.location).ok();
        }
    }

    /// Drops identities whose newest report is older than `max_age`. Returns how many went.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let max_age = match self.max_age {
            Some(max_age) => max_age,
            None => return 0,
        };
        let before = self.contacts.len();
        self.contacts.retain(|id, reports| {
            let keep = reports.last().map_or(false, |newest| now - newest.received <= max_age);
            if !keep {
                debug!("Dropping stale contact {}", id);
            }
            keep
        });
        before - self.contacts.len()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::ContactRegistry;
    use crate::geo::{GeoPoint, LocalPoint, Projector};
    use crate::telemetry_message::{ContactReport, Dimensions};

    fn report(id: u32, location: GeoPoint) -> ContactReport {
        ContactReport {
            id,
            name: format!("vessel {}", id),
            location,
            heading: 90.0,
            dimensions: Dimensions { to_bow: 20.0, to_stern: 5.0, to_port: 3.0, to_starboard: 3.0 },
        }
    }

    #[test]
    fn test_newest_report_is_current() {
        let projector = Projector::with_origin(GeoPoint::new(43.0, -70.0));
        let received = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let g1 = GeoPoint::new(43.01, -70.0);
        let g2 = GeoPoint::new(43.02, -70.0);
        let mut registry = ContactRegistry::default();
        registry.add_report(report(7, g1), received, &projector);
        registry.add_report(report(7, g2), received, &projector);

        let current: Vec<_> = registry.current_reports().collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, 7);
        assert_eq!(current[0].location, g2);
        assert_eq!(current[0].local, projector.project(&g2).ok());
        assert_eq!(registry.history(7).len(), 2);
        assert!(registry.history(8).is_empty());
    }

    #[test]
    fn test_current_reports_restartable() {
        let projector = Projector::new();
        let received = Utc::now();
        let mut registry = ContactRegistry::default();
        for id in [5, 1, 3] {
            registry.add_report(report(id, GeoPoint::new(1.0, 1.0)), received, &projector);
        }
        let first: Vec<u32> = registry.current_reports().map(|c| c.id).collect();
        let second: Vec<u32> = registry.current_reports().map(|c| c.id).collect();
        assert_eq!(first, vec![1, 3, 5]);
        assert_eq!(first, second);
        assert!(registry.current_reports().all(|c| c.local.is_none()));
    }

    #[test]
    fn test_reproject() {
        let mut projector = Projector::new();
        let mut registry = ContactRegistry::default();
        let location = GeoPoint::new(10.0, 20.0);
        registry.add_report(report(1, location), Utc::now(), &projector);
        projector.set_origin(location);
        registry.reproject(&projector);
        assert_eq!(registry.current(1).unwrap().local, Some(LocalPoint::new(0.0, 0.0)));
    }

    #[test]
    fn test_history_limit() {
        let projector = Projector::new();
        let mut registry = ContactRegistry::new(Some(3), None);
        for step in 0..10 {
            registry.add_report(report(2, GeoPoint::new(step as f64, 0.0)), Utc::now(), &projector);
        }
        let kept: Vec<f64> = registry.history(2).iter().map(|c| c.location.latitude).collect();
        assert_eq!(kept, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_prune_by_age() {
        let projector = Projector::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut registry = ContactRegistry::new(None, Some(Duration::seconds(60)));
        registry.add_report(report(1, GeoPoint::new(0.0, 0.0)), start, &projector);
        registry.add_report(report(2, GeoPoint::new(0.0, 0.0)), start + Duration::seconds(30), &projector);

        assert_eq!(registry.prune(start + Duration::seconds(60)), 0);
        assert_eq!(registry.prune(start + Duration::seconds(61)), 1);
        assert!(registry.current(1).is_none());
        assert!(registry.current(2).is_some());
        assert_eq!(registry.prune(start + Duration::seconds(91)), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_no_expiry_by_default() {
        let projector = Projector::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut registry = ContactRegistry::default();
        registry.add_report(report(1, GeoPoint::new(0.0, 0.0)), start, &projector);
        assert_eq!(registry.prune(start + Duration::days(365)), 0);
        assert_eq!(registry.len(), 1);
    }
}
