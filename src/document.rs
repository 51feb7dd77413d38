use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;


/**
 * The persisted part of a link: the operating state and the origin.
 * Histories, contacts and link health only live for the session.
 */
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDocument {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub helm_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<GeoPoint>,
}


impl LinkDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> crate::errors::Result<LinkDocument> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::errors::Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::LinkDocument;
    use crate::geo::GeoPoint;

    #[test]
    fn test_json_layout() {
        let document = LinkDocument {
            active: true,
            helm_mode: "survey".to_string(),
            origin: Some(GeoPoint::new(43.07, -70.71)),
        };
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["active"], true);
        assert_eq!(value["helmMode"], "survey");
        assert_eq!(value["origin"]["latitude"], 43.07);
        assert!(value["origin"].get("altitude").is_none());
    }

    #[test]
    fn test_missing_fields() {
        let document: LinkDocument = serde_json::from_str("{}").unwrap();
        assert_eq!(document, LinkDocument::default());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("vehicle-link-doc-{}.json", std::process::id()));
        let document = LinkDocument {
            active: false,
            helm_mode: "standby".to_string(),
            origin: Some(GeoPoint::with_altitude(1.5, 2.5, 3.0)),
        };
        document.save(&path).unwrap();
        let loaded = LinkDocument::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, document);
    }
}
