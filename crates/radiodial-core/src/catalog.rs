//! Station catalog.
//!
//! The catalog is built once from already-parsed [`StationRecord`]s and never
//! mutated afterwards. Catalog order is significant: it breaks ties in source
//! selection.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Opaque reference to a station's audio (a file path or URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(pub String);

impl SourceRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One record as produced by the external catalog parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub audio_ref: String,
    pub position: f32,
    pub strength: f32,
    pub sigma: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub title: String,
    pub description: String,
    pub position: f32,
    /// Peak volume when tuned exactly, in [0, 1].
    pub strength: f32,
    /// Tuning width; always > 0.
    pub sigma: f32,
    pub source: SourceRef,
}

impl TryFrom<StationRecord> for Station {
    type Error = Error;

    fn try_from(record: StationRecord) -> Result<Self> {
        let reject = |reason: String| Error::InvalidStation {
            id: record.id.clone(),
            reason,
        };

        if record.id.is_empty() {
            return Err(reject("empty id".into()));
        }
        if !record.position.is_finite() {
            return Err(reject(format!("position {} is not finite", record.position)));
        }
        if !(0.0..=1.0).contains(&record.strength) {
            return Err(reject(format!("strength {} out of range (0-1)", record.strength)));
        }
        if !(record.sigma.is_finite() && record.sigma > 0.0) {
            return Err(reject(format!("sigma {} must be positive", record.sigma)));
        }

        Ok(Self {
            id: record.id,
            title: record.title,
            description: record.description,
            position: record.position,
            strength: record.strength,
            sigma: record.sigma,
            source: SourceRef(record.audio_ref),
        })
    }
}

/// Immutable, ordered list of stations.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    stations: Vec<Station>,
}

impl Catalog {
    pub fn new(records: impl IntoIterator<Item = StationRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut stations = Vec::new();

        for record in records {
            let station = Station::try_from(record)?;
            if !seen.insert(station.id.clone()) {
                return Err(Error::DuplicateStation(station.id));
            }
            stations.push(station);
        }

        Ok(Self { stations })
    }

    /// Parse a JSON array of station records.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let records: Vec<StationRecord> = serde_json::from_str(text)?;
        Self::new(records)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Station> {
        self.stations.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.stations.iter().position(|s| s.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Station> {
        self.stations.iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Station;
    type IntoIter = std::slice::Iter<'a, Station>;

    fn into_iter(self) -> Self::IntoIter {
        self.stations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, position: f32) -> StationRecord {
        StationRecord {
            id: id.into(),
            title: format!("{id} FM"),
            description: String::new(),
            audio_ref: format!("audio/{id}.wav"),
            position,
            strength: 0.8,
            sigma: 2.0,
        }
    }

    #[test]
    fn test_catalog_keeps_order() {
        let catalog = Catalog::new([record("b", 70.0), record("a", 20.0)]).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.stations()[0].id, "b");
        assert_eq!(catalog.index_of("a"), Some(1));
        assert_eq!(catalog.index_of("zz"), None);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Catalog::new([record("a", 10.0), record("a", 30.0)]).unwrap_err();
        assert!(matches!(err, Error::DuplicateStation(id) if id == "a"));
    }

    #[test]
    fn test_invalid_sigma_rejected() {
        let mut bad = record("a", 10.0);
        bad.sigma = 0.0;
        assert!(matches!(
            Catalog::new([bad]),
            Err(Error::InvalidStation { .. })
        ));
    }

    #[test]
    fn test_invalid_strength_rejected() {
        let mut bad = record("a", 10.0);
        bad.strength = 1.2;
        assert!(Catalog::new([bad]).is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"id": "jazz", "title": "Jazz 88", "audioRef": "jazz.wav",
             "position": 12.5, "strength": 0.9, "sigma": 1.5},
            {"id": "news", "audioRef": "news.wav",
             "position": 40.0, "strength": 0.6, "sigma": 3.0}
        ]"#;
        let catalog = Catalog::from_json_str(json).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.stations()[0].title, "Jazz 88");
        assert_eq!(catalog.stations()[1].title, "");
        assert_eq!(catalog.stations()[1].source.as_str(), "news.wav");
    }

    #[test]
    fn test_from_json_missing_field() {
        let json = r#"[{"id": "jazz", "position": 12.5, "strength": 0.9, "sigma": 1.5}]"#;
        assert!(matches!(Catalog::from_json_str(json), Err(Error::Json(_))));
    }
}
