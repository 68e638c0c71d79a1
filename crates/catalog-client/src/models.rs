//! Wire models for the catalog REST API.

use serde::{Deserialize, Deserializer, Serialize};

/// Time format used in granule index listings.
pub const LAYER_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// A resolved coverage store reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRef {
    pub workspace: String,
    pub name: String,
}

/// A coverage inside a mosaic store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRef {
    pub name: String,
    #[serde(default)]
    pub href: Option<String>,
}

/// Coverage listing of a mosaic store.
///
/// The catalog collapses a single-element coverage list into a bare object
/// and renders an empty list as `""`; deserialization flattens all three
/// shapes into a plain vector.
#[derive(Debug, Clone, Default)]
pub struct CoverageList {
    pub coverages: Vec<CoverageRef>,
}

impl<'de> Deserialize<'de> for CoverageList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            coverages: Option<CoveragesField>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum CoveragesField {
            Text(String),
            Wrapped {
                #[serde(default)]
                coverage: Option<OneOrMany>,
            },
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            Many(Vec<CoverageRef>),
            One(CoverageRef),
        }

        let raw = Raw::deserialize(deserializer)?;
        let coverages = match raw.coverages {
            Some(CoveragesField::Wrapped {
                coverage: Some(OneOrMany::Many(list)),
            }) => list,
            Some(CoveragesField::Wrapped {
                coverage: Some(OneOrMany::One(single)),
            }) => vec![single],
            _ => Vec::new(),
        };
        Ok(CoverageList { coverages })
    }
}

/// Properties of a registered granule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GranuleProperties {
    pub location: String,
    #[serde(default)]
    pub time: Option<String>,
}

/// A single granule in a coverage index listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Granule {
    pub id: String,
    pub properties: GranuleProperties,
}

/// Granule index listing of a coverage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GranuleCollection {
    #[serde(default)]
    pub features: Vec<Granule>,
}

/// Registration record for an image living in remote object storage.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteGranule {
    pub host: String,
    pub workspace: String,
    pub layer_name: String,
    pub image_url: String,
}

/// Time dimension settings written into coverage metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeDimension {
    pub name: String,
    pub enabled: bool,
    pub presentation: String,
    #[serde(default)]
    pub resolution: Option<String>,
    pub units: String,
    #[serde(default)]
    pub nearest_match_enabled: Option<bool>,
}

/// Metadata saved onto a coverage after store creation.
#[derive(Debug, Clone, Default)]
pub struct CoverageMetadata {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub time: Option<TimeDimension>,
    pub cache_age_max: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granule_collection_deserialization() {
        let json = r#"{
            "features": [
                {
                    "id": "airmass_store.1",
                    "properties": {
                        "location": "/mnt/data/20200818_1200_europe_airmass.tif",
                        "time": "2020-08-18T12:00:00.000+0000"
                    }
                }
            ]
        }"#;
        let collection: GranuleCollection = serde_json::from_str(json).unwrap();
        assert_eq!(collection.features.len(), 1);
        assert_eq!(collection.features[0].id, "airmass_store.1");
        assert_eq!(
            collection.features[0].properties.location,
            "/mnt/data/20200818_1200_europe_airmass.tif"
        );
    }

    #[test]
    fn test_granule_collection_empty() {
        let collection: GranuleCollection = serde_json::from_str("{}").unwrap();
        assert!(collection.features.is_empty());
    }

    #[test]
    fn test_coverage_list_many() {
        let json = r#"{"coverages": {"coverage": [{"name": "a"}, {"name": "b"}]}}"#;
        let list: CoverageList = serde_json::from_str(json).unwrap();
        assert_eq!(list.coverages.len(), 2);
        assert_eq!(list.coverages[1].name, "b");
    }

    #[test]
    fn test_coverage_list_single_collapsed() {
        let json = r#"{"coverages": {"coverage": {"name": "only"}}}"#;
        let list: CoverageList = serde_json::from_str(json).unwrap();
        assert_eq!(list.coverages.len(), 1);
        assert_eq!(list.coverages[0].name, "only");
    }

    #[test]
    fn test_coverage_list_empty_string() {
        let json = r#"{"coverages": ""}"#;
        let list: CoverageList = serde_json::from_str(json).unwrap();
        assert!(list.coverages.is_empty());
    }

    #[test]
    fn test_layer_time_format_parses_catalog_times() {
        use chrono::DateTime;

        for time in ["2020-08-18T12:00:00.000+0000", "2020-08-18T12:00:00.000+00:00"] {
            assert!(
                DateTime::parse_from_str(time, LAYER_TIME_FORMAT).is_ok(),
                "failed to parse {}",
                time
            );
        }
    }
}
