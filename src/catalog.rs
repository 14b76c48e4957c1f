//! Stellar catalog lookup
//!
//! Stellar plan targets only carry a catalog name id; the object itself
//! (coordinates, type, magnitude) comes from the stellar identification
//! service behind [`StellarCatalog`].

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of a stellar catalog lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StellarObject {
    pub name_id: i64,
    pub name: String,
    pub object_type: String,
    /// J2000 right ascension, degrees
    pub ra_deg: f64,
    /// J2000 declination, degrees
    pub dec_deg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectral_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_names: Option<Vec<String>>,
}

pub trait StellarCatalog {
    /// Resolve a catalog name id. An unknown id is an
    /// [`ArchiveError::NotFound`](crate::error::ArchiveError::NotFound).
    fn query_stellar_by_name_id(&self, name_id: i64) -> Result<StellarObject>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_and_skips_empty_fields() -> anyhow::Result<()> {
        let object = StellarObject {
            name_id: 7,
            name: "Vega".into(),
            object_type: "Star".into(),
            ra_deg: 279.2347,
            dec_deg: 38.7837,
            magnitude: Some(0.03),
            spectral_type: None,
            alternative_names: None,
        };

        let json = serde_json::to_value(&object)?;
        assert_eq!(json["nameId"], 7);
        assert_eq!(json["objectType"], "Star");
        assert!(json.get("spectralType").is_none());

        let back: StellarObject = serde_json::from_value(json)?;
        assert_eq!(back, object);
        Ok(())
    }
}
