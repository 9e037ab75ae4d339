//! FHIR Bundle wire model.
//!
//! Only the parts of a `searchset` Bundle that extraction needs are modelled: the match
//! `total` and each entry's `resource`. Entry resources stay as raw JSON so that one
//! malformed resource does not spoil the rest of the page.

use crate::FhirError;
use serde::Deserialize;
use serde_json::Value;

/// Wire representation of a search Bundle.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Bundle {
    #[serde(default)]
    pub total: Option<u64>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub entry: Vec<BundleEntry>,
}

/// One entry of a Bundle.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl", default)]
    pub full_url: Option<String>,

    #[serde(default)]
    pub resource: Option<Value>,
}

impl Bundle {
    /// Parse a Bundle from a response body.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] if `json` is not an object or `total`/`entry` have
    /// unexpected types.
    pub fn parse(json: &Value) -> Result<Bundle, FhirError> {
        Bundle::deserialize(json)
            .map_err(|e| FhirError::Translation(format!("Bundle schema mismatch: {e}")))
    }

    /// Whether the server reported any matches. An absent `total` counts as none.
    pub fn has_matches(&self) -> bool {
        self.total.unwrap_or(0) > 0
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<BundleEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<BundleEntry>>::deserialize(deserializer)?.unwrap_or_default())
}
