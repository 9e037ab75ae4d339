//! FHIR Patient wire models and translation helpers.
//!
//! This module provides both domain-level types and wire models for Patient resources
//! exchanged with the external FHIR server.
//!
//! Responsibilities:
//! - Define a lenient wire model for deserialising server responses
//! - Build the Patient resource body sent when creating a patient
//! - Normalise inbound dates of birth to the FHIR `date` format
//!
//! Notes:
//! - Servers add fields we do not model (meta, telecom, extensions); these are ignored
//! - `null` is treated the same as an absent field

use crate::FhirError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// HL7 v2 identifier type code system.
pub const IDENTIFIER_TYPE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v2-0203";

/// Identifier type code for a medical record number.
pub const MR_CODE: &str = "MR";

/// Display text for [`MR_CODE`].
pub const MR_DISPLAY: &str = "Medical Record Number";

// ============================================================================
// Public domain-level types
// ============================================================================

/// Purpose of a human name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameUse {
    /// Usual/preferred name.
    Usual,
    /// Official name.
    Official,
    /// Temporary name.
    Temp,
    /// Nickname or informal name.
    Nickname,
    /// Anonymous name.
    Anonymous,
    /// Old name (no longer in use).
    Old,
    /// Maiden name.
    Maiden,
}

impl NameUse {
    /// Convert to FHIR wire format string.
    pub fn to_wire(self) -> &'static str {
        match self {
            NameUse::Usual => "usual",
            NameUse::Official => "official",
            NameUse::Temp => "temp",
            NameUse::Nickname => "nickname",
            NameUse::Anonymous => "anonymous",
            NameUse::Old => "old",
            NameUse::Maiden => "maiden",
        }
    }

    /// Parse from FHIR wire format string.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "usual" => Some(NameUse::Usual),
            "official" => Some(NameUse::Official),
            "temp" => Some(NameUse::Temp),
            "nickname" => Some(NameUse::Nickname),
            "anonymous" => Some(NameUse::Anonymous),
            "old" => Some(NameUse::Old),
            "maiden" => Some(NameUse::Maiden),
            _ => None,
        }
    }
}

/// Details supplied by a caller when creating a patient.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    /// ISO 8601 date (`YYYY-MM-DD`) or date-time; only the date part is sent.
    pub date_of_birth: String,
    pub mrn: String,
}

// ============================================================================
// Wire types
// ============================================================================

/// Wire representation of a Patient resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct PatientResource {
    #[serde(
        rename = "resourceType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub identifier: Vec<Identifier>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub name: Vec<HumanName>,

    #[serde(rename = "birthDate", default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

/// Wire representation of a human name.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct HumanName {
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub given: Vec<String>,
}

impl HumanName {
    /// The parsed `use` tag, if it is one of the FHIR name uses.
    pub fn name_use(&self) -> Option<NameUse> {
        self.use_type.as_deref().and_then(NameUse::from_wire)
    }
}

/// Wire representation of an identifier.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Identifier {
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_type: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Identifier {
    /// Whether any coding of the identifier type carries `code == code`.
    pub fn has_type_code(&self, code: &str) -> bool {
        self.type_
            .as_ref()
            .is_some_and(|t| t.coding.iter().any(|c| c.code.as_deref() == Some(code)))
    }
}

/// Wire representation of a codeable concept.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CodeableConcept {
    #[serde(default, deserialize_with = "null_as_default")]
    pub coding: Vec<Coding>,
}

/// Wire representation of a coding.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

// ============================================================================
// Public Patient operations
// ============================================================================

/// Patient resource operations.
///
/// This is a zero-sized type used for namespacing patient-related operations.
/// All methods are associated functions.
pub struct Patient;

impl Patient {
    /// Parse a Patient resource from JSON.
    ///
    /// This uses `serde_path_to_error` to surface a best-effort "path" (e.g. `name.0.given`)
    /// to the failing field when the JSON does not match the wire schema.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - any modelled field has an unexpected type,
    /// - `resourceType` is present and is not `"Patient"`.
    pub fn parse(json: &Value) -> Result<PatientResource, FhirError> {
        let resource = match serde_path_to_error::deserialize::<_, PatientResource>(json) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(FhirError::Translation(format!(
                    "Patient schema mismatch at {path}: {source}"
                )));
            }
        };

        if let Some(resource_type) = resource.resource_type.as_deref() {
            if resource_type != "Patient" {
                return Err(FhirError::InvalidInput(format!(
                    "Expected resourceType 'Patient', got '{resource_type}'"
                )));
            }
        }

        Ok(resource)
    }

    /// Build the JSON body used to create a Patient on the FHIR server.
    ///
    /// The body carries one official MRN identifier (typed with the v2-0203 `MR` code and
    /// tagged with `mrn_system`) and one official name.
    ///
    /// # Arguments
    ///
    /// * `details` - Caller-supplied patient details.
    /// * `mrn_system` - Identifier system the FHIR server uses for MRNs.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if the date of birth cannot be parsed.
    pub fn create_body(details: &NewPatient, mrn_system: &str) -> Result<Value, FhirError> {
        let birth_date = normalise_birth_date(&details.date_of_birth)?;

        let resource = PatientResource {
            resource_type: Some("Patient".to_string()),
            id: None,
            active: Some(true),
            identifier: vec![Identifier {
                use_type: Some("official".to_string()),
                type_: Some(CodeableConcept {
                    coding: vec![Coding {
                        system: Some(IDENTIFIER_TYPE_SYSTEM.to_string()),
                        code: Some(MR_CODE.to_string()),
                        display: Some(MR_DISPLAY.to_string()),
                    }],
                }),
                system: Some(mrn_system.to_string()),
                value: Some(details.mrn.clone()),
            }],
            name: vec![HumanName {
                use_type: Some(NameUse::Official.to_wire().to_string()),
                text: Some(format!("{}, {}", details.last_name, details.first_name)),
                family: Some(details.last_name.clone()),
                given: vec![details.first_name.clone()],
            }],
            birth_date: Some(birth_date),
        };

        serde_json::to_value(&resource)
            .map_err(|e| FhirError::Translation(format!("Failed to serialise patient: {e}")))
    }
}

/// Normalise an ISO 8601 date or date-time to a FHIR `date` (`YYYY-MM-DD`).
///
/// # Errors
///
/// Returns [`FhirError::InvalidInput`] if `input` is neither a date, a naive date-time nor
/// an RFC 3339 timestamp.
pub fn normalise_birth_date(input: &str) -> Result<String, FhirError> {
    let trimmed = input.trim();
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date())
        })
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.date_naive()))
        .map_err(|_| FhirError::InvalidInput(format!("invalid date of birth: {input:?}")))?;

    Ok(date.format("%Y-%m-%d").to_string())
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
