//! Extraction of compact patient records from FHIR Patient resources.
//!
//! FHIR Patients may carry several names (<http://hl7.org/fhir/datatypes.html#HumanName>) and
//! several identifiers (<http://hl7.org/fhir/datatypes.html#Identifier>). The extractor picks
//! one first/last name and one MRN per resource using fixed tie-break rules, and drops
//! resources that cannot be shown to a user.

use crate::bundle::Bundle;
use crate::patient::{HumanName, NameUse, Patient, PatientResource, MR_CODE};
use crate::FhirError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Compact patient record derived from a FHIR Patient resource.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CanonicalPatient {
    /// Logical id of the resource on the FHIR server.
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    /// FHIR `date` as sent by the server.
    pub date_of_birth: String,
    pub mrn: Option<String>,
}

/// Choose a first name and last name for a patient.
///
/// Candidates are considered in this order:
/// 1. the first name with `use == "usual"`
/// 2. the first name with `use == "official"`
/// 3. the first name of any kind
///
/// First and last name fall back independently: the first name is the first `given` of the
/// earliest candidate that has any, and the last name is the earliest non-empty `family`.
/// Missing parts come back as empty strings.
pub fn extract_name(patient: &PatientResource) -> (String, String) {
    let first_with_use = |name_use: NameUse| {
        patient
            .name
            .iter()
            .find(|n| n.name_use() == Some(name_use))
    };
    let candidates: [Option<&HumanName>; 3] = [
        first_with_use(NameUse::Usual),
        first_with_use(NameUse::Official),
        patient.name.first(),
    ];

    let first_name = candidates
        .iter()
        .flatten()
        .find_map(|n| n.given.first())
        .cloned()
        .unwrap_or_default();
    let last_name = candidates
        .iter()
        .flatten()
        .find_map(|n| n.family.as_deref().filter(|f| !f.is_empty()))
        .map(str::to_owned)
        .unwrap_or_default();

    (first_name, last_name)
}

/// Extracts [`CanonicalPatient`]s using a FHIR server's MRN identifier system.
#[derive(Clone, Debug)]
pub struct PatientExtractor {
    mrn_system: String,
}

impl PatientExtractor {
    pub fn new(mrn_system: impl Into<String>) -> Self {
        Self {
            mrn_system: mrn_system.into(),
        }
    }

    pub fn mrn_system(&self) -> &str {
        &self.mrn_system
    }

    /// Find the patient's MRN.
    ///
    /// Identifiers are scanned in order. An identifier is an MRN if its type carries the
    /// v2-0203 `MR` coding, or failing that (servers that ignore identifier typing) if its
    /// `system` is the configured MRN system. When `expected` is set, an MRN is only accepted
    /// if its value equals `expected`; otherwise the scan moves on to the next identifier.
    ///
    /// # Returns
    ///
    /// The first accepted identifier value, or `None` once every identifier has been tried.
    pub fn extract_mrn(
        &self,
        patient: &PatientResource,
        expected: Option<&str>,
    ) -> Option<String> {
        let accepts = |value: &str| expected.map_or(true, |e| e == value);

        for identifier in &patient.identifier {
            let Some(value) = identifier.value.as_deref() else {
                continue;
            };

            if identifier.has_type_code(MR_CODE) {
                if accepts(value) {
                    return Some(value.to_owned());
                }
                continue;
            }

            if identifier.system.as_deref() == Some(self.mrn_system.as_str()) && accepts(value) {
                return Some(value.to_owned());
            }
        }

        None
    }

    /// Extract patients from a search Bundle.
    ///
    /// # Arguments
    ///
    /// * `bundle` - Response body of a Patient search.
    /// * `expected_mrn` - When set, resources whose MRN does not match are treated as false
    ///   positives from the server and dropped.
    ///
    /// # Returns
    ///
    /// One [`CanonicalPatient`] per usable resource, in Bundle order. Resources without a
    /// name, without a matching MRN (when `expected_mrn` is set), or missing `id`/`birthDate`
    /// are logged and skipped.
    pub fn extract_patients(
        &self,
        bundle: &Value,
        expected_mrn: Option<&str>,
    ) -> Vec<CanonicalPatient> {
        let bundle = match Bundle::parse(bundle) {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!("could not read search bundle: {e}");
                return Vec::new();
            }
        };

        if !bundle.has_matches() {
            tracing::debug!("no entries found");
            return Vec::new();
        }
        tracing::debug!("found {} entries", bundle.entry.len());

        let mut patients = Vec::with_capacity(bundle.entry.len());
        for entry in &bundle.entry {
            let Some(resource) = entry.resource.as_ref() else {
                tracing::warn!(full_url = ?entry.full_url, "bundle entry has no resource, skipping");
                continue;
            };
            if let Some(patient) = self.extract_one(resource, expected_mrn) {
                patients.push(patient);
            }
        }

        patients
    }

    /// Summarise the server's echo of a newly created Patient.
    ///
    /// The MRN is the first identifier's value, which is the one the create body carried.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the resource cannot be parsed or lacks `id` or `birthDate`.
    pub fn created_patient(&self, resource: &Value) -> Result<CanonicalPatient, FhirError> {
        let patient = Patient::parse(resource)?;
        let (first_name, last_name) = extract_name(&patient);

        let external_id = patient
            .id
            .clone()
            .ok_or_else(|| FhirError::Translation("created Patient has no id".into()))?;
        let date_of_birth = patient
            .birth_date
            .clone()
            .ok_or_else(|| FhirError::Translation("created Patient has no birthDate".into()))?;

        Ok(CanonicalPatient {
            external_id,
            first_name,
            last_name,
            date_of_birth,
            mrn: patient.identifier.first().and_then(|i| i.value.clone()),
        })
    }

    fn extract_one(
        &self,
        resource: &Value,
        expected_mrn: Option<&str>,
    ) -> Option<CanonicalPatient> {
        let patient = match Patient::parse(resource) {
            Ok(patient) => patient,
            Err(e) => {
                tracing::warn!("could not read Patient resource, skipping: {e}");
                return None;
            }
        };

        let Some(external_id) = patient.id.clone() else {
            tracing::warn!("Patient resource has no id, skipping");
            return None;
        };

        let (first_name, last_name) = extract_name(&patient);
        if first_name.is_empty() && last_name.is_empty() {
            tracing::warn!(
                "could not extract name for patient, skipping FHIR resource {external_id}"
            );
            return None;
        }

        let mrn = self.extract_mrn(&patient, expected_mrn);
        if expected_mrn.is_some() && mrn.is_none() {
            tracing::warn!(
                "patient does not have the expected MRN, skipping FHIR resource {external_id}"
            );
            return None;
        }

        let Some(date_of_birth) = patient.birth_date else {
            tracing::warn!("Patient has no birthDate, skipping FHIR resource {external_id}");
            return None;
        };

        Some(CanonicalPatient {
            external_id,
            first_name,
            last_name,
            date_of_birth,
            mrn,
        })
    }
}
