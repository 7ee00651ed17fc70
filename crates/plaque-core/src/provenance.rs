//! Per-field provenance for one listing editing session.
//!
//! Each field is `Empty`, `Certified` by a trusted provider, or `Declared` by
//! the user. A user edit always wins over provider data: certified writes
//! from a lookup or resync skip declared fields, and nothing turns a declared
//! field back into a certified one except an explicit
//! [`FieldProvenanceStore::revert_override`] or a fresh certified write after
//! the user cleared the field.
//!
//! The first time a user overrides a certified value, that value is kept as
//! the field's `original_certified` snapshot. Later edits and later
//! certifications never replace it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{FieldResult, FieldValue, UtcDateTime};
use crate::ValidationError;

/// Fields a listing editor starts with.
pub const DEFAULT_FIELDS: &[&str] = &[
    "make",
    "model",
    "version",
    "fuel",
    "gearbox",
    "year",
    "mileage",
    "power_hp",
    "fiscal_power",
    "color",
    "doors",
    "seats",
    "body_type",
    "first_registration",
    "co2",
    "crit_air",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Certified,
    Declared,
    Empty,
}

/// Which provider vouched for a value, and when.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub source: String,
    pub certified_at: UtcDateTime,
}

/// Current state of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldState {
    Empty,
    Certified {
        value: FieldValue,
        certification: Certification,
    },
    Declared {
        value: FieldValue,
    },
}

impl FieldState {
    pub const fn status(&self) -> FieldStatus {
        match self {
            Self::Empty => FieldStatus::Empty,
            Self::Certified { .. } => FieldStatus::Certified,
            Self::Declared { .. } => FieldStatus::Declared,
        }
    }

    pub fn value(&self) -> Option<&FieldValue> {
        match self {
            Self::Empty => None,
            Self::Certified { value, .. } | Self::Declared { value } => Some(value),
        }
    }
}

/// Certified value captured when the user first overrode it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifiedSnapshot {
    pub value: FieldValue,
    #[serde(flatten)]
    pub certification: Certification,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    name: String,
    state: FieldState,
    original_certified: Option<CertifiedSnapshot>,
}

impl FieldRecord {
    fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: FieldState::Empty,
            original_certified: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &FieldState {
        &self.state
    }

    pub const fn status(&self) -> FieldStatus {
        self.state.status()
    }

    pub fn value(&self) -> Option<&FieldValue> {
        self.state.value()
    }

    pub fn certification(&self) -> Option<&Certification> {
        match &self.state {
            FieldState::Certified { certification, .. } => Some(certification),
            _ => None,
        }
    }

    pub fn original_certified(&self) -> Option<&CertifiedSnapshot> {
        self.original_certified.as_ref()
    }

    /// Flat view in the shape the editor UI renders.
    pub fn view(&self) -> FieldView {
        let certification = self.certification();
        FieldView {
            field_name: self.name.clone(),
            value: self.value().cloned(),
            status: self.status(),
            certified_source: certification.map(|c| c.source.clone()),
            certified_timestamp: certification.map(|c| c.certified_at),
            original_certified_value: self
                .original_certified
                .as_ref()
                .map(|snapshot| snapshot.value.clone()),
            original_certification: self
                .original_certified
                .as_ref()
                .map(|snapshot| snapshot.certification.clone()),
        }
    }

    fn certify(&mut self, value: FieldValue, certification: Certification) {
        self.state = FieldState::Certified {
            value,
            certification,
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub field_name: String,
    pub value: Option<FieldValue>,
    pub status: FieldStatus,
    pub certified_source: Option<String>,
    pub certified_timestamp: Option<UtcDateTime>,
    /// Bare value the first override replaced.
    pub original_certified_value: Option<FieldValue>,
    /// Provider and time behind `original_certified_value`.
    pub original_certification: Option<Certification>,
}

/// What a bulk certified write did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped_declared: usize,
    pub skipped_uncertified: usize,
    /// Certified results with no source or no value.
    pub skipped_invalid: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceSummary {
    pub certified: usize,
    pub declared: usize,
    pub empty: usize,
    pub sources: Vec<String>,
}

/// Session-scoped field map. Writes are synchronous and immediately visible
/// to every holder of the store.
#[derive(Debug, Default)]
pub struct FieldProvenanceStore {
    fields: Mutex<BTreeMap<String, FieldRecord>>,
}

impl FieldProvenanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every record and creates an empty one per name.
    pub fn initialize<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields = self.lock();
        fields.clear();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() {
                fields.insert(name.to_owned(), FieldRecord::empty(name));
            }
        }
    }

    pub fn initialize_defaults(&self) {
        self.initialize(DEFAULT_FIELDS.iter().copied());
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, name: &str) -> Option<FieldRecord> {
        self.lock().get(name).cloned()
    }

    pub fn status(&self, name: &str) -> Option<FieldStatus> {
        self.lock().get(name).map(FieldRecord::status)
    }

    pub fn records(&self) -> Vec<FieldRecord> {
        self.lock().values().cloned().collect()
    }

    pub fn views(&self) -> Vec<FieldView> {
        self.lock().values().map(FieldRecord::view).collect()
    }

    /// Applies a user edit. A blank value empties the field; anything else
    /// declares it. Overriding a certified value for the first time keeps
    /// that value as the field's original certified snapshot.
    pub fn edit(&self, name: &str, value: Option<FieldValue>) -> Result<FieldStatus, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyFieldName);
        }
        if let Some(FieldValue::Number(number)) = &value {
            if !number.is_finite() {
                return Err(ValidationError::NonFiniteValue {
                    field: name.to_owned(),
                });
            }
        }

        let mut fields = self.lock();
        let record = fields
            .entry(name.to_owned())
            .or_insert_with(|| FieldRecord::empty(name));

        if let FieldState::Certified {
            value: certified,
            certification,
        } = &record.state
        {
            if record.original_certified.is_none() {
                record.original_certified = Some(CertifiedSnapshot {
                    value: certified.clone(),
                    certification: certification.clone(),
                });
            }
        }

        record.state = match value {
            Some(value) if !value.is_blank() => FieldState::Declared { value },
            _ => FieldState::Empty,
        };

        Ok(record.status())
    }

    /// Writes certified provider results. Declared fields are left alone;
    /// empty, certified and unknown fields take the provider value.
    pub fn apply_certified(&self, results: &[FieldResult]) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut fields = self.lock();

        for result in results {
            if !result.is_certified {
                report.skipped_uncertified += 1;
                continue;
            }

            let name = result.field_name.trim();
            let source = result.source.as_deref().map(str::trim).unwrap_or_default();
            let value = result.field_value.as_ref().filter(|value| !value.is_blank());
            let (Some(value), false, false) = (value, source.is_empty(), name.is_empty()) else {
                warn!(field = %result.field_name, "certified result without source or value ignored");
                report.skipped_invalid += 1;
                continue;
            };

            let record = fields
                .entry(name.to_owned())
                .or_insert_with(|| FieldRecord::empty(name));
            if record.status() == FieldStatus::Declared {
                debug!(field = name, "keeping user-declared value over provider value");
                report.skipped_declared += 1;
                continue;
            }

            record.certify(
                value.clone(),
                Certification {
                    source: source.to_owned(),
                    certified_at: certified_at(result.source_timestamp.as_deref()),
                },
            );
            report.applied += 1;
        }

        report
    }

    /// Restores the value captured on the first override of a certified
    /// field. Returns `false` when the field has no such snapshot or is
    /// already certified.
    pub fn revert_override(&self, name: &str) -> bool {
        let mut fields = self.lock();
        let Some(record) = fields.get_mut(name.trim()) else {
            return false;
        };
        if record.status() == FieldStatus::Certified {
            return false;
        }
        let Some(snapshot) = record.original_certified.clone() else {
            return false;
        };

        record.certify(snapshot.value, snapshot.certification);
        true
    }

    pub fn summary(&self) -> ProvenanceSummary {
        let fields = self.lock();
        let mut summary = ProvenanceSummary::default();
        let mut sources = BTreeSet::new();

        for record in fields.values() {
            match &record.state {
                FieldState::Empty => summary.empty += 1,
                FieldState::Declared { .. } => summary.declared += 1,
                FieldState::Certified { certification, .. } => {
                    summary.certified += 1;
                    sources.insert(certification.source.clone());
                }
            }
        }

        summary.sources = sources.into_iter().collect();
        summary
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, FieldRecord>> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn certified_at(raw: Option<&str>) -> UtcDateTime {
    match raw.map(UtcDateTime::parse) {
        Some(Ok(timestamp)) => timestamp,
        Some(Err(error)) => {
            debug!(%error, "provider timestamp unreadable, stamping with current time");
            UtcDateTime::now()
        }
        None => UtcDateTime::now(),
    }
}
