use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Improvement hint attached to a visibility score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub field: String,
    pub message: String,
    #[serde(default)]
    pub boost: f64,
}

/// Server-computed visibility score of one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSnapshot {
    pub score: f64,
    #[serde(default)]
    pub previous_score: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization_message: Option<String>,
}

impl ScoreSnapshot {
    pub fn new(score: f64, label: impl Into<String>) -> Self {
        Self {
            score,
            previous_score: 0.0,
            label: label.into(),
            suggestions: Vec::new(),
            normalized_score: None,
            normalization_message: None,
        }
    }

    /// Validates an untrusted score payload.
    ///
    /// Returns `None` for null payloads, non-objects, and objects whose
    /// `score` is missing, non-numeric or non-finite. Every other field is
    /// read leniently: null or wrong-shaped values fall back to their
    /// defaults, and malformed suggestions are dropped one by one.
    pub fn from_payload(payload: Option<&Value>) -> Option<Self> {
        let object = payload?.as_object()?;
        let score = object.get("score")?.as_f64().filter(|score| score.is_finite())?;

        let suggestions = object
            .get("suggestions")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(lenient::<Suggestion>).collect())
            .unwrap_or_default();

        Some(Self {
            score,
            previous_score: object
                .get("previousScore")
                .and_then(Value::as_f64)
                .unwrap_or_default(),
            label: object
                .get("label")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_default(),
            suggestions,
            normalized_score: object.get("normalizedScore").and_then(Value::as_f64),
            normalization_message: object
                .get("normalizationMessage")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }
}

fn lenient<T: DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_payload() {
        let snapshot = ScoreSnapshot::from_payload(Some(&json!({ "score": 50 })))
            .expect("payload with a score is valid");

        assert_eq!(snapshot.score, 50.0);
        assert!(snapshot.label.is_empty());
        assert!(snapshot.suggestions.is_empty());
    }

    #[test]
    fn accepts_full_payload() {
        let payload = json!({
            "score": 72,
            "previousScore": 50,
            "label": "Good",
            "suggestions": [{ "field": "photos", "message": "Add 3 more photos", "boost": 8 }],
            "normalizedScore": 0.72,
            "normalizationMessage": "compared with similar listings"
        });

        let snapshot = ScoreSnapshot::from_payload(Some(&payload)).expect("valid payload");

        assert_eq!(snapshot.label, "Good");
        assert_eq!(snapshot.suggestions[0].boost, 8.0);
        assert_eq!(snapshot.normalized_score, Some(0.72));
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(ScoreSnapshot::from_payload(None).is_none());
        assert!(ScoreSnapshot::from_payload(Some(&Value::Null)).is_none());
        assert!(ScoreSnapshot::from_payload(Some(&json!({}))).is_none());
        assert!(ScoreSnapshot::from_payload(Some(&json!({ "score": "72" }))).is_none());
        assert!(ScoreSnapshot::from_payload(Some(&json!([72]))).is_none());
        assert!(ScoreSnapshot::from_payload(Some(&json!({ "score": null }))).is_none());
    }

    #[test]
    fn null_or_misshapen_optional_fields_fall_back_to_defaults() {
        let payload = json!({
            "score": 72,
            "previousScore": null,
            "label": null,
            "suggestions": "none",
            "normalizedScore": "high"
        });

        let snapshot = ScoreSnapshot::from_payload(Some(&payload)).expect("finite score is enough");

        assert_eq!(snapshot.score, 72.0);
        assert_eq!(snapshot.previous_score, 0.0);
        assert!(snapshot.label.is_empty());
        assert!(snapshot.suggestions.is_empty());
        assert_eq!(snapshot.normalized_score, None);
    }

    #[test]
    fn malformed_suggestions_are_dropped_individually() {
        let payload = json!({
            "score": 64,
            "suggestions": [
                { "field": "photos", "message": "Add photos", "boost": 5 },
                { "field": null },
                "mileage"
            ]
        });

        let snapshot = ScoreSnapshot::from_payload(Some(&payload)).expect("valid score");

        assert_eq!(snapshot.suggestions.len(), 1);
        assert_eq!(snapshot.suggestions[0].field, "photos");
    }
}
