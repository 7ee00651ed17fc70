use serde::{Deserialize, Serialize};

/// Per-adapter result of one lookup or resync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
    Cached,
}

/// Freshness of a cached provider answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Fresh,
    Stale,
}

/// Outcome reported by one provider adapter. Lives only as long as the call
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutcome {
    pub adapter_interface: String,
    pub provider_key: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_status: Option<CacheStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl ProviderOutcome {
    pub fn new(
        adapter_interface: impl Into<String>,
        provider_key: impl Into<String>,
        status: OutcomeStatus,
    ) -> Self {
        Self {
            adapter_interface: adapter_interface.into(),
            provider_key: provider_key.into(),
            status,
            cache_status: None,
            error_message: None,
            response_time_ms: None,
        }
    }

    pub fn success(adapter_interface: impl Into<String>, provider_key: impl Into<String>) -> Self {
        Self::new(adapter_interface, provider_key, OutcomeStatus::Success)
    }

    pub fn failed(
        adapter_interface: impl Into<String>,
        provider_key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::new(adapter_interface, provider_key, OutcomeStatus::Failed)
        }
    }

    pub fn cached(
        adapter_interface: impl Into<String>,
        provider_key: impl Into<String>,
        cache_status: CacheStatus,
    ) -> Self {
        Self {
            cache_status: Some(cache_status),
            ..Self::new(adapter_interface, provider_key, OutcomeStatus::Cached)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }

    /// Failed, or served from a stale cache entry.
    pub fn is_degraded(&self) -> bool {
        self.is_failed() || self.cache_status == Some(CacheStatus::Stale)
    }
}

/// Resync candidate reported by the availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterAvailability {
    pub adapter_interface: String,
    pub provider_key: String,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub certifiable_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_outcome_with_optional_fields() {
        let payload = r#"{
            "adapterInterface":"IVehicleRegistry",
            "providerKey":"siv",
            "status":"cached",
            "cacheStatus":"stale",
            "responseTimeMs":412
        }"#;

        let outcome: ProviderOutcome = serde_json::from_str(payload).expect("must decode");

        assert_eq!(outcome.status, OutcomeStatus::Cached);
        assert_eq!(outcome.response_time_ms, Some(412));
        assert!(!outcome.is_failed());
        assert!(outcome.is_degraded());
    }
}
