use thiserror::Error;

/// Validation errors raised by `plaque-core` constructors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listing id cannot be empty")]
    EmptyListingId,
    #[error("listing id contains invalid character '{ch}' at index {index}")]
    ListingIdInvalidChar { ch: char, index: usize },

    #[error("field name cannot be empty")]
    EmptyFieldName,
    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: String },

    #[error("timestamp must be RFC3339: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("invalid identifier type '{value}', expected one of plate, vin")]
    InvalidIdentifierType { value: String },
    #[error("'{value}' is not a complete plate or VIN")]
    IncompleteIdentifier { value: String },

    #[error("setting '{name}' must be a positive integer: '{value}'")]
    InvalidSetting { name: &'static str, value: String },
    #[error("base url must start with http:// or https://: '{value}'")]
    InvalidBaseUrl { value: String },
}
