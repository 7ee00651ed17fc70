//! Vehicle identifier classification.
//!
//! Sellers type either a registration plate (`AB-123-CD`) or a VIN into the
//! same box. Classification runs on every keystroke and never fails: input
//! that cannot be placed yet is [`IdentifierFormat::Unknown`], which keeps
//! submission disabled downstream.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Below this many non-whitespace characters nothing is guessed.
pub const MIN_CLASSIFY_LEN: usize = 3;
pub const VIN_LEN: usize = 17;
pub const PLATE_ALNUM_LEN: usize = 7;

/// Classification of partial or complete identifier input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierFormat {
    Plate,
    Vin,
    Unknown,
}

impl IdentifierFormat {
    pub const fn identifier_type(self) -> Option<IdentifierType> {
        match self {
            Self::Plate => Some(IdentifierType::Plate),
            Self::Vin => Some(IdentifierType::Vin),
            Self::Unknown => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plate => "plate",
            Self::Vin => "vin",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for IdentifierFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier kind accepted by the lookup endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    Plate,
    Vin,
}

impl IdentifierType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plate => "plate",
            Self::Vin => "vin",
        }
    }
}

impl Display for IdentifierType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plate" => Ok(Self::Plate),
            "vin" => Ok(Self::Vin),
            other => Err(ValidationError::InvalidIdentifierType {
                value: other.to_owned(),
            }),
        }
    }
}

/// Transient view of what the user has typed so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierCandidate {
    pub raw_input: String,
    pub cleaned_alnum: String,
    pub format: IdentifierFormat,
    pub is_complete: bool,
}

impl IdentifierCandidate {
    pub fn from_input(raw_input: &str) -> Self {
        let format = classify(raw_input);
        let cleaned_alnum = clean_alnum(raw_input);
        let is_complete = match format {
            IdentifierFormat::Plate => {
                is_valid_identifier(&format_plate(raw_input), IdentifierFormat::Plate)
            }
            IdentifierFormat::Vin => is_valid_identifier(&cleaned_alnum, IdentifierFormat::Vin),
            IdentifierFormat::Unknown => false,
        };

        Self {
            raw_input: raw_input.to_owned(),
            cleaned_alnum,
            format,
            is_complete,
        }
    }

    /// Identifier and type to submit, once the input is complete.
    pub fn submission(&self) -> Option<(String, IdentifierType)> {
        if !self.is_complete {
            return None;
        }

        match self.format {
            IdentifierFormat::Plate => Some((format_plate(&self.raw_input), IdentifierType::Plate)),
            IdentifierFormat::Vin => Some((self.cleaned_alnum.clone(), IdentifierType::Vin)),
            IdentifierFormat::Unknown => None,
        }
    }
}

/// Classifies partial or complete input as a plate, a VIN, or unknown.
pub fn classify(input: &str) -> IdentifierFormat {
    let significant = input.chars().filter(|ch| !ch.is_whitespace()).count();
    if significant < MIN_CLASSIFY_LEN {
        return IdentifierFormat::Unknown;
    }

    let cleaned = clean_alnum(input);
    let vin_legal = !cleaned.is_empty() && cleaned.chars().all(is_vin_char);

    if cleaned.len() > PLATE_ALNUM_LEN && vin_legal {
        return IdentifierFormat::Vin;
    }

    if has_letters_outside_plate_slots(&cleaned) {
        return IdentifierFormat::Vin;
    }

    let has_letter = cleaned.chars().any(|ch| ch.is_ascii_alphabetic());
    let has_digit = cleaned.chars().any(|ch| ch.is_ascii_digit());
    if has_letter && has_digit && matches_partial_plate(input) {
        return IdentifierFormat::Plate;
    }

    if vin_legal && cleaned.len() >= MIN_CLASSIFY_LEN {
        return IdentifierFormat::Vin;
    }

    IdentifierFormat::Unknown
}

/// Progressive plate formatting: `ab123c` becomes `AB-123-C`.
///
/// Input beyond the seven plate characters is dropped.
pub fn format_plate(input: &str) -> String {
    let cleaned = clean_alnum(input);
    let mut formatted = String::with_capacity(PLATE_ALNUM_LEN + 2);

    for (index, ch) in cleaned.chars().take(PLATE_ALNUM_LEN).enumerate() {
        if index == 2 || index == 5 {
            formatted.push('-');
        }
        formatted.push(ch);
    }

    formatted
}

/// `plate` must be exactly `LL-DDD-LL`; `vin` exactly 17 VIN characters.
/// Letters are compared case-insensitively.
pub fn is_valid_identifier(input: &str, format: IdentifierFormat) -> bool {
    match format {
        IdentifierFormat::Plate => {
            let chars = input.chars().collect::<Vec<_>>();
            chars.len() == PLATE_ALNUM_LEN + 2
                && chars.iter().enumerate().all(|(index, ch)| match index {
                    0 | 1 | 7 | 8 => ch.is_ascii_alphabetic(),
                    2 | 6 => *ch == '-',
                    _ => ch.is_ascii_digit(),
                })
        }
        IdentifierFormat::Vin => {
            input.chars().count() == VIN_LEN
                && input.chars().all(|ch| is_vin_char(ch.to_ascii_uppercase()))
        }
        IdentifierFormat::Unknown => false,
    }
}

fn clean_alnum(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

fn is_vin_char(ch: char) -> bool {
    ch.is_ascii_digit() || (ch.is_ascii_uppercase() && !matches!(ch, 'I' | 'O' | 'Q'))
}

/// Plates carry letters only at positions 0-1 and 5-6.
fn has_letters_outside_plate_slots(cleaned: &str) -> bool {
    cleaned
        .chars()
        .enumerate()
        .any(|(index, ch)| ch.is_ascii_alphabetic() && !matches!(index, 0 | 1 | 5 | 6))
}

/// Two letters, up to three digits, up to two letters, each group optional
/// and separated by at most one `-` or space.
fn matches_partial_plate(input: &str) -> bool {
    let upper = input.trim().to_ascii_uppercase();
    let chars = upper.chars().collect::<Vec<_>>();

    let mut pos = 0;
    pos += take_while_max(&chars[pos..], 2, |ch| ch.is_ascii_uppercase());
    pos += take_while_max(&chars[pos..], 1, is_plate_separator);
    pos += take_while_max(&chars[pos..], 3, |ch| ch.is_ascii_digit());
    pos += take_while_max(&chars[pos..], 1, is_plate_separator);
    pos += take_while_max(&chars[pos..], 2, |ch| ch.is_ascii_uppercase());

    pos == chars.len()
}

fn take_while_max(chars: &[char], max: usize, predicate: impl Fn(char) -> bool) -> usize {
    chars.iter().take(max).take_while(|ch| predicate(**ch)).count()
}

fn is_plate_separator(ch: char) -> bool {
    ch == '-' || ch == ' '
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_unknown() {
        for input in ["", "A", "AB", " A B ", "1-", "\t9\n"] {
            assert_eq!(classify(input), IdentifierFormat::Unknown, "input {input:?}");
        }
    }

    #[test]
    fn plate_shapes_classify_as_plate() {
        for input in ["AB1", "AB-1", "AB-123", "AB123C", "ab-123-cd", "AB 123 CD", "AB123CD"] {
            assert_eq!(classify(input), IdentifierFormat::Plate, "input {input:?}");
        }
    }

    #[test]
    fn vin_shapes_classify_as_vin() {
        assert_eq!(classify("VF1RFB00X56789012"), IdentifierFormat::Vin);
        assert_eq!(classify("WVWZZZ1J"), IdentifierFormat::Vin);
        // Letter in a digit slot rules out a plate.
        assert_eq!(classify("VF1R"), IdentifierFormat::Vin);
        // Letters only: not a plate, still VIN-legal.
        assert_eq!(classify("ABC"), IdentifierFormat::Vin);
    }

    #[test]
    fn seventeen_vin_characters_always_classify_as_vin() {
        let alphabet = "ABCDEFGHJKLMNPRSTUVWXYZ0123456789".chars().collect::<Vec<_>>();
        for offset in 0..alphabet.len() {
            let vin = (0..VIN_LEN)
                .map(|index| alphabet[(offset + index * 7) % alphabet.len()])
                .collect::<String>();
            assert_eq!(classify(&vin), IdentifierFormat::Vin, "vin {vin}");
            assert!(is_valid_identifier(&vin, IdentifierFormat::Vin), "vin {vin}");
        }
    }

    #[test]
    fn forbidden_vin_letters_invalidate_vin() {
        let base = "VF1RFB00X56789012";
        for forbidden in ['I', 'O', 'Q'] {
            for index in 0..VIN_LEN {
                let mut chars = base.chars().collect::<Vec<_>>();
                chars[index] = forbidden;
                let candidate = chars.into_iter().collect::<String>();
                assert!(
                    !is_valid_identifier(&candidate, IdentifierFormat::Vin),
                    "candidate {candidate}"
                );
            }
        }
    }

    #[test]
    fn symbols_only_input_is_unknown() {
        assert_eq!(classify("---"), IdentifierFormat::Unknown);
        assert_eq!(classify("#!?%"), IdentifierFormat::Unknown);
    }

    #[test]
    fn formats_plate_progressively() {
        assert_eq!(format_plate("a"), "A");
        assert_eq!(format_plate("ab"), "AB");
        assert_eq!(format_plate("ab1"), "AB-1");
        assert_eq!(format_plate("ab123"), "AB-123");
        assert_eq!(format_plate("ab123c"), "AB-123-C");
        assert_eq!(format_plate("AB123CD"), "AB-123-CD");
        assert_eq!(format_plate("AB 123 CD EF"), "AB-123-CD");
    }

    #[test]
    fn format_plate_is_idempotent() {
        for input in ["AB123CD", "ab-12", "a", "AB-123-C"] {
            let once = format_plate(input);
            assert_eq!(format_plate(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn plate_validity_requires_exact_shape() {
        assert!(is_valid_identifier("AB-123-CD", IdentifierFormat::Plate));
        assert!(!is_valid_identifier("AB123CD", IdentifierFormat::Plate));
        assert!(!is_valid_identifier("AB-123-C", IdentifierFormat::Plate));
        assert!(!is_valid_identifier("A1-123-CD", IdentifierFormat::Plate));
        assert!(!is_valid_identifier("AB-123-CD", IdentifierFormat::Unknown));
    }

    #[test]
    fn candidate_exposes_submission_when_complete() {
        let candidate = IdentifierCandidate::from_input("ab123cd");
        assert_eq!(candidate.format, IdentifierFormat::Plate);
        assert_eq!(candidate.cleaned_alnum, "AB123CD");
        assert!(candidate.is_complete);
        assert_eq!(
            candidate.submission(),
            Some((String::from("AB-123-CD"), IdentifierType::Plate))
        );

        let partial = IdentifierCandidate::from_input("AB-12");
        assert!(!partial.is_complete);
        assert_eq!(partial.submission(), None);
    }

    #[test]
    fn parses_identifier_type() {
        assert_eq!("VIN".parse::<IdentifierType>(), Ok(IdentifierType::Vin));
        assert!(matches!(
            "isbn".parse::<IdentifierType>(),
            Err(ValidationError::InvalidIdentifierType { .. })
        ));
    }
}
