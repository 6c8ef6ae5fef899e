//! Identifiers for wards, shifts and shift forms
//!
//! ID Format:
//! - Form IDs: `f-{7-char-hash}` (e.g., `f-7f2b4c1`)
//! - Ward IDs: uppercase ASCII alphanumerics, `-` and `_` (e.g., `WARD6`)
//!
//! The form hash is derived from the form key plus creation timestamp, so a
//! draft that supersedes a rejected record for the same key gets a new ID.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Date format used for `dateString` values
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid form ID format: expected 'f-{{7-char-hash}}', got '{0}'")]
    InvalidFormId(String),

    #[error("Invalid ward ID: '{0}' (use letters, digits, '-' or '_')")]
    InvalidWardId(String),

    #[error("Invalid shift: expected 'morning' or 'night', got '{0}'")]
    InvalidShift(String),

    #[error("Invalid date: expected YYYY-MM-DD, got '{0}'")]
    InvalidDate(String),
}

/// Generates a 7-character hash from a seed and timestamp
fn generate_hash(seed: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", seed, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

/// Parses a `YYYY-MM-DD` date string
pub fn parse_date(s: &str) -> Result<NaiveDate, IdError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| IdError::InvalidDate(s.to_string()))
}

/// Ward identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WardId(String);

impl WardId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WardId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(IdError::InvalidWardId(s.to_string()));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for WardId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WardId> for String {
    fn from(id: WardId) -> Self {
        id.0
    }
}

/// One of the two 12-hour recording windows per ward per day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Morning,
    Night,
}

impl Shift {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Night => "night",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shift {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" | "m" => Ok(Shift::Morning),
            "night" | "n" => Ok(Shift::Night),
            _ => Err(IdError::InvalidShift(s.to_string())),
        }
    }
}

/// The (ward, date, shift) triple that owns at most one live form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormKey {
    pub ward_id: WardId,
    pub date: NaiveDate,
    pub shift: Shift,
}

impl FormKey {
    pub fn new(ward_id: WardId, date: NaiveDate, shift: Shift) -> Self {
        Self {
            ward_id,
            date,
            shift,
        }
    }

    /// Key of the shift whose ending census carries over into this one
    ///
    /// Morning follows the prior day's night; night follows the same day's
    /// morning. Returns None only at the edge of the calendar.
    pub fn predecessor(&self) -> Option<FormKey> {
        match self.shift {
            Shift::Morning => self
                .date
                .pred_opt()
                .map(|d| FormKey::new(self.ward_id.clone(), d, Shift::Night)),
            Shift::Night => Some(FormKey::new(
                self.ward_id.clone(),
                self.date,
                Shift::Morning,
            )),
        }
    }

    /// Returns the date formatted as `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.ward_id, self.date_string(), self.shift)
    }
}

/// Shift form ID in the format `f-{7-char-hash}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormId {
    hash: String,
}

impl FormId {
    /// Creates a new form ID from its key and creation timestamp
    pub fn new(key: &FormKey, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(&key.to_string(), timestamp),
        }
    }

    /// Creates the ID of a draft that supersedes `previous` for the same key
    pub fn superseding(key: &FormKey, previous: &FormId, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(&format!("{}{}", key, previous), timestamp),
        }
    }

    /// Returns the hash portion of the ID
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f-{}", self.hash)
    }
}

impl FromStr for FormId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hash = s
            .strip_prefix("f-")
            .ok_or_else(|| IdError::InvalidFormId(s.to_string()))?;

        if hash.len() != 7 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdError::InvalidFormId(s.to_string()));
        }

        Ok(Self {
            hash: hash.to_string(),
        })
    }
}

impl TryFrom<String> for FormId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FormId> for String {
    fn from(id: FormId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(shift: Shift) -> FormKey {
        FormKey::new(
            "ward6".parse().unwrap(),
            parse_date("2024-01-15").unwrap(),
            shift,
        )
    }

    #[test]
    fn ward_id_is_normalized_to_uppercase() {
        let id: WardId = " ward6 ".parse().unwrap();
        assert_eq!(id.as_str(), "WARD6");
    }

    #[test]
    fn ward_id_rejects_bad_characters() {
        assert!("".parse::<WardId>().is_err());
        assert!("ward 6".parse::<WardId>().is_err());
        assert!("ward/6".parse::<WardId>().is_err());
    }

    #[test]
    fn form_id_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap();
        let id = FormId::new(&key(Shift::Morning), ts);
        let s = id.to_string();

        assert!(s.starts_with("f-"));
        assert_eq!(s.len(), 9);
        assert_eq!(s.parse::<FormId>().unwrap(), id);
    }

    #[test]
    fn same_key_different_time_gives_different_ids() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();

        assert_ne!(
            FormId::new(&key(Shift::Morning), t1),
            FormId::new(&key(Shift::Morning), t2)
        );
    }

    #[test]
    fn superseding_id_differs_at_same_instant() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap();
        let first = FormId::new(&key(Shift::Morning), ts);
        let second = FormId::superseding(&key(Shift::Morning), &first, ts);
        assert_ne!(first, second);
    }

    #[test]
    fn invalid_form_ids() {
        assert!("t-1234567".parse::<FormId>().is_err());
        assert!("f-123".parse::<FormId>().is_err());
        assert!("f-zzzzzzz".parse::<FormId>().is_err());
    }

    #[test]
    fn shift_parsing() {
        assert_eq!("Morning".parse::<Shift>().unwrap(), Shift::Morning);
        assert_eq!("n".parse::<Shift>().unwrap(), Shift::Night);
        assert!("evening".parse::<Shift>().is_err());
    }

    #[test]
    fn predecessor_of_morning_is_prior_night() {
        let pred = key(Shift::Morning).predecessor().unwrap();
        assert_eq!(pred.shift, Shift::Night);
        assert_eq!(pred.date_string(), "2024-01-14");
    }

    #[test]
    fn predecessor_of_night_is_same_day_morning() {
        let pred = key(Shift::Night).predecessor().unwrap();
        assert_eq!(pred.shift, Shift::Morning);
        assert_eq!(pred.date_string(), "2024-01-15");
    }

    #[test]
    fn key_display() {
        assert_eq!(key(Shift::Night).to_string(), "WARD6/2024-01-15/night");
    }

    #[test]
    fn serde_roundtrip_uses_string_form() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap();
        let id = FormId::new(&key(Shift::Night), ts);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
