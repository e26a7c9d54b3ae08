use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::MoadianError;
use super::verhoeff;

/// Largest internal sequence that fits the 12-digit decimal field.
pub const MAX_SEQUENCE: u64 = 999_999_999_999;

/// Largest day count that fits the 6-digit decimal field (year 4707).
pub const MAX_DAYS: i64 = 999_999;

/// Longest accepted registered identity (memory id).
pub const MAX_IDENTITY_LEN: usize = 16;

const DAY_HEX_WIDTH: usize = 5;
const SEQUENCE_HEX_WIDTH: usize = 10;
const SUFFIX_LEN: usize = DAY_HEX_WIDTH + SEQUENCE_HEX_WIDTH + 1;
const SECONDS_PER_DAY: i64 = 86_400;

/// A tax id ("taxid") issued under a registered identity.
///
/// Layout: `{identity}{days:05X}{sequence:010X}{check}` where `days` counts
/// whole UTC days since 1970-01-01 and `check` is a Verhoeff digit over the
/// decimal rendering of the same fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceId(String);

impl InvoiceId {
    /// Parse and fully verify a rendered id, check digit included.
    pub fn parse(value: &str) -> Result<Self, MoadianError> {
        let invalid = |reason: &str| {
            MoadianError::InvalidArgument(format!("invalid invoice id '{value}': {reason}"))
        };

        if value.len() <= SUFFIX_LEN || !value.is_ascii() {
            return Err(invalid("too short"));
        }
        let (raw_identity, suffix) = value.split_at(value.len() - SUFFIX_LEN);
        let identity = normalize_identity(raw_identity)?;
        if identity != raw_identity {
            return Err(invalid("identity must be upper-case alphanumeric"));
        }

        let is_upper_hex = |b: u8| b.is_ascii_digit() || (b'A'..=b'F').contains(&b);
        if !suffix[..SUFFIX_LEN - 1].bytes().all(is_upper_hex) {
            return Err(invalid("day and sequence segments must be upper-case hex"));
        }
        let days = u64::from_str_radix(&suffix[..DAY_HEX_WIDTH], 16)
            .map_err(|_| invalid("day segment is not hex"))?;
        let sequence = u64::from_str_radix(&suffix[DAY_HEX_WIDTH..SUFFIX_LEN - 1], 16)
            .map_err(|_| invalid("sequence segment is not hex"))?;
        if days > MAX_DAYS as u64 || sequence > MAX_SEQUENCE {
            return Err(invalid("segment out of range"));
        }

        let mut digits = decimal_form(&numeric_identity(&identity), days, sequence);
        digits.push_str(&suffix[SUFFIX_LEN - 1..]);
        if !verhoeff::is_valid(&digits) {
            return Err(invalid("check digit mismatch"));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The registered identity the id was issued under.
    pub fn identity(&self) -> &str {
        &self.0[..self.0.len() - SUFFIX_LEN]
    }

    /// Whole UTC days since the Unix epoch encoded in the id.
    pub fn days_since_epoch(&self) -> u32 {
        let start = self.0.len() - SUFFIX_LEN;
        // Segments were validated on construction.
        u32::from_str_radix(&self.0[start..start + DAY_HEX_WIDTH], 16).unwrap_or_default()
    }

    /// The internal sequence number encoded in the id.
    pub fn sequence(&self) -> u64 {
        u64::from_str_radix(self.sequence_hex(), 16).unwrap_or_default()
    }

    /// The 10-digit hex sequence segment, used as the invoice's `inno`.
    pub fn sequence_hex(&self) -> &str {
        let start = self.0.len() - SUFFIX_LEN + DAY_HEX_WIDTH;
        &self.0[start..start + SEQUENCE_HEX_WIDTH]
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InvoiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InvoiceId {
    type Error = MoadianError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InvoiceId> for String {
    fn from(id: InvoiceId) -> Self {
        id.0
    }
}

/// Deterministic tax id generator bound to one registered identity.
///
/// Generation is a pure function of `(identity, created_at, sequence)`, so a
/// retried submission can regenerate the exact same id.
#[derive(Debug, Clone)]
pub struct InvoiceIdGenerator {
    identity: String,
    numeric_identity: String,
}

impl InvoiceIdGenerator {
    /// Create a generator for a registered identity (memory id).
    ///
    /// The identity is trimmed and upper-cased; it must be 1 to
    /// [`MAX_IDENTITY_LEN`] ASCII alphanumeric characters.
    pub fn new(identity: &str) -> Result<Self, MoadianError> {
        let identity = normalize_identity(identity)?;
        let numeric_identity = numeric_identity(&identity);
        Ok(Self {
            identity,
            numeric_identity,
        })
    }

    /// The normalized identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Render the id for an invoice created at `created_at` with the caller's
    /// internal sequence number.
    pub fn generate(
        &self,
        created_at: DateTime<Utc>,
        internal_sequence: u64,
    ) -> Result<InvoiceId, MoadianError> {
        if internal_sequence > MAX_SEQUENCE {
            return Err(MoadianError::InvalidArgument(format!(
                "internal sequence {internal_sequence} exceeds {MAX_SEQUENCE}"
            )));
        }
        let days = days_since_epoch(created_at)?;

        let decimal = decimal_form(&self.numeric_identity, days, internal_sequence);
        let check = verhoeff::check_digit(&decimal).ok_or_else(|| {
            MoadianError::InvalidArgument(format!("non-numeric id material '{decimal}'"))
        })?;

        Ok(InvoiceId(format!(
            "{}{:0dw$X}{:0sw$X}{}",
            self.identity,
            days,
            internal_sequence,
            check,
            dw = DAY_HEX_WIDTH,
            sw = SEQUENCE_HEX_WIDTH,
        )))
    }

    /// Whether `id` is well-formed and was issued under this identity.
    pub fn verify(&self, id: &str) -> bool {
        InvoiceId::parse(id).is_ok_and(|parsed| parsed.identity() == self.identity)
    }
}

/// One-shot form of [`InvoiceIdGenerator::generate`].
pub fn generate_invoice_id(
    identity: &str,
    created_at: DateTime<Utc>,
    internal_sequence: u64,
) -> Result<InvoiceId, MoadianError> {
    InvoiceIdGenerator::new(identity)?.generate(created_at, internal_sequence)
}

fn normalize_identity(identity: &str) -> Result<String, MoadianError> {
    let identity = identity.trim();
    if identity.is_empty() || identity.len() > MAX_IDENTITY_LEN {
        return Err(MoadianError::InvalidArgument(format!(
            "identity must be 1-{MAX_IDENTITY_LEN} characters, got {}",
            identity.len()
        )));
    }
    if !identity.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(MoadianError::InvalidArgument(format!(
            "identity '{identity}' must be ASCII alphanumeric"
        )));
    }
    Ok(identity.to_ascii_uppercase())
}

/// Digits stay as-is, letters become their ASCII code ("A" -> "65").
fn numeric_identity(identity: &str) -> String {
    identity
        .bytes()
        .map(|b| {
            if b.is_ascii_digit() {
                (b as char).to_string()
            } else {
                b.to_string()
            }
        })
        .collect()
}

fn decimal_form(numeric_identity: &str, days: u64, sequence: u64) -> String {
    format!("{numeric_identity}{days:06}{sequence:012}")
}

fn days_since_epoch(created_at: DateTime<Utc>) -> Result<u64, MoadianError> {
    let days = created_at.timestamp().div_euclid(SECONDS_PER_DAY);
    if !(0..=MAX_DAYS).contains(&days) {
        return Err(MoadianError::InvalidArgument(format!(
            "creation time {created_at} is outside the representable date range"
        )));
    }
    Ok(days as u64)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn numeric_identity_maps_letters_to_ascii() {
        assert_eq!(numeric_identity("A11216"), "6511216");
        assert_eq!(numeric_identity("0012345678"), "0012345678");
    }

    #[test]
    fn generates_reference_id() {
        let id_gen = InvoiceIdGenerator::new("0012345678").unwrap();
        let id = id_gen.generate(at(2024, 3, 15, 0, 0), 7).unwrap();
        assert_eq!(id.as_str(), "001234567804D5500000000073");
    }

    #[test]
    fn alphanumeric_identity() {
        let id_gen = InvoiceIdGenerator::new("a11216").unwrap();
        assert_eq!(id_gen.identity(), "A11216");
        let id = id_gen.generate(at(2023, 5, 21, 10, 30), 1).unwrap();
        assert_eq!(id.as_str(), "A1121604C2A00000000010");
    }

    #[test]
    fn time_of_day_does_not_matter() {
        let id_gen = InvoiceIdGenerator::new("0012345678").unwrap();
        let morning = id_gen.generate(at(2024, 3, 15, 0, 0), 7).unwrap();
        let night = id_gen
            .generate(Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap(), 7)
            .unwrap();
        assert_eq!(morning, night);
    }

    #[test]
    fn largest_sequence_fits() {
        let id_gen = InvoiceIdGenerator::new("A11216").unwrap();
        let id = id_gen.generate(at(2023, 5, 21, 10, 30), MAX_SEQUENCE).unwrap();
        assert_eq!(id.as_str(), "A1121604C2AE8D4A50FFF9");
        assert_eq!(id.sequence(), MAX_SEQUENCE);
    }

    #[test]
    fn rejects_out_of_range_sequence() {
        let id_gen = InvoiceIdGenerator::new("A11216").unwrap();
        let err = id_gen
            .generate(at(2024, 1, 1, 0, 0), MAX_SEQUENCE + 1)
            .unwrap_err();
        assert!(matches!(err, MoadianError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_pre_epoch_dates() {
        let id_gen = InvoiceIdGenerator::new("A11216").unwrap();
        let err = id_gen.generate(at(1969, 12, 31, 23, 0), 1).unwrap_err();
        assert!(matches!(err, MoadianError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_malformed_identity() {
        assert!(InvoiceIdGenerator::new("").is_err());
        assert!(InvoiceIdGenerator::new("   ").is_err());
        assert!(InvoiceIdGenerator::new("AB-123").is_err());
        assert!(InvoiceIdGenerator::new("ØRE123").is_err());
        assert!(InvoiceIdGenerator::new("12345678901234567").is_err());
    }

    #[test]
    fn segments_round_trip() {
        let id = InvoiceId::parse("001234567804D5500000000073").unwrap();
        assert_eq!(id.identity(), "0012345678");
        assert_eq!(id.days_since_epoch(), 19_797);
        assert_eq!(id.sequence(), 7);
        assert_eq!(id.sequence_hex(), "0000000007");
    }

    #[test]
    fn parse_rejects_bad_check_digit() {
        assert!(InvoiceId::parse("001234567804D5500000000074").is_err());
        assert!(InvoiceId::parse("001234567804d5500000000073").is_err());
        assert!(InvoiceId::parse("04D5500000000073").is_err());
        assert!(InvoiceId::parse(" 001234567804D5500000000073").is_err());
    }

    #[test]
    fn verify_binds_identity() {
        let ours = InvoiceIdGenerator::new("0012345678").unwrap();
        let theirs = InvoiceIdGenerator::new("A11216").unwrap();
        let id = ours.generate(at(2024, 3, 15, 0, 0), 7).unwrap();
        assert!(ours.verify(id.as_str()));
        assert!(!theirs.verify(id.as_str()));
    }

    #[test]
    fn serde_validates() {
        let json = serde_json::to_string(&InvoiceId::parse("A1121604C2A00000000010").unwrap())
            .unwrap();
        assert_eq!(json, "\"A1121604C2A00000000010\"");
        assert!(serde_json::from_str::<InvoiceId>("\"A1121604C2A00000000011\"").is_err());
    }
}
