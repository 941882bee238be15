use crate::error::VerigeniusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Human-facing student matricule, format `DDDD L-L` (four digits, a space,
/// one uppercase letter, a hyphen, one uppercase letter). Immutable once
/// assigned and unique across all records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(raw: impl Into<String>) -> Result<Self, VerigeniusError> {
        let raw = raw.into();
        if is_valid_external_id(&raw) {
            Ok(Self(raw))
        } else {
            Err(VerigeniusError::InvalidExternalId(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = VerigeniusError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ExternalId> for String {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

/// Structural check for the matricule format `DDDD L-L`.
pub fn is_valid_external_id(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 8
        && bytes[..4].iter().all(|b| b.is_ascii_digit())
        && bytes[4] == b' '
        && bytes[5].is_ascii_uppercase()
        && bytes[6] == b'-'
        && bytes[7].is_ascii_uppercase()
}

/// Academic year codes. Closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    L1,
    L2,
    L3,
    M1,
    M2,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::M1 => "M1",
            Self::M2 => "M2",
        }
    }
}

impl FromStr for Level {
    type Err = VerigeniusError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "L1" => Ok(Self::L1),
            "L2" => Ok(Self::L2),
            "L3" => Ok(Self::L3),
            "M1" => Ok(Self::M1),
            "M2" => Ok(Self::M2),
            other => Err(VerigeniusError::UnknownLevel(other.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Program codes. Closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldOfStudy {
    #[serde(rename = "IG")]
    Ig,
    #[serde(rename = "SR")]
    Sr,
    #[serde(rename = "GE")]
    Ge,
    #[serde(rename = "DR")]
    Dr,
}

impl FieldOfStudy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ig => "IG",
            Self::Sr => "SR",
            Self::Ge => "GE",
            Self::Dr => "DR",
        }
    }
}

impl FromStr for FieldOfStudy {
    type Err = VerigeniusError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "IG" => Ok(Self::Ig),
            "SR" => Ok(Self::Sr),
            "GE" => Ok(Self::Ge),
            "DR" => Ok(Self::Dr),
            other => Err(VerigeniusError::UnknownFieldOfStudy(other.to_string())),
        }
    }
}

impl fmt::Display for FieldOfStudy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enrollment/payment status of a stored record.
///
/// The set of recognized values is closed, but unrecognized stored values are
/// preserved verbatim as [`EnrollmentStatus::Unknown`] so the status gate can
/// fail closed instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnrollmentStatus {
    FullyPaid,
    PartiallyPaid,
    PendingPayment,
    Inactive,
    Unknown(String),
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::FullyPaid => "fully_paid",
            Self::PartiallyPaid => "partially_paid",
            Self::PendingPayment => "pending_payment",
            Self::Inactive => "inactive",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for EnrollmentStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "fully_paid" => Self::FullyPaid,
            "partially_paid" => Self::PartiallyPaid,
            "pending_payment" => Self::PendingPayment,
            "inactive" => Self::Inactive,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<EnrollmentStatus> for String {
    fn from(status: EnrollmentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class assignment bucket, format `LEVEL-FIELD-GROUP` (e.g. `L3-IG-G1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassAssignment {
    level: Level,
    field: FieldOfStudy,
    group: String,
}

impl ClassAssignment {
    pub fn parse(raw: &str) -> Result<Self, VerigeniusError> {
        let invalid = || VerigeniusError::InvalidClassAssignment(raw.to_string());

        let mut parts = raw.splitn(3, '-');
        let level = parts.next().ok_or_else(invalid)?;
        let field = parts.next().ok_or_else(invalid)?;
        let group = parts.next().ok_or_else(invalid)?;

        if group.is_empty() || !group.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        Ok(Self {
            level: level.parse().map_err(|_| invalid())?,
            field: field.parse().map_err(|_| invalid())?,
            group: group.to_string(),
        })
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn field(&self) -> FieldOfStudy {
        self.field
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

impl fmt::Display for ClassAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.level, self.field, self.group)
    }
}

impl TryFrom<String> for ClassAssignment {
    type Error = VerigeniusError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<ClassAssignment> for String {
    fn from(class: ClassAssignment) -> Self {
        class.to_string()
    }
}

/// Stored student record. Owned by the record store; the validation engine
/// only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    /// Store-assigned opaque id. Never exposed by the validation response.
    pub record_id: String,
    #[serde(rename = "studentId")]
    pub external_id: ExternalId,
    pub first_name: String,
    pub last_name: String,
    pub level: Level,
    pub field_of_study: FieldOfStudy,
    pub status: EnrollmentStatus,
    #[serde(rename = "classId")]
    pub class_assignment: ClassAssignment,
}

/// Caller-supplied identity claim. Unauthenticated; every field is checked
/// against the stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Public projection of a validated record. Carries everything the caller may
/// see; the store-internal `record_id` is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student_id: ExternalId,
    pub first_name: String,
    pub last_name: String,
    pub level: Level,
    pub field_of_study: FieldOfStudy,
    pub status: EnrollmentStatus,
    pub class_id: ClassAssignment,
}

impl From<&StudentRecord> for StudentProfile {
    fn from(record: &StudentRecord) -> Self {
        Self {
            student_id: record.external_id.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            level: record.level,
            field_of_study: record.field_of_study,
            status: record.status.clone(),
            class_id: record.class_assignment.clone(),
        }
    }
}

/// Canonical storage form of a first name: title-case each word, keeping
/// space, hyphen, and apostrophe separators. Applied at write time only.
pub fn canonical_first_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut at_word_start = true;
    for ch in raw.trim().chars() {
        if ch == ' ' || ch == '-' || ch == '\'' {
            out.push(ch);
            at_word_start = true;
        } else if at_word_start {
            out.extend(ch.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Canonical storage form of a last name: upper-case. Applied at write time
/// only.
pub fn canonical_last_name(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_matricules() {
        for raw in ["1814 H-F", "0000 A-Z", "9999 Q-Q"] {
            assert!(is_valid_external_id(raw), "{raw} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_matricules() {
        for raw in [
            "bad-format",
            "1814 h-F",
            "1814 H_F",
            "181 H-F",
            "18145 H-F",
            "1814  H-F",
            "1814 H-",
            "",
        ] {
            assert!(!is_valid_external_id(raw), "{raw} should be invalid");
            assert!(ExternalId::new(raw).is_err());
        }
    }

    #[test]
    fn class_assignment_round_trips_through_display() {
        let class = ClassAssignment::parse("L3-IG-G1").unwrap();
        assert_eq!(class.level(), Level::L3);
        assert_eq!(class.field(), FieldOfStudy::Ig);
        assert_eq!(class.group(), "G1");
        assert_eq!(class.to_string(), "L3-IG-G1");
    }

    #[test]
    fn class_assignment_rejects_unknown_codes() {
        assert!(ClassAssignment::parse("L9-IG-G1").is_err());
        assert!(ClassAssignment::parse("L3-XX-G1").is_err());
        assert!(ClassAssignment::parse("L3-IG-").is_err());
        assert!(ClassAssignment::parse("L3-IG").is_err());
    }

    #[test]
    fn unknown_status_is_preserved_verbatim() {
        let status = EnrollmentStatus::from("suspended".to_string());
        assert_eq!(status, EnrollmentStatus::Unknown("suspended".to_string()));
        assert_eq!(status.as_str(), "suspended");
        assert!(!status.is_known());
    }

    #[test]
    fn status_serde_uses_snake_case_strings() {
        let json = serde_json::to_string(&EnrollmentStatus::FullyPaid).unwrap();
        assert_eq!(json, "\"fully_paid\"");
        let back: EnrollmentStatus = serde_json::from_str("\"partially_paid\"").unwrap();
        assert_eq!(back, EnrollmentStatus::PartiallyPaid);
    }

    #[test]
    fn canonicalizes_names_for_storage() {
        assert_eq!(canonical_first_name("irinah"), "Irinah");
        assert_eq!(canonical_first_name("jean-pierre  "), "Jean-Pierre");
        assert_eq!(canonical_first_name("MARIE claire"), "Marie Claire");
        assert_eq!(canonical_last_name("raoel"), "RAOEL");
        assert_eq!(canonical_last_name(" rakoto "), "RAKOTO");
    }

    #[test]
    fn student_record_uses_wire_field_names() {
        let record = StudentRecord {
            record_id: "doc-1".to_string(),
            external_id: ExternalId::new("1814 H-F").unwrap(),
            first_name: "Irinah".to_string(),
            last_name: "RAOEL".to_string(),
            level: Level::L3,
            field_of_study: FieldOfStudy::Ig,
            status: EnrollmentStatus::FullyPaid,
            class_assignment: ClassAssignment::parse("L3-IG-G1").unwrap(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["studentId"], "1814 H-F");
        assert_eq!(value["classId"], "L3-IG-G1");
        assert_eq!(value["status"], "fully_paid");
        assert_eq!(value["fieldOfStudy"], "IG");
        assert_eq!(value["recordId"], "doc-1");
    }
}
