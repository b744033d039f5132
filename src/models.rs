use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

pub const UNKNOWN_DEPARTMENT: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fullname: String,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub length_ok: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_upper: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_lower: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_digit: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_special: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub common_password: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub used_personal_info: bool,
}

impl UserRecord {
    pub fn department_key(&self) -> &str {
        match self.department.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => UNKNOWN_DEPARTMENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PasswordStatus {
    Strong,
    Weak,
    Common,
}

impl fmt::Display for PasswordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PasswordStatus::Strong => "Strong",
            PasswordStatus::Weak => "Weak",
            PasswordStatus::Common => "Common",
        };
        f.write_str(label)
    }
}

/// A single failing check. Variant order is the order reasons are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Reason {
    #[serde(rename = "Common password")]
    CommonPassword,
    #[serde(rename = "Uses personal info")]
    UsesPersonalInfo,
    #[serde(rename = "Too short")]
    TooShort,
    #[serde(rename = "No uppercase letter")]
    NoUppercase,
    #[serde(rename = "No digit")]
    NoDigit,
    #[serde(rename = "No special character")]
    NoSpecialCharacter,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::CommonPassword => "Common password",
            Reason::UsesPersonalInfo => "Uses personal info",
            Reason::TooShort => "Too short",
            Reason::NoUppercase => "No uppercase letter",
            Reason::NoDigit => "No digit",
            Reason::NoSpecialCharacter => "No special character",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedUser {
    #[serde(flatten)]
    pub user: UserRecord,
    pub password_status: PasswordStatus,
    pub reasons: Vec<Reason>,
}

impl ClassifiedUser {
    /// Comma-joined reasons, or `N/A` when nothing failed.
    pub fn reason_summary(&self) -> String {
        if self.reasons.is_empty() {
            return "N/A".to_string();
        }
        self.reasons
            .iter()
            .map(Reason::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub email: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoginStatus {
    Success,
    Failed,
    Other(String),
}

impl LoginStatus {
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("success") {
            LoginStatus::Success
        } else if trimmed.eq_ignore_ascii_case("failed") {
            LoginStatus::Failed
        } else {
            LoginStatus::Other(trimmed.to_string())
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, LoginStatus::Other(_))
    }
}

impl From<String> for LoginStatus {
    fn from(value: String) -> Self {
        LoginStatus::from_label(&value)
    }
}

impl From<LoginStatus> for String {
    fn from(value: LoginStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginStatus::Success => f.write_str("Success"),
            LoginStatus::Failed => f.write_str("Failed"),
            LoginStatus::Other(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginLogEntry {
    pub email: String,
    pub timestamp: String,
    pub status: LoginStatus,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ip: String,
}

impl LoginLogEntry {
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Keeps the wall-clock time as written, offset or not, so the calendar day
/// is the one the event was recorded on.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.naive_local());
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSnapshot {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub logs: Vec<LoginLogEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_users: usize,
    pub strong_passwords: usize,
    pub weak_passwords: usize,
    pub common_passwords: usize,
    pub overall_score: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentCounts {
    pub weak: usize,
    pub common: usize,
    pub personal_info_used: usize,
}

pub type DepartmentBreakdown = BTreeMap<String, DepartmentCounts>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLoginCount {
    pub date: NaiveDate,
    pub success_count: usize,
    pub failed_count: usize,
}

impl DailyLoginCount {
    /// Chart axis label, e.g. `Jun 19`.
    pub fn label(&self) -> String {
        self.date.format("%b %-d").to_string()
    }
}

pub type DailyLoginSeries = Vec<DailyLoginCount>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskComposition {
    pub total_users: usize,
    pub common_password_users: usize,
    pub personal_info_users: usize,
    pub weak_users: usize,
    pub common_password_pct: u32,
    pub personal_info_pct: u32,
    pub weak_pct: u32,
    pub average_risk_pct: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaknessBreakdown {
    pub missing_uppercase: usize,
    pub missing_digit: usize,
    pub common_password: usize,
    pub used_personal_info: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    pub unparsable_timestamps: usize,
    pub unrecognized_statuses: usize,
}

pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|name| !name.trim().is_empty()))
}

/// Accepts booleans, numbers and the usual truthy spellings. Anything else,
/// including unexpected types, counts as a failing flag.
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientBool)
}

struct LenientBool;

impl<'de> serde::de::Visitor<'de> for LenientBool {
    type Value = bool;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean flag")
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<bool, E> {
        Ok(v)
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<bool, E> {
        Ok(v != 0)
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<bool, E> {
        Ok(v != 0)
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<bool, E> {
        Ok(v != 0.0)
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<bool, E> {
        Ok(matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ))
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<bool, E> {
        Ok(false)
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<bool, E> {
        Ok(false)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientBool)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<bool, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        while seq
            .next_element::<serde::de::IgnoredAny>()?
            .is_some()
        {}
        Ok(false)
    }

    fn visit_map<A>(self, mut map: A) -> Result<bool, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        while map
            .next_entry::<serde::de::IgnoredAny, serde::de::IgnoredAny>()?
            .is_some()
        {}
        Ok(false)
    }
}
