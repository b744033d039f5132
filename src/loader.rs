use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    blank_as_none, lenient_bool, null_as_empty, AuditSnapshot, LoginLogEntry, LoginStatus,
    UserRecord,
};

pub const USERS_FILE: &str = "users.csv";
pub const SECURITY_FILE: &str = "user_security.csv";
pub const LOGIN_LOG_FILE: &str = "login-log.txt";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogLineError {
    #[error("line does not start with a bracketed timestamp")]
    MissingTimestamp,
    #[error("missing `LOGIN:` marker")]
    MissingLoginMarker,
    #[error("status must be a single word, got {0:?}")]
    InvalidStatus(String),
    #[error("missing `from IP:` segment")]
    MissingIp,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(default, deserialize_with = "null_as_empty")]
    fullname: String,
    email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    phone: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    department: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SecurityRow {
    email: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    length_ok: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    has_upper: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    has_lower: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    has_digit: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    has_special: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    common_password: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    used_personal_info: bool,
}

pub fn load_directory(dir: &Path) -> anyhow::Result<AuditSnapshot> {
    let users = load_users(&dir.join(USERS_FILE), &dir.join(SECURITY_FILE))?;
    let logs = read_login_log(&dir.join(LOGIN_LOG_FILE))?;
    Ok(AuditSnapshot { users, logs })
}

/// Left-joins security flags onto profiles by email. Profiles without a
/// security row keep every flag false. Short rows are accepted; absent
/// trailing columns take their defaults.
pub fn load_users(users_csv: &Path, security_csv: &Path) -> anyhow::Result<Vec<UserRecord>> {
    let mut reader = open_csv(users_csv)?;
    let mut profiles: Vec<ProfileRow> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for result in reader.deserialize::<ProfileRow>() {
        let row = result.with_context(|| format!("bad row in {}", users_csv.display()))?;
        match positions.get(&row.email) {
            Some(&index) => {
                warn!(email = %row.email, "duplicate user row, keeping the last one");
                profiles[index] = row;
            }
            None => {
                positions.insert(row.email.clone(), profiles.len());
                profiles.push(row);
            }
        }
    }

    let mut reader = open_csv(security_csv)?;
    let mut flags: HashMap<String, SecurityRow> = HashMap::new();
    for result in reader.deserialize::<SecurityRow>() {
        let row = result.with_context(|| format!("bad row in {}", security_csv.display()))?;
        if flags.contains_key(&row.email) {
            warn!(email = %row.email, "duplicate security row, keeping the last one");
        }
        flags.insert(row.email.clone(), row);
    }

    let mut missing = 0usize;
    let users = profiles
        .into_iter()
        .map(|profile| {
            let security = flags.remove(&profile.email).unwrap_or_else(|| {
                missing += 1;
                SecurityRow::default()
            });
            UserRecord {
                fullname: profile.fullname,
                email: profile.email,
                phone: profile.phone,
                department: profile.department,
                length_ok: security.length_ok,
                has_upper: security.has_upper,
                has_lower: security.has_lower,
                has_digit: security.has_digit,
                has_special: security.has_special,
                common_password: security.common_password,
                used_personal_info: security.used_personal_info,
            }
        })
        .collect::<Vec<_>>();

    if missing > 0 {
        warn!(missing, "users without security flags are treated as failing every check");
    }
    debug!(users = users.len(), "loaded user records");
    Ok(users)
}

fn open_csv(path: &Path) -> anyhow::Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

/// A missing log file means no login activity yet.
pub fn read_login_log(path: &Path) -> anyhow::Result<Vec<LoginLogEntry>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse_login_log(&contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no login log found");
            Ok(Vec::new())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Newest (last written) line first.
pub fn parse_login_log(contents: &str) -> Vec<LoginLogEntry> {
    let mut entries = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_log_line(line) {
            Ok(entry) => entries.push(entry),
            Err(error) => debug!(line = index + 1, %error, "skipping malformed login log line"),
        }
    }
    entries.reverse();
    entries
}

/// `[2025-06-23 19:13:08] SUCCESS LOGIN: user@example.com from IP: 127.0.0.1`
pub fn parse_log_line(line: &str) -> Result<LoginLogEntry, LogLineError> {
    let rest = line
        .trim()
        .strip_prefix('[')
        .ok_or(LogLineError::MissingTimestamp)?;
    let (timestamp, rest) = rest
        .split_once("] ")
        .ok_or(LogLineError::MissingTimestamp)?;
    let (status, rest) = rest
        .split_once(" LOGIN: ")
        .ok_or(LogLineError::MissingLoginMarker)?;
    if status.is_empty() || status.contains(char::is_whitespace) {
        return Err(LogLineError::InvalidStatus(status.to_string()));
    }
    let (email, ip) = rest
        .split_once(" from IP: ")
        .ok_or(LogLineError::MissingIp)?;

    Ok(LoginLogEntry {
        email: email.to_string(),
        timestamp: timestamp.to_string(),
        status: LoginStatus::from_label(&capitalize(status)),
        ip: ip.to_string(),
    })
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn load_snapshot(path: &Path) -> anyhow::Result<AuditSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid snapshot {}", path.display()))
}

pub fn write_snapshot(path: &Path, snapshot: &AuditSnapshot) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LOG: &str = "
[2025-06-23 19:13:08] SUCCESS LOGIN: test@gmail.com from IP: 127.0.0.1
[2025-06-23 23:24:04] FAILED LOGIN: test@gmail.com from IP: 127.0.0.1
this line is noise
[2025-06-26 23:40:08] WARNING LOGIN: password@gmail.com from IP: 10.0.0.7
";

    #[test]
    fn parses_log_line_fields() {
        let entry =
            parse_log_line("[2025-06-23 19:13:08] SUCCESS LOGIN: test@gmail.com from IP: 127.0.0.1")
                .unwrap();
        assert_eq!(entry.timestamp, "2025-06-23 19:13:08");
        assert_eq!(entry.status, LoginStatus::Success);
        assert_eq!(entry.email, "test@gmail.com");
        assert_eq!(entry.ip, "127.0.0.1");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(
            parse_log_line("2025-06-23 SUCCESS LOGIN: a from IP: b"),
            Err(LogLineError::MissingTimestamp)
        );
        assert_eq!(
            parse_log_line("[2025-06-23 19:13:08] SUCCESS a from IP: b"),
            Err(LogLineError::MissingLoginMarker)
        );
        assert_eq!(
            parse_log_line("[2025-06-23 19:13:08] NOT OK LOGIN: a from IP: b"),
            Err(LogLineError::InvalidStatus("NOT OK".to_string()))
        );
        assert_eq!(
            parse_log_line("[2025-06-23 19:13:08] FAILED LOGIN: a@b.com"),
            Err(LogLineError::MissingIp)
        );
    }

    #[test]
    fn log_is_returned_newest_first() {
        let entries = parse_login_log(SAMPLE_LOG);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].status, LoginStatus::Other("Warning".to_string()));
        assert_eq!(entries[1].status, LoginStatus::Failed);
        assert_eq!(entries[2].timestamp, "2025-06-23 19:13:08");
    }

    #[test]
    fn missing_log_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let logs = read_login_log(&dir.path().join(LOGIN_LOG_FILE)).unwrap();
        assert!(logs.is_empty());
    }

    #[test]
    fn directory_join_defaults_missing_flags() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(USERS_FILE),
            "fullname,email,phone,department,dob,gender,address\n\
             Avery Lee,avery@example.com,5550101,HR,1990-01-01,F,1 Main St\n\
             Jules Moreno,jules@example.com,5550102,,1991-02-02,M,2 Main St\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(SECURITY_FILE),
            "email,password,length_ok,has_upper,has_lower,has_digit,has_special,security_warning,common_password,used_personal_info\n\
             avery@example.com,$2b$12$hash,true,True,true,true,false,true,false,\n",
        )
        .unwrap();
        std::fs::write(dir.path().join(LOGIN_LOG_FILE), SAMPLE_LOG).unwrap();

        let snapshot = load_directory(dir.path()).unwrap();
        assert_eq!(snapshot.users.len(), 2);
        assert_eq!(snapshot.logs.len(), 3);

        let avery = &snapshot.users[0];
        assert_eq!(avery.department_key(), "HR");
        assert!(avery.length_ok && avery.has_upper && avery.has_digit);
        assert!(!avery.has_special);
        assert!(!avery.used_personal_info);

        let jules = &snapshot.users[1];
        assert_eq!(jules.department, None);
        assert!(!jules.length_ok && !jules.has_upper && !jules.common_password);
    }

    #[test]
    fn short_security_rows_default_trailing_flags() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(USERS_FILE),
            "fullname,email,phone,department\n\
             Avery Lee,avery@example.com,5550101,HR\n\
             Jules Moreno,jules@example.com,5550102,IT\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(SECURITY_FILE),
            "email,password,length_ok,has_upper,has_lower,has_digit,has_special,security_warning,common_password,used_personal_info\n\
             avery@example.com,hash,true,true,true,true,true,false,false,true\n\
             jules@example.com,hash,true,true,true,true,true,false\n",
        )
        .unwrap();

        let users = load_directory(dir.path()).unwrap().users;
        assert_eq!(users.len(), 2);
        assert!(users[0].used_personal_info);

        let jules = &users[1];
        assert!(jules.length_ok && jules.has_upper && jules.has_digit && jules.has_special);
        assert!(!jules.common_password);
        assert!(!jules.used_personal_info);
    }

    #[test]
    fn repeated_user_rows_collapse_onto_one_account() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(USERS_FILE),
            "fullname,email,phone,department\n\
             Avery Lee,avery@example.com,5550101,HR\n\
             Jules Moreno,jules@example.com,5550102,IT\n\
             Avery Lee,avery@example.com,5550199,Finance\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(SECURITY_FILE),
            "email,length_ok,has_upper,has_lower,has_digit,has_special,common_password,used_personal_info\n\
             avery@example.com,true,true,true,true,true,false,false\n\
             jules@example.com,true,true,true,true,true,false,false\n",
        )
        .unwrap();

        let snapshot = load_directory(dir.path()).unwrap();
        assert_eq!(snapshot.users.len(), 2);
        assert_eq!(snapshot.users[0].email, "avery@example.com");
        assert_eq!(snapshot.users[0].phone, "5550199");
        assert_eq!(snapshot.users[0].department_key(), "Finance");

        let summary = crate::aggregate::aggregate(&snapshot.users, &snapshot.logs).summary;
        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.strong_passwords, 2);
        assert_eq!(summary.weak_passwords, 0);
    }

    #[test]
    fn snapshot_file_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = AuditSnapshot {
            users: vec![UserRecord {
                email: "a@example.com".to_string(),
                department: Some("IT".to_string()),
                has_digit: true,
                ..UserRecord::default()
            }],
            logs: parse_login_log(SAMPLE_LOG),
        };

        write_snapshot(&path, &snapshot).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
    }
}
