use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::models::{AuditSnapshot, LoginLogEntry, LoginStatus, UserRecord};

const FIRST_NAMES: [&str; 8] = [
    "Avery", "Jules", "Kiara", "Noah", "Priya", "Mateo", "Hana", "Omar",
];
const LAST_NAMES: [&str; 8] = [
    "Lee", "Moreno", "Patel", "Kim", "Novak", "Silva", "Okafor", "Berg",
];
const DEPARTMENTS: [&str; 5] = ["HR", "IT", "Finance", "Sales", "Operations"];

/// Deterministic demo data for previews and tests. The same seed and sizes
/// always produce the same snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    seed: u64,
    users: usize,
    logs: usize,
    start: NaiveDateTime,
    days: i64,
}

impl SnapshotBuilder {
    pub fn new(seed: u64) -> Self {
        let start = NaiveDate::from_ymd_opt(2025, 6, 16)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .unwrap_or_default();
        Self {
            seed,
            users: 12,
            logs: 40,
            start,
            days: 7,
        }
    }

    pub fn users(mut self, count: usize) -> Self {
        self.users = count;
        self
    }

    pub fn logs(mut self, count: usize) -> Self {
        self.logs = count;
        self
    }

    pub fn window(mut self, start: NaiveDateTime, days: i64) -> Self {
        self.start = start;
        self.days = days.max(1);
        self
    }

    pub fn build(&self) -> AuditSnapshot {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let users: Vec<UserRecord> = (0..self.users)
            .map(|index| self.user(&mut rng, index))
            .collect();

        let window_minutes = self.days * 24 * 60;
        let logs = (0..self.logs)
            .filter_map(|_| {
                let user = users.choose(&mut rng)?;
                let offset = Duration::minutes(rng.gen_range(0..window_minutes));
                let status = match rng.gen_range(0..10) {
                    0..=6 => LoginStatus::Success,
                    7..=8 => LoginStatus::Failed,
                    _ => LoginStatus::Other("Warning".to_string()),
                };
                Some(LoginLogEntry {
                    email: user.email.clone(),
                    timestamp: (self.start + offset).format("%Y-%m-%d %H:%M:%S").to_string(),
                    status,
                    ip: format!("10.0.{}.{}", rng.gen_range(0..4), rng.gen_range(2..255)),
                })
            })
            .collect();

        AuditSnapshot { users, logs }
    }

    fn user(&self, rng: &mut StdRng, index: usize) -> UserRecord {
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Demo");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("User");
        let department = if rng.gen_bool(0.1) {
            None
        } else {
            DEPARTMENTS.choose(rng).map(|name| name.to_string())
        };

        UserRecord {
            fullname: format!("{first} {last}"),
            email: format!(
                "{}.{}{index}@example.com",
                first.to_lowercase(),
                last.to_lowercase()
            ),
            phone: format!("555{:04}", rng.gen_range(0..10_000)),
            department,
            length_ok: rng.gen_bool(0.8),
            has_upper: rng.gen_bool(0.75),
            has_lower: rng.gen_bool(0.95),
            has_digit: rng.gen_bool(0.7),
            has_special: rng.gen_bool(0.5),
            common_password: rng.gen_bool(0.15),
            used_personal_info: rng.gen_bool(0.2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn same_seed_same_snapshot() {
        let first = SnapshotBuilder::new(7).users(20).logs(50).build();
        let second = SnapshotBuilder::new(7).users(20).logs(50).build();
        assert_eq!(first, second);
    }

    #[test]
    fn sizes_and_keys_are_respected() {
        let snapshot = SnapshotBuilder::new(42).users(25).logs(60).build();
        assert_eq!(snapshot.users.len(), 25);
        assert_eq!(snapshot.logs.len(), 60);

        let emails: HashSet<_> = snapshot.users.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails.len(), 25);
        assert!(snapshot
            .logs
            .iter()
            .all(|log| emails.contains(log.email.as_str())));
    }

    #[test]
    fn logs_fall_inside_the_window() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let snapshot = SnapshotBuilder::new(3).window(start, 2).build();
        for log in &snapshot.logs {
            let at = log.parsed_timestamp().unwrap();
            assert!(at >= start && at < start + Duration::days(2));
        }
    }

    #[test]
    fn no_users_means_no_logs() {
        let snapshot = SnapshotBuilder::new(1).users(0).logs(10).build();
        assert!(snapshot.users.is_empty());
        assert!(snapshot.logs.is_empty());
    }
}
