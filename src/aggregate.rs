use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{
    ClassifiedUser, DailyLoginCount, DailyLoginSeries, DataQuality, DepartmentBreakdown,
    LoginLogEntry, LoginStatus, PasswordStatus, RiskComposition, SummaryStats, UserRecord,
    WeaknessBreakdown,
};
use crate::risk;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub summary: SummaryStats,
    pub departments: DepartmentBreakdown,
    pub daily_logins: DailyLoginSeries,
    pub risk: RiskComposition,
    pub weaknesses: WeaknessBreakdown,
    pub data_quality: DataQuality,
}

pub fn aggregate(users: &[UserRecord], logs: &[LoginLogEntry]) -> Aggregate {
    let classified = risk::classify_all(users);
    aggregate_classified(&classified, logs)
}

pub fn aggregate_classified(classified: &[ClassifiedUser], logs: &[LoginLogEntry]) -> Aggregate {
    let (daily_logins, unparsable_timestamps) = daily_logins(logs);
    let unrecognized_statuses = logs
        .iter()
        .filter(|entry| !entry.status.is_recognized())
        .count();

    Aggregate {
        summary: summarize(classified),
        departments: by_department(classified),
        daily_logins,
        risk: risk_composition(classified),
        weaknesses: weaknesses(classified),
        data_quality: DataQuality {
            unparsable_timestamps,
            unrecognized_statuses,
        },
    }
}

pub fn summarize(classified: &[ClassifiedUser]) -> SummaryStats {
    let mut stats = SummaryStats {
        total_users: classified.len(),
        ..SummaryStats::default()
    };

    for user in classified {
        match user.password_status {
            PasswordStatus::Strong => stats.strong_passwords += 1,
            PasswordStatus::Weak => stats.weak_passwords += 1,
            PasswordStatus::Common => stats.common_passwords += 1,
        }
    }

    stats.overall_score = percent(stats.strong_passwords, stats.total_users);
    stats
}

pub fn by_department(classified: &[ClassifiedUser]) -> DepartmentBreakdown {
    let mut breakdown = DepartmentBreakdown::new();

    for user in classified {
        let entry = breakdown
            .entry(user.user.department_key().to_string())
            .or_default();
        if user.password_status == PasswordStatus::Weak {
            entry.weak += 1;
        }
        if user.password_status == PasswordStatus::Common {
            entry.common += 1;
        }
        if user.user.used_personal_info {
            entry.personal_info_used += 1;
        }
    }

    breakdown
}

/// Groups logins by calendar day in ascending order. Only `Success` counts as
/// a success; every other status lands in the failed bucket. Returns the
/// series and the number of entries dropped for an unparsable timestamp.
pub fn daily_logins(logs: &[LoginLogEntry]) -> (DailyLoginSeries, usize) {
    let mut timed: Vec<_> = logs
        .iter()
        .filter_map(|entry| entry.parsed_timestamp().map(|at| (at, &entry.status)))
        .collect();
    let skipped = logs.len() - timed.len();
    timed.sort_by_key(|(at, _)| *at);

    let mut series: DailyLoginSeries = Vec::new();
    for (at, status) in timed {
        let date = at.date();
        if series.last().map(|day| day.date) != Some(date) {
            series.push(DailyLoginCount {
                date,
                success_count: 0,
                failed_count: 0,
            });
        }

        if let Some(day) = series.last_mut() {
            if *status == LoginStatus::Success {
                day.success_count += 1;
            } else {
                day.failed_count += 1;
            }
        }
    }

    (series, skipped)
}

pub fn risk_composition(classified: &[ClassifiedUser]) -> RiskComposition {
    let common = classified
        .iter()
        .filter(|user| user.user.common_password)
        .count();
    let personal = classified
        .iter()
        .filter(|user| user.user.used_personal_info)
        .count();
    let weak = classified
        .iter()
        .filter(|user| user.password_status == PasswordStatus::Weak)
        .count();

    composition_from_counts(classified.len(), common, personal, weak)
}

pub fn composition_from_counts(
    total_users: usize,
    common_password_users: usize,
    personal_info_users: usize,
    weak_users: usize,
) -> RiskComposition {
    let common_password_pct = percent(common_password_users, total_users);
    let personal_info_pct = percent(personal_info_users, total_users);
    let weak_pct = percent(weak_users, total_users);
    let sum = common_password_pct + personal_info_pct + weak_pct;

    RiskComposition {
        total_users,
        common_password_users,
        personal_info_users,
        weak_users,
        common_password_pct,
        personal_info_pct,
        weak_pct,
        average_risk_pct: (2 * sum + 3) / 6,
    }
}

pub fn weaknesses(classified: &[ClassifiedUser]) -> WeaknessBreakdown {
    let mut counts = WeaknessBreakdown::default();
    for user in classified {
        let flags = &user.user;
        counts.missing_uppercase += usize::from(!flags.has_upper);
        counts.missing_digit += usize::from(!flags.has_digit);
        counts.common_password += usize::from(flags.common_password);
        counts.used_personal_info += usize::from(flags.used_personal_info);
    }
    counts
}

// Undated entries sort last.
pub fn recent_logins(logs: &[LoginLogEntry], limit: usize) -> Vec<LoginLogEntry> {
    let mut sorted = logs.to_vec();
    sorted.sort_by_cached_key(|entry| Reverse(entry.parsed_timestamp()));
    sorted.truncate(limit);
    sorted
}

/// Rounds half up.
pub fn percent(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * count + total) / (2 * total)) as u32
}

impl Aggregate {
    /// Combines aggregates built over disjoint partitions of a snapshot.
    /// Counts add up and every percentage is re-derived from the sums.
    pub fn merge(self, other: Aggregate) -> Aggregate {
        let mut summary = SummaryStats {
            total_users: self.summary.total_users + other.summary.total_users,
            strong_passwords: self.summary.strong_passwords + other.summary.strong_passwords,
            weak_passwords: self.summary.weak_passwords + other.summary.weak_passwords,
            common_passwords: self.summary.common_passwords + other.summary.common_passwords,
            overall_score: 0,
        };
        summary.overall_score = percent(summary.strong_passwords, summary.total_users);

        let mut departments = self.departments;
        for (name, counts) in other.departments {
            let entry = departments.entry(name).or_default();
            entry.weak += counts.weak;
            entry.common += counts.common;
            entry.personal_info_used += counts.personal_info_used;
        }

        let mut days: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
        for day in self.daily_logins.into_iter().chain(other.daily_logins) {
            let entry = days.entry(day.date).or_default();
            entry.0 += day.success_count;
            entry.1 += day.failed_count;
        }
        let daily_logins = days
            .into_iter()
            .map(|(date, (success_count, failed_count))| DailyLoginCount {
                date,
                success_count,
                failed_count,
            })
            .collect();

        let risk = composition_from_counts(
            self.risk.total_users + other.risk.total_users,
            self.risk.common_password_users + other.risk.common_password_users,
            self.risk.personal_info_users + other.risk.personal_info_users,
            self.risk.weak_users + other.risk.weak_users,
        );

        Aggregate {
            summary,
            departments,
            daily_logins,
            risk,
            weaknesses: WeaknessBreakdown {
                missing_uppercase: self.weaknesses.missing_uppercase
                    + other.weaknesses.missing_uppercase,
                missing_digit: self.weaknesses.missing_digit + other.weaknesses.missing_digit,
                common_password: self.weaknesses.common_password
                    + other.weaknesses.common_password,
                used_personal_info: self.weaknesses.used_personal_info
                    + other.weaknesses.used_personal_info,
            },
            data_quality: DataQuality {
                unparsable_timestamps: self.data_quality.unparsable_timestamps
                    + other.data_quality.unparsable_timestamps,
                unrecognized_statuses: self.data_quality.unrecognized_statuses
                    + other.data_quality.unrecognized_statuses,
            },
        }
    }
}
