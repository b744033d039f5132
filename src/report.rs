use std::fmt::Write;

use serde::Serialize;

use crate::aggregate::{self, Aggregate};
use crate::models::{
    AuditSnapshot, ClassifiedUser, LoginLogEntry, NotificationRequest, PasswordStatus,
};
use crate::risk;

pub const RECENT_LOGIN_LIMIT: usize = 5;

/// Everything the rendering layer needs for one dashboard load.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub users: Vec<ClassifiedUser>,
    pub recent_logins: Vec<LoginLogEntry>,
    #[serde(flatten)]
    pub aggregate: Aggregate,
}

impl DashboardData {
    pub fn from_snapshot(snapshot: &AuditSnapshot) -> Self {
        let users = risk::classify_all(&snapshot.users);
        let aggregate = aggregate::aggregate_classified(&users, &snapshot.logs);
        Self {
            recent_logins: aggregate::recent_logins(&snapshot.logs, RECENT_LOGIN_LIMIT),
            users,
            aggregate,
        }
    }

    pub fn notifications(&self) -> Vec<NotificationRequest> {
        self.users
            .iter()
            .filter_map(risk::notification_for)
            .collect()
    }

    /// Non-strong users, common passwords first.
    pub fn at_risk(&self) -> Vec<&ClassifiedUser> {
        let mut users: Vec<_> = self
            .users
            .iter()
            .filter(|user| user.password_status != PasswordStatus::Strong)
            .collect();
        users.sort_by_key(|user| {
            (
                user.password_status != PasswordStatus::Common,
                std::cmp::Reverse(user.reasons.len()),
            )
        });
        users
    }
}

pub fn build_report(scope: Option<&str>, dashboard: &DashboardData) -> String {
    let stats = &dashboard.aggregate.summary;
    let composition = &dashboard.aggregate.risk;
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all users");

    let _ = writeln!(output, "# Password Audit Report");
    let _ = writeln!(output, "Generated for {}", scope_label);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Total users: {}", stats.total_users);
    let _ = writeln!(output, "- Strong passwords: {}", stats.strong_passwords);
    let _ = writeln!(output, "- Weak passwords: {}", stats.weak_passwords);
    let _ = writeln!(output, "- Common passwords: {}", stats.common_passwords);
    let _ = writeln!(output, "- Overall score: {}%", stats.overall_score);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Composition");
    let _ = writeln!(
        output,
        "- Common password: {}%",
        composition.common_password_pct
    );
    let _ = writeln!(output, "- Personal info: {}%", composition.personal_info_pct);
    let _ = writeln!(output, "- Weak password: {}%", composition.weak_pct);
    let _ = writeln!(output, "- Average risk: {}%", composition.average_risk_pct);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Departments");

    if dashboard.aggregate.departments.is_empty() {
        let _ = writeln!(output, "No users in this snapshot.");
    } else {
        for (department, counts) in &dashboard.aggregate.departments {
            let _ = writeln!(
                output,
                "- {}: {} weak, {} common, {} using personal info",
                department, counts.weak, counts.common, counts.personal_info_used
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Users Needing Attention");

    let at_risk = dashboard.at_risk();
    if at_risk.is_empty() {
        let _ = writeln!(output, "Every password passed the audit.");
    } else {
        for user in at_risk.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {}: {}",
                user.user.fullname,
                user.user.email,
                user.user.department_key(),
                user.password_status,
                user.reason_summary()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Login Activity");

    if dashboard.aggregate.daily_logins.is_empty() {
        let _ = writeln!(output, "No login activity recorded.");
    } else {
        for day in &dashboard.aggregate.daily_logins {
            let _ = writeln!(
                output,
                "- {}: {} successful, {} failed",
                day.label(),
                day.success_count,
                day.failed_count
            );
        }
    }

    let quality = &dashboard.aggregate.data_quality;
    if quality.unparsable_timestamps > 0 || quality.unrecognized_statuses > 0 {
        let _ = writeln!(
            output,
            "_{} entries skipped for unreadable timestamps, {} with an unrecognized status counted as failed._",
            quality.unparsable_timestamps, quality.unrecognized_statuses
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Logins");

    if dashboard.recent_logins.is_empty() {
        let _ = writeln!(output, "No login activity recorded.");
    } else {
        for entry in &dashboard.recent_logins {
            let _ = writeln!(
                output,
                "- {} {} at {} from {}",
                entry.email, entry.status, entry.timestamp, entry.ip
            );
        }
    }

    output
}
