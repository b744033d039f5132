use std::collections::HashMap;
use std::path::Path;

use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::fixtures::SnapshotBuilder;
use crate::loader;
use crate::models::{AuditSnapshot, LoginLogEntry, LoginStatus, UserRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub users: usize,
    pub logs: usize,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(
    pool: &PgPool,
    seed: u64,
    users: usize,
    logs: usize,
) -> anyhow::Result<ImportCounts> {
    let snapshot = SnapshotBuilder::new(seed).users(users).logs(logs).build();
    import_snapshot(pool, &snapshot).await
}

pub async fn import_directory(pool: &PgPool, dir: &Path) -> anyhow::Result<ImportCounts> {
    let snapshot = loader::load_directory(dir)?;
    import_snapshot(pool, &snapshot).await
}

/// Upserts users on email and inserts login events once per source key, so
/// re-importing the same files is a no-op.
pub async fn import_snapshot(
    pool: &PgPool,
    snapshot: &AuditSnapshot,
) -> anyhow::Result<ImportCounts> {
    let mut tx = pool.begin().await?;
    let mut counts = ImportCounts::default();

    for user in &snapshot.users {
        sqlx::query(
            r#"
            INSERT INTO password_audit.users
            (id, fullname, email, phone, department, length_ok, has_upper, has_lower,
             has_digit, has_special, common_password, used_personal_info)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (email) DO UPDATE
            SET fullname = EXCLUDED.fullname,
                phone = EXCLUDED.phone,
                department = EXCLUDED.department,
                length_ok = EXCLUDED.length_ok,
                has_upper = EXCLUDED.has_upper,
                has_lower = EXCLUDED.has_lower,
                has_digit = EXCLUDED.has_digit,
                has_special = EXCLUDED.has_special,
                common_password = EXCLUDED.common_password,
                used_personal_info = EXCLUDED.used_personal_info,
                updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.fullname)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.department.as_deref())
        .bind(user.length_ok)
        .bind(user.has_upper)
        .bind(user.has_lower)
        .bind(user.has_digit)
        .bind(user.has_special)
        .bind(user.common_password)
        .bind(user.used_personal_info)
        .execute(&mut *tx)
        .await?;
        counts.users += 1;
    }

    for (entry, source_key) in snapshot.logs.iter().zip(source_keys(&snapshot.logs)) {
        let result = sqlx::query(
            r#"
            INSERT INTO password_audit.login_events
            (id, email, occurred_at, status, ip, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.email)
        .bind(&entry.timestamp)
        .bind(entry.status.to_string())
        .bind(&entry.ip)
        .bind(source_key)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            counts.logs += 1;
        }
    }

    tx.commit().await?;
    info!(users = counts.users, logs = counts.logs, "snapshot imported");
    Ok(counts)
}

pub async fn fetch_snapshot(pool: &PgPool) -> anyhow::Result<AuditSnapshot> {
    let rows = sqlx::query(
        "SELECT fullname, email, phone, department, length_ok, has_upper, has_lower, \
         has_digit, has_special, common_password, used_personal_info \
         FROM password_audit.users ORDER BY fullname, email",
    )
    .fetch_all(pool)
    .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        let flag = |name: &str| row.get::<Option<bool>, _>(name).unwrap_or(false);
        users.push(UserRecord {
            fullname: row.get("fullname"),
            email: row.get("email"),
            phone: row.get("phone"),
            department: row.get("department"),
            length_ok: flag("length_ok"),
            has_upper: flag("has_upper"),
            has_lower: flag("has_lower"),
            has_digit: flag("has_digit"),
            has_special: flag("has_special"),
            common_password: flag("common_password"),
            used_personal_info: flag("used_personal_info"),
        });
    }

    let rows = sqlx::query(
        "SELECT email, occurred_at, status, ip FROM password_audit.login_events \
         ORDER BY occurred_at DESC",
    )
    .fetch_all(pool)
    .await?;

    let logs = rows
        .into_iter()
        .map(|row| LoginLogEntry {
            email: row.get("email"),
            timestamp: row.get("occurred_at"),
            status: LoginStatus::from_label(row.get::<&str, _>("status")),
            ip: row.get("ip"),
        })
        .collect();

    Ok(AuditSnapshot { users, logs })
}

/// Stable per-entry keys; identical entries are told apart by occurrence.
fn source_keys(logs: &[LoginLogEntry]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    logs.iter()
        .map(|entry| {
            let base = format!(
                "{}|{}|{}|{}",
                entry.timestamp, entry.email, entry.status, entry.ip
            );
            let occurrence = seen.entry(base.clone()).or_insert(0);
            *occurrence += 1;
            format!("{base}#{occurrence}")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: &str, status: &str) -> LoginLogEntry {
        LoginLogEntry {
            email: "avery@example.com".to_string(),
            timestamp: timestamp.to_string(),
            status: LoginStatus::from_label(status),
            ip: "127.0.0.1".to_string(),
        }
    }

    #[test]
    fn source_keys_disambiguate_repeated_lines() {
        let logs = vec![
            entry("2025-06-23 23:25:06", "Failed"),
            entry("2025-06-23 23:25:06", "Failed"),
            entry("2025-06-23 23:25:16", "Success"),
        ];

        let keys = source_keys(&logs);
        assert_eq!(
            keys,
            vec![
                "2025-06-23 23:25:06|avery@example.com|Failed|127.0.0.1#1",
                "2025-06-23 23:25:06|avery@example.com|Failed|127.0.0.1#2",
                "2025-06-23 23:25:16|avery@example.com|Success|127.0.0.1#1",
            ]
        );
        assert_eq!(keys, source_keys(&logs));
    }
}
