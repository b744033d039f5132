use crate::models::{
    ClassifiedUser, NotificationRequest, PasswordStatus, Reason, UserRecord,
};

/// Reasons cover every failing check regardless of which rule set the
/// status, so a `Strong` user may still carry some.
pub fn classify(user: &UserRecord) -> ClassifiedUser {
    ClassifiedUser {
        user: user.clone(),
        password_status: password_status(user),
        reasons: reasons(user),
    }
}

pub fn classify_all(users: &[UserRecord]) -> Vec<ClassifiedUser> {
    users.iter().map(classify).collect()
}

pub fn password_status(user: &UserRecord) -> PasswordStatus {
    if user.common_password {
        PasswordStatus::Common
    } else if !user.length_ok || !user.has_upper || !user.has_digit {
        PasswordStatus::Weak
    } else {
        PasswordStatus::Strong
    }
}

pub fn reasons(user: &UserRecord) -> Vec<Reason> {
    let checks = [
        (user.common_password, Reason::CommonPassword),
        (user.used_personal_info, Reason::UsesPersonalInfo),
        (!user.length_ok, Reason::TooShort),
        (!user.has_upper, Reason::NoUppercase),
        (!user.has_digit, Reason::NoDigit),
        (!user.has_special, Reason::NoSpecialCharacter),
    ];

    checks
        .into_iter()
        .filter(|(failing, _)| *failing)
        .map(|(_, reason)| reason)
        .collect()
}

pub fn notification_for(user: &ClassifiedUser) -> Option<NotificationRequest> {
    if user.password_status == PasswordStatus::Strong {
        return None;
    }

    Some(NotificationRequest {
        email: user.user.email.clone(),
        reason: user.reason_summary(),
    })
}

pub fn search_users<'a>(users: &'a [ClassifiedUser], term: &str) -> Vec<&'a ClassifiedUser> {
    let needle = term.trim().to_lowercase();
    users
        .iter()
        .filter(|classified| {
            needle.is_empty()
                || classified.user.fullname.to_lowercase().contains(&needle)
                || classified.user.email.to_lowercase().contains(&needle)
                || classified
                    .user
                    .department_key()
                    .to_lowercase()
                    .contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strong_user() -> UserRecord {
        UserRecord {
            fullname: "Avery Lee".to_string(),
            email: "avery@example.com".to_string(),
            phone: "5550101".to_string(),
            department: Some("HR".to_string()),
            length_ok: true,
            has_upper: true,
            has_lower: true,
            has_digit: true,
            has_special: true,
            common_password: false,
            used_personal_info: false,
        }
    }

    fn user_strategy() -> impl Strategy<Value = UserRecord> {
        (
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(
                |(
                    length_ok,
                    has_upper,
                    has_lower,
                    has_digit,
                    has_special,
                    common_password,
                    used_personal_info,
                )| UserRecord {
                    length_ok,
                    has_upper,
                    has_lower,
                    has_digit,
                    has_special,
                    common_password,
                    used_personal_info,
                    ..strong_user()
                },
            )
    }

    #[test]
    fn clean_password_is_strong_without_reasons() {
        let classified = classify(&strong_user());
        assert_eq!(classified.password_status, PasswordStatus::Strong);
        assert!(classified.reasons.is_empty());
        assert!(notification_for(&classified).is_none());
    }

    #[test]
    fn missing_special_character_stays_strong_with_reason() {
        let user = UserRecord {
            has_special: false,
            ..strong_user()
        };
        let classified = classify(&user);
        assert_eq!(classified.password_status, PasswordStatus::Strong);
        assert_eq!(classified.reasons, vec![Reason::NoSpecialCharacter]);
    }

    #[test]
    fn personal_info_alone_does_not_downgrade() {
        let user = UserRecord {
            used_personal_info: true,
            ..strong_user()
        };
        let classified = classify(&user);
        assert_eq!(classified.password_status, PasswordStatus::Strong);
        assert_eq!(classified.reasons, vec![Reason::UsesPersonalInfo]);
    }

    #[test]
    fn common_password_wins_and_lists_every_failure() {
        let user = UserRecord {
            common_password: true,
            used_personal_info: true,
            length_ok: false,
            has_upper: false,
            has_digit: false,
            has_special: false,
            ..strong_user()
        };
        let classified = classify(&user);
        assert_eq!(classified.password_status, PasswordStatus::Common);
        assert_eq!(
            classified.reason_summary(),
            "Common password, Uses personal info, Too short, No uppercase letter, No digit, No special character"
        );
    }

    #[test]
    fn lowercase_flag_never_matters() {
        let user = UserRecord {
            has_lower: false,
            ..strong_user()
        };
        let classified = classify(&user);
        assert_eq!(classified.password_status, PasswordStatus::Strong);
        assert!(classified.reasons.is_empty());
    }

    #[test]
    fn default_record_is_weak() {
        let classified = classify(&UserRecord::default());
        assert_eq!(classified.password_status, PasswordStatus::Weak);
        assert_eq!(
            classified.reasons,
            vec![
                Reason::TooShort,
                Reason::NoUppercase,
                Reason::NoDigit,
                Reason::NoSpecialCharacter
            ]
        );
    }

    #[test]
    fn notification_carries_joined_reasons() {
        let user = UserRecord {
            has_digit: false,
            has_special: false,
            ..strong_user()
        };
        let request = notification_for(&classify(&user)).unwrap();
        assert_eq!(request.email, "avery@example.com");
        assert_eq!(request.reason, "No digit, No special character");
    }

    #[test]
    fn search_matches_name_email_and_department() {
        let users = classify_all(&[
            strong_user(),
            UserRecord {
                fullname: "Jules Moreno".to_string(),
                email: "jules@example.com".to_string(),
                department: None,
                ..strong_user()
            },
        ]);

        assert_eq!(search_users(&users, "AVERY").len(), 1);
        assert_eq!(search_users(&users, "jules@").len(), 1);
        assert_eq!(search_users(&users, "unknown").len(), 1);
        assert_eq!(search_users(&users, "example.com").len(), 2);
        assert_eq!(search_users(&users, "  ").len(), 2);
        assert!(search_users(&users, "finance").is_empty());
    }

    proptest! {
        #[test]
        fn empty_reasons_imply_strong(user in user_strategy()) {
            let classified = classify(&user);
            if classified.reasons.is_empty() {
                prop_assert_eq!(classified.password_status, PasswordStatus::Strong);
            }
        }

        #[test]
        fn common_password_always_common(user in user_strategy()) {
            let user = UserRecord { common_password: true, ..user };
            prop_assert_eq!(classify(&user).password_status, PasswordStatus::Common);
        }

        #[test]
        fn failed_shape_check_is_weak(user in user_strategy()) {
            let classified = classify(&user);
            if !user.common_password && (!user.length_ok || !user.has_upper || !user.has_digit) {
                prop_assert_eq!(classified.password_status, PasswordStatus::Weak);
            }
        }

        #[test]
        fn reasons_are_ordered_and_unique(user in user_strategy()) {
            let reasons = classify(&user).reasons;
            prop_assert!(reasons.windows(2).all(|pair| pair[0] < pair[1]));
        }

        #[test]
        fn only_non_strong_users_get_notifications(user in user_strategy()) {
            let classified = classify(&user);
            prop_assert_eq!(
                notification_for(&classified).is_none(),
                classified.password_status == PasswordStatus::Strong
            );
        }
    }
}
