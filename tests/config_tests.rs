#![allow(clippy::unwrap_used)]

use chrono::{NaiveTime, Weekday};
use referral_bot::config::{Config, ReferralTerms};
use std::env;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

// Mutex to ensure config tests run sequentially to avoid environment variable conflicts
static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "TELEGRAM_BOT_TOKEN",
    "DATABASE_URL",
    "HTTP_PORT",
    "TIMEZONE",
    "ADMIN_IDS",
    "APPROVED_CHAT_IDS",
    "BROADCAST_RETRY_COUNT",
    "BROADCAST_RETRY_DELAY",
    "ANNOUNCEMENT_DAYS",
    "ANNOUNCEMENT_TIME",
    "REFERRALS_PER_CPM_STEP",
    "CPM_STEP_VALUE",
    "REFERRAL_CASH_BONUS",
    "UPLOAD_DIR",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_config_defaults() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    env::set_var("TELEGRAM_BOT_TOKEN", "required_token");

    let config = Config::from_env().unwrap();

    assert_eq!(config.telegram_bot_token, "required_token");
    assert_eq!(config.database_url, "sqlite:./data/referrals.db");
    assert_eq!(config.http_port, 3000);
    assert_eq!(config.timezone, chrono_tz::America::New_York);
    assert!(config.admin_ids.is_empty());
    assert_eq!(config.broadcast_retry_count, 3);
    assert_eq!(config.broadcast_retry_delay, Duration::from_secs(2));
    assert_eq!(config.announcement_days, vec![Weekday::Mon, Weekday::Thu]);
    assert_eq!(config.announcement_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
    assert_eq!(config.referral_terms, ReferralTerms::default());
    assert_eq!(config.upload_dir, PathBuf::from("./data/uploads/reminders"));

    clear_env();
}

#[test]
fn test_config_from_env_with_all_vars() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    env::set_var("TELEGRAM_BOT_TOKEN", "test_token_123");
    env::set_var("DATABASE_URL", "sqlite:test.db");
    env::set_var("HTTP_PORT", "8080");
    env::set_var("TIMEZONE", "Europe/Berlin");
    env::set_var("ADMIN_IDS", "1, 2, not-a-number");
    env::set_var("APPROVED_CHAT_IDS", "-1001");
    env::set_var("BROADCAST_RETRY_COUNT", "5");
    env::set_var("BROADCAST_RETRY_DELAY", "0.5");
    env::set_var("ANNOUNCEMENT_DAYS", "Tuesday, fri");
    env::set_var("ANNOUNCEMENT_TIME", "08:15");
    env::set_var("REFERRALS_PER_CPM_STEP", "3");
    env::set_var("CPM_STEP_VALUE", "1");
    env::set_var("REFERRAL_CASH_BONUS", "750");
    env::set_var("UPLOAD_DIR", "/var/lib/referral-bot/media");

    let config = Config::from_env().unwrap();

    assert_eq!(config.database_url, "sqlite:test.db");
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
    assert_eq!(config.admin_ids, vec![1, 2]);
    assert_eq!(config.approved_chat_ids, vec![-1001]);
    assert_eq!(config.broadcast_retry_count, 5);
    assert_eq!(config.broadcast_retry_delay, Duration::from_millis(500));
    assert_eq!(config.announcement_days, vec![Weekday::Tue, Weekday::Fri]);
    assert_eq!(config.announcement_time, NaiveTime::from_hms_opt(8, 15, 0).unwrap());
    assert_eq!(
        config.referral_terms,
        ReferralTerms {
            referrals_per_cpm_step: 3,
            cpm_step_value: 1,
            cash_bonus: 750
        }
    );
    assert_eq!(config.upload_dir, PathBuf::from("/var/lib/referral-bot/media"));

    clear_env();
}

#[test]
fn test_config_missing_required_token() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let error_msg = Config::from_env().unwrap_err().to_string();
    assert!(error_msg.contains("TELEGRAM_BOT_TOKEN must be set"));

    env::set_var("TELEGRAM_BOT_TOKEN", "   ");
    assert!(Config::from_env().is_err());

    clear_env();
}

#[test]
fn test_config_rejects_bad_values() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let cases = [
        ("HTTP_PORT", "invalid_port", "Invalid HTTP_PORT"),
        ("TIMEZONE", "Mars/Olympus", "Invalid TIMEZONE"),
        ("BROADCAST_RETRY_COUNT", "0", "BROADCAST_RETRY_COUNT"),
        ("BROADCAST_RETRY_COUNT", "three", "BROADCAST_RETRY_COUNT"),
        ("BROADCAST_RETRY_DELAY", "-1", "BROADCAST_RETRY_DELAY"),
        ("BROADCAST_RETRY_DELAY", "1e30", "BROADCAST_RETRY_DELAY"),
        ("BROADCAST_RETRY_DELAY", "inf", "BROADCAST_RETRY_DELAY"),
        ("ANNOUNCEMENT_TIME", "25:00", "ANNOUNCEMENT_TIME"),
        ("REFERRAL_CASH_BONUS", "lots", "REFERRAL_CASH_BONUS"),
    ];

    for (var, value, expected) in cases {
        clear_env();
        env::set_var("TELEGRAM_BOT_TOKEN", "token");
        env::set_var(var, value);

        let error_msg = Config::from_env().unwrap_err().to_string();
        assert!(error_msg.contains(expected), "{var}={value} gave '{error_msg}'");
    }

    clear_env();
}

#[test]
fn test_config_empty_values_use_defaults() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    env::set_var("TELEGRAM_BOT_TOKEN", "valid_token");
    env::set_var("DATABASE_URL", "");
    env::set_var("ANNOUNCEMENT_DAYS", "  ");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database_url, "sqlite:./data/referrals.db");
    assert_eq!(config.announcement_days, vec![Weekday::Mon, Weekday::Thu]);

    clear_env();
}
