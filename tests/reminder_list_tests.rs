#![allow(clippy::unwrap_used, clippy::panic)]

use chrono_tz::Tz;
use teloxide::types::InlineKeyboardButtonKind;

use referral_bot::bot::commands::reminders::{reminder_keyboard, reminder_list_text, ReminderAction};
use referral_bot::database::models::ReminderRow;

fn tz() -> Tz {
    "America/New_York".parse().unwrap()
}

fn row(id: i64, kind: &str, active: bool) -> ReminderRow {
    ReminderRow {
        id,
        text: "Submit logs".to_string(),
        kind: kind.to_string(),
        run_at: None,
        time_of_day: Some("09:00".to_string()),
        weekday: Some(0),
        weekdays: Some("0,3".to_string()),
        every_n_weeks: Some(2),
        active,
        created_by: Some(1),
        created_at: "2025-01-01T00:00:00+00:00".to_string(),
        media_path: None,
        ignore_inactive: true,
    }
}

#[test]
fn test_empty_list() {
    assert_eq!(reminder_list_text(&[], &tz()), "Reminders:\n– No reminders configured yet.");
    assert!(reminder_keyboard(&[]).is_none());
}

#[test]
fn test_list_lines_show_schedule_and_status() {
    let rows = vec![row(2, "twice", true), row(1, "daily", false)];
    let text = reminder_list_text(&rows, &tz());

    assert_eq!(
        text,
        "Reminders:\n\
         2) [Schedule Mon, Thu] 09:00 – \"Submit logs\" (Active)\n\
         1) [Daily] 09:00 – \"Submit logs\" (Disabled)"
    );
}

#[test]
fn test_unreadable_schedule_is_listed_not_hidden() {
    let mut broken = row(5, "weekly", true);
    broken.weekday = None;
    let text = reminder_list_text(&[broken], &tz());
    assert!(text.contains("5) [weekly] unreadable schedule"));
}

#[test]
fn test_keyboard_buttons_match_state() {
    let keyboard = reminder_keyboard(&[row(2, "daily", true), row(1, "daily", false)]).unwrap();
    let rows = &keyboard.inline_keyboard;
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0][0].text, "Disable #2");
    assert_eq!(rows[1][0].text, "Enable #1");
    assert_eq!(rows[1][1].text, "Delete #1");
    match &rows[1][1].kind {
        InlineKeyboardButtonKind::CallbackData(data) => assert_eq!(data, "reminders:delete:1"),
        other => panic!("unexpected button kind {other:?}"),
    }
}

#[test]
fn test_callback_data_parsing() {
    assert_eq!(ReminderAction::parse("reminders:toggle:7"), Some(ReminderAction::Toggle(7)));
    assert_eq!(ReminderAction::parse("reminders:delete:12"), Some(ReminderAction::Delete(12)));
    assert_eq!(ReminderAction::parse("reminders:delete:x"), None);
    assert_eq!(ReminderAction::parse("reminders:pause:1"), None);
    assert_eq!(ReminderAction::parse("settings:toggle:1"), None);
    assert_eq!(
        ReminderAction::parse(&ReminderAction::Toggle(3).callback_data()),
        Some(ReminderAction::Toggle(3))
    );
}
