//! # Referral Bot
//!
//! A Telegram bot that tracks a driver referral programme and broadcasts
//! scheduled reminders to every group it has been added to.
//!
//! ## Features
//! - One-time, daily, weekly, bi-weekly and twice-a-week reminders, optionally with a photo
//! - Broadcasts that skip staff chats, admins and groups marked INACTIVE
//! - Rate-limit aware delivery with per-chat retries
//! - Referral leaderboard and scheduled referral announcements
//! - Persistent storage with SQLite, reminders restored on restart

/// Telegram commands, callbacks and chat tracking
pub mod bot;
/// Configuration from environment variables
pub mod config;
/// Database models, connections, and migrations
pub mod database;
/// Scheduling, broadcasting and the health endpoint
pub mod services;
/// Utility functions for datetime, validation, and formatting
pub mod utils;
