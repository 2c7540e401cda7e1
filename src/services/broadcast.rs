//! Fan-out of one message to every eligible chat.
//!
//! Eligibility is evaluated lazily per chat while the broadcast runs, and each
//! chat gets its own retry loop:
//!
//! * `Forbidden` suspends the chat (`is_active = 0`) and moves on.
//! * `RateLimited` waits the requested time plus a small margin and retries
//!   without using up an attempt.
//! * `BadRequest` is logged and the chat is skipped.
//! * anything else is retried after a fixed delay until attempts run out.
//!
//! A broadcast never fails as a whole.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::database::models::TrackedChat;
use crate::services::delivery::{DeliveryChannel, DeliveryError, OutboundMessage};
use crate::utils::logging::{log_broadcast_summary, log_database_error, log_delivery_issue};
use crate::utils::markdown::normalize_title;

/// Keyword that, in a group title, marks the group as not wanting broadcasts.
pub const INACTIVE_MARKER: &str = "INACTIVE";

/// Storage the broadcaster reads its audience from.
#[async_trait]
pub trait AudienceStore: Send + Sync {
    /// Chats not suspended, most recently seen first.
    async fn active_chats(&self) -> Result<Vec<TrackedChat>, sqlx::Error>;

    async fn set_chat_active(&self, chat_id: i64, active: bool) -> Result<(), sqlx::Error>;

    /// Admins added at runtime, on top of the configured ones.
    async fn additional_admin_ids(&self) -> Result<Vec<i64>, sqlx::Error>;

    /// Approved chats added at runtime, on top of the configured ones.
    async fn approved_chat_ids(&self) -> Result<Vec<i64>, sqlx::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastPolicy {
    /// Attempts per chat for transient failures. Rate limits do not count.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Added on top of Telegram's `retry_after`.
    pub rate_limit_margin: Duration,
}

impl Default for BroadcastPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            rate_limit_margin: Duration::from_millis(500),
        }
    }
}

/// Chat ids by outcome, in the order they were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<i64>,
    /// Marked inactive after a Forbidden error.
    pub suspended: Vec<i64>,
    /// Skipped after a Bad Request.
    pub rejected: Vec<i64>,
    /// Kept failing until attempts ran out.
    pub abandoned: Vec<i64>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.suspended.len() + self.rejected.len() + self.abandoned.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatOutcome {
    Delivered,
    Suspended,
    Rejected,
    Abandoned,
}

/// Ids that never receive broadcasts, loaded once per run.
struct Exclusions {
    admin_ids: HashSet<i64>,
    approved_chat_ids: HashSet<i64>,
}

pub struct Broadcaster {
    channel: Arc<dyn DeliveryChannel>,
    store: Arc<dyn AudienceStore>,
    policy: BroadcastPolicy,
    static_admin_ids: Vec<i64>,
    static_approved_chat_ids: Vec<i64>,
}

impl Broadcaster {
    pub fn new(
        channel: Arc<dyn DeliveryChannel>,
        store: Arc<dyn AudienceStore>,
        policy: BroadcastPolicy,
        static_admin_ids: Vec<i64>,
        static_approved_chat_ids: Vec<i64>,
    ) -> Self {
        Self {
            channel,
            store,
            policy,
            static_admin_ids,
            static_approved_chat_ids,
        }
    }

    pub fn policy(&self) -> BroadcastPolicy {
        self.policy
    }

    async fn load_exclusions(&self) -> Exclusions {
        let mut admin_ids: HashSet<i64> = self.static_admin_ids.iter().copied().collect();
        match self.store.additional_admin_ids().await {
            Ok(ids) => admin_ids.extend(ids),
            Err(e) => log_database_error("SELECT", "admins", &e.to_string(), None),
        }

        let mut approved_chat_ids: HashSet<i64> = self.static_approved_chat_ids.iter().copied().collect();
        match self.store.approved_chat_ids().await {
            Ok(ids) => approved_chat_ids.extend(ids),
            Err(e) => log_database_error("SELECT", "approved_chats", &e.to_string(), None),
        }

        Exclusions {
            admin_ids,
            approved_chat_ids,
        }
    }

    /// Lazily yields the chat ids a broadcast should reach.
    ///
    /// Approved chats and admins' private chats are always left out. With
    /// `ignore_inactive`, groups whose title contains `INACTIVE` are left out
    /// too; the cached title is checked first, then a live lookup confirms.
    /// A failed lookup keeps the chat in.
    pub fn eligible_chats(&self, ignore_inactive: bool) -> BoxStream<'_, i64> {
        let load = async move {
            let exclusions = self.load_exclusions().await;
            let chats = match self.store.active_chats().await {
                Ok(chats) => chats,
                Err(e) => {
                    log_database_error("SELECT", "chats", &e.to_string(), Some("broadcast audience"));
                    Vec::new()
                }
            };
            (exclusions, chats)
        };

        stream::once(load)
            .flat_map(|(exclusions, chats)| {
                let exclusions = Arc::new(exclusions);
                stream::iter(chats).map(move |chat| (exclusions.clone(), chat))
            })
            .filter_map(move |(exclusions, chat)| async move {
                self.is_eligible(&chat, &exclusions, ignore_inactive)
                    .await
                    .then_some(chat.chat_id)
            })
            .boxed()
    }

    async fn is_eligible(&self, chat: &TrackedChat, exclusions: &Exclusions, ignore_inactive: bool) -> bool {
        if exclusions.approved_chat_ids.contains(&chat.chat_id) {
            return false;
        }
        if chat.is_private() && exclusions.admin_ids.contains(&chat.chat_id) {
            return false;
        }
        if !(ignore_inactive && chat.is_group()) {
            return true;
        }

        let cached_title = chat.title.as_deref().unwrap_or_default();
        if normalize_title(cached_title).contains(INACTIVE_MARKER) {
            return false;
        }

        match self.channel.get_chat(chat.chat_id).await {
            Ok(info) => !info
                .title
                .as_deref()
                .map(|title| normalize_title(title).contains(INACTIVE_MARKER))
                .unwrap_or(false),
            Err(e) => {
                tracing::debug!("BROADCAST: live lookup for chat {} failed: {}", chat.chat_id, e);
                true
            }
        }
    }

    /// Sends `message` to every eligible chat, one chat at a time.
    pub async fn broadcast(&self, message: &OutboundMessage, ignore_inactive: bool) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut chats = self.eligible_chats(ignore_inactive);

        while let Some(chat_id) = chats.next().await {
            match self.deliver_with_retry(chat_id, message).await {
                ChatOutcome::Delivered => report.delivered.push(chat_id),
                ChatOutcome::Suspended => report.suspended.push(chat_id),
                ChatOutcome::Rejected => report.rejected.push(chat_id),
                ChatOutcome::Abandoned => report.abandoned.push(chat_id),
            }
        }

        log_broadcast_summary(
            report.delivered.len(),
            report.suspended.len(),
            report.rejected.len(),
            report.abandoned.len(),
        );
        report
    }

    async fn send_once(&self, chat_id: i64, message: &OutboundMessage) -> Result<(), DeliveryError> {
        match &message.photo {
            Some(photo) => self.channel.send_photo(chat_id, photo, &message.text).await,
            None => self.channel.send_text(chat_id, &message.text).await,
        }
    }

    async fn deliver_with_retry(&self, chat_id: i64, message: &OutboundMessage) -> ChatOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.send_once(chat_id, message).await {
                Ok(()) => return ChatOutcome::Delivered,
                Err(DeliveryError::Forbidden(reason)) => {
                    log_delivery_issue(chat_id, attempt, &format!("forbidden ({reason}), suspending chat"));
                    if let Err(e) = self.store.set_chat_active(chat_id, false).await {
                        log_database_error("UPDATE", "chats", &e.to_string(), Some(&format!("chat_id={chat_id}")));
                    }
                    return ChatOutcome::Suspended;
                }
                Err(DeliveryError::RateLimited(wait)) => {
                    log_delivery_issue(chat_id, attempt, &format!("rate limited, waiting {:?}", wait));
                    tokio::time::sleep(wait + self.policy.rate_limit_margin).await;
                }
                Err(DeliveryError::BadRequest(reason)) => {
                    log_delivery_issue(chat_id, attempt, &format!("bad request ({reason}), skipping"));
                    return ChatOutcome::Rejected;
                }
                Err(DeliveryError::Unknown(reason)) => {
                    if attempt >= max_attempts {
                        log_delivery_issue(chat_id, attempt, &format!("giving up: {reason}"));
                        return ChatOutcome::Abandoned;
                    }
                    log_delivery_issue(chat_id, attempt, &format!("{reason}, retrying"));
                    attempt += 1;
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
            }
        }
    }
}
