//! Notification fan-out and the recipient-facing notification operations.
//!
//! Social actions never write notifications themselves. They emit a
//! [`NotificationEvent`] into a [`NotificationOutbox`] after their own write has
//! succeeded; delivery failures are logged and never reach the triggering caller.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::Caller;
use crate::cursor::{self, Cursor};
use crate::error::ApiError;
use crate::models::{Id, NewNotification, Notification, NotificationPage, NotificationType};
use crate::repo::Repo;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

/// A qualifying social action, addressed to the affected user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub recipient_id: Id,
    pub kind: NotificationType,
    pub actor_id: Id,
    pub post_id: Option<Id>,
}

impl NotificationEvent {
    /// Returns `None` for self-directed actions, which never notify.
    pub fn new(recipient_id: Id, kind: NotificationType, actor_id: Id, post_id: Option<Id>) -> Option<Self> {
        (recipient_id != actor_id).then_some(Self { recipient_id, kind, actor_id, post_id })
    }

    fn into_row(self) -> NewNotification {
        NewNotification {
            user_id: self.recipient_id,
            kind: self.kind,
            related_user_id: Some(self.actor_id),
            related_post_id: self.post_id,
        }
    }
}

#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    /// Hand an event over for delivery. Never fails from the emitter's point of view.
    async fn emit(&self, event: NotificationEvent);
}

async fn deliver(repo: &dyn Repo, event: NotificationEvent) {
    let recipient = event.recipient_id;
    let kind = event.kind;
    match repo.create_notification(event.into_row()).await {
        Ok(n) => log::debug!("notification {} ({}) delivered to user {recipient}", n.id, kind.as_str()),
        Err(e) => log::warn!("dropping {} notification for user {recipient}: {e}", kind.as_str()),
    }
}

/// Delivers in the emitting task, after the primary write has completed.
pub struct InlineOutbox {
    repo: Arc<dyn Repo>,
}

impl InlineOutbox {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl NotificationOutbox for InlineOutbox {
    async fn emit(&self, event: NotificationEvent) {
        deliver(self.repo.as_ref(), event).await;
    }
}

/// Queues events on an unbounded channel drained by a background worker, so the
/// primary request never waits on notification writes.
pub struct QueuedOutbox {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl QueuedOutbox {
    /// Spawn the delivery worker on the current tokio runtime. The worker exits once
    /// every sender has been dropped and the queue is drained.
    pub fn spawn(repo: Arc<dyn Repo>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationEvent>();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                deliver(repo.as_ref(), event).await;
            }
            log::info!("notification worker stopped");
        });
        (Self { tx }, handle)
    }
}

#[async_trait]
impl NotificationOutbox for QueuedOutbox {
    async fn emit(&self, event: NotificationEvent) {
        if let Err(e) = self.tx.send(event) {
            log::error!("notification queue closed, dropping event for user {}", e.0.recipient_id);
        }
    }
}

/// Fan-out entry point. Suppresses self-notifications before anything is queued.
pub async fn notify(outbox: &dyn NotificationOutbox, recipient_id: Id, kind: NotificationType, actor_id: Id, post_id: Option<Id>) {
    if let Some(event) = NotificationEvent::new(recipient_id, kind, actor_id, post_id) {
        outbox.emit(event).await;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// Newest-first page of the caller's notifications.
pub async fn list_notifications(repo: &dyn Repo, user_id: Id, opts: ListOptions) -> Result<NotificationPage, ApiError> {
    let limit = opts.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let after = cursor::parse_opt(opts.cursor.as_deref()).map_err(|e| ApiError::validation(e.to_string()))?;
    let mut rows = repo.list_notifications(user_id, opts.unread_only, after, limit + 1).await?;
    let next_cursor = if rows.len() as i64 > limit {
        rows.truncate(limit as usize);
        rows.last().map(|n| Cursor::new(n.created_at, n.id).encode())
    } else {
        None
    };
    Ok(NotificationPage { notifications: rows, next_cursor })
}

/// Transition one notification to read. Only the recipient may do this.
pub async fn mark_read(repo: &dyn Repo, notification_id: Id, caller: &Caller) -> Result<Notification, ApiError> {
    let n = repo.get_notification(notification_id).await?;
    if n.user_id != caller.id {
        return Err(ApiError::Forbidden);
    }
    if n.read {
        return Ok(n);
    }
    Ok(repo.mark_read(notification_id).await?)
}

pub async fn mark_all_read(repo: &dyn Repo, user_id: Id) -> Result<u64, ApiError> {
    Ok(repo.mark_all_read(user_id).await?)
}

pub async fn unread_count(repo: &dyn Repo, user_id: Id) -> Result<i64, ApiError> {
    Ok(repo.unread_count(user_id).await?)
}

/// `@username` handles referenced in free text, deduplicated, in order of appearance.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (i, _) in text.match_indices('@') {
        // an '@' glued to a preceding word is an email address, not a mention
        let glued = text[..i].chars().next_back().is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.');
        if glued {
            continue;
        }
        let handle: String = text[i + 1..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.' || *c == '-')
            .collect();
        let handle = handle.trim_end_matches(['.', '-']).to_string();
        if !handle.is_empty() && !out.contains(&handle) {
            out.push(handle);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_directed_events_are_suppressed() {
        assert!(NotificationEvent::new(1, NotificationType::Like, 1, Some(9)).is_none());
        let ev = NotificationEvent::new(2, NotificationType::Like, 1, Some(9)).unwrap();
        let row = ev.into_row();
        assert_eq!(row.user_id, 2);
        assert_eq!(row.related_user_id, Some(1));
        assert_eq!(row.related_post_id, Some(9));
    }

    #[test]
    fn mentions_are_parsed_and_deduplicated() {
        assert_eq!(extract_mentions("hi @alice and @bob_1, also @alice."), vec!["alice", "bob_1"]);
        assert!(extract_mentions("mail me at me@example.com").is_empty());
        assert!(extract_mentions("just an @ sign").is_empty());
        assert_eq!(extract_mentions("(@carol)"), vec!["carol"]);
    }
}
