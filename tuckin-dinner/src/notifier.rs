use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use tuckin_shared::clients::fcm::FcmClient;
use tuckin_shared::AppResult;

use crate::calendar::Clock;
use crate::domain::{NewNotification, UserId};
use crate::store::Store;

/// Outbound push channel.
#[async_trait]
pub trait PushSink: Send + Sync {
    async fn send(&self, user_id: UserId, title: &str, body: &str, data: &Value) -> AppResult<()>;
}

/// Pushes to every registered device of the user through FCM.
pub struct FcmPushSink {
    client: FcmClient,
    store: Arc<dyn Store>,
}

impl FcmPushSink {
    pub fn new(client: FcmClient, store: Arc<dyn Store>) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl PushSink for FcmPushSink {
    async fn send(&self, user_id: UserId, title: &str, body: &str, data: &Value) -> AppResult<()> {
        let tokens = self.store.device_tokens(user_id).await?;
        if tokens.is_empty() {
            tracing::debug!(user_id = %user_id, "no device tokens, push skipped");
            return Ok(());
        }
        let report = self.client.send_to_tokens(&tokens, title, body, data).await?;
        if report.failure > 0 {
            tracing::warn!(user_id = %user_id, failure = report.failure, "some devices rejected the push");
        }
        Ok(())
    }
}

/// The `type` field carried in every notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    MatchingSuccess,
    MatchingFailed,
    VoteResult,
    BookingReminder,
    AttendanceReminder,
    RatingOpen,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatchingSuccess => "matching_success",
            Self::MatchingFailed => "matching_failed",
            Self::VoteResult => "vote_result",
            Self::BookingReminder => "booking_reminder",
            Self::AttendanceReminder => "attendance_reminder",
            Self::RatingOpen => "rating_open",
        }
    }

    /// Payload `{type, ...extra}`; `extra` must be an object or null.
    pub fn payload(&self, extra: Value) -> Value {
        let mut data = json!({ "type": self.as_str() });
        if let (Some(target), Value::Object(fields)) = (data.as_object_mut(), extra) {
            target.extend(fields);
        }
        data
    }
}

/// Persists a notification row and pushes it. Push failures never fail the
/// caller; persistence failures do.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn Store>,
    push: Arc<dyn PushSink>,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(store: Arc<dyn Store>, push: Arc<dyn PushSink>, clock: Arc<dyn Clock>) -> Self {
        Self { store, push, clock }
    }

    pub async fn notify(&self, user_id: UserId, title: &str, body: &str, data: Value) -> AppResult<()> {
        let notification = NewNotification {
            user_id,
            title: title.to_string(),
            body: body.to_string(),
            data,
        };
        self.store
            .insert_notification(&notification, self.clock.now())
            .await?;

        if let Err(e) = self.push.send(user_id, title, body, &notification.data).await {
            tracing::warn!(user_id = %user_id, error = %e, "push delivery failed");
        }
        Ok(())
    }

    /// Notifies each user independently. Returns how many were notified.
    pub async fn notify_group(&self, user_ids: &[UserId], title: &str, body: &str, data: Value) -> usize {
        let sends = user_ids.iter().map(|user_id| {
            let data = data.clone();
            async move { (*user_id, self.notify(*user_id, title, body, data).await) }
        });

        let mut delivered = 0;
        for (user_id, result) in join_all(sends).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!(user_id = %user_id, error = %e, "notification failed"),
            }
        }
        metrics::counter!("notifications_sent_total").increment(delivered as u64);
        delivered
    }
}
