use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tuckin_shared::{AppError, AppResult, ErrorCode};

use crate::calendar::LOCAL_TZ;
use crate::domain::{UserId, UserStatus};
use crate::notifier::{NotificationKind, Notifier};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Booking,
    Attendance,
}

impl ReminderKind {
    pub fn target_statuses(&self) -> &'static [UserStatus] {
        match self {
            Self::Booking => &[
                UserStatus::Booking,
                UserStatus::MatchingFailed,
                UserStatus::ConfirmationTimeout,
                UserStatus::LowAttendance,
            ],
            Self::Attendance => &[UserStatus::WaitingAttendance],
        }
    }

    fn notification(&self) -> NotificationKind {
        match self {
            Self::Booking => NotificationKind::BookingReminder,
            Self::Attendance => NotificationKind::AttendanceReminder,
        }
    }
}

impl FromStr for ReminderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking" | "reminder_booking" => Ok(Self::Booking),
            "attendance" | "reminder_attendance" => Ok(Self::Attendance),
            other => Err(AppError::new(
                ErrorCode::UnknownTaskType,
                format!("unknown reminder type: {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReminderOptions {
    #[serde(default)]
    pub dry_run: bool,
    /// When set, only these users are reminded.
    #[serde(default)]
    pub test_user_ids: Option<Vec<UserId>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderMessage {
    pub user_id: UserId,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderReport {
    pub reminder_type: ReminderKind,
    pub eligible: usize,
    pub notified: usize,
    pub dry_run: bool,
    pub test_mode: bool,
    /// Filled on dry runs only.
    pub messages: Vec<ReminderMessage>,
}

pub struct ReminderService {
    store: Arc<dyn Store>,
    notifier: Notifier,
}

impl ReminderService {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    pub async fn recipients(&self, kind: ReminderKind) -> AppResult<Vec<UserId>> {
        self.store.users_with_status(kind.target_statuses()).await
    }

    async fn message_for(&self, kind: ReminderKind, user_id: UserId) -> AppResult<(String, String)> {
        match kind {
            ReminderKind::Booking => Ok((
                "本週聚餐開放報名".to_string(),
                "想認識新朋友嗎？快來報名這週的晚餐聚會！".to_string(),
            )),
            ReminderKind::Attendance => {
                let Some(group) = self.store.group_for_user(user_id).await? else {
                    return Ok(Self::generic_attendance());
                };
                let Some(event) = self.store.event_for_group(group.id).await? else {
                    return Ok(Self::generic_attendance());
                };
                let restaurant = self
                    .store
                    .load_restaurant(event.restaurant_id)
                    .await?
                    .map(|r| r.name)
                    .unwrap_or_else(|| event.name.clone());
                let time = event.date.with_timezone(&LOCAL_TZ).format("%H:%M");
                Ok((
                    "今晚聚餐提醒".to_string(),
                    format!("今天 {time} 在「{restaurant}」見，別遲到囉！"),
                ))
            }
        }
    }

    fn generic_attendance() -> (String, String) {
        ("今晚聚餐提醒".to_string(), "今天晚上的聚餐別忘了喔！".to_string())
    }

    pub async fn send(&self, kind: ReminderKind, options: &ReminderOptions) -> AppResult<ReminderReport> {
        let mut targets = self.recipients(kind).await?;
        if let Some(only) = &options.test_user_ids {
            targets.retain(|id| only.contains(id));
        }

        let mut report = ReminderReport {
            reminder_type: kind,
            eligible: targets.len(),
            notified: 0,
            dry_run: options.dry_run,
            test_mode: options.test_user_ids.is_some(),
            messages: Vec::new(),
        };

        for user_id in targets {
            let (title, body) = self.message_for(kind, user_id).await?;
            if options.dry_run {
                report.messages.push(ReminderMessage { user_id, title, body });
                continue;
            }
            let data = kind.notification().payload(json!({}));
            match self.notifier.notify(user_id, &title, &body, data).await {
                Ok(()) => report.notified += 1,
                Err(e) => tracing::error!(user_id = %user_id, error = %e, "reminder failed"),
            }
        }

        if !options.dry_run {
            metrics::counter!("notifications_sent_total").increment(report.notified as u64);
        }
        tracing::info!(
            kind = ?kind,
            eligible = report.eligible,
            notified = report.notified,
            dry_run = options.dry_run,
            "reminders processed"
        );
        Ok(report)
    }
}
