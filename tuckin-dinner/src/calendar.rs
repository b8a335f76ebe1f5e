use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Asia::Taipei;
use chrono_tz::Tz;
use serde::Serialize;
use tuckin_shared::{AppError, AppResult, ErrorCode};

use crate::domain::{TaskType, UserStatus};

pub const LOCAL_TZ: Tz = Taipei;

pub const DINNER_HOUR: u32 = 18;

/// Matching must be able to run before the dinner; closer dinners roll over.
const MIN_LEAD_HOURS: i64 = 61;

/// Wall-clock source. Everything that compares against "now" or waits takes
/// one of these so tests can drive time by hand.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: std::time::Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Odd ISO weeks are "single" weeks and dine on Monday; even weeks on Thursday.
pub fn is_single_week(date: NaiveDate) -> bool {
    date.iso_week().week() % 2 == 1
}

pub fn dinner_weekday(date: NaiveDate) -> Weekday {
    if is_single_week(date) {
        Weekday::Mon
    } else {
        Weekday::Thu
    }
}

pub fn week_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn local_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&LOCAL_TZ).date_naive()
}

/// Resolves a local wall-clock time to a UTC instant.
pub fn local_instant(date: NaiveDate, hour: u32, minute: u32) -> AppResult<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| invalid_date(date, hour, minute))?;
    LOCAL_TZ
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| invalid_date(date, hour, minute))
}

fn invalid_date(date: NaiveDate, hour: u32, minute: u32) -> AppError {
    AppError::new(
        ErrorCode::InvalidDate,
        format!("{date} {hour:02}:{minute:02} does not exist in {LOCAL_TZ}"),
    )
}

/// The dinner instant of the ISO week containing `date`.
pub fn week_dinner_instant(date: NaiveDate) -> AppResult<DateTime<Utc>> {
    let monday = week_monday(date);
    let offset = dinner_weekday(monday).num_days_from_monday() as i64;
    local_instant(monday + Duration::days(offset), DINNER_HOUR, 0)
}

/// Dinner instants from the current local week onwards.
fn dinners_from(now: DateTime<Utc>) -> impl Iterator<Item = AppResult<DateTime<Utc>>> {
    let monday = week_monday(local_date(now));
    (0..).map(move |week| week_dinner_instant(monday + Duration::weeks(week)))
}

/// The next dinner that users can still book: at least 61 hours away.
pub fn next_dinner_instant(now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    for dinner in dinners_from(now).take(4) {
        let dinner = dinner?;
        if dinner - now >= Duration::hours(MIN_LEAD_HOURS) {
            return Ok(dinner);
        }
    }
    Err(AppError::new(ErrorCode::InvalidDate, "no dinner within four weeks"))
}

/// The dinner of the cycle currently in progress: the first one strictly after
/// `now`, with no booking lead time.
pub fn upcoming_dinner_instant(now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    for dinner in dinners_from(now).take(3) {
        let dinner = dinner?;
        if dinner > now {
            return Ok(dinner);
        }
    }
    Err(AppError::new(ErrorCode::InvalidDate, "no dinner within three weeks"))
}

/// Task instants of one cycle, all anchored to the dinner's local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedInstants {
    pub reminder_booking: DateTime<Utc>,
    pub matching: DateTime<Utc>,
    pub restaurant_vote_end: DateTime<Utc>,
    pub reminder_attendance: DateTime<Utc>,
    pub event_end: DateTime<Utc>,
    pub rating_end: DateTime<Utc>,
}

impl DerivedInstants {
    pub fn tasks(&self) -> [(TaskType, DateTime<Utc>); 6] {
        [
            (TaskType::ReminderBooking, self.reminder_booking),
            (TaskType::Match, self.matching),
            (TaskType::RestaurantVoteEnd, self.restaurant_vote_end),
            (TaskType::ReminderAttendance, self.reminder_attendance),
            (TaskType::EventEnd, self.event_end),
            (TaskType::RatingEnd, self.rating_end),
        ]
    }
}

pub fn derived_instants(dinner: DateTime<Utc>) -> AppResult<DerivedInstants> {
    let day = local_date(dinner);
    let at = |offset_days: i64, hour: u32| local_instant(day + Duration::days(offset_days), hour, 0);

    Ok(DerivedInstants {
        reminder_booking: at(-3, 9)?,
        matching: at(-2, 6)?,
        restaurant_vote_end: at(-1, 6)?,
        reminder_attendance: at(0, 9)?,
        event_end: at(0, 22)?,
        rating_end: at(2, 22)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageStage {
    #[serde(rename = "reserve")]
    Reserve,
    #[serde(rename = "nextWeek")]
    NextWeek,
}

/// What the booking page shows about the next dinner.
#[derive(Debug, Clone, Serialize)]
pub struct DinnerTimeInfo {
    pub next_dinner_date: NaiveDate,
    pub next_dinner_time: DateTime<Tz>,
    pub is_single_week: bool,
    pub weekday_text: &'static str,
    pub current_stage: PageStage,
    pub cancel_deadline: DateTime<Tz>,
    pub restaurant_selection_start: DateTime<Tz>,
    pub restaurant_selection_end: DateTime<Tz>,
    pub questionnaire_notification_time: DateTime<Tz>,
}

pub fn weekday_text(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "星期一",
        Weekday::Tue => "星期二",
        Weekday::Wed => "星期三",
        Weekday::Thu => "星期四",
        Weekday::Fri => "星期五",
        Weekday::Sat => "星期六",
        Weekday::Sun => "星期日",
    }
}

pub fn dinner_time_info(now: DateTime<Utc>, status: Option<UserStatus>) -> AppResult<DinnerTimeInfo> {
    let dinner = next_dinner_instant(now)?;
    let dinner_date = local_date(dinner);
    let cancel_deadline = local_instant(dinner_date - Duration::days(2), 6, 0)?;

    let current_stage = match status {
        None | Some(UserStatus::Booking) => PageStage::Reserve,
        Some(_) => PageStage::NextWeek,
    };

    Ok(DinnerTimeInfo {
        next_dinner_date: dinner_date,
        next_dinner_time: dinner.with_timezone(&LOCAL_TZ),
        is_single_week: is_single_week(local_date(now)),
        weekday_text: weekday_text(dinner_date.weekday()),
        current_stage,
        cancel_deadline: cancel_deadline.with_timezone(&LOCAL_TZ),
        restaurant_selection_start: (dinner - Duration::hours(60)).with_timezone(&LOCAL_TZ),
        restaurant_selection_end: (dinner - Duration::hours(36)).with_timezone(&LOCAL_TZ),
        questionnaire_notification_time: (dinner + Duration::hours(4)).with_timezone(&LOCAL_TZ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn taipei(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        local_instant(NaiveDate::from_ymd_opt(y, m, d).unwrap(), h, min).unwrap()
    }

    #[test]
    fn odd_weeks_dine_on_monday() {
        // 2025-01-06 is ISO week 2, 2025-01-13 is week 3.
        let even = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        let odd = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(dinner_weekday(even), Weekday::Thu);
        assert_eq!(dinner_weekday(odd), Weekday::Mon);
        assert_eq!(week_dinner_instant(even).unwrap(), taipei(2025, 1, 9, 18, 0));
        assert_eq!(week_dinner_instant(odd).unwrap(), taipei(2025, 1, 13, 18, 0));
    }

    #[test]
    fn next_dinner_keeps_sixty_one_hour_lead() {
        // Monday of week 2: Thursday dinner is 81h away.
        let now = taipei(2025, 1, 6, 9, 0);
        assert_eq!(next_dinner_instant(now).unwrap(), taipei(2025, 1, 9, 18, 0));

        // Tuesday 06:00: Thursday dinner is 60h away, roll to Monday of week 3.
        let now = taipei(2025, 1, 7, 6, 0);
        assert_eq!(next_dinner_instant(now).unwrap(), taipei(2025, 1, 13, 18, 0));
    }

    #[test]
    fn upcoming_dinner_ignores_lead_time() {
        let now = taipei(2025, 1, 7, 6, 0);
        assert_eq!(upcoming_dinner_instant(now).unwrap(), taipei(2025, 1, 9, 18, 0));

        let after = taipei(2025, 1, 9, 18, 30);
        assert_eq!(upcoming_dinner_instant(after).unwrap(), taipei(2025, 1, 13, 18, 0));
    }

    #[test]
    fn derived_instants_follow_local_schedule() {
        let dinner = taipei(2025, 1, 9, 18, 0);
        let derived = derived_instants(dinner).unwrap();
        assert_eq!(derived.reminder_booking, taipei(2025, 1, 6, 9, 0));
        assert_eq!(derived.matching, taipei(2025, 1, 7, 6, 0));
        assert_eq!(derived.restaurant_vote_end, taipei(2025, 1, 8, 6, 0));
        assert_eq!(derived.reminder_attendance, taipei(2025, 1, 9, 9, 0));
        assert_eq!(derived.event_end, taipei(2025, 1, 9, 22, 0));
        assert_eq!(derived.rating_end, taipei(2025, 1, 11, 22, 0));
        // Taipei is UTC+8 all year.
        assert_eq!(derived.matching.hour(), 22);
    }

    #[test]
    fn every_generated_dinner_respects_parity() {
        let mut now = taipei(2024, 12, 20, 12, 0);
        for _ in 0..60 {
            let dinner = next_dinner_instant(now).unwrap();
            let date = local_date(dinner);
            assert_eq!(date.weekday() == Weekday::Mon, date.iso_week().week() % 2 == 1);
            now += Duration::days(3);
        }
    }

    #[test]
    fn dinner_time_info_reports_stage_and_windows() {
        let now = taipei(2025, 1, 6, 9, 0);
        let info = dinner_time_info(now, Some(UserStatus::WaitingMatching)).unwrap();
        assert_eq!(info.next_dinner_date, NaiveDate::from_ymd_opt(2025, 1, 9).unwrap());
        assert_eq!(info.weekday_text, "星期四");
        assert!(!info.is_single_week);
        assert_eq!(info.current_stage, PageStage::NextWeek);
        assert_eq!(info.cancel_deadline.with_timezone(&Utc), taipei(2025, 1, 7, 6, 0));
        assert_eq!(info.restaurant_selection_end.with_timezone(&Utc), taipei(2025, 1, 8, 6, 0));

        let info = dinner_time_info(now, None).unwrap();
        assert_eq!(info.current_stage, PageStage::Reserve);
    }
}
