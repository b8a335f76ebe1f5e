use serde::Deserialize;

use crate::domain::Restaurant;

const MINUTES_PER_DAY: u32 = 24 * 60;
const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY;

/// Decides whether a restaurant is open at a given moment of the week.
pub trait RestaurantProvider: Send + Sync {
    /// `weekday` counts from Sunday = 0; `minute` is the minute of the day.
    fn is_open(&self, restaurant: &Restaurant, weekday: u32, minute: u32) -> bool;
}

/// Reads the opening hours stored alongside each restaurant, in the shape
/// returned by the places API (`regularOpeningHours`). Missing, empty or
/// unreadable hours count as open.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusinessHoursProvider;

impl RestaurantProvider for BusinessHoursProvider {
    fn is_open(&self, restaurant: &Restaurant, weekday: u32, minute: u32) -> bool {
        let Some(raw) = restaurant.business_hours.as_deref() else {
            return true;
        };
        match parse_hours(raw) {
            Some(hours) if !hours.periods.is_empty() => hours.is_open_at(weekday * MINUTES_PER_DAY + minute),
            Some(_) => true,
            None => {
                tracing::debug!(restaurant_id = %restaurant.id, "unreadable business hours, assuming open");
                true
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Point {
    day: u32,
    #[serde(default)]
    hour: u32,
    #[serde(default)]
    minute: u32,
}

impl Point {
    fn minute_of_week(&self) -> u32 {
        (self.day * MINUTES_PER_DAY + self.hour * 60 + self.minute) % MINUTES_PER_WEEK
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Period {
    open: Point,
    close: Option<Point>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpeningHours {
    #[serde(default)]
    periods: Vec<Period>,
}

impl OpeningHours {
    fn is_open_at(&self, minute_of_week: u32) -> bool {
        self.periods.iter().any(|period| {
            let open = period.open.minute_of_week();
            let Some(close) = period.close.map(|c| c.minute_of_week()) else {
                // A period with no close means open around the clock.
                return true;
            };
            if open <= close {
                (open..close).contains(&minute_of_week)
            } else {
                minute_of_week >= open || minute_of_week < close
            }
        })
    }
}

/// Accepts JSON as well as the single-quoted dict notation some rows were
/// imported with.
fn parse_hours(raw: &str) -> Option<OpeningHours> {
    if let Ok(hours) = serde_json::from_str(raw) {
        return Some(hours);
    }
    let normalized = raw
        .replace('\'', "\"")
        .replace("True", "true")
        .replace("False", "false")
        .replace("None", "null");
    serde_json::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn restaurant(hours: Option<&str>) -> Restaurant {
        Restaurant {
            id: Uuid::new_v4(),
            name: "test".into(),
            category_id: None,
            address: None,
            business_hours: hours.map(str::to_string),
        }
    }

    // Monday and Thursday, 11:00 to 21:00.
    const WEEKDAY_HOURS: &str = r#"{"openNow": true, "periods": [
        {"open": {"day": 1, "hour": 11, "minute": 0}, "close": {"day": 1, "hour": 21, "minute": 0}},
        {"open": {"day": 4, "hour": 11, "minute": 0}, "close": {"day": 4, "hour": 21, "minute": 0}}
    ]}"#;

    #[test]
    fn open_inside_a_period() {
        let r = restaurant(Some(WEEKDAY_HOURS));
        assert!(BusinessHoursProvider.is_open(&r, 1, 18 * 60));
        assert!(BusinessHoursProvider.is_open(&r, 4, 18 * 60));
        assert!(!BusinessHoursProvider.is_open(&r, 2, 18 * 60));
        assert!(!BusinessHoursProvider.is_open(&r, 1, 21 * 60));
    }

    #[test]
    fn periods_may_wrap_past_midnight_and_week_end() {
        let late = r#"{"periods": [{"open": {"day": 6, "hour": 17, "minute": 0}, "close": {"day": 0, "hour": 2, "minute": 0}}]}"#;
        let r = restaurant(Some(late));
        assert!(BusinessHoursProvider.is_open(&r, 6, 23 * 60));
        assert!(BusinessHoursProvider.is_open(&r, 0, 60));
        assert!(!BusinessHoursProvider.is_open(&r, 0, 3 * 60));
    }

    #[test]
    fn python_style_dicts_are_accepted() {
        let raw = "{'openNow': False, 'periods': [{'open': {'day': 1, 'hour': 17, 'minute': 30}, 'close': {'day': 1, 'hour': 22, 'minute': 0}}]}";
        let r = restaurant(Some(raw));
        assert!(BusinessHoursProvider.is_open(&r, 1, 18 * 60));
        assert!(!BusinessHoursProvider.is_open(&r, 1, 17 * 60));
    }

    #[test]
    fn unknown_hours_fail_open() {
        assert!(BusinessHoursProvider.is_open(&restaurant(None), 3, 0));
        assert!(BusinessHoursProvider.is_open(&restaurant(Some("closed on holidays")), 3, 0));
        assert!(BusinessHoursProvider.is_open(&restaurant(Some(r#"{"periods": []}"#)), 3, 0));

        let always = r#"{"periods": [{"open": {"day": 0, "hour": 0, "minute": 0}}]}"#;
        assert!(BusinessHoursProvider.is_open(&restaurant(Some(always)), 5, 4 * 60));
    }
}
