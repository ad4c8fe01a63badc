use chrono::{DateTime, TimeZone};

use crate::models::Period;

/// Pick the period that best represents "today".
///
/// Preference order:
/// 1. The first period named exactly `Today`.
/// 2. The first daytime period whose start date, in its own offset, equals
///    the date of `now` seen in that same offset.
/// 3. The first period, whatever it is.
///
/// Returns `None` only for an empty slice.
pub fn select_today<'a, Tz: TimeZone>(
    periods: &'a [Period],
    now: &DateTime<Tz>,
) -> Option<&'a Period> {
    if let Some(today) = periods.iter().find(|p| p.name == "Today") {
        return Some(today);
    }

    periods
        .iter()
        .filter(|p| p.is_daytime)
        .find(|p| {
            let local_now = now.with_timezone(p.start_time.offset());
            local_now.date_naive() == p.start_time.date_naive()
        })
        .or_else(|| periods.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, Utc};

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    fn period(name: &str, start: &str, is_daytime: bool) -> Period {
        let start_time = at(start);
        Period {
            name: name.to_string(),
            start_time,
            end_time: start_time + chrono::Duration::hours(12),
            is_daytime,
            temperature: 70,
            temperature_unit: "F".to_string(),
            short_forecast: format!("{name} forecast"),
            detailed_forecast: String::new(),
        }
    }

    #[test]
    fn test_empty_periods() {
        assert!(select_today(&[], &Utc::now()).is_none());
    }

    #[test]
    fn test_named_today_wins_regardless_of_position_or_daytime() {
        let periods = vec![
            period("Tonight", "2024-06-01T18:00:00-04:00", false),
            period("Saturday", "2024-06-01T06:00:00-04:00", true),
            period("Today", "2030-01-01T18:00:00-04:00", false),
        ];
        let now = at("2024-06-01T12:00:00-04:00");

        assert_eq!(select_today(&periods, &now).unwrap().name, "Today");
    }

    #[test]
    fn test_daytime_date_match_in_period_offset() {
        // 02:30 UTC on June 2nd is still June 1st in UTC-4.
        let now: DateTime<Utc> = at("2024-06-02T02:30:00Z").with_timezone(&Utc);
        let periods = vec![
            period("Overnight", "2024-06-01T22:00:00-04:00", false),
            period("Friday", "2024-05-31T06:00:00-04:00", true),
            period("Saturday", "2024-06-01T06:00:00-04:00", true),
            period("Sunday", "2024-06-02T06:00:00-04:00", true),
        ];

        assert_eq!(select_today(&periods, &now).unwrap().name, "Saturday");
    }

    #[test]
    fn test_caller_offset_is_ignored() {
        // Same instant as above, expressed in a far-east offset where it is
        // already June 2nd.
        let now = at("2024-06-02T11:30:00+09:00");
        let periods = vec![
            period("Saturday", "2024-06-01T06:00:00-04:00", true),
            period("Sunday", "2024-06-02T06:00:00-04:00", true),
        ];

        assert_eq!(select_today(&periods, &now).unwrap().name, "Saturday");
    }

    #[test]
    fn test_nighttime_match_is_skipped() {
        let now = at("2024-06-01T20:00:00-04:00");
        let periods = vec![
            period("Tonight", "2024-06-01T18:00:00-04:00", false),
            period("Sunday", "2024-06-02T06:00:00-04:00", true),
        ];

        // no daytime period on June 1st, so fall back to the first element
        assert_eq!(select_today(&periods, &now).unwrap().name, "Tonight");
    }

    #[test]
    fn test_all_nighttime_falls_back_to_first() {
        let now = at("2024-06-05T12:00:00-04:00");
        let periods = vec![
            period("Tonight", "2024-06-01T18:00:00-04:00", false),
            period("Saturday Night", "2024-06-02T18:00:00-04:00", false),
        ];

        assert_eq!(select_today(&periods, &now).unwrap().name, "Tonight");
    }

    #[test]
    fn test_name_match_is_case_sensitive() {
        let now = at("2024-06-10T12:00:00-04:00");
        let periods = vec![
            period("Tonight", "2024-06-01T18:00:00-04:00", false),
            period("today", "2024-06-01T06:00:00-04:00", true),
        ];

        assert_eq!(select_today(&periods, &now).unwrap().name, "Tonight");
    }
}
