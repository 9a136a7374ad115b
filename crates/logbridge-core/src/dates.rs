//! Date helpers matching Logseq's journal encoding.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone};

/// Logseq stores journal days (and scheduled/deadline dates) as `yyyymmdd`.
pub fn journal_day(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// Journal day number `days` after `date`.
pub fn journal_day_after(date: NaiveDate, days: u64) -> u32 {
    journal_day(date.checked_add_days(Days::new(days)).unwrap_or(date))
}

/// Prefix prepended to inbound messages when timestamps are enabled.
pub fn timestamp_prefix<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_journal_day() {
        let date = NaiveDate::from_ymd_opt(2023, 3, 4).unwrap();
        assert_eq!(journal_day(date), 20230304);
    }

    #[test]
    fn test_journal_day_after_crosses_month() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(journal_day_after(date, 1), 20240301);
    }

    #[test]
    fn test_journal_day_after_crosses_year() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(journal_day_after(date, 1), 20240101);
    }

    #[test]
    fn test_timestamp_prefix() {
        let at = Utc.with_ymd_and_hms(2023, 3, 4, 7, 5, 59).unwrap();
        assert_eq!(timestamp_prefix(&at), "07:05");

        let offset = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(timestamp_prefix(&at.with_timezone(&offset)), "08:05");
    }
}
