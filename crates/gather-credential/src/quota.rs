use std::time::Duration;

use gather_coord::QuotaWindow;
use time::{Date, Month, OffsetDateTime, Time};

/// Time from `now` until the UTC boundary that ends `window`: next midnight
/// for daily counters, the first of next month for monthly ones.
pub fn until_window_end(window: QuotaWindow, now: OffsetDateTime) -> Duration {
    let now = now.to_offset(time::UtcOffset::UTC);
    let boundary = match window {
        QuotaWindow::Daily => now.date().next_day(),
        QuotaWindow::Monthly => first_of_next_month(now.date()),
    };
    let Some(boundary) = boundary else {
        return Duration::from_secs(1);
    };
    let end = boundary.with_time(Time::MIDNIGHT).assume_utc();
    let remaining = end - now;
    Duration::try_from(remaining)
        .unwrap_or(Duration::ZERO)
        .max(Duration::from_secs(1))
}

fn first_of_next_month(date: Date) -> Option<Date> {
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        month => (date.year(), month.next()),
    };
    Date::from_calendar_date(year, month, 1).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn daily_ends_at_next_utc_midnight() {
        let now = datetime!(2024-03-10 22:30 UTC);
        assert_eq!(
            until_window_end(QuotaWindow::Daily, now),
            Duration::from_secs(90 * 60)
        );
    }

    #[test]
    fn daily_converts_offsets_to_utc() {
        let now = datetime!(2024-03-10 23:30 +02:00);
        assert_eq!(
            until_window_end(QuotaWindow::Daily, now),
            Duration::from_secs(2 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn monthly_rolls_over_year_end() {
        let now = datetime!(2024-12-31 23:00 UTC);
        assert_eq!(
            until_window_end(QuotaWindow::Monthly, now),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn monthly_handles_leap_february() {
        let now = datetime!(2024-02-28 00:00 UTC);
        assert_eq!(
            until_window_end(QuotaWindow::Monthly, now),
            Duration::from_secs(2 * 86_400)
        );
    }
}
