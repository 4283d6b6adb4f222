/*
 *  market.rs
 *
 *  tickertape - LED stock ticker
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

//! US equity market calendar, New York session hours.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Open,
    Closed,
}

impl MarketStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MarketStatus::Open => "Open",
            MarketStatus::Closed => "Closed",
        }
    }

    pub fn is_open(&self) -> bool {
        *self == MarketStatus::Open
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarketCalendar {
    /// honour the NYSE holiday list, otherwise weekdays only
    holidays: bool,
}

impl MarketCalendar {
    pub fn new(holidays: bool) -> Self {
        MarketCalendar { holidays }
    }

    pub fn status(&self, now: DateTime<Utc>) -> MarketStatus {
        if self.is_open(now) { MarketStatus::Open } else { MarketStatus::Closed }
    }

    /// Weekdays 09:30 to 16:00 New York time.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = eastern_time(now);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        if self.holidays && is_holiday(local.date()) {
            return false;
        }
        let minutes = local.hour() * 60 + local.minute();
        (9 * 60 + 30..16 * 60).contains(&minutes)
    }

    pub fn status_now(&self) -> MarketStatus {
        self.status(Utc::now())
    }
}

/// Wall-clock time in New York.
///
/// Daylight time runs from the second Sunday of March 02:00 EST
/// (07:00 UTC) to the first Sunday of November 02:00 EDT (06:00 UTC).
pub fn eastern_time(now: DateTime<Utc>) -> NaiveDateTime {
    let utc = now.naive_utc();
    let year = utc.year();
    let dst = match (
        dst_boundary(year, 3, 2, 7),
        dst_boundary(year, 11, 1, 6),
    ) {
        (Some(start), Some(end)) => utc >= start && utc < end,
        _ => false,
    };
    utc - Duration::hours(if dst { 4 } else { 5 })
}

/// `n`-th Sunday of `month` at `hour` UTC.
fn dst_boundary(year: i32, month: u32, n: u8, hour: u32) -> Option<NaiveDateTime> {
    let day = NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Sun, n)?;
    Some(day.and_time(NaiveTime::from_hms_opt(hour, 0, 0)?))
}

pub fn is_holiday(date: NaiveDate) -> bool {
    nyse_holidays(date.year()).contains(&date)
}

/// Full-day NYSE closures for `year`, weekend dates moved to the observed day.
pub fn nyse_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(10);

    // New Year on a Saturday is not observed on the prior Friday
    if let Some(d) = NaiveDate::from_ymd_opt(year, 1, 1) {
        match d.weekday() {
            Weekday::Sun => days.push(d + Duration::days(1)),
            Weekday::Sat => {}
            _ => days.push(d),
        }
    }
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 3));
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3));
    days.extend(easter_sunday(year).map(|d| d - Duration::days(2)));
    days.extend(
        NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Mon, 5)
            .or_else(|| NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Mon, 4)),
    );
    if year >= 2022 {
        days.extend(observed(year, 6, 19));
    }
    days.extend(observed(year, 7, 4));
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1));
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4));
    days.extend(observed(year, 12, 25));
    days
}

fn observed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let d = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(match d.weekday() {
        Weekday::Sat => d - Duration::days(1),
        Weekday::Sun => d + Duration::days(1),
        _ => d,
    })
}

/// Gregorian Easter (anonymous computus).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_session_hours_with_dst() {
        let cal = MarketCalendar::new(true);
        // Tue 2025-07-15: EDT, opens 13:30 UTC
        assert!(!cal.is_open(utc(2025, 7, 15, 13, 29)));
        assert!(cal.is_open(utc(2025, 7, 15, 13, 30)));
        assert!(cal.is_open(utc(2025, 7, 15, 19, 59)));
        assert!(!cal.is_open(utc(2025, 7, 15, 20, 0)));
        // Tue 2025-01-14: EST, opens 14:30 UTC
        assert!(!cal.is_open(utc(2025, 1, 14, 14, 0)));
        assert!(cal.is_open(utc(2025, 1, 14, 14, 30)));
    }

    #[test]
    fn test_weekend_closed() {
        let cal = MarketCalendar::new(false);
        assert_eq!(cal.status(utc(2025, 7, 12, 15, 0)), MarketStatus::Closed);
    }

    #[test]
    fn test_holidays() {
        let days = nyse_holidays(2025);
        assert!(days.contains(&NaiveDate::from_ymd_opt(2025, 4, 18).unwrap())); // Good Friday
        assert!(days.contains(&NaiveDate::from_ymd_opt(2025, 5, 26).unwrap())); // Memorial
        assert!(days.contains(&NaiveDate::from_ymd_opt(2025, 11, 27).unwrap())); // Thanksgiving
        // 2026-07-04 is a Saturday, observed Friday
        assert!(is_holiday(NaiveDate::from_ymd_opt(2026, 7, 3).unwrap()));
        // 2022-01-01 was a Saturday and not observed
        assert!(!is_holiday(NaiveDate::from_ymd_opt(2021, 12, 31).unwrap()));

        let with = MarketCalendar::new(true);
        let without = MarketCalendar::new(false);
        let july4 = utc(2025, 7, 4, 15, 0);
        assert!(!with.is_open(july4));
        assert!(without.is_open(july4));
    }

    #[test]
    fn test_easter() {
        assert_eq!(easter_sunday(2024), NaiveDate::from_ymd_opt(2024, 3, 31));
        assert_eq!(easter_sunday(2026), NaiveDate::from_ymd_opt(2026, 4, 5));
    }
}
