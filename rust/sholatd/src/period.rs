use chrono::{Months, NaiveDate, Weekday};
use thiserror::Error;

use crate::prayer::Gender;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("date must be YYYY-MM-DD: {0}")]
    BadDate(String),
    #[error("week must be YYYY-Www: {0}")]
    BadWeek(String),
    #[error("week {week} does not exist in ISO year {year}")]
    WeekOutOfRange { year: i32, week: u32 },
    #[error("month must be YYYY-MM: {0}")]
    BadMonth(String),
    #[error("month must be between 01 and 12: {0}")]
    MonthOutOfRange(String),
    #[error("month {year:04}-{month:02} is outside the supported calendar")]
    MonthOutOfCalendar { year: i32, month: u32 },
    #[error("gender must be L or P: {0}")]
    BadGender(String),
    #[error("{0}")]
    BadShape(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    All,
    Day(NaiveDate),
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
}

impl Period {
    /// Builds a period from the three optional form inputs.
    /// Blank inputs are ignored; a date wins over a week, a week over a month.
    pub fn from_inputs(
        date: Option<&str>,
        week: Option<&str>,
        month: Option<&str>,
    ) -> Result<Period, PeriodError> {
        if let Some(d) = present(date) {
            return parse_date(d).map(Period::Day);
        }
        if let Some(w) = present(week) {
            return parse_week(w);
        }
        if let Some(m) = present(month) {
            return parse_month(m);
        }
        Ok(Period::All)
    }

    /// Inclusive date range, `None` for `All`.
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            Period::All => None,
            Period::Day(d) => Some((d, d)),
            Period::Week { year, week } => {
                let start = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
                let end = NaiveDate::from_isoywd_opt(year, week, Weekday::Sun)?;
                Some((start, end))
            }
            Period::Month { year, month } => {
                let start = NaiveDate::from_ymd_opt(year, month, 1)?;
                let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
                Some((start, end))
            }
        }
    }

    pub fn days(&self) -> u32 {
        match self.range() {
            Some((start, end)) => ((end - start).num_days() + 1) as u32,
            None => 1,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Period::Week { .. } | Period::Month { .. })
    }

    /// Canonical form of the input that selected this period.
    pub fn key(&self) -> Option<String> {
        match *self {
            Period::All => None,
            Period::Day(d) => Some(d.format("%Y-%m-%d").to_string()),
            Period::Week { year, week } => Some(format!("{:04}-W{:02}", year, week)),
            Period::Month { year, month } => Some(format!("{:04}-{:02}", year, month)),
        }
    }
}

fn present(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, PeriodError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| PeriodError::BadDate(raw.to_string()))
}

fn parse_week(raw: &str) -> Result<Period, PeriodError> {
    let t = raw.trim();
    let (y, w) = t
        .split_once("-W")
        .or_else(|| t.split_once("-w"))
        .ok_or_else(|| PeriodError::BadWeek(raw.to_string()))?;
    let year = y
        .parse::<i32>()
        .map_err(|_| PeriodError::BadWeek(raw.to_string()))?;
    let week = w
        .parse::<u32>()
        .map_err(|_| PeriodError::BadWeek(raw.to_string()))?;
    let period = Period::Week { year, week };
    if period.range().is_none() {
        return Err(PeriodError::WeekOutOfRange { year, week });
    }
    Ok(period)
}

fn parse_month(raw: &str) -> Result<Period, PeriodError> {
    let t = raw.trim();
    let Some((y, m)) = t.split_once('-') else {
        return Err(PeriodError::BadMonth(raw.to_string()));
    };
    let year = y
        .parse::<i32>()
        .map_err(|_| PeriodError::BadMonth(raw.to_string()))?;
    let month = m
        .parse::<u32>()
        .map_err(|_| PeriodError::BadMonth(raw.to_string()))?;
    if !(1..=12).contains(&month) {
        return Err(PeriodError::MonthOutOfRange(raw.to_string()));
    }
    let period = Period::Month { year, month };
    // Both ends must be representable dates, or the range filter vanishes.
    if period.range().is_none() {
        return Err(PeriodError::MonthOutOfCalendar { year, month });
    }
    Ok(period)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    pub gender: Option<Gender>,
    pub search: Option<String>,
    pub period: Period,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            gender: None,
            search: None,
            period: Period::All,
        }
    }
}

/// Reads `{gender, search, date, week, month}`; a missing object means no filter.
pub fn parse_report_filter(raw: Option<&serde_json::Value>) -> Result<ReportFilter, PeriodError> {
    let Some(raw) = raw else {
        return Ok(ReportFilter::default());
    };
    if raw.is_null() {
        return Ok(ReportFilter::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err(PeriodError::BadShape("filters must be an object"));
    };

    let gender = match opt_str(obj, "gender")?.map(str::trim) {
        None | Some("") => None,
        Some(s) if s.eq_ignore_ascii_case("ALL") => None,
        Some(s) => Some(Gender::parse(s).ok_or_else(|| PeriodError::BadGender(s.to_string()))?),
    };
    let search = opt_str(obj, "search")?
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    let period = Period::from_inputs(
        opt_str(obj, "date")?,
        opt_str(obj, "week")?,
        opt_str(obj, "month")?,
    )?;

    Ok(ReportFilter {
        gender,
        search,
        period,
    })
}

fn opt_str<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<&'a str>, PeriodError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or(PeriodError::BadShape("filter values must be strings or null")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn date_wins_over_week_and_month() {
        let p = Period::from_inputs(Some("2025-03-04"), Some("2025-W10"), Some("2025-03"))
            .expect("period");
        assert_eq!(p, Period::Day(ymd(2025, 3, 4)));
        let p = Period::from_inputs(Some("  "), Some("2025-W10"), Some("2025-03")).expect("period");
        assert_eq!(p, Period::Week { year: 2025, week: 10 });
        let p = Period::from_inputs(None, Some(""), Some("2025-03")).expect("period");
        assert_eq!(p, Period::Month { year: 2025, month: 3 });
        assert_eq!(Period::from_inputs(None, None, None), Ok(Period::All));
    }

    #[test]
    fn iso_week_runs_monday_to_sunday() {
        let p = Period::from_inputs(None, Some("2025-W01"), None).expect("week");
        assert_eq!(p.range(), Some((ymd(2024, 12, 30), ymd(2025, 1, 5))));
        assert_eq!(p.days(), 7);
        assert_eq!(p.key().as_deref(), Some("2025-W01"));
    }

    #[test]
    fn week_53_only_in_long_years() {
        assert!(Period::from_inputs(None, Some("2020-W53"), None).is_ok());
        assert_eq!(
            Period::from_inputs(None, Some("2025-W53"), None),
            Err(PeriodError::WeekOutOfRange { year: 2025, week: 53 })
        );
        assert!(Period::from_inputs(None, Some("2025-W00"), None).is_err());
        assert!(Period::from_inputs(None, Some("2025-10"), None).is_err());
    }

    #[test]
    fn month_lengths_follow_calendar() {
        let feb_leap = Period::from_inputs(None, None, Some("2024-02")).expect("month");
        assert_eq!(feb_leap.range(), Some((ymd(2024, 2, 1), ymd(2024, 2, 29))));
        assert_eq!(feb_leap.days(), 29);
        let dec = Period::from_inputs(None, None, Some("2025-12")).expect("month");
        assert_eq!(dec.range(), Some((ymd(2025, 12, 1), ymd(2025, 12, 31))));
        assert_eq!(dec.days(), 31);
        assert!(matches!(
            Period::from_inputs(None, None, Some("2025-13")),
            Err(PeriodError::MonthOutOfRange(_))
        ));
    }

    #[test]
    fn months_beyond_the_calendar_are_rejected() {
        assert_eq!(
            Period::from_inputs(None, None, Some("300000-01")),
            Err(PeriodError::MonthOutOfCalendar { year: 300000, month: 1 })
        );
        // Near chrono's upper bound: accepted only if the whole month fits.
        for raw in ["262142-12", "262143-01", "262143-12"] {
            if let Ok(p) = Period::from_inputs(None, None, Some(raw)) {
                assert!(p.range().is_some(), "{} accepted without a range", raw);
            }
        }
        assert!(parse_report_filter(Some(&json!({ "month": "300000-01" }))).is_err());
        assert!(Period::from_inputs(None, Some("300000-W02"), None).is_err());
    }

    #[test]
    fn single_day_and_all_count_one_day() {
        let d = Period::from_inputs(Some("2025-06-01"), None, None).expect("day");
        assert_eq!(d.days(), 1);
        assert!(!d.is_range());
        assert_eq!(Period::All.days(), 1);
        assert_eq!(Period::All.range(), None);
    }

    #[test]
    fn filter_object_parses_gender_and_search() {
        let f = parse_report_filter(Some(&json!({
            "gender": "P",
            "search": "  siti ",
            "month": "2025-01"
        })))
        .expect("filter");
        assert_eq!(f.gender, Some(Gender::Female));
        assert_eq!(f.search.as_deref(), Some("siti"));
        assert_eq!(f.period, Period::Month { year: 2025, month: 1 });

        let f = parse_report_filter(Some(&json!({ "gender": "", "search": "" }))).expect("filter");
        assert_eq!(f, ReportFilter::default());
        assert!(parse_report_filter(Some(&json!({ "gender": "X" }))).is_err());
        assert!(parse_report_filter(Some(&json!([1, 2]))).is_err());
        assert!(parse_report_filter(Some(&json!({ "date": 5 }))).is_err());
    }
}
