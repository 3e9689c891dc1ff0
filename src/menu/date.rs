use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Lines between the month label and the day number. The menu template puts one
/// separator line (usually the weekday) in between.
const DAY_LINE_OFFSET: usize = 2;

// Ramen Shop's menus render month names with arbitrary spaces between letters,
// so "march", "m a r c h" and "mar  ch" all have to match.
static MONTH_PATTERNS: Lazy<Vec<(u32, Regex)>> = Lazy::new(|| {
    MONTH_NAMES
        .iter()
        .zip(1u32..)
        .map(|(name, month)| {
            let letters: Vec<String> = name.chars().map(|c| c.to_string()).collect();
            let pattern = format!("^{}$", letters.join(" *"));
            (month, Regex::new(&pattern).expect("valid month pattern"))
        })
        .collect()
});

static DAY_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("valid day regex"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    /// Month and day were found but do not form a real date (e.g. February 31).
    #[error("invalid calendar date: {year}-{month:02}-{day}")]
    InvalidCalendarDate { year: i32, month: u32, day: String },
}

/// A fully resolved menu date. The year is inferred, never read from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MenuDate(NaiveDate);

impl MenuDate {
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Object key the menu is archived under, e.g. `2024-03-15.pdf`.
    pub fn archive_key(&self) -> String {
        format!("{}.pdf", self)
    }

    /// Human label used in alerts, e.g. `Friday, Mar 15`.
    pub fn label(&self) -> String {
        self.0.format("%A, %b %-d").to_string()
    }
}

impl fmt::Display for MenuDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year(), self.month(), self.day())
    }
}

/// Finds the first line (top to bottom) that is entirely a month name.
/// Returns the line index and the 1-indexed month number.
pub fn find_month(lines: &[String]) -> Option<(usize, u32)> {
    lines.iter().enumerate().find_map(|(index, line)| {
        MONTH_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(line))
            .map(|(month, _)| (index, *month))
    })
}

/// Picks the year for a menu month, assuming the menu is for today or the next few days.
/// Only the December/January wraparound is handled.
pub fn infer_year(month: u32, today: NaiveDate) -> i32 {
    match (today.month(), month) {
        (12, 1) => today.year() + 1,
        (1, 12) => today.year() - 1,
        _ => today.year(),
    }
}

/// Extracts the menu date from normalized lines, resolving the year against `today`.
///
/// `Ok(None)` means no date could be located (no month line, no line at the day
/// offset, or no digits on it). An impossible month/day pair is an error.
pub fn extract(lines: &[String], today: NaiveDate) -> Result<Option<MenuDate>, DateError> {
    let Some((month_line, month)) = find_month(lines) else {
        return Ok(None);
    };

    let Some(day_line) = lines.get(month_line + DAY_LINE_OFFSET) else {
        return Ok(None);
    };

    let Some(digits) = DAY_DIGITS.find(day_line) else {
        return Ok(None);
    };

    let year = infer_year(month, today);
    let invalid = || DateError::InvalidCalendarDate {
        year,
        month,
        day: digits.as_str().to_string(),
    };

    let day: u32 = digits.as_str().parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|date| Some(MenuDate(date)))
        .ok_or_else(invalid)
}
