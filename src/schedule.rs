//! Meeting schedule parsing.
//!
//! A schedule is free text in which some lines carry a date
//! (`M/D/YY` or `M/D/YYYY`) and optionally a time (`H:MM` with an
//! optional AM/PM suffix). Each dated line opens a meeting block that also
//! takes the indented or bulleted detail lines directly beneath it.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::section::is_list_item;

pub const MONTHS: [&str; 12] = [
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

/// One dated entry from a schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Meeting {
    pub when: NaiveDateTime,
    /// The date line plus its detail lines, as written.
    pub block: String,
}

impl Meeting {
    pub fn month(&self) -> u32 {
        self.when.month()
    }
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").expect("date pattern is valid")
    })
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2}):(\d{2})(?:\s*([ap])\.?m\b\.?|\b)").expect("time pattern is valid")
    })
}

/// Parses the first date on a line. Two-digit years are taken as 20YY;
/// three-digit years and impossible dates are rejected.
pub fn parse_date(line: &str) -> Option<NaiveDate> {
    date_re().captures_iter(line).find_map(|caps| {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year_text = &caps[3];
        let year: i32 = match year_text.len() {
            2 => 2000 + year_text.parse::<i32>().ok()?,
            4 => year_text.parse().ok()?,
            _ => return None,
        };
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// Parses the first time on a line into 24-hour form.
pub fn parse_time(line: &str) -> Option<NaiveTime> {
    time_re().captures_iter(line).find_map(|caps| {
        let mut hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(ref half) if half == "p" => {
                if !(1..=12).contains(&hour) {
                    return None;
                }
                if hour != 12 {
                    hour += 12;
                }
            }
            Some(_) => {
                if !(1..=12).contains(&hour) {
                    return None;
                }
                if hour == 12 {
                    hour = 0;
                }
            }
            None => {}
        }
        NaiveTime::from_hms_opt(hour, minute, 0)
    })
}

/// Splits a schedule into meeting blocks, in document order.
pub fn parse_meetings(text: &str) -> Vec<Meeting> {
    let lines: Vec<&str> = text.lines().collect();
    let mut meetings = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(date) = parse_date(lines[i]) else {
            i += 1;
            continue;
        };
        let time = parse_time(lines[i]).unwrap_or(NaiveTime::MIN);
        let mut block = vec![lines[i].trim_end()];
        let mut j = i + 1;
        while j < lines.len() && is_detail_line(lines[j]) {
            block.push(lines[j].trim_end());
            j += 1;
        }
        meetings.push(Meeting {
            when: date.and_time(time),
            block: block.join("\n"),
        });
        i = j;
    }
    meetings
}

fn is_detail_line(line: &str) -> bool {
    if line.trim().is_empty() || parse_date(line).is_some() {
        return false;
    }
    line.starts_with(char::is_whitespace) || is_list_item(line)
}

/// The earliest meeting strictly after `now`. Ties keep document order.
pub fn next_meeting(text: &str, now: NaiveDateTime) -> Option<Meeting> {
    parse_meetings(text)
        .into_iter()
        .filter(|m| m.when > now)
        .fold(None, |best: Option<Meeting>, m| match best {
            Some(b) if b.when <= m.when => Some(b),
            _ => Some(m),
        })
}

/// Meetings whose date falls in `month` (1-12), in document order.
pub fn meetings_in_month(text: &str, month: u32) -> Vec<Meeting> {
    parse_meetings(text)
        .into_iter()
        .filter(|m| m.month() == month)
        .collect()
}

/// The first full month name appearing as a whole word, as 1-12.
pub fn month_in_query(query: &str) -> Option<u32> {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();
    words
        .iter()
        .find_map(|w| MONTHS.iter().position(|m| m == w))
        .map(|idx| idx as u32 + 1)
}

pub fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    NAMES
        .get((month as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("that month")
}
