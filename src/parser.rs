use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use pest::iterators::Pair;
use pest::Parser;
use std::fmt;
use std::fmt::Formatter;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "time.pest"]
pub struct TimeParser;

pub type YMD = (i32, u32, u32);
pub type HM = (u32, u32);

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid integer")]
    ParseInt(#[from] std::num::ParseIntError),
    #[error(transparent)]
    PestError(#[from] pest::error::Error<Rule>),
    #[error("unexpected non matching pattern")]
    UnexpectedNonMatchingPattern,
    #[error("unknown weekday: `{0}`")]
    UnknownWeekday(String),
    #[error("unknown month: `{0}`")]
    UnknownMonth(String),
    #[error("unknown time keyword: `{0}`")]
    UnknownTimeKeyword(String),
    #[error("unknown shortcut day: `{0}`")]
    UnknownShortcutDay(String),
}

fn weekday_from(s: &str) -> Result<Weekday, ParseError> {
    match s {
        "Mon" => Ok(Weekday::Mon),
        "Tue" => Ok(Weekday::Tue),
        "Wed" => Ok(Weekday::Wed),
        "Thu" => Ok(Weekday::Thu),
        "Fri" => Ok(Weekday::Fri),
        "Sat" => Ok(Weekday::Sat),
        "Sun" => Ok(Weekday::Sun),
        _ => Err(ParseError::UnknownWeekday(s.to_string())),
    }
}

fn month_from(s: &str) -> Result<u32, ParseError> {
    match s.to_ascii_lowercase().as_str() {
        "january" | "jan" => Ok(1),
        "february" | "feb" => Ok(2),
        "march" | "mar" => Ok(3),
        "april" | "apr" => Ok(4),
        "may" => Ok(5),
        "june" | "jun" => Ok(6),
        "july" | "jul" => Ok(7),
        "august" | "aug" => Ok(8),
        "september" | "sep" => Ok(9),
        "october" | "oct" => Ok(10),
        "november" | "nov" => Ok(11),
        "december" | "dec" => Ok(12),
        _ => Err(ParseError::UnknownMonth(s.to_string())),
    }
}

fn time_keyword_from(s: &str) -> Result<HM, ParseError> {
    match s {
        "noon" => Ok((12, 0)),
        "teatime" => Ok((16, 0)),
        "midnight" => Ok((0, 0)),
        _ => Err(ParseError::UnknownTimeKeyword(s.to_string())),
    }
}

#[derive(Debug, PartialEq)]
pub enum ShortcutDay {
    Today,
    Tomorrow,
    Yesterday,
}

fn shortcut_day_from(s: &str) -> Result<ShortcutDay, ParseError> {
    match s {
        "today" => Ok(ShortcutDay::Today),
        "tomorrow" => Ok(ShortcutDay::Tomorrow),
        "yesterday" => Ok(ShortcutDay::Yesterday),
        _ => Err(ParseError::UnknownShortcutDay(s.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OffsetUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Months,
    Years,
}

impl fmt::Display for OffsetUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OffsetUnit::Seconds => write!(f, "s"),
            OffsetUnit::Minutes => write!(f, "min"),
            OffsetUnit::Hours => write!(f, "h"),
            OffsetUnit::Days => write!(f, "d"),
            OffsetUnit::Months => write!(f, "mon"),
            OffsetUnit::Years => write!(f, "y"),
        }
    }
}

/// A signed shift applied to the resolved base instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    pub count: i64,
    pub unit: OffsetUnit,
}

// Checked top to bottom; "min" and "mon" must win before any shorter
// prefix could ("m" alone matches nothing and is dropped).
const UNIT_PREFIXES: [(&str, OffsetUnit); 6] = [
    ("s", OffsetUnit::Seconds),
    ("min", OffsetUnit::Minutes),
    ("h", OffsetUnit::Hours),
    ("d", OffsetUnit::Days),
    ("mon", OffsetUnit::Months),
    ("y", OffsetUnit::Years),
];

fn unit_from(s: &str) -> Option<OffsetUnit> {
    UNIT_PREFIXES
        .iter()
        .find(|(prefix, _)| s.starts_with(prefix))
        .map(|(_, unit)| *unit)
}

#[derive(Debug, PartialEq)]
pub enum DateSpec {
    Shortcut(ShortcutDay),
    Ymd(YMD),
    /// Month and day only; the year comes from the reference date.
    MonthDay(u32, u32),
    /// Rewinds to the most recent date with this weekday.
    Weekday(Weekday),
}

#[derive(Debug, PartialEq)]
pub enum TimeExpr {
    /// Whole seconds since the Unix epoch.
    Epoch(i64),
    /// Fully specified "HH:mmYYYYMMdd" literal.
    Literal(YMD, HM),
    /// The reference instant, seconds zeroed, optionally shifted.
    Now(Option<Offset>),
    /// Clock and calendar fragments; whatever is unset comes from the
    /// reference instant (midnight, current date).
    Parts(Option<HM>, Option<DateSpec>, Option<Offset>),
}

/// Strips the separators the supported formats use interchangeably,
/// so `"10:55 2014 12 20"` and `"10:55_2014_12_20"` read the same.
fn normalize(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, ' ' | ',' | '_')).collect()
}

/// An 8-digit string shaped like `YYYYMMDD` is a calendar literal, not an
/// epoch value: year above 1900, month below 13, day below 32.
fn is_calendar_shaped(digits: &str) -> bool {
    if digits.len() != 8 {
        return false;
    }
    let year: u16 = digits[..4].parse().unwrap_or(0);
    let month: u8 = digits[4..6].parse().unwrap_or(13);
    let day: u8 = digits[6..8].parse().unwrap_or(32);
    year > 1900 && month < 13 && day < 32
}

/// Splits a trailing offset off the base expression. `+` wins over `-`;
/// the sign of a `-` offset is pushed back onto the offset text.
fn split_offset(s: &str) -> (&str, String) {
    if let Some((base, offset)) = s.split_once('+') {
        (base, offset.to_string())
    } else if let Some((base, offset)) = s.split_once('-') {
        (base, format!("-{offset}"))
    } else {
        (s, String::new())
    }
}

fn parse_offset(text: &str) -> Result<Option<Offset>, ParseError> {
    if text.is_empty() {
        return Ok(None);
    }
    // Text that is not of the form `(-?digits)(letters)` carries no
    // offset; the base instant passes through unchanged.
    let pairs = match TimeParser::parse(Rule::offset, text) {
        Ok(pairs) => pairs,
        Err(_) => return Ok(None),
    };
    let parts: Vec<(Rule, &str)> = pairs
        .flatten()
        .map(|pair| (pair.as_rule(), pair.as_str()))
        .collect();
    match parts.as_slice() {
        [(Rule::offset, _), (Rule::offset_count, count), (Rule::offset_unit, unit), (Rule::EOI, _)] =>
        {
            let count: i64 = count.parse()?;
            Ok(unit_from(unit).map(|unit| Offset { count, unit }))
        }
        _ => Err(ParseError::UnexpectedNonMatchingPattern),
    }
}

fn clock_from(pair: Pair<Rule>) -> Result<HM, ParseError> {
    let mut hour: u32 = 0;
    let mut minute: u32 = 0;
    let mut meridiem = None;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::hour => hour = part.as_str().parse()?,
            Rule::minute => minute = part.as_str().parse()?,
            Rule::meridiem => meridiem = Some(part.as_str()),
            _ => return Err(ParseError::UnexpectedNonMatchingPattern),
        }
    }
    match meridiem {
        Some("pm") => Ok(((hour % 24 + 12) % 24, minute)),
        _ => Ok((hour, minute)),
    }
}

/// Two-digit years pivot like `%y`: 00-68 land in the 2000s.
fn full_year(year: i32, digits: usize) -> i32 {
    if digits == 2 {
        if year < 69 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}

fn slash_date_from(pair: Pair<Rule>) -> Result<DateSpec, ParseError> {
    let parts: Vec<(Rule, &str)> = pair
        .into_inner()
        .map(|part| (part.as_rule(), part.as_str()))
        .collect();
    match parts.as_slice() {
        [(Rule::month_num, month), (Rule::day_num, day), (Rule::year_num, year)] => {
            let month: u32 = month.parse()?;
            let day: u32 = day.parse()?;
            let year = full_year(year.parse()?, year.len());
            Ok(DateSpec::Ymd((year, month, day)))
        }
        _ => Err(ParseError::UnexpectedNonMatchingPattern),
    }
}

fn digit_date_from(s: &str) -> Result<DateSpec, ParseError> {
    let year: i32 = s[..4].parse()?;
    let month: u32 = s[4..6].parse()?;
    let day: u32 = s[6..8].parse()?;
    Ok(DateSpec::Ymd((year, month, day)))
}

fn month_day_year_from(pair: Pair<Rule>) -> Result<DateSpec, ParseError> {
    let parts: Vec<(Rule, &str)> = pair
        .into_inner()
        .map(|part| (part.as_rule(), part.as_str()))
        .collect();
    match parts.as_slice() {
        [(Rule::month_name, month), (Rule::day_num, day), (Rule::year4, year)] => {
            let month = month_from(month)?;
            let day: u32 = day.parse()?;
            let year: i32 = year.parse()?;
            Ok(DateSpec::Ymd((year, month, day)))
        }
        _ => Err(ParseError::UnexpectedNonMatchingPattern),
    }
}

fn month_day_from(pair: Pair<Rule>) -> Result<DateSpec, ParseError> {
    let parts: Vec<(Rule, &str)> = pair
        .into_inner()
        .map(|part| (part.as_rule(), part.as_str()))
        .collect();
    match parts.as_slice() {
        [(Rule::month_name, month), (Rule::day_num, day)] => {
            let month = month_from(month)?;
            let day: u32 = day.parse()?;
            Ok(DateSpec::MonthDay(month, day))
        }
        _ => Err(ParseError::UnexpectedNonMatchingPattern),
    }
}

fn parse_base(s: &str) -> Result<(Option<HM>, Option<DateSpec>), ParseError> {
    let mut pairs = TimeParser::parse(Rule::base, s)?;
    let base = pairs
        .next()
        .ok_or(ParseError::UnexpectedNonMatchingPattern)?;
    let mut time = None;
    let mut date = None;
    for pair in base.into_inner() {
        match pair.as_rule() {
            Rule::clock => time = Some(clock_from(pair)?),
            Rule::time_keyword => time = Some(time_keyword_from(pair.as_str())?),
            Rule::shortcut_day => {
                date = Some(DateSpec::Shortcut(shortcut_day_from(pair.as_str())?))
            }
            Rule::slash_date => date = Some(slash_date_from(pair)?),
            Rule::digit_date => date = Some(digit_date_from(pair.as_str())?),
            Rule::month_day_year => date = Some(month_day_year_from(pair)?),
            Rule::month_day => date = Some(month_day_from(pair)?),
            Rule::weekday => date = Some(DateSpec::Weekday(weekday_from(pair.as_str())?)),
            Rule::EOI => {}
            _ => return Err(ParseError::UnexpectedNonMatchingPattern),
        }
    }
    Ok((time, date))
}

/// Runs the full pipeline over one query-parameter value: normalize,
/// classify all-digit input, try the compact fast path, split off a
/// trailing offset, then read the remaining time and date fragments.
pub fn parse_expr(s: &str) -> Result<TimeExpr, ParseError> {
    let normalized = normalize(s);

    if !normalized.is_empty() && normalized.bytes().all(|b| b.is_ascii_digit()) {
        if !is_calendar_shaped(&normalized) {
            let seconds: i64 = normalized.parse()?;
            return Ok(TimeExpr::Epoch(seconds));
        }
        // calendar-shaped 8-digit literal: leave it for the date formats
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(&normalized, "%H:%M%Y%m%d") {
        return Ok(TimeExpr::Literal(
            (datetime.year(), datetime.month(), datetime.day()),
            (datetime.hour(), datetime.minute()),
        ));
    }

    let (base, offset_text) = split_offset(&normalized);
    let offset = parse_offset(&offset_text)?;
    if base.is_empty() || base == "now" {
        return Ok(TimeExpr::Now(offset));
    }
    let (time, date) = parse_base(base)?;
    Ok(TimeExpr::Parts(time, date, offset))
}
