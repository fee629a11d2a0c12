//! # querytime
//! Graphite-style time expression parser for the `from`/`until` query
//! parameters of an event search API.
//!
//! Accepts Unix epoch seconds, compact `HH:mmYYYYMMdd` literals, relative
//! keywords (`now`, `yesterday`, `noon`), partial dates (`Jul 30`,
//! `12/30/14`, `Sun`) and trailing offsets (`-1d`, `+6h`). Unrecognized
//! fragments degrade to sensible defaults instead of failing.
//!
//! ## Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use querytime::parse;
//! let now = Utc.with_ymd_and_hms(2015, 2, 1, 10, 55, 30).unwrap();
//! let expected = Utc.with_ymd_and_hms(2015, 1, 31, 10, 55, 0).unwrap();
//! let datetime = parse("now - 1d", now).unwrap();
//! assert_eq!(datetime, expected);
//! ```
//!
extern crate pest;
#[macro_use]
extern crate pest_derive;

use chrono::DateTime;
use thiserror::Error;

pub mod interpreter;
pub mod parser;

#[derive(Error, Debug)]
pub enum QueryTimeError {
    #[error(transparent)]
    ParseError(#[from] parser::ParseError),
    #[error(transparent)]
    EvaluationError(#[from] interpreter::EvaluationError),
}

/// Resolves a time expression against `now`, the reference instant for
/// every relative or partial form. `now` is read exactly once, so a
/// single call is internally consistent.
pub fn parse<Tz: chrono::TimeZone>(
    s: &str,
    now: DateTime<Tz>,
) -> Result<DateTime<Tz>, QueryTimeError> {
    let expr = parser::parse_expr(s)?;
    let datetime = interpreter::evaluate(expr, now)?;
    Ok(datetime)
}

/// Like [`parse`], but returns the whole seconds since the Unix epoch
/// that a search backend consumes as a range bound.
pub fn parse_timestamp<Tz: chrono::TimeZone>(
    s: &str,
    now: DateTime<Tz>,
) -> Result<i64, QueryTimeError> {
    Ok(parse(s, now)?.timestamp())
}
