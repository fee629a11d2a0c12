use crate::parser::{DateSpec, Offset, OffsetUnit, ShortcutDay, TimeExpr};
use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum EvaluationError {
    #[error("invalid time of day: {hour}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },
    #[error("invalid calendar date: {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("no unambiguous local time for {0}")]
    InvalidLocalTime(NaiveDateTime),
    #[error("datetime out of range")]
    OutOfRange,
    #[error("offset out of range: {count}{unit}")]
    OffsetOutOfRange { count: i64, unit: OffsetUnit },
}

fn local_datetime<Tz: TimeZone>(
    now: &DateTime<Tz>,
    naive: NaiveDateTime,
) -> Result<DateTime<Tz>, EvaluationError> {
    now.timezone()
        .from_local_datetime(&naive)
        .single()
        .ok_or(EvaluationError::InvalidLocalTime(naive))
}

/// Resolves a date fragment against the reference date.
fn resolve_date(spec: DateSpec, reference: NaiveDate) -> Result<NaiveDate, EvaluationError> {
    match spec {
        DateSpec::Shortcut(ShortcutDay::Today) => Ok(reference),
        DateSpec::Shortcut(ShortcutDay::Tomorrow) => {
            reference.succ_opt().ok_or(EvaluationError::OutOfRange)
        }
        DateSpec::Shortcut(ShortcutDay::Yesterday) => {
            reference.pred_opt().ok_or(EvaluationError::OutOfRange)
        }
        // a shape that matched but names an impossible date is ignored
        DateSpec::Ymd((year, month, day)) => {
            Ok(NaiveDate::from_ymd_opt(year, month, day).unwrap_or(reference))
        }
        DateSpec::MonthDay(month, day) => {
            Ok(NaiveDate::from_ymd_opt(reference.year(), month, day).unwrap_or(reference))
        }
        DateSpec::Weekday(weekday) => {
            // walks backward only, at most six steps
            let mut date = reference;
            while date.weekday() != weekday {
                date = date.pred_opt().ok_or(EvaluationError::OutOfRange)?;
            }
            Ok(date)
        }
    }
}

fn shift_months<Tz: TimeZone>(base: DateTime<Tz>, months: i64) -> Option<DateTime<Tz>> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        base.checked_add_months(Months::new(magnitude))
    } else {
        base.checked_sub_months(Months::new(magnitude))
    }
}

/// Seconds, minutes, hours and days shift by a fixed duration; months and
/// years shift calendar-aware, clamping the day of month where needed.
fn apply_offset<Tz: TimeZone>(
    base: DateTime<Tz>,
    offset: Option<Offset>,
) -> Result<DateTime<Tz>, EvaluationError> {
    let Some(Offset { count, unit }) = offset else {
        return Ok(base);
    };
    let shifted = match unit {
        OffsetUnit::Seconds => {
            Duration::try_seconds(count).and_then(|d| base.checked_add_signed(d))
        }
        OffsetUnit::Minutes => {
            Duration::try_minutes(count).and_then(|d| base.checked_add_signed(d))
        }
        OffsetUnit::Hours => Duration::try_hours(count).and_then(|d| base.checked_add_signed(d)),
        OffsetUnit::Days => Duration::try_days(count).and_then(|d| base.checked_add_signed(d)),
        OffsetUnit::Months => shift_months(base, count),
        OffsetUnit::Years => count
            .checked_mul(12)
            .and_then(|months| shift_months(base, months)),
    };
    shifted.ok_or(EvaluationError::OffsetOutOfRange { count, unit })
}

pub fn evaluate<Tz: TimeZone>(
    expr: TimeExpr,
    now: DateTime<Tz>,
) -> Result<DateTime<Tz>, EvaluationError> {
    match expr {
        TimeExpr::Epoch(seconds) => {
            let utc = DateTime::from_timestamp(seconds, 0).ok_or(EvaluationError::OutOfRange)?;
            Ok(utc.with_timezone(&now.timezone()))
        }
        TimeExpr::Literal((year, month, day), (hour, minute)) => {
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .ok_or(EvaluationError::InvalidDate { year, month, day })?;
            let time = NaiveTime::from_hms_opt(hour, minute, 0)
                .ok_or(EvaluationError::InvalidTime { hour, minute })?;
            local_datetime(&now, date.and_time(time))
        }
        TimeExpr::Now(offset) => {
            let reference = now
                .with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .ok_or(EvaluationError::OutOfRange)?;
            apply_offset(reference, offset)
        }
        TimeExpr::Parts(time, date, offset) => {
            let (hour, minute) = time.unwrap_or((0, 0));
            let clock = NaiveTime::from_hms_opt(hour, minute, 0)
                .ok_or(EvaluationError::InvalidTime { hour, minute })?;
            let mut day = now.date_naive();
            if let Some(spec) = date {
                day = resolve_date(spec, day)?;
            }
            let base = local_datetime(&now, day.and_time(clock))?;
            apply_offset(base, offset)
        }
    }
}

#[cfg(test)]
mod test {
    use crate::interpreter::{evaluate, EvaluationError};
    use crate::parser::{DateSpec, Offset, OffsetUnit, ShortcutDay, TimeExpr};
    use chrono::{TimeZone, Utc, Weekday};

    // 2015-02-01 is a Sunday.
    fn reference() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 2, 1, 10, 55, 30).unwrap()
    }

    #[test]
    fn test_evaluate_now() {
        let expected = Utc.with_ymd_and_hms(2015, 2, 1, 10, 55, 0).unwrap();
        assert_eq!(evaluate(TimeExpr::Now(None), reference()).unwrap(), expected);
    }

    #[test]
    fn test_evaluate_epoch() {
        let expected = Utc.timestamp_opt(1422792604, 0).unwrap();
        assert_eq!(
            evaluate(TimeExpr::Epoch(1422792604), reference()).unwrap(),
            expected
        );
        assert_eq!(
            evaluate(TimeExpr::Epoch(i64::MAX), reference()),
            Err(EvaluationError::OutOfRange)
        );
    }

    #[test]
    fn test_evaluate_literal() {
        let expected = Utc.with_ymd_and_hms(2014, 12, 20, 10, 55, 0).unwrap();
        assert_eq!(
            evaluate(TimeExpr::Literal((2014, 12, 20), (10, 55)), reference()).unwrap(),
            expected
        );
    }

    #[test]
    fn test_evaluate_time_fragment_only() {
        let expected = Utc.with_ymd_and_hms(2015, 2, 1, 12, 24, 0).unwrap();
        assert_eq!(
            evaluate(TimeExpr::Parts(Some((12, 24)), None, None), reference()).unwrap(),
            expected
        );
    }

    #[test]
    fn test_evaluate_defaults_to_midnight_today() {
        let expected = Utc.with_ymd_and_hms(2015, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(
            evaluate(TimeExpr::Parts(None, None, None), reference()).unwrap(),
            expected
        );
    }

    #[test]
    fn test_evaluate_shortcut_days() {
        let today = Utc.with_ymd_and_hms(2015, 2, 1, 0, 0, 0).unwrap();
        let tomorrow = Utc.with_ymd_and_hms(2015, 2, 2, 0, 0, 0).unwrap();
        let yesterday = Utc.with_ymd_and_hms(2015, 1, 31, 0, 0, 0).unwrap();
        for (day, expected) in [
            (ShortcutDay::Today, today),
            (ShortcutDay::Tomorrow, tomorrow),
            (ShortcutDay::Yesterday, yesterday),
        ] {
            assert_eq!(
                evaluate(
                    TimeExpr::Parts(None, Some(DateSpec::Shortcut(day)), None),
                    reference()
                )
                .unwrap(),
                expected
            );
        }
    }

    #[test]
    fn test_evaluate_month_day_uses_reference_year() {
        let expected = Utc.with_ymd_and_hms(2015, 7, 30, 0, 0, 0).unwrap();
        assert_eq!(
            evaluate(
                TimeExpr::Parts(None, Some(DateSpec::MonthDay(7, 30)), None),
                reference()
            )
            .unwrap(),
            expected
        );
    }

    #[test]
    fn test_evaluate_impossible_date_degrades() {
        let expected = Utc.with_ymd_and_hms(2015, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(
            evaluate(
                TimeExpr::Parts(None, Some(DateSpec::Ymd((2014, 4, 31))), None),
                reference()
            )
            .unwrap(),
            expected
        );
    }

    #[test]
    fn test_evaluate_weekday_rewinds() {
        // reference day itself matches: no movement
        let sunday = Utc.with_ymd_and_hms(2015, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(
            evaluate(
                TimeExpr::Parts(None, Some(DateSpec::Weekday(Weekday::Sun)), None),
                reference()
            )
            .unwrap(),
            sunday
        );
        let saturday = Utc.with_ymd_and_hms(2015, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(
            evaluate(
                TimeExpr::Parts(None, Some(DateSpec::Weekday(Weekday::Sat)), None),
                reference()
            )
            .unwrap(),
            saturday
        );
        // most recent Monday is six days back, never one day forward
        let monday = Utc.with_ymd_and_hms(2015, 1, 26, 0, 0, 0).unwrap();
        assert_eq!(
            evaluate(
                TimeExpr::Parts(None, Some(DateSpec::Weekday(Weekday::Mon)), None),
                reference()
            )
            .unwrap(),
            monday
        );
    }

    #[test]
    fn test_evaluate_fixed_duration_offsets() {
        let offset = |count, unit| TimeExpr::Now(Some(Offset { count, unit }));
        assert_eq!(
            evaluate(offset(-30, OffsetUnit::Seconds), reference()).unwrap(),
            Utc.with_ymd_and_hms(2015, 2, 1, 10, 54, 30).unwrap()
        );
        assert_eq!(
            evaluate(offset(-1, OffsetUnit::Minutes), reference()).unwrap(),
            Utc.with_ymd_and_hms(2015, 2, 1, 10, 54, 0).unwrap()
        );
        assert_eq!(
            evaluate(offset(6, OffsetUnit::Hours), reference()).unwrap(),
            Utc.with_ymd_and_hms(2015, 2, 1, 16, 55, 0).unwrap()
        );
        assert_eq!(
            evaluate(offset(-1, OffsetUnit::Days), reference()).unwrap(),
            Utc.with_ymd_and_hms(2015, 1, 31, 10, 55, 0).unwrap()
        );
    }

    #[test]
    fn test_evaluate_calendar_offsets_clamp() {
        // Jan 31 + 1 month clamps to Feb 28
        let jan31 = TimeExpr::Parts(
            None,
            Some(DateSpec::Ymd((2015, 1, 31))),
            Some(Offset {
                count: 1,
                unit: OffsetUnit::Months,
            }),
        );
        assert_eq!(
            evaluate(jan31, reference()).unwrap(),
            Utc.with_ymd_and_hms(2015, 2, 28, 0, 0, 0).unwrap()
        );
        // Feb 29 + 1 year clamps to Feb 28
        let leap = TimeExpr::Parts(
            None,
            Some(DateSpec::Ymd((2016, 2, 29))),
            Some(Offset {
                count: 1,
                unit: OffsetUnit::Years,
            }),
        );
        assert_eq!(
            evaluate(leap, reference()).unwrap(),
            Utc.with_ymd_and_hms(2017, 2, 28, 0, 0, 0).unwrap()
        );
        let back = TimeExpr::Parts(
            None,
            Some(DateSpec::Ymd((2015, 3, 31))),
            Some(Offset {
                count: -1,
                unit: OffsetUnit::Months,
            }),
        );
        assert_eq!(
            evaluate(back, reference()).unwrap(),
            Utc.with_ymd_and_hms(2015, 2, 28, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_evaluate_invalid_time() {
        assert_eq!(
            evaluate(TimeExpr::Parts(Some((99, 0)), None, None), reference()),
            Err(EvaluationError::InvalidTime {
                hour: 99,
                minute: 0
            })
        );
    }

    #[test]
    fn test_evaluate_offset_overflow() {
        assert_eq!(
            evaluate(
                TimeExpr::Now(Some(Offset {
                    count: i64::MAX,
                    unit: OffsetUnit::Days
                })),
                reference()
            ),
            Err(EvaluationError::OffsetOutOfRange {
                count: i64::MAX,
                unit: OffsetUnit::Days
            })
        );
    }
}
