//! Condition and schedule evaluation.
//!
//! Conditions are a fixed operator set evaluated by hand; user input is
//! never executed or compiled into anything other than a `regex`
//! pattern, and a pattern that fails to compile evaluates to false.

use chrono::{DateTime, Datelike, Local, Timelike};
use serde_json::Value;

use crate::types::{Condition, ConditionOperator, Schedule};

/// Walk a dot-separated path into a JSON tree.
///
/// Returns `None` when any segment is missing or the intermediate
/// value is not an object. Array indexing is supported with numeric
/// segments.
pub fn lookup_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Evaluate all conditions against the payload (logical AND).
///
/// An empty list always matches.
pub fn conditions_match(conditions: &[Condition], payload: &Value) -> bool {
    conditions
        .iter()
        .all(|condition| evaluate(condition, payload))
}

fn evaluate(condition: &Condition, payload: &Value) -> bool {
    let resolved = lookup_path(payload, &condition.field);

    match condition.operator {
        ConditionOperator::Exists => resolved.is_some(),
        ConditionOperator::NotExists => resolved.is_none(),
        ConditionOperator::Equals => resolved.is_some_and(|v| values_equal(v, &condition.value)),
        ConditionOperator::NotEquals => {
            resolved.is_some_and(|v| !values_equal(v, &condition.value))
        }
        ConditionOperator::Contains => resolved.is_some_and(|v| contains(v, &condition.value)),
        ConditionOperator::NotContains => {
            resolved.is_some_and(|v| !contains(v, &condition.value))
        }
        ConditionOperator::GreaterThan => compare(resolved, &condition.value, |a, b| a > b),
        ConditionOperator::LessThan => compare(resolved, &condition.value, |a, b| a < b),
        ConditionOperator::Regex => resolved.is_some_and(|v| regex_matches(v, &condition.value)),
    }
}

fn values_equal(resolved: &Value, expected: &Value) -> bool {
    if resolved == expected {
        return true;
    }
    // 1 and 1.0 compare equal even when the JSON encodings differ.
    match (as_number(resolved), as_number(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

// Substring match, string-typed only.
fn contains(resolved: &Value, needle: &Value) -> bool {
    match (resolved.as_str(), needle.as_str()) {
        (Some(haystack), Some(needle)) => haystack.contains(needle),
        _ => false,
    }
}

fn compare(resolved: Option<&Value>, expected: &Value, ordering: fn(f64, f64) -> bool) -> bool {
    let Some(resolved) = resolved else {
        return false;
    };
    match (as_number(resolved), as_number(expected)) {
        (Some(a), Some(b)) => ordering(a, b),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn regex_matches(resolved: &Value, pattern: &Value) -> bool {
    let Some(text) = resolved.as_str() else {
        return false;
    };
    let Some(pattern) = pattern.as_str() else {
        return false;
    };
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(text),
        Err(err) => {
            tracing::warn!(pattern, %err, "invalid regex in condition, evaluating to false");
            false
        }
    }
}

/// Whether the schedule admits delivery at `now` (engine local time).
pub fn schedule_matches(schedule: &Schedule, now: DateTime<Local>) -> bool {
    if let Some(range) = &schedule.time_range {
        // Inclusive on both bounds, truncated to whole minutes so an
        // end of 17:00 admits 17:00:59.
        let minute_of_day = now.time().hour() * 60 + now.time().minute();
        let start = range.start.hour() * 60 + range.start.minute();
        let end = range.end.hour() * 60 + range.end.minute();
        if minute_of_day < start || minute_of_day > end {
            return false;
        }
    }

    if let Some(days) = &schedule.days_of_week {
        let day = now.weekday().num_days_from_sunday() as u8;
        if !days.contains(&day) {
            return false;
        }
    }

    if let Some((from, to)) = &schedule.date_range {
        let today = now.date_naive();
        if today < *from || today > *to {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::types::TimeRange;

    fn payload() -> Value {
        json!({
            "data": {
                "transcription": {
                    "confidence": 0.95,
                    "language": "he-IL",
                    "text": "hello world",
                },
                "items": [{"name": "first"}],
            }
        })
    }

    fn cond(field: &str, operator: ConditionOperator, value: Value) -> Condition {
        Condition::new(field, operator, value)
    }

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let p = payload();
        assert_eq!(
            lookup_path(&p, "data.transcription.language"),
            Some(&json!("he-IL"))
        );
        assert_eq!(lookup_path(&p, "data.items.0.name"), Some(&json!("first")));
        assert_eq!(lookup_path(&p, "data.missing.deep"), None);
    }

    #[test]
    fn greater_than_coerces_numbers() {
        let p = payload();
        assert!(conditions_match(
            &[cond(
                "data.transcription.confidence",
                ConditionOperator::GreaterThan,
                json!(0.8)
            )],
            &p
        ));
        assert!(!conditions_match(
            &[cond(
                "data.transcription.confidence",
                ConditionOperator::GreaterThan,
                json!("0.99")
            )],
            &p
        ));
    }

    #[test]
    fn contains_is_string_only() {
        let p = payload();
        assert!(conditions_match(
            &[cond(
                "data.transcription.text",
                ConditionOperator::Contains,
                json!("world")
            )],
            &p
        ));
        assert!(!conditions_match(
            &[cond(
                "data.transcription.confidence",
                ConditionOperator::Contains,
                json!("0.9")
            )],
            &p
        ));
    }

    #[test]
    fn missing_path_satisfies_only_not_exists() {
        let p = payload();
        assert!(conditions_match(
            &[cond("data.absent", ConditionOperator::NotExists, Value::Null)],
            &p
        ));
        assert!(!conditions_match(
            &[cond("data.absent", ConditionOperator::Equals, Value::Null)],
            &p
        ));
        assert!(!conditions_match(
            &[cond("data.absent", ConditionOperator::NotEquals, json!(1))],
            &p
        ));
    }

    #[test]
    fn invalid_regex_evaluates_false_without_panicking() {
        let p = payload();
        assert!(!conditions_match(
            &[cond(
                "data.transcription.text",
                ConditionOperator::Regex,
                json!("([unclosed")
            )],
            &p
        ));
        assert!(conditions_match(
            &[cond(
                "data.transcription.text",
                ConditionOperator::Regex,
                json!("^hello")
            )],
            &p
        ));
    }

    #[test]
    fn all_conditions_are_anded() {
        let p = payload();
        let passing = cond(
            "data.transcription.confidence",
            ConditionOperator::GreaterThan,
            json!(0.5),
        );
        let failing = cond(
            "data.transcription.language",
            ConditionOperator::Equals,
            json!("en-US"),
        );
        assert!(!conditions_match(&[passing, failing], &p));
    }

    #[test]
    fn schedule_time_range_is_inclusive() {
        // 2026-08-26 is a Wednesday.
        let now = Local.with_ymd_and_hms(2026, 8, 26, 17, 0, 30).unwrap();
        let schedule = Schedule {
            time_range: Some(TimeRange {
                start: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            }),
            ..Default::default()
        };
        assert!(schedule_matches(&schedule, now));

        let after = Local.with_ymd_and_hms(2026, 8, 26, 17, 1, 0).unwrap();
        assert!(!schedule_matches(&schedule, after));
    }

    #[test]
    fn schedule_days_of_week_use_sunday_zero() {
        let wednesday = Local.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap();
        let weekdays: HashSet<u8> = [1, 2, 3, 4, 5].into_iter().collect();
        let schedule = Schedule {
            days_of_week: Some(weekdays),
            ..Default::default()
        };
        assert!(schedule_matches(&schedule, wednesday));

        let sunday_only: HashSet<u8> = [0].into_iter().collect();
        let schedule = Schedule {
            days_of_week: Some(sunday_only),
            ..Default::default()
        };
        assert!(!schedule_matches(&schedule, wednesday));
    }

    #[test]
    fn empty_schedule_always_matches() {
        let now = Local.with_ymd_and_hms(2026, 8, 26, 3, 0, 0).unwrap();
        assert!(schedule_matches(&Schedule::default(), now));
    }
}
