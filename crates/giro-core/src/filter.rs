//! Query filter compiler.
//!
//! Pure translation of a query's extracted date range and time-of-day
//! preference into the structured metadata predicate handed to the semantic
//! retrieval collaborator. Dates travel as integer day offsets from a fixed
//! origin, matching the metadata stored in the index.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

/// Origin for the integer date encoding used by the retrieval index.
const DATE_ORIGIN: (i32, u32, u32) = (2023, 1, 1);

/// Day offset of `date` from the fixed origin.
pub fn date_ordinal(date: NaiveDate) -> i64 {
    let (y, m, d) = DATE_ORIGIN;
    let origin = NaiveDate::from_ymd_opt(y, m, d).unwrap();
    (date - origin).num_days()
}

/// Time-of-day preference as extracted from the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePreference {
    Daytime,
    Nighttime,
    /// No preference stated.
    #[default]
    #[serde(alias = "both")]
    EntireDay,
}

/// The date/time intent extracted from a query. `None` dates mean
/// "unspecified" and take the defaults at compile time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub time: TimePreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Lte,
    Gte,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

/// Structured predicate over item metadata, serialized as-is for the
/// retrieval service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Filter {
    Compare {
        comparator: Comparator,
        attribute: &'static str,
        value: Value,
    },
    Operation {
        operator: Operator,
        arguments: Vec<Filter>,
    },
}

impl Filter {
    fn cmp(comparator: Comparator, attribute: &'static str, value: Value) -> Self {
        Self::Compare {
            comparator,
            attribute,
            value,
        }
    }
}

/// The item metadata shape the compiled predicate evaluates against.
#[derive(Debug, Clone, Copy)]
pub struct ItemAvailability {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Closed flags indexed Monday..Sunday.
    pub closed: [bool; 7],
    pub is_during_day: bool,
    pub is_during_night: bool,
}

const CLOSED_ATTRIBUTES: [&str; 7] = [
    "is_closed_mon",
    "is_closed_tue",
    "is_closed_wed",
    "is_closed_thu",
    "is_closed_fri",
    "is_closed_sat",
    "is_closed_sun",
];

/// Compile a query's availability intent into a conjunctive predicate.
///
/// Defaulting: an unspecified start is `today`; an unspecified end is
/// `today + lookahead_days - 1` (a one-week horizon with the default 7).
/// An inverted extracted range is clamped to a single day rather than
/// failing the turn.
pub fn compile(query: &DateQuery, today: NaiveDate, lookahead_days: i64) -> Filter {
    let start = query.start.unwrap_or(today);
    let end = query.end.unwrap_or(today + Duration::days(lookahead_days - 1));
    let end = end.max(start);

    // Interval overlap: the item's active interval must intersect the
    // requested one, not be contained in it.
    let mut arguments = vec![
        Filter::cmp(Comparator::Lte, "start_date", Value::Int(date_ordinal(end))),
        Filter::cmp(Comparator::Gte, "end_date", Value::Int(date_ordinal(start))),
    ];

    // The item must be open on at least one weekday occurring in the range.
    let mut present = [false; 7];
    let span = (end - start).num_days().min(6);
    for i in 0..=span {
        let day = (start + Duration::days(i)).weekday();
        present[day.num_days_from_monday() as usize] = true;
    }

    let open_terms: Vec<Filter> = CLOSED_ATTRIBUTES
        .iter()
        .zip(present.iter())
        .filter(|(_, p)| **p)
        .map(|(attr, _)| Filter::cmp(Comparator::Eq, attr, Value::Bool(false)))
        .collect();
    // The range is non-empty by construction, so this can never be an empty
    // disjunction (which the retriever would treat as match-nothing).
    assert!(!open_terms.is_empty());
    arguments.push(Filter::Operation {
        operator: Operator::Or,
        arguments: open_terms,
    });

    match query.time {
        TimePreference::Daytime => {
            arguments.push(Filter::cmp(Comparator::Eq, "is_during_day", Value::Bool(true)));
        }
        TimePreference::Nighttime => {
            arguments.push(Filter::cmp(
                Comparator::Eq,
                "is_during_night",
                Value::Bool(true),
            ));
        }
        TimePreference::EntireDay => {}
    }

    Filter::Operation {
        operator: Operator::And,
        arguments,
    }
}

impl ItemAvailability {
    fn attribute(&self, name: &str) -> Value {
        match name {
            "start_date" => Value::Int(date_ordinal(self.start_date)),
            "end_date" => Value::Int(date_ordinal(self.end_date)),
            "is_during_day" => Value::Bool(self.is_during_day),
            "is_during_night" => Value::Bool(self.is_during_night),
            _ => {
                let idx = CLOSED_ATTRIBUTES
                    .iter()
                    .position(|a| *a == name)
                    .unwrap_or_else(|| panic!("unknown filter attribute: {name}"));
                Value::Bool(self.closed[idx])
            }
        }
    }
}

impl Filter {
    /// Evaluate the predicate against one item's metadata.
    pub fn matches(&self, item: &ItemAvailability) -> bool {
        match self {
            Self::Compare {
                comparator,
                attribute,
                value,
            } => {
                let actual = item.attribute(attribute);
                match (actual, *value, comparator) {
                    (Value::Int(a), Value::Int(b), Comparator::Lte) => a <= b,
                    (Value::Int(a), Value::Int(b), Comparator::Gte) => a >= b,
                    (Value::Int(a), Value::Int(b), Comparator::Eq) => a == b,
                    (Value::Bool(a), Value::Bool(b), Comparator::Eq) => a == b,
                    _ => false,
                }
            }
            Self::Operation {
                operator: Operator::And,
                arguments,
            } => arguments.iter().all(|f| f.matches(item)),
            Self::Operation {
                operator: Operator::Or,
                arguments,
            } => arguments.iter().any(|f| f.matches(item)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_item(start: NaiveDate, end: NaiveDate) -> ItemAvailability {
        ItemAvailability {
            start_date: start,
            end_date: end,
            closed: [false; 7],
            is_during_day: true,
            is_during_night: true,
        }
    }

    /// Collect the closed-day attributes in the compiled weekday disjunction.
    fn weekday_terms(filter: &Filter) -> Vec<&'static str> {
        let Filter::Operation { arguments, .. } = filter else {
            panic!("expected top-level conjunction");
        };
        for arg in arguments {
            if let Filter::Operation {
                operator: Operator::Or,
                arguments,
            } = arg
            {
                return arguments
                    .iter()
                    .map(|f| match f {
                        Filter::Compare { attribute, .. } => *attribute,
                        _ => panic!("expected comparison in disjunction"),
                    })
                    .collect();
            }
        }
        panic!("no weekday disjunction found");
    }

    #[test]
    fn test_date_ordinal_origin() {
        assert_eq!(date_ordinal(date(2023, 1, 1)), 0);
        assert_eq!(date_ordinal(date(2023, 1, 8)), 7);
    }

    #[test]
    fn test_overlap_law() {
        // 2026-06-01 is a Monday; query Monday..Wednesday.
        let query = DateQuery {
            start: Some(date(2026, 6, 1)),
            end: Some(date(2026, 6, 3)),
            time: TimePreference::EntireDay,
        };
        let filter = compile(&query, date(2026, 6, 1), 7);

        // Intersecting intervals pass, in every overlap configuration.
        for (s, e) in [
            (date(2026, 5, 20), date(2026, 6, 1)),  // touches start
            (date(2026, 6, 3), date(2026, 6, 30)),  // touches end
            (date(2026, 6, 2), date(2026, 6, 2)),   // contained
            (date(2026, 5, 1), date(2026, 7, 1)),   // contains the query
        ] {
            assert!(filter.matches(&open_item(s, e)), "{s}..{e} should match");
        }

        // Disjoint intervals fail on both sides.
        for (s, e) in [
            (date(2026, 5, 1), date(2026, 5, 31)),
            (date(2026, 6, 4), date(2026, 6, 10)),
        ] {
            assert!(!filter.matches(&open_item(s, e)), "{s}..{e} should not match");
        }
    }

    #[test]
    fn test_weekday_disjunction_monday_tuesday() {
        // 2026-06-01 (Mon) .. 2026-06-02 (Tue).
        let query = DateQuery {
            start: Some(date(2026, 6, 1)),
            end: Some(date(2026, 6, 2)),
            time: TimePreference::EntireDay,
        };
        let filter = compile(&query, date(2026, 6, 1), 7);
        assert_eq!(
            weekday_terms(&filter),
            vec!["is_closed_mon", "is_closed_tue"]
        );
    }

    #[test]
    fn test_weekday_disjunction_full_week() {
        let query = DateQuery {
            start: Some(date(2026, 6, 1)),
            end: Some(date(2026, 6, 30)),
            time: TimePreference::EntireDay,
        };
        let filter = compile(&query, date(2026, 6, 1), 7);
        assert_eq!(weekday_terms(&filter).len(), 7);
    }

    #[test]
    fn test_open_on_one_requested_day_suffices() {
        // Query Monday..Tuesday; item closed Monday but open Tuesday.
        let query = DateQuery {
            start: Some(date(2026, 6, 1)),
            end: Some(date(2026, 6, 2)),
            time: TimePreference::EntireDay,
        };
        let filter = compile(&query, date(2026, 6, 1), 7);

        let mut item = open_item(date(2026, 1, 1), date(2026, 12, 31));
        item.closed[0] = true; // Monday
        assert!(filter.matches(&item));

        item.closed[1] = true; // Tuesday too: closed on every requested day
        assert!(!filter.matches(&item));
    }

    #[test]
    fn test_defaults_one_week_horizon() {
        // Nothing specified: today..today+6.
        let today = date(2026, 6, 3); // Wednesday
        let filter = compile(&DateQuery::default(), today, 7);
        assert_eq!(weekday_terms(&filter).len(), 7);

        // An item active only on the horizon's last day still matches.
        let item = open_item(date(2026, 6, 9), date(2026, 6, 9));
        assert!(filter.matches(&item));
        // One past the horizon does not.
        let item = open_item(date(2026, 6, 10), date(2026, 6, 10));
        assert!(!filter.matches(&item));
    }

    #[test]
    fn test_weekend_query_no_time_term() {
        // "un aperitivo sabato e domenica" asked on a Wednesday: the
        // extractor yields the upcoming Saturday..Sunday, no time preference.
        let today = date(2026, 6, 3); // Wednesday
        let query = DateQuery {
            start: Some(date(2026, 6, 6)),
            end: Some(date(2026, 6, 7)),
            time: TimePreference::EntireDay,
        };
        let filter = compile(&query, today, 7);
        assert_eq!(
            weekday_terms(&filter),
            vec!["is_closed_sat", "is_closed_sun"]
        );

        // No time-of-day comparison anywhere in the conjunction.
        let Filter::Operation { arguments, .. } = &filter else {
            unreachable!()
        };
        assert!(arguments.iter().all(|f| !matches!(
            f,
            Filter::Compare {
                attribute: "is_during_day" | "is_during_night",
                ..
            }
        )));
    }

    #[test]
    fn test_time_preference_terms() {
        let today = date(2026, 6, 3);
        let day_query = DateQuery {
            time: TimePreference::Daytime,
            ..Default::default()
        };
        let filter = compile(&day_query, today, 7);

        let mut item = open_item(date(2026, 6, 1), date(2026, 6, 30));
        item.is_during_day = false;
        assert!(!filter.matches(&item));
        item.is_during_day = true;
        assert!(filter.matches(&item));

        let night_query = DateQuery {
            time: TimePreference::Nighttime,
            ..Default::default()
        };
        let filter = compile(&night_query, today, 7);
        item.is_during_night = false;
        assert!(!filter.matches(&item));
    }

    #[test]
    fn test_inverted_range_clamps_to_single_day() {
        let query = DateQuery {
            start: Some(date(2026, 6, 2)), // Tuesday
            end: Some(date(2026, 6, 1)),
            time: TimePreference::EntireDay,
        };
        let filter = compile(&query, date(2026, 6, 1), 7);
        assert_eq!(weekday_terms(&filter), vec!["is_closed_tue"]);
    }

    #[test]
    fn test_serialized_shape() {
        let query = DateQuery {
            start: Some(date(2023, 1, 2)),
            end: Some(date(2023, 1, 2)),
            time: TimePreference::Nighttime,
        };
        let filter = compile(&query, date(2023, 1, 1), 7);
        let json = serde_json::to_value(&filter).unwrap();

        assert_eq!(json["operator"], "and");
        let args = json["arguments"].as_array().unwrap();
        assert_eq!(args[0]["comparator"], "lte");
        assert_eq!(args[0]["attribute"], "start_date");
        assert_eq!(args[0]["value"], 1);
        assert_eq!(args[2]["operator"], "or");
        assert_eq!(args[3]["attribute"], "is_during_night");
        assert_eq!(args[3]["value"], true);
    }
}
