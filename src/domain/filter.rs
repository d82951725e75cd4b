// Filter-query translation: raw query-string pairs -> structured per-column,
// operator-qualified constraints, plus predicate evaluation against records.
use std::collections::BTreeMap;

use crate::domain::measurement::{Measurement, parse_timestamp};

/// The fixed columns every series has.
pub const KNOWN_COLUMNS: &[&str] = &["value", "measurement", "created_at"];

/// Operator applied to bare `key=value` pairs.
pub const MEMBERSHIP_OP: &str = "in";

const OP_SEPARATOR: &str = "__";

/// Constraint value: a single comparison operand, or the accumulated
/// membership list for the implicit "in" operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

/// column -> operator -> constraint, e.g.
/// `{"created_at": {"gt": "2020-01-01"}, "measurement": {"in": ["salon"]}}`.
pub type FilterSpec = BTreeMap<String, BTreeMap<String, FilterValue>>;

/// Parse ordered `(key, value)` pairs into a FilterSpec.
///
/// `col__op=value` sets operator `op` for `col`, last occurrence winning for
/// the exact `(col, op)` pair. A bare `col=value` appends to the membership
/// list for `col`, preserving argument order and duplicates. Keys whose base
/// column is not in `known_columns` are skipped. Values stay strings; type
/// coercion happens at predicate evaluation.
pub fn parse_filters(args: &[(String, String)], known_columns: &[&str]) -> FilterSpec {
    let mut filters = FilterSpec::new();

    for (key, value) in args {
        let (base, op) = match key.split_once(OP_SEPARATOR) {
            Some((base, op)) => (base, op),
            None => (key.as_str(), MEMBERSHIP_OP),
        };

        if !known_columns.contains(&base) {
            continue;
        }

        let column = filters.entry(base.to_string()).or_default();
        if op == MEMBERSHIP_OP {
            let slot = column
                .entry(MEMBERSHIP_OP.to_string())
                .or_insert_with(|| FilterValue::Many(Vec::new()));
            match slot {
                FilterValue::Many(values) => values.push(value.clone()),
                // an explicit `col__in=v` arrived first; fold it into a list
                FilterValue::One(prior) => {
                    let prior = std::mem::take(prior);
                    *slot = FilterValue::Many(vec![prior, value.clone()]);
                }
            }
        } else {
            column.insert(op.to_string(), FilterValue::One(value.clone()));
        }
    }

    filters
}

/// Evaluate a FilterSpec against one record. Membership compares the
/// string-coerced column value; `gt`/`gte`/`lt`/`lte` compare in the column's
/// native type (timestamps for created_at, numbers for value). An operand
/// that cannot be coerced never matches.
pub fn matches(record: &Measurement, filters: &FilterSpec) -> bool {
    for (column, constraints) in filters {
        for (op, operand) in constraints {
            let ok = match (op.as_str(), operand) {
                (MEMBERSHIP_OP, FilterValue::Many(values)) => {
                    values.contains(&column_as_string(record, column))
                }
                (MEMBERSHIP_OP, FilterValue::One(value)) => {
                    *value == column_as_string(record, column)
                }
                (_, FilterValue::One(value)) => compare(record, column, op, value),
                // comparison operators carry a single operand
                (_, FilterValue::Many(_)) => false,
            };
            if !ok {
                return false;
            }
        }
    }
    true
}

fn column_as_string(record: &Measurement, column: &str) -> String {
    match column {
        "value" => record.value.to_string(),
        "measurement" => record.measurement.clone(),
        "created_at" => record.created_at.to_rfc3339(),
        _ => String::new(),
    }
}

fn compare(record: &Measurement, column: &str, op: &str, operand: &str) -> bool {
    match column {
        "created_at" => match parse_timestamp(operand) {
            Some(bound) => compare_ord(record.created_at, bound, op),
            None => false,
        },
        "value" => match operand.trim().parse::<f64>() {
            Ok(bound) => compare_ord(record.value, bound, op),
            Err(_) => false,
        },
        "measurement" => compare_ord(record.measurement.as_str(), operand, op),
        _ => false,
    }
}

fn compare_ord<T: PartialOrd>(lhs: T, rhs: T, op: &str) -> bool {
    match op {
        "gt" => lhs > rhs,
        "gte" => lhs >= rhs,
        "lt" => lhs < rhs,
        "lte" => lhs <= rhs,
        _ => false,
    }
}
