use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use std::fmt;

use crate::natural::{CaseSensitivity, natural_compare};
use crate::sort_settings::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A derived per-item value (similarity score, face region, ...) that views
/// sort by when no named field applies.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Int(i64),
    UInt(u64),
    Double(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Rect(Rect),
    Text(String),
}

impl SortValue {
    fn kind(&self) -> u8 {
        match self {
            SortValue::Int(_) => 0,
            SortValue::UInt(_) => 1,
            SortValue::Double(_) => 2,
            SortValue::Date(_) => 3,
            SortValue::DateTime(_) => 4,
            SortValue::Time(_) => 5,
            SortValue::Rect(_) => 6,
            SortValue::Text(_) => 7,
        }
    }

    pub fn same_kind(&self, other: &SortValue) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for SortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortValue::Int(v) => write!(f, "{}", v),
            SortValue::UInt(v) => write!(f, "{}", v),
            SortValue::Double(v) => write!(f, "{}", v),
            SortValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            SortValue::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.3f")),
            SortValue::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.3f")),
            SortValue::Rect(r) => write!(f, "{},{} {}x{}", r.left, r.top, r.width, r.height),
            SortValue::Text(s) => f.write_str(s),
        }
    }
}

/// Strict less-than on two values under the given direction. Values of
/// different kinds are never less than each other.
pub fn less_than_values(
    left: &SortValue,
    right: &SortValue,
    direction: Direction,
    case: CaseSensitivity,
    natural: bool,
) -> bool {
    if !left.same_kind(right) {
        return false;
    }

    let ordering = match (left, right) {
        (SortValue::Int(a), SortValue::Int(b)) => a.cmp(b),
        (SortValue::UInt(a), SortValue::UInt(b)) => a.cmp(b),
        (SortValue::Double(a), SortValue::Double(b)) => a.total_cmp(b),
        (SortValue::Date(a), SortValue::Date(b)) => a.cmp(b),
        (SortValue::DateTime(a), SortValue::DateTime(b)) => a.cmp(b),
        (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
        (SortValue::Rect(a), SortValue::Rect(b)) => a
            .top
            .total_cmp(&b.top)
            .then_with(|| a.left.total_cmp(&b.left))
            .then_with(|| a.area().total_cmp(&b.area()))
            .then_with(|| natural_compare(&left.to_string(), &right.to_string(), case, natural)),
        _ => natural_compare(&left.to_string(), &right.to_string(), case, natural),
    };

    direction.apply(ordering) == Ordering::Less
}
