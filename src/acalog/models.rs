//! Typed course records produced from catalog detail panels.

use serde::{Serialize, Serializer};
use std::fmt;

/// Marker written in place of any field the extractor could not parse.
pub const NOT_AVAILABLE: &str = "N/A";

/// A parsed value, or an explicit marker that the panel did not yield one.
///
/// Every [`CourseRecord`] field is a `Field`, so consumers only ever deal with
/// one notion of "absent".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    Value(T),
    #[default]
    NotAvailable,
}

impl<T> Field<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            Field::NotAvailable => None,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::NotAvailable, Field::Value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(v) => v.serialize(serializer),
            Field::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

/// Credit units for a course: a fixed value or an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credits {
    Fixed(u32),
    /// Invariant: `lower <= upper`.
    Range { lower: u32, upper: u32 },
}

impl Credits {
    /// Builds a range, ordering the bounds so the result is always ascending.
    pub fn range(a: u32, b: u32) -> Self {
        Credits::Range {
            lower: a.min(b),
            upper: a.max(b),
        }
    }
}

impl Serialize for Credits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Credits::Fixed(units) => serializer.serialize_u32(units),
            Credits::Range { lower, upper } => [lower, upper].serialize(serializer),
        }
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credits::Fixed(units) => write!(f, "{units}"),
            Credits::Range { lower, upper } => write!(f, "[{lower},{upper}]"),
        }
    }
}

/// One course offering in one catalog year.
///
/// Field order is the canonical column order used by exports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CourseRecord {
    pub course_code: Field<String>,
    pub course_name: Field<String>,
    pub credits: Field<Credits>,
    pub course_description: Field<String>,
    pub prereqs: Field<Vec<String>>,
    pub coreqs: Field<Vec<String>>,
    pub class_levels: Field<Vec<String>>,
    pub repeats_allowed_for_credit: Field<u32>,
}

impl CourseRecord {
    /// Column names in canonical order.
    pub const COLUMNS: [&'static str; 8] = [
        "course_code",
        "course_name",
        "credits",
        "course_description",
        "prereqs",
        "coreqs",
        "class_levels",
        "repeats_allowed_for_credit",
    ];

    /// The key used by the per-job de-duplication registry.
    ///
    /// Records without a parsed code share the `N/A` key, so only the first
    /// code-less panel of a job is kept.
    pub fn dedup_key(&self) -> &str {
        self.course_code
            .value()
            .map(String::as_str)
            .unwrap_or(NOT_AVAILABLE)
    }
}
