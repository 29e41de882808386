//! Prop transforms: a typed view over a stored primitive.
//!
//! The tree (and therefore snapshots and patches) always holds the stored
//! form. A transform converts on read and converts back on write.

use crate::errors::{ArborError, Result};
use crate::ops::Store;
use crate::types::TypeCheckError;
use crate::value::{Input, NodeId, PathSegment, Value};
use chrono::{DateTime, SecondsFormat, Utc};

pub trait PropTransform {
    type View;

    /// Stored form to view
    ///
    /// # Errors
    ///
    /// Returns `TypeCheck` when the stored value has the wrong shape.
    fn transform(&self, stored: &Value) -> Result<Self::View>;

    /// View to stored form
    fn untransform(&self, view: &Self::View) -> Value;
}

fn shape_error(expected: &str, stored: &Value) -> ArborError {
    ArborError::TypeCheck(TypeCheckError {
        path: Vec::new(),
        expected: expected.to_string(),
        actual: stored
            .to_json()
            .unwrap_or_else(|| serde_json::Value::String(stored.to_string())),
    })
}

/// Milliseconds since the Unix epoch stored as a number
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampToDate;

impl PropTransform for TimestampToDate {
    type View = DateTime<Utc>;

    fn transform(&self, stored: &Value) -> Result<DateTime<Utc>> {
        let millis = match stored {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            _ => None,
        };
        millis
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| shape_error("timestamp in milliseconds", stored))
    }

    fn untransform(&self, view: &DateTime<Utc>) -> Value {
        Value::from(view.timestamp_millis())
    }
}

/// RFC 3339 string stored as a string
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoStringToDate;

impl PropTransform for IsoStringToDate {
    type View = DateTime<Utc>;

    fn transform(&self, stored: &Value) -> Result<DateTime<Utc>> {
        stored
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .ok_or_else(|| shape_error("ISO 8601 date string", stored))
    }

    fn untransform(&self, view: &DateTime<Utc>) -> Value {
        Value::String(view.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Arbitrary-size integer stored as a decimal string
#[derive(Debug, Clone, Copy, Default)]
pub struct StringToBigInt;

impl PropTransform for StringToBigInt {
    type View = i128;

    fn transform(&self, stored: &Value) -> Result<i128> {
        stored
            .as_str()
            .and_then(|s| s.parse::<i128>().ok())
            .ok_or_else(|| shape_error("decimal integer string", stored))
    }

    fn untransform(&self, view: &i128) -> Value {
        Value::String(view.to_string())
    }
}

impl Store {
    /// Read a prop through a transform.
    ///
    /// # Errors
    ///
    /// Fails when the prop cannot be read or the stored value does not fit the transform.
    pub fn get_as<T: PropTransform>(
        &self,
        node: NodeId,
        key: impl Into<PathSegment>,
        transform: &T,
    ) -> Result<T::View> {
        let stored = self.get(node, key)?;
        transform.transform(&stored)
    }

    /// Write a prop through a transform. Must run inside an action.
    ///
    /// # Errors
    ///
    /// Fails like [`Store::set`].
    pub fn set_as<T: PropTransform>(
        &mut self,
        node: NodeId,
        key: impl Into<PathSegment>,
        transform: &T,
        view: &T::View,
    ) -> Result<()> {
        self.set(node, key, Input::Value(transform.untransform(view)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip() {
        let stored = Value::from(1234);
        let date = TimestampToDate.transform(&stored).unwrap();
        assert_eq!(date.timestamp_millis(), 1234);
        assert_eq!(TimestampToDate.untransform(&date), stored);
    }

    #[test]
    fn test_timestamp_rejects_strings() {
        let err = TimestampToDate.transform(&Value::from("soon")).unwrap_err();
        assert!(matches!(err, ArborError::TypeCheck(_)));
    }

    #[test]
    fn test_iso_string_round_trip() {
        let stored = Value::from("2024-03-01T10:20:30.000Z");
        let date = IsoStringToDate.transform(&stored).unwrap();
        assert_eq!(IsoStringToDate.untransform(&date), stored);
    }

    #[test]
    fn test_big_int_beyond_f64_precision() {
        let stored = Value::from("170141183460469231731687303715884105727");
        let n = StringToBigInt.transform(&stored).unwrap();
        assert_eq!(n, i128::MAX);
        assert_eq!(StringToBigInt.untransform(&n), stored);
    }
}
