//! Session values and structural equality.

use serde_json::{Map, Number, Value};

/// The contents of a session: field names mapped to JSON values.
pub type SessionData = Map<String, Value>;

/// Compare two values structurally.
///
/// Objects are equal when they have the same keys with structurally equal
/// values, arrays when their elements are pairwise equal in order. Numbers
/// compare by numeric value, so `1` and `1.0` are equal even though
/// `serde_json` keeps them as distinct representations.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => maps_equal(x, y),
        _ => false,
    }
}

/// Compare two mappings structurally (see [`deep_equal`]).
pub fn maps_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| deep_equal(value, other)))
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    // Mixed integer/float, or values outside the i64/u64 ranges.
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
