//! Structural equality for resolved query arguments.
//!
//! Argument functions run on every re-evaluation and usually allocate a fresh
//! value each time. [`deep_equal`] decides whether two such values describe the
//! same query, so that an adapter only resubscribes when the arguments actually
//! changed.

use serde_json::{Number, Value};

/// Returns `true` if `a` and `b` are structurally equal.
///
/// - Objects are equal when they have the same keys and every value is deep-equal,
///   independent of key order.
/// - Arrays are equal element-wise.
/// - Numbers compare by numeric value, so `1` and `1.0` are equal.
/// - Strings, booleans and `null` compare by value.
///
/// # Example
///
/// ```
/// use live_query::equality::deep_equal;
/// use serde_json::json;
///
/// assert!(deep_equal(&json!({"id": 1, "tag": "a"}), &json!({"tag": "a", "id": 1.0})));
/// assert!(!deep_equal(&json!({"id": 1}), &json!({"id": 2})));
/// ```
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => false,
    }
}

#[allow(clippy::float_cmp)]
fn numbers_equal(x: &Number, y: &Number) -> bool {
    match (integer(x), integer(y)) {
        (Some(x), Some(y)) => x == y,
        (Some(i), None) => y.as_f64().is_some_and(|f| float_is_integer(f, i)),
        (None, Some(i)) => x.as_f64().is_some_and(|f| float_is_integer(f, i)),
        (None, None) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// `true` only if `f` is exactly the integer `i`; integers above 2^53 never match
/// a neighbouring float.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn float_is_integer(f: f64, i: i128) -> bool {
    // Saturating cast: out-of-range floats land on i128 bounds, far from any u64/i64.
    f.fract() == 0.0 && f as i128 == i
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert!(deep_equal(&json!(null), &json!(null)));
        assert!(deep_equal(&json!(true), &json!(true)));
        assert!(!deep_equal(&json!(true), &json!(false)));
        assert!(deep_equal(&json!("a"), &json!("a")));
        assert!(!deep_equal(&json!("a"), &json!("b")));
    }

    #[test]
    fn test_mismatched_kinds() {
        assert!(!deep_equal(&json!(null), &json!(false)));
        assert!(!deep_equal(&json!("1"), &json!(1)));
        assert!(!deep_equal(&json!([]), &json!({})));
        assert!(!deep_equal(&json!(0), &json!(null)));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(deep_equal(&json!(1), &json!(1.0)));
        assert!(deep_equal(&json!(-3), &json!(-3.0)));
        assert!(!deep_equal(&json!(1), &json!(1.5)));
        assert!(deep_equal(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!deep_equal(&json!(u64::MAX), &json!(u64::MAX - 1)));
        assert!(deep_equal(&json!(-1), &json!(-1.0)));
        assert!(!deep_equal(&json!(-1), &json!(u64::MAX)));
    }

    #[test]
    fn test_large_integers_never_match_nearby_floats() {
        // 2^53 + 1 has no f64 representation; the closest float is 2^53
        let above = json!(9_007_199_254_740_993_u64);
        let float = json!(9_007_199_254_740_992.0_f64);
        assert!(!deep_equal(&above, &float));
        assert!(!deep_equal(&float, &above));
        assert!(deep_equal(&json!(9_007_199_254_740_992_u64), &float));
        assert!(!deep_equal(&json!(1), &json!(1e300)));
    }

    #[test]
    fn test_objects_ignore_key_order() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": {"c": [1, 2]}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": {"c": [1, 2]}, "a": 1}"#).unwrap();
        assert!(deep_equal(&a, &b));
    }

    #[test]
    fn test_objects_with_different_keys() {
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!deep_equal(&json!({"a": 1, "b": 2}), &json!({"a": 1})));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"b": 1})));
        assert!(!deep_equal(&json!({"a": null}), &json!({})));
    }

    #[test]
    fn test_arrays_are_ordered() {
        assert!(deep_equal(&json!([1, 2, 3]), &json!([1, 2, 3])));
        assert!(!deep_equal(&json!([1, 2, 3]), &json!([3, 2, 1])));
        assert!(!deep_equal(&json!([1, 2]), &json!([1, 2, 3])));
    }

    #[test]
    fn test_nested_structures() {
        let a = json!({"filter": {"tags": ["x", "y"], "limit": 10}, "cursor": null});
        let b = json!({"cursor": null, "filter": {"limit": 10.0, "tags": ["x", "y"]}});
        let c = json!({"cursor": null, "filter": {"limit": 10, "tags": ["y", "x"]}});
        assert!(deep_equal(&a, &b));
        assert!(!deep_equal(&a, &c));
    }
}
