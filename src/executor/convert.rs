//! Tuple to row conversion
//!
//! - absent fields are null
//! - a list value is reduced to its first element, an empty list to null;
//!   the remaining elements are dropped
//! - values are coerced to the column's logical type when they parse;
//!   values that cannot be coerced are passed through unchanged

use serde_json::{Number, Value};

use crate::catalog::LogicalType;
use crate::planner::ReadColumn;
use crate::remote::Tuple;

/// Converts one tuple into a row in column order
pub fn convert_tuple(tuple: &Tuple, columns: &[ReadColumn]) -> Vec<Value> {
    columns
        .iter()
        .map(|column| convert_value(tuple.get(&column.key), column.logical_type))
        .collect()
}

/// Converts one raw value
pub fn convert_value(raw: Option<&Value>, logical_type: LogicalType) -> Value {
    let value = match raw {
        None | Some(Value::Null) => return Value::Null,
        Some(Value::Array(items)) => match items.first() {
            Some(first) => first,
            None => return Value::Null,
        },
        Some(v) => v,
    };
    coerce(value, logical_type)
}

fn coerce(value: &Value, logical_type: LogicalType) -> Value {
    match (logical_type, value) {
        (LogicalType::Any, v) => v.clone(),
        (LogicalType::String, Value::String(_)) => value.clone(),
        (LogicalType::String, Value::Number(n)) => Value::String(n.to_string()),
        (LogicalType::String, Value::Bool(b)) => Value::String(b.to_string()),

        (LogicalType::Integer, Value::Number(n)) => match n.as_f64() {
            _ if n.is_i64() || n.is_u64() => value.clone(),
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        (LogicalType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Value::from(i),
            Err(_) => value.clone(),
        },

        (LogicalType::Float, Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        (LogicalType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),

        (_, v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(key: &str, logical_type: LogicalType) -> ReadColumn {
        ReadColumn {
            key: key.into(),
            logical_type,
            multi_valued: false,
        }
    }

    #[test]
    fn test_absent_and_null() {
        assert_eq!(convert_value(None, LogicalType::String), Value::Null);
        assert_eq!(convert_value(Some(&Value::Null), LogicalType::Integer), Value::Null);
    }

    #[test]
    fn test_list_reduced_to_first_element() {
        assert_eq!(
            convert_value(Some(&json!(["b1", "b2"])), LogicalType::String),
            json!("b1")
        );
        assert_eq!(convert_value(Some(&json!([])), LogicalType::String), Value::Null);
    }

    #[test]
    fn test_coercion() {
        assert_eq!(convert_value(Some(&json!(3)), LogicalType::String), json!("3"));
        assert_eq!(convert_value(Some(&json!("42")), LogicalType::Integer), json!(42));
        assert_eq!(convert_value(Some(&json!(4.0)), LogicalType::Integer), json!(4));
        assert_eq!(convert_value(Some(&json!(4.5)), LogicalType::Integer), json!(4.5));
        assert_eq!(convert_value(Some(&json!(2)), LogicalType::Float), json!(2.0));
        assert_eq!(convert_value(Some(&json!("1.5")), LogicalType::Float), json!(1.5));
        assert_eq!(convert_value(Some(&json!("abc")), LogicalType::Integer), json!("abc"));
        assert_eq!(convert_value(Some(&json!(true)), LogicalType::Any), json!(true));
    }

    #[test]
    fn test_convert_tuple_in_column_order() {
        let tuple: Tuple = serde_json::from_value(json!({"b": ["x", "y"], "a": "1"})).unwrap();
        let columns = vec![
            column("a", LogicalType::Integer),
            column("b", LogicalType::String),
            column("missing", LogicalType::String),
        ];
        assert_eq!(
            convert_tuple(&tuple, &columns),
            vec![json!(1), json!("x"), Value::Null]
        );
    }
}
