use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// A single typed value: one table cell or one metadata value.
///
/// The serde representation is externally tagged so that it survives
/// non-self-describing formats (bincode). Use [`Scalar::from_json`] and
/// [`Scalar::to_json`] at JSON boundaries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON value. Objects and arrays are not scalars.
    pub fn from_json(field: &str, value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(TypeError::UnsupportedValue {
                        field: field.to_string(),
                        reason: format!("number {n} does not fit i64 or f64"),
                    })
                }
            }
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Array(_) => Err(TypeError::UnsupportedValue {
                field: field.to_string(),
                reason: "nested arrays are not scalar".into(),
            }),
            Value::Object(_) => Err(TypeError::UnsupportedValue {
                field: field.to_string(),
                reason: "nested objects are not scalar".into(),
            }),
        }
    }

    /// The JSON form of this value. Non-finite floats become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Interpret command-line text: `null`, `true`/`false`, integers and
    /// floats are typed; anything else is text. Quote with `"` to force text.
    pub fn parse_text(s: &str) -> Self {
        if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            return Self::Text(s[1..s.len() - 1].to_string());
        }
        match s {
            "null" => return Self::Null,
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(i) = s.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return Self::Float(f);
            }
        }
        Self::Text(s.to_string())
    }

    /// Exact-match comparison used by catalog predicates.
    ///
    /// Integers and floats compare by exact value; every other pair must have
    /// the same variant and equal contents.
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => {
                int_equals_float(*a, *b)
            }
            _ => self == other,
        }
    }

    /// Returns `true` for [`Scalar::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Lower-case name of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Exact equality of an integer and a float. Only an integral float inside
/// the `i64` range can equal an integer.
fn int_equals_float(a: i64, b: f64) -> bool {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    b.fract() == 0.0 && (-TWO_POW_63..TWO_POW_63).contains(&b) && b as i64 == a
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_scalars() {
        assert_eq!(Scalar::from_json("a", &json!(null)).unwrap(), Scalar::Null);
        assert_eq!(Scalar::from_json("a", &json!(true)).unwrap(), Scalar::Bool(true));
        assert_eq!(Scalar::from_json("a", &json!(3)).unwrap(), Scalar::Int(3));
        assert_eq!(Scalar::from_json("a", &json!(2.5)).unwrap(), Scalar::Float(2.5));
        assert_eq!(
            Scalar::from_json("a", &json!("x")).unwrap(),
            Scalar::Text("x".into())
        );
    }

    #[test]
    fn from_json_rejects_nested() {
        let err = Scalar::from_json("cell", &json!([1, 2])).unwrap_err();
        assert!(matches!(err, TypeError::UnsupportedValue { ref field, .. } if field == "cell"));
        assert!(Scalar::from_json("cell", &json!({"a": 1})).is_err());
    }

    #[test]
    fn to_json_roundtrips_finite_values() {
        for v in [json!(null), json!(false), json!(-7), json!(0.25), json!("s")] {
            assert_eq!(Scalar::from_json("v", &v).unwrap().to_json(), v);
        }
    }

    #[test]
    fn non_finite_float_is_null_in_json() {
        assert_eq!(Scalar::Float(f64::NAN).to_json(), Value::Null);
    }

    #[test]
    fn parse_text_infers_types() {
        assert_eq!(Scalar::parse_text("1"), Scalar::Int(1));
        assert_eq!(Scalar::parse_text("1.5"), Scalar::Float(1.5));
        assert_eq!(Scalar::parse_text("true"), Scalar::Bool(true));
        assert_eq!(Scalar::parse_text("null"), Scalar::Null);
        assert_eq!(Scalar::parse_text("titanic"), Scalar::Text("titanic".into()));
        assert_eq!(Scalar::parse_text("\"42\""), Scalar::Text("42".into()));
        assert_eq!(Scalar::parse_text("inf"), Scalar::Text("inf".into()));
    }

    #[test]
    fn numeric_match_crosses_int_and_float() {
        assert!(Scalar::Int(1).matches(&Scalar::Float(1.0)));
        assert!(Scalar::Float(2.0).matches(&Scalar::Int(2)));
        assert!(!Scalar::Int(1).matches(&Scalar::Float(1.5)));
        assert!(!Scalar::Int(0).matches(&Scalar::Float(f64::NAN)));
    }

    #[test]
    fn numeric_match_is_exact_beyond_float_precision() {
        let two_pow_53 = 1_i64 << 53;
        assert!(Scalar::Int(two_pow_53).matches(&Scalar::Float(two_pow_53 as f64)));
        assert!(!Scalar::Int(two_pow_53 + 1).matches(&Scalar::Float(two_pow_53 as f64)));
        assert!(!Scalar::Float(two_pow_53 as f64).matches(&Scalar::Int(two_pow_53 + 1)));
        assert!(!Scalar::Int(i64::MAX).matches(&Scalar::Float(9_223_372_036_854_775_808.0)));
        assert!(Scalar::Int(i64::MIN).matches(&Scalar::Float(-9_223_372_036_854_775_808.0)));
        assert!(!Scalar::Int(i64::MAX).matches(&Scalar::Float(f64::INFINITY)));
    }

    #[test]
    fn match_is_type_strict_otherwise() {
        assert!(!Scalar::Text("1".into()).matches(&Scalar::Int(1)));
        assert!(!Scalar::Bool(true).matches(&Scalar::Int(1)));
        assert!(Scalar::Null.matches(&Scalar::Null));
    }

    #[test]
    fn bincode_compatible_serde() {
        let values = vec![Scalar::Null, Scalar::Int(4), Scalar::Text("t".into())];
        let json = serde_json::to_string(&values).unwrap();
        let back: Vec<Scalar> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn display() {
        assert_eq!(Scalar::Int(3).to_string(), "3");
        assert_eq!(Scalar::Null.to_string(), "null");
        assert_eq!(Scalar::Text("a b".into()).to_string(), "a b");
    }
}
