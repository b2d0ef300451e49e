//! Dynamically tagged value type (spec.md §3 "Value", §9 "Dynamic typing").

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active,
    Inactive,
    Broken,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
            Status::Broken => "broken",
        };
        write!(f, "{s}")
    }
}

/// Tagged sum value (spec.md §3). `None` propagates through arithmetic and
/// comparisons rather than erroring, except where the operation is
/// intrinsically undefined (division by zero), which is a runtime error.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    Status(Status),
    /// A reference to another variable's dotted path, resolved lazily by
    /// the runtime's `read` expression (spec.md §4.11 "Variable
    /// resolution").
    Ref(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::None => write!(f, "none"),
            Value::Status(s) => write!(f, "{s}"),
            Value::Ref(name) => write!(f, "{name}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::None => false,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Status(s) => matches!(s, Status::Active),
            Value::Ref(_) => true,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => Option::None,
        }
    }

    /// Numeric addition with `none`-propagation; falls back to string
    /// concatenation when either side is a `Str` (spec.md doesn't forbid
    /// it and the Classroom demos rely on `+` for message-building).
    pub fn add(&self, other: &Value) -> Value {
        if let (Value::Str(_), _) | (_, Value::Str(_)) = (self, other) {
            if matches!(self, Value::None) || matches!(other, Value::None) {
                return Value::None;
            }
            return Value::Str(format!("{self}{other}"));
        }
        match (self, other) {
            (Value::None, _) | (_, Value::None) => Value::None,
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => Value::Float(a + b),
                _ => Value::None,
            },
        }
    }

    pub fn sub(&self, other: &Value) -> Value {
        self.numeric_op(other, |a, b| a - b, |a, b| a - b)
    }

    pub fn mul(&self, other: &Value) -> Value {
        self.numeric_op(other, |a, b| a * b, |a, b| a * b)
    }

    /// Returns `Err` on division by zero (spec.md §8 boundary behavior);
    /// `None` still propagates first.
    pub fn div(&self, other: &Value) -> Result<Value, ()> {
        if matches!(self, Value::None) || matches!(other, Value::None) {
            return Ok(Value::None);
        }
        match (self, other) {
            (Value::Int(_), Value::Int(0)) => Err(()),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(_), Some(b)) if b == 0.0 => Err(()),
                (Some(a), Some(b)) => Ok(Value::Float(a / b)),
                _ => Ok(Value::None),
            },
        }
    }

    pub fn rem(&self, other: &Value) -> Result<Value, ()> {
        if matches!(self, Value::None) || matches!(other, Value::None) {
            return Ok(Value::None);
        }
        match (self, other) {
            (Value::Int(_), Value::Int(0)) => Err(()),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(_), Some(b)) if b == 0.0 => Err(()),
                (Some(a), Some(b)) => Ok(Value::Float(a % b)),
                _ => Ok(Value::None),
            },
        }
    }

    fn numeric_op(
        &self,
        other: &Value,
        int_op: fn(i64, i64) -> i64,
        float_op: fn(f64, f64) -> f64,
    ) -> Value {
        if matches!(self, Value::None) || matches!(other, Value::None) {
            return Value::None;
        }
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Value::Int(int_op(*a, *b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => Value::Float(float_op(a, b)),
                _ => Value::None,
            },
        }
    }

    /// `none`-propagating equality used by `==`/`!=`.
    pub fn eq_value(&self, other: &Value) -> Value {
        if matches!(self, Value::None) || matches!(other, Value::None) {
            return Value::None;
        }
        Value::Bool(self.structural_eq(other))
    }

    fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Status(a), Value::Status(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.structural_eq(bv)))
            }
            _ => false,
        }
    }

    /// `none`-propagating ordering used by `< > <= >=`.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        if matches!(self, Value::None) || matches!(other, Value::None) {
            return Option::None;
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Option::None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_propagates_through_arithmetic() {
        assert_eq!(Value::Int(1).add(&Value::None), Value::None);
        assert_eq!(Value::None.mul(&Value::Int(2)), Value::None);
    }

    #[test]
    fn division_by_zero_is_err() {
        assert!(Value::Int(1).div(&Value::Int(0)).is_err());
    }

    #[test]
    fn equality_is_none_propagating() {
        assert_eq!(Value::Int(1).eq_value(&Value::None), Value::None);
        assert_eq!(Value::Int(1).eq_value(&Value::Int(1)), Value::Bool(true));
    }
}
