//! Arithmetic and coercion engine.
//!
//! One pure method per operator. Every operator has a defined result for
//! every pair of dynamic types, under one of two policies:
//!
//! - **lenient** (default): null coerces to zero in numeric operators,
//!   divide/modulo by zero yields zero (uniformly, integral and float
//!   alike), failed coercions resolve to a neutral value.
//! - **strict**: null with a non-null operand, zero divisors, and failed
//!   coercions raise evaluation errors.
//!
//! The promotion ladder: if either operand is a float, or a string whose
//! numeric form lexically carries `.`/`e`/`E`, both operands widen to
//! float and the float form of the operator runs; otherwise both coerce
//! to integers. `add` falls back to string concatenation only after the
//! numeric attempt has failed. Equality and inequality are null-safe
//! regardless of policy.

use std::cmp::Ordering;

use rill_ir::BinaryOp;

use crate::error::{
    division_by_zero, invalid_operands, modulo_by_zero, null_operand, number_coercion, EvalError,
};
use crate::value::Value;

/// A numeric operand after coercion, before promotion.
#[derive(Clone, Copy, Debug)]
enum Num {
    Int(i64),
    Float(f64),
}

/// Both operands after the promotion ladder.
#[derive(Clone, Copy, Debug)]
enum Promoted {
    Int(i64, i64),
    Float(f64, f64),
}

fn promote(l: Num, r: Num) -> Promoted {
    match (l, r) {
        (Num::Int(a), Num::Int(b)) => Promoted::Int(a, b),
        (Num::Int(a), Num::Float(b)) => Promoted::Float(a as f64, b),
        (Num::Float(a), Num::Int(b)) => Promoted::Float(a, b as f64),
        (Num::Float(a), Num::Float(b)) => Promoted::Float(a, b),
    }
}

/// The engine. Cheap to copy; carries only the policy toggle.
#[derive(Clone, Copy, Debug, Default)]
pub struct Arithmetic {
    strict: bool,
}

impl Arithmetic {
    pub fn new(strict: bool) -> Self {
        Arithmetic { strict }
    }

    #[inline]
    pub fn is_strict(self) -> bool {
        self.strict
    }

    /// Numeric form of a value, if it has one. Null is not numeric here;
    /// operators decide what null means.
    fn as_num(self, v: &Value) -> Option<Num> {
        match v {
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            Value::Str(s) => parse_num(s),
            _ => None,
        }
    }

    /// Numeric operand for `op`, applying the null policy.
    fn operand(self, v: &Value, op: BinaryOp) -> Result<Option<Num>, EvalError> {
        if v.is_null() {
            if self.strict {
                return Err(null_operand(op));
            }
            return Ok(Some(Num::Int(0)));
        }
        Ok(self.as_num(v))
    }

    /// `l + r`: numeric addition, falling back to string concatenation
    /// only once the numeric attempt has failed.
    pub fn add(self, l: &Value, r: &Value) -> Result<Value, EvalError> {
        if l.is_null() && r.is_null() {
            return Ok(Value::Int(0));
        }
        let numeric = match (l, r) {
            // Null on one side: policy decides before any fallback.
            _ if l.is_null() || r.is_null() => {
                (self.operand(l, BinaryOp::Add)?, self.operand(r, BinaryOp::Add)?)
            }
            _ => (self.as_num(l), self.as_num(r)),
        };
        if let (Some(a), Some(b)) = numeric {
            return Ok(match promote(a, b) {
                Promoted::Int(a, b) => int_or_float(a.checked_add(b), || a as f64 + b as f64),
                Promoted::Float(a, b) => Value::Float(a + b),
            });
        }
        // Numeric attempt failed; a string operand means concatenation.
        if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
            return Ok(Value::string(format!("{l}{r}")));
        }
        self.undefined(BinaryOp::Add, l, r)
    }

    /// `l - r`.
    pub fn subtract(self, l: &Value, r: &Value) -> Result<Value, EvalError> {
        self.numeric_op(BinaryOp::Sub, l, r, |p| match p {
            Promoted::Int(a, b) => Ok(int_or_float(a.checked_sub(b), || a as f64 - b as f64)),
            Promoted::Float(a, b) => Ok(Value::Float(a - b)),
        })
    }

    /// `l * r`.
    pub fn multiply(self, l: &Value, r: &Value) -> Result<Value, EvalError> {
        self.numeric_op(BinaryOp::Mul, l, r, |p| match p {
            Promoted::Int(a, b) => Ok(int_or_float(a.checked_mul(b), || a as f64 * b as f64)),
            Promoted::Float(a, b) => Ok(Value::Float(a * b)),
        })
    }

    /// `l / r`. Zero divisor: zero sentinel in lenient mode, error in
    /// strict mode; the policy is uniform across integral and float forms.
    pub fn divide(self, l: &Value, r: &Value) -> Result<Value, EvalError> {
        let strict = self.strict;
        self.numeric_op(BinaryOp::Div, l, r, |p| match p {
            Promoted::Int(_, 0) if strict => Err(division_by_zero()),
            Promoted::Int(_, 0) => Ok(Value::Int(0)),
            Promoted::Int(a, b) => Ok(int_or_float(a.checked_div(b), || a as f64 / b as f64)),
            Promoted::Float(_, b) if b == 0.0 && strict => Err(division_by_zero()),
            Promoted::Float(_, b) if b == 0.0 => Ok(Value::Float(0.0)),
            Promoted::Float(a, b) => Ok(Value::Float(a / b)),
        })
    }

    /// `l % r`. Same zero-divisor policy as `divide`.
    pub fn modulo(self, l: &Value, r: &Value) -> Result<Value, EvalError> {
        let strict = self.strict;
        self.numeric_op(BinaryOp::Mod, l, r, |p| match p {
            Promoted::Int(_, 0) if strict => Err(modulo_by_zero()),
            Promoted::Int(_, 0) => Ok(Value::Int(0)),
            Promoted::Int(a, b) => Ok(int_or_float(a.checked_rem(b), || (a as f64) % (b as f64))),
            Promoted::Float(_, b) if b == 0.0 && strict => Err(modulo_by_zero()),
            Promoted::Float(_, b) if b == 0.0 => Ok(Value::Float(0.0)),
            Promoted::Float(a, b) => Ok(Value::Float(a % b)),
        })
    }

    fn numeric_op(
        self,
        op: BinaryOp,
        l: &Value,
        r: &Value,
        apply: impl FnOnce(Promoted) -> Result<Value, EvalError>,
    ) -> Result<Value, EvalError> {
        if l.is_null() && r.is_null() {
            return Ok(Value::Int(0));
        }
        match (self.operand(l, op)?, self.operand(r, op)?) {
            (Some(a), Some(b)) => apply(promote(a, b)),
            _ => self.undefined(op, l, r),
        }
    }

    /// Unary minus.
    pub fn negate(self, v: &Value) -> Result<Value, EvalError> {
        match v {
            Value::Null if self.strict => Err(null_operand(BinaryOp::Sub)),
            Value::Null => Ok(Value::Int(0)),
            Value::Int(i) => Ok(int_or_float(i.checked_neg(), || -(*i as f64))),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Str(s) => match parse_num(s) {
                Some(Num::Int(i)) => Ok(Value::Int(-i)),
                Some(Num::Float(f)) => Ok(Value::Float(-f)),
                None if self.strict => Err(number_coercion(v)),
                None => Ok(Value::Null),
            },
            _ if self.strict => Err(number_coercion(v)),
            _ => Ok(Value::Null),
        }
    }

    /// Truthiness. Strings are true only when they spell `true`
    /// (case-insensitive), matching host-boolean parsing.
    pub fn to_boolean(self, v: &Value) -> bool {
        match v {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => s.eq_ignore_ascii_case("true"),
            Value::List(_) | Value::Map(_) | Value::Closure(_) => true,
        }
    }

    /// Numeric coercion for host use; null is zero in lenient mode.
    pub fn to_number(self, v: &Value) -> Result<Value, EvalError> {
        if v.is_null() && !self.strict {
            return Ok(Value::Int(0));
        }
        match self.as_num(v) {
            Some(Num::Int(i)) => Ok(Value::Int(i)),
            Some(Num::Float(f)) => Ok(Value::Float(f)),
            None => Err(number_coercion(v)),
        }
    }

    /// Integer coercion, truncating floats.
    pub fn to_integer(self, v: &Value) -> Result<i64, EvalError> {
        match self.to_number(v)? {
            Value::Int(i) => Ok(i),
            Value::Float(f) => Ok(f as i64),
            _ => Err(number_coercion(v)),
        }
    }

    /// Equality. Always null-safe: null equals only null, under either
    /// policy. Same-type compares naturally; a boolean operand coerces
    /// the other side to boolean; mixed numerics, including numeric
    /// strings, ride the same promotion ladder as ordering, so `==` and
    /// `<=`/`>=` agree on which values are equal; anything else compares
    /// via string form.
    pub fn equals(self, l: &Value, r: &Value) -> bool {
        match (l, r) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                self.to_boolean(l) == self.to_boolean(r)
            }
            _ if std::mem::discriminant(l) == std::mem::discriminant(r) => l == r,
            _ => match (self.as_num(l), self.as_num(r)) {
                (Some(a), Some(b)) => match promote(a, b) {
                    Promoted::Int(a, b) => a == b,
                    Promoted::Float(a, b) => a == b,
                },
                _ => l.to_string() == r.to_string(),
            },
        }
    }

    /// Three-way comparison; `None` means incomparable. Numeric operands
    /// (including numeric strings) follow the promotion ladder; otherwise
    /// both sides fall back to string-form ordering. Null orders only
    /// against null.
    pub fn compare(self, l: &Value, r: &Value) -> Option<Ordering> {
        match (l, r) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) | (_, Value::Null) => None,
            _ => match (self.as_num(l), self.as_num(r)) {
                (Some(a), Some(b)) => match promote(a, b) {
                    Promoted::Int(a, b) => Some(a.cmp(&b)),
                    Promoted::Float(a, b) => a.partial_cmp(&b),
                },
                _ => Some(l.to_string().cmp(&r.to_string())),
            },
        }
    }

    /// Apply a relational operator through `compare`.
    pub fn relate(self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
        let Some(ord) = self.compare(l, r) else {
            if self.strict {
                return Err(invalid_operands(op, l, r));
            }
            return Ok(Value::Bool(false));
        };
        let b = match op {
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::Le => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            BinaryOp::Ge => ord != Ordering::Less,
            _ => return Err(invalid_operands(op, l, r)),
        };
        Ok(Value::Bool(b))
    }

    /// Dispatch a binary operator tag to its implementation.
    pub fn binary(self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
        match op {
            BinaryOp::Add => self.add(l, r),
            BinaryOp::Sub => self.subtract(l, r),
            BinaryOp::Mul => self.multiply(l, r),
            BinaryOp::Div => self.divide(l, r),
            BinaryOp::Mod => self.modulo(l, r),
            BinaryOp::Eq => Ok(Value::Bool(self.equals(l, r))),
            BinaryOp::Ne => Ok(Value::Bool(!self.equals(l, r))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => self.relate(op, l, r),
        }
    }

    fn undefined(self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
        if self.strict {
            Err(invalid_operands(op, l, r))
        } else {
            Ok(Value::Null)
        }
    }
}

/// Integer result, widening to float when the checked operation overflows.
#[inline]
fn int_or_float(checked: Option<i64>, wide: impl FnOnce() -> f64) -> Value {
    match checked {
        Some(i) => Value::Int(i),
        None => Value::Float(wide()),
    }
}

/// Parse a string operand. Integer form stays integral; a lexical `.`,
/// `e`, or `E` (anything the integer parse rejects but the float parse
/// accepts) lands on the float rung of the ladder.
fn parse_num(s: &str) -> Option<Num> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(i) = t.parse::<i64>() {
        return Some(Num::Int(i));
    }
    t.parse::<f64>().ok().map(Num::Float)
}
