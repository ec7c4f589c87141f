use std::fmt;
use std::rc::Rc;

use crate::vm::native::NativeFn;
use crate::vm::table::{TableId, TableKey};

/// A single VM value.
///
/// Strings are reference-counted and immutable, so cloning a `Value` is
/// always cheap. Tables live in the VM's table store and are represented
/// here by id; two `Value::Table`s are equal exactly when they name the
/// same table, which is the identity-equality the embedding layer relies
/// on when it compares captured values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Rc<str>),
    Table(TableId),
    Native(NativeFn),
}

impl Value {
    /// Human-readable type name, used in mismatch errors and diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Native(_) => "function",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Value::Table(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Native(_))
    }

    /// Converts this value into a table key, if it can serve as one.
    ///
    /// Floats with an exact `i64` representation collapse to that
    /// integer, so `t[2.0]` and `t[2]` address the same entry. Nil,
    /// non-integral floats, floats outside `i64` range and functions
    /// cannot key a table and return `None`.
    pub fn to_table_key(&self) -> Option<TableKey> {
        match self {
            Value::Boolean(b) => Some(TableKey::Boolean(*b)),
            Value::Integer(i) => Some(TableKey::Integer(*i)),
            Value::Float(f) => float_to_exact_int(*f).map(TableKey::Integer),
            Value::String(s) => Some(TableKey::Str(s.clone())),
            Value::Table(id) => Some(TableKey::Table(*id)),
            _ => None,
        }
    }
}

/// The exact `i64` a float names, if any. The range check must come
/// first: `as` saturates, so `2^63` would round-trip through `i64::MAX`
/// and alias its key.
fn float_to_exact_int(f: f64) -> Option<i64> {
    const BOUND: f64 = 9_223_372_036_854_775_808.0; // 2^63
    if (-BOUND..BOUND).contains(&f) && (f as i64) as f64 == f {
        Some(f as i64)
    } else {
        None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Table(id) => write!(f, "table#{}", id.index()),
            Value::Native(func) => write!(f, "<native {}>", func.name),
        }
    }
}
