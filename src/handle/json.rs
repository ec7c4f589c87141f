//! Serde interop: moving whole value trees across the boundary.
//!
//! JSON trees map onto VM values the obvious way: null is nil, arrays
//! are tables keyed `1..=len`, objects are string-keyed tables. Reading
//! back, a table whose keys are exactly `1..=len` comes out as an
//! array and anything else as an object, with integer and boolean keys
//! stringified. Two keys that stringify alike (`1` alongside `"1"`) are
//! a [`TypeMismatch`], not a coin toss over which entry survives. The
//! empty table reads as the empty object.
//!
//! Tables cannot hold nil entries, so nulls inside arrays and objects
//! are dropped on the way in: an object value of null loses its key,
//! and a null array element punches a hole that turns the rest of the
//! array into object keys.

use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::handle::convert::{FromVm, ToVm};
use crate::handle::error::TypeMismatch;
use crate::handle::handle::Handle;
use crate::vm::{TableKey, VM, Value};

/// Read depth cap, so cyclic tables come back as an error instead of
/// recursing forever. Matches serde_json's own recursion limit.
const MAX_TREE_DEPTH: usize = 128;

impl ToVm for serde_json::Value {
    fn push_to_vm(&self, vm: &VM) {
        match self {
            serde_json::Value::Null => vm.push(Value::Nil),
            serde_json::Value::Bool(b) => vm.push(Value::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    vm.push(Value::Integer(i));
                } else {
                    let f = n.as_f64().expect("JSON numbers are representable as f64");
                    vm.push(Value::Float(f));
                }
            }
            serde_json::Value::String(s) => vm.push(Value::String(Rc::from(s.as_str()))),
            serde_json::Value::Array(items) => {
                vm.push_new_table();
                for (i, item) in items.iter().enumerate() {
                    vm.push(Value::Integer(i as i64 + 1));
                    item.push_to_vm(vm);
                    vm.raw_set_kv();
                }
            }
            serde_json::Value::Object(map) => {
                vm.push_new_table();
                for (key, item) in map {
                    vm.push(Value::String(Rc::from(key.as_str())));
                    item.push_to_vm(vm);
                    vm.raw_set_kv();
                }
            }
        }
    }
}

impl FromVm for serde_json::Value {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        tree_at(vm, depth, MAX_TREE_DEPTH)
    }
}

fn tree_at(vm: &VM, depth: usize, remaining: usize) -> Result<serde_json::Value, TypeMismatch> {
    match vm.peek(depth) {
        Value::Nil => Ok(serde_json::Value::Null),
        Value::Boolean(b) => Ok(serde_json::Value::Bool(b)),
        Value::Integer(i) => Ok(serde_json::Value::Number(i.into())),
        Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| TypeMismatch::new("finite number", "float")),
        Value::String(s) => Ok(serde_json::Value::String(s.as_ref().to_owned())),
        Value::Native(_) => Err(TypeMismatch::new("JSON-representable value", "function")),
        Value::Table(_) => {
            if remaining == 0 {
                return Err(TypeMismatch::new("value tree of bounded depth", "table"));
            }
            table_tree_at(vm, depth, remaining)
        }
    }
}

fn table_tree_at(vm: &VM, depth: usize, remaining: usize) -> Result<serde_json::Value, TypeMismatch> {
    let keys = vm.table_keys(depth);
    let len = keys.len();

    let mut indices: Vec<i64> = Vec::with_capacity(len);
    for key in &keys {
        match key {
            TableKey::Integer(i) => indices.push(*i),
            _ => {
                indices.clear();
                break;
            }
        }
    }
    indices.sort_unstable();
    let is_array = len > 0 && indices.len() == len && indices.iter().copied().eq(1..=len as i64);

    vm.push_copy(depth);
    let tree = if is_array {
        let mut items = Vec::with_capacity(len);
        let mut failure = None;
        for i in 1..=len as i64 {
            vm.push(Value::Integer(i));
            vm.raw_get_kv();
            let element = tree_at(vm, 0, remaining - 1);
            vm.pop();
            match element {
                Ok(value) => items.push(value),
                Err(mismatch) => {
                    failure = Some(mismatch);
                    break;
                }
            }
        }
        match failure {
            None => Ok(serde_json::Value::Array(items)),
            Some(mismatch) => Err(mismatch),
        }
    } else {
        let mut map = serde_json::Map::new();
        let mut failure = None;
        for key in keys {
            let name = match &key {
                TableKey::Str(s) => s.as_ref().to_owned(),
                TableKey::Integer(i) => i.to_string(),
                TableKey::Boolean(b) => b.to_string(),
                TableKey::Table(_) => {
                    failure = Some(TypeMismatch::new("string or integer table key", "table"));
                    break;
                }
            };
            vm.push(key.to_value());
            vm.raw_get_kv();
            let element = tree_at(vm, 0, remaining - 1);
            vm.pop();
            match element {
                Ok(value) => {
                    // distinct table keys (`1`, `"1"`) can stringify to
                    // the same JSON key
                    if map.insert(name, value).is_some() {
                        failure = Some(TypeMismatch::new(
                            "distinctly stringified table keys",
                            "table",
                        ));
                        break;
                    }
                }
                Err(mismatch) => {
                    failure = Some(mismatch);
                    break;
                }
            }
        }
        match failure {
            None => Ok(serde_json::Value::Object(map)),
            Some(mismatch) => Err(mismatch),
        }
    };
    vm.pop();
    tree
}

impl Handle {
    /// Serializes any `Serialize` host value into a VM value tree and
    /// captures its root. `None` and unit structs serialize to null and
    /// so come back as the empty handle.
    pub fn from_serde<T: Serialize>(vm: &VM, value: &T) -> Result<Handle, TypeMismatch> {
        let tree = serde_json::to_value(value)
            .map_err(|_| TypeMismatch::new("JSON-serializable host value", "host value"))?;
        Ok(Handle::from_host(vm, &tree))
    }

    /// Reads the pinned value tree back into a `Deserialize` host type.
    /// Like [`Handle::value`], this is total over the empty handle: it
    /// reads as null.
    pub fn to_serde<T: DeserializeOwned>(&self) -> Result<T, TypeMismatch> {
        let tree = if self.is_empty() {
            serde_json::Value::Null
        } else {
            self.cast::<serde_json::Value>()?
        };
        serde_json::from_value(tree)
            .map_err(|_| TypeMismatch::new("compatible value tree", "incompatible value tree"))
    }
}
