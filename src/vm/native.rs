use std::fmt;

use crate::vm::value::Value;

/// Signature shared by all host functions exposed to the VM.
pub type NativeSig = fn(&[Value]) -> Result<Value, String>;

/// A host function value. Equality is by name: the VM treats two
/// natives registered under the same name as the same function.
#[derive(Clone, Copy)]
pub struct NativeFn {
    pub name: &'static str,
    pub func: NativeSig,
}

impl NativeFn {
    pub fn new(name: &'static str, func: NativeSig) -> Self {
        NativeFn { name, func }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
