use std::rc::Rc;

use crate::handle::error::TypeMismatch;
use crate::handle::handle::Handle;
use crate::handle::table_view::TableView;
use crate::vm::{NativeFn, VM, Value};

/// Pushes a host value onto the VM's operand stack.
///
/// Implementations push exactly one value. `Handle::from_host` wraps
/// the push in a stack guard, so an implementation that pushes more or
/// less than one value trips the guard in debug builds.
pub trait ToVm {
    fn push_to_vm(&self, vm: &VM);
}

/// Reads a host value out of the VM's operand stack.
///
/// `depth` addresses the value the same way [`VM::peek`] does: 0 is the
/// top of the stack. Implementations read without consuming and leave
/// the stack height unchanged on success and failure alike; a value of
/// the wrong shape is reported as [`TypeMismatch`], never panicked on.
pub trait FromVm: Sized {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch>;
}

impl<T: ToVm + ?Sized> ToVm for &T {
    fn push_to_vm(&self, vm: &VM) {
        (**self).push_to_vm(vm);
    }
}

impl ToVm for bool {
    fn push_to_vm(&self, vm: &VM) {
        vm.push(Value::Boolean(*self));
    }
}

impl FromVm for bool {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        match vm.peek(depth) {
            Value::Boolean(b) => Ok(b),
            other => Err(TypeMismatch::new("boolean", other.type_name())),
        }
    }
}

impl ToVm for i64 {
    fn push_to_vm(&self, vm: &VM) {
        vm.push(Value::Integer(*self));
    }
}

impl FromVm for i64 {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        match vm.peek(depth) {
            Value::Integer(i) => Ok(i),
            other => Err(TypeMismatch::new("integer", other.type_name())),
        }
    }
}

impl ToVm for i32 {
    fn push_to_vm(&self, vm: &VM) {
        vm.push(Value::Integer(i64::from(*self)));
    }
}

impl FromVm for i32 {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        match vm.peek(depth) {
            Value::Integer(i) => {
                i32::try_from(i).map_err(|_| TypeMismatch::new("32-bit integer", "integer"))
            }
            other => Err(TypeMismatch::new("32-bit integer", other.type_name())),
        }
    }
}

impl ToVm for f64 {
    fn push_to_vm(&self, vm: &VM) {
        vm.push(Value::Float(*self));
    }
}

/// Floats read leniently: an integer-typed VM value converts rather
/// than mismatching, so a script writing `2` satisfies a host reading
/// `f64`.
impl FromVm for f64 {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        match vm.peek(depth) {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => Err(TypeMismatch::new("float", other.type_name())),
        }
    }
}

impl ToVm for str {
    fn push_to_vm(&self, vm: &VM) {
        vm.push(Value::String(Rc::from(self)));
    }
}

impl ToVm for String {
    fn push_to_vm(&self, vm: &VM) {
        self.as_str().push_to_vm(vm);
    }
}

impl FromVm for String {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        match vm.peek(depth) {
            Value::String(s) => Ok(s.as_ref().to_owned()),
            other => Err(TypeMismatch::new("string", other.type_name())),
        }
    }
}

impl ToVm for Rc<str> {
    fn push_to_vm(&self, vm: &VM) {
        vm.push(Value::String(self.clone()));
    }
}

impl FromVm for Rc<str> {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        match vm.peek(depth) {
            Value::String(s) => Ok(s),
            other => Err(TypeMismatch::new("string", other.type_name())),
        }
    }
}

/// Unit maps to nil. Note that capturing a pushed unit in a handle
/// yields the empty handle, since nil is never registered.
impl ToVm for () {
    fn push_to_vm(&self, vm: &VM) {
        vm.push(Value::Nil);
    }
}

impl FromVm for () {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        match vm.peek(depth) {
            Value::Nil => Ok(()),
            other => Err(TypeMismatch::new("nil", other.type_name())),
        }
    }
}

impl<T: ToVm> ToVm for Option<T> {
    fn push_to_vm(&self, vm: &VM) {
        match self {
            Some(value) => value.push_to_vm(vm),
            None => vm.push(Value::Nil),
        }
    }
}

impl<T: FromVm> FromVm for Option<T> {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        if vm.peek(depth).is_nil() {
            Ok(None)
        } else {
            T::read_from_vm(vm, depth).map(Some)
        }
    }
}

impl ToVm for Value {
    fn push_to_vm(&self, vm: &VM) {
        vm.push(self.clone());
    }
}

impl FromVm for Value {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        Ok(vm.peek(depth))
    }
}

impl ToVm for NativeFn {
    fn push_to_vm(&self, vm: &VM) {
        vm.push(Value::Native(*self));
    }
}

impl FromVm for NativeFn {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        match vm.peek(depth) {
            Value::Native(f) => Ok(f),
            other => Err(TypeMismatch::new("function", other.type_name())),
        }
    }
}

/// An empty handle pushes nil. A non-empty handle materializes its
/// pinned value, and must belong to the VM it is pushed to.
impl ToVm for Handle {
    fn push_to_vm(&self, vm: &VM) {
        if self.is_empty() {
            vm.push(Value::Nil);
            return;
        }
        assert!(
            self.belongs_to(vm),
            "handle pushed to a VM it does not belong to"
        );
        self.push_value_to_stack();
    }
}

/// Capturing never fails: whatever value sits at `depth` is pinned, and
/// nil collapses to the empty handle.
impl FromVm for Handle {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        vm.push_copy(depth);
        Ok(Handle::from_stack(vm))
    }
}

impl ToVm for TableView {
    fn push_to_vm(&self, vm: &VM) {
        self.handle().push_to_vm(vm);
    }
}

/// Views capture like handles do; whether the captured value is
/// actually a table only matters once a field operation runs.
impl FromVm for TableView {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        Handle::read_from_vm(vm, depth).map(TableView::from)
    }
}
