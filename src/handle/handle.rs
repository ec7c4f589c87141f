use std::mem;
use std::rc::Weak;

use crate::handle::convert::{FromVm, ToVm};
use crate::handle::error::TypeMismatch;
use crate::handle::stack_guard::StackGuard;
use crate::vm::{Slot, VM, Value, WeakState};

/// An owning reference to a VM value.
///
/// A non-empty handle holds a registry slot that pins its value against
/// collection; the pin is released when the handle drops. Cloning a
/// handle makes an independent registration of the same value, so the
/// two clones release independently. Capturing nil never registers
/// anything: the result is the *empty* handle, the same state
/// [`Handle::new`] produces.
///
/// Handles do not keep the VM alive. A handle that outlives its VM
/// still drops safely and still answers [`Handle::is_empty`], but any
/// operation that needs the value itself is fatal.
#[derive(Debug, Default)]
pub struct Handle {
    vm: WeakState,
    slot: Option<Slot>,
}

impl Handle {
    /// The empty handle: refers to no value, belongs to no VM.
    pub fn new() -> Handle {
        Handle::default()
    }

    /// Pops the top of the stack and takes ownership of it. Popping nil
    /// yields the empty handle. Capturing from an empty stack is fatal.
    pub fn from_stack(vm: &VM) -> Handle {
        assert!(
            vm.stack_height() > 0,
            "Handle::from_stack: operand stack is empty"
        );
        match vm.pin_from_stack() {
            Some(slot) => Handle {
                vm: vm.downgrade(),
                slot: Some(slot),
            },
            None => Handle::new(),
        }
    }

    /// Pushes a host value and captures it in one step. Net stack
    /// effect is zero.
    pub fn from_host<T: ToVm>(vm: &VM, value: T) -> Handle {
        let _guard = StackGuard::new(vm);
        value.push_to_vm(vm);
        Handle::from_stack(vm)
    }

    /// True when this handle refers to no value. O(1); never touches
    /// the VM.
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// The VM this handle belongs to, if it is still alive.
    pub fn vm(&self) -> Option<VM> {
        self.vm.upgrade().map(VM::from_shared)
    }

    /// True when this handle's registration lives in `vm`. Empty
    /// handles belong to no VM.
    pub fn belongs_to(&self, vm: &VM) -> bool {
        self.slot.is_some() && vm.shares_state_with(&self.vm)
    }

    /// Resolves the VM and slot behind a non-empty handle, or dies with
    /// a message naming the operation that needed them.
    pub(crate) fn require_live(&self, op: &str) -> (VM, Slot) {
        let Some(slot) = self.slot else {
            panic!("{op}: handle is empty");
        };
        let Some(state) = self.vm.upgrade() else {
            panic!("{op}: the VM this handle belongs to is gone");
        };
        (VM::from_shared(state), slot)
    }

    /// Materializes the pinned value on top of the operand stack. Net
    /// stack effect is +1. Fatal on an empty handle.
    pub fn push_value_to_stack(&self) {
        let (vm, slot) = self.require_live("Handle::push_value_to_stack");
        vm.push_pinned(slot);
    }

    /// The pinned value, or nil for the empty handle.
    pub fn value(&self) -> Value {
        if self.is_empty() {
            return Value::Nil;
        }
        let (vm, slot) = self.require_live("Handle::value");
        let _guard = StackGuard::new(&vm);
        vm.push_pinned(slot);
        vm.pop()
    }

    /// Converts the pinned value to a host type. The stack is restored
    /// whether the conversion succeeds or fails. Fatal on an empty
    /// handle; a wrong shape is an `Err`, not a panic.
    pub fn cast<T: FromVm>(&self) -> Result<T, TypeMismatch> {
        let (vm, slot) = self.require_live("Handle::cast");
        let _guard = StackGuard::new(&vm);
        vm.push_pinned(slot);
        let result = T::read_from_vm(&vm, 0);
        vm.pop();
        result
    }

    /// [`Handle::cast`] with the mismatch detail discarded. Still fatal
    /// on an empty handle.
    pub fn try_cast<T: FromVm>(&self) -> Option<T> {
        self.cast().ok()
    }

    /// True when the pinned value can be called. The empty handle is
    /// not callable.
    pub fn is_callable(&self) -> bool {
        !self.is_empty() && self.value().is_function()
    }

    /// The value's metatable as a fresh handle, or the empty handle
    /// when there is none. Empty handles have no metatable.
    pub fn metatable(&self) -> Handle {
        if self.is_empty() {
            return Handle::new();
        }
        let (vm, slot) = self.require_live("Handle::metatable");
        let _guard = StackGuard::new(&vm);
        vm.push_pinned(slot);
        if !vm.push_metatable() {
            vm.pop();
            return Handle::new();
        }
        let meta = Handle::from_stack(&vm);
        vm.pop();
        meta
    }

    /// Installs `meta` as the pinned value's metatable. Pushing an
    /// empty handle or `None` clears it. Only tables carry metatables;
    /// on any other receiver this is a no-op. Fatal on an empty handle.
    pub fn set_metatable<M: ToVm>(&self, meta: M) {
        let (vm, slot) = self.require_live("Handle::set_metatable");
        let _guard = StackGuard::new(&vm);
        vm.push_pinned(slot);
        meta.push_to_vm(&vm);
        vm.set_metatable_from_stack();
        vm.pop();
    }

    /// Rendering of the pinned value for logs and assertions. The
    /// empty handle renders as `nil`, strings render quoted, tables
    /// render by identity, so equal renderings of two table handles
    /// mean the same table.
    pub fn debug_str(&self) -> String {
        self.value().to_string()
    }

    /// Moves the registration out, leaving this handle empty. The slot
    /// transfers as-is: no new pin is made and nothing is released.
    pub fn take(&mut self) -> Handle {
        mem::take(self)
    }

    /// Releases the registration, leaving this handle empty.
    pub fn clear(&mut self) {
        *self = Handle::new();
    }
}

impl Clone for Handle {
    /// Re-registers the pinned value under a fresh slot. Cloning an
    /// empty handle, or one whose VM is gone, yields the empty handle.
    fn clone(&self) -> Handle {
        match (self.slot, self.vm.upgrade()) {
            (Some(slot), Some(state)) => {
                let vm = VM::from_shared(state);
                let _guard = StackGuard::new(&vm);
                vm.push_pinned(slot);
                let fresh = vm.pin_from_stack();
                debug_assert!(fresh.is_some(), "pinned values are never nil");
                Handle {
                    vm: self.vm.clone(),
                    slot: fresh,
                }
            }
            _ => Handle::new(),
        }
    }

    fn clone_from(&mut self, source: &Handle) {
        // Same registration means there is nothing to re-pin. With
        // exclusive slot ownership that only happens when both sides
        // are empty, but the check keeps redundant assignments free.
        if self.slot == source.slot && Weak::ptr_eq(&self.vm, &source.vm) {
            return;
        }
        *self = source.clone();
    }
}

impl Drop for Handle {
    /// Releases the registration. Dropping after the VM is gone is a
    /// quiet no-op; the registry died with it.
    fn drop(&mut self) {
        if let (Some(slot), Some(state)) = (self.slot.take(), self.vm.upgrade()) {
            VM::from_shared(state).unpin(slot);
        }
    }
}
