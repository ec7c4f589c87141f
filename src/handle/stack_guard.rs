use crate::vm::VM;

/// Records the operand stack height on creation and asserts, in debug
/// builds, that the height is back to that mark when the guard drops.
/// Every handle operation that touches the stack scopes itself with one
/// of these, so an unbalanced push or pop is caught at the operation
/// that caused it rather than corrupting later reads.
///
/// The check is skipped while the thread is already panicking: the
/// operation that panicked mid-way is allowed to leave the stack dirty
/// without turning the panic into an abort.
pub struct StackGuard {
    vm: VM,
    expected: usize,
}

impl StackGuard {
    pub fn new(vm: &VM) -> Self {
        StackGuard {
            vm: vm.clone(),
            expected: vm.stack_height(),
        }
    }

    /// The height the guard will require on drop.
    pub fn expected(&self) -> usize {
        self.expected
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        debug_assert_eq!(
            self.vm.stack_height(),
            self.expected,
            "operand stack height not restored"
        );
    }
}
