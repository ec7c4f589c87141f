use std::ops::Deref;

use crate::handle::convert::ToVm;
use crate::handle::handle::Handle;
use crate::handle::stack_guard::StackGuard;
use crate::vm::VM;

/// A [`Handle`] specialized for field access.
///
/// A view is just a handle with table operations on top, so it captures
/// and releases exactly like one, and any handle can be wrapped into a
/// view. If the wrapped value turns out not to be a table, reads
/// produce the empty handle and writes are silently dropped; the only
/// fatal case is operating through an *empty* view.
#[derive(Debug, Clone, Default)]
pub struct TableView {
    handle: Handle,
}

impl TableView {
    /// Allocates a fresh empty table and returns a view owning it.
    pub fn create(vm: &VM) -> TableView {
        let _guard = StackGuard::new(vm);
        vm.push_new_table();
        TableView {
            handle: Handle::from_stack(vm),
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn into_handle(self) -> Handle {
        self.handle
    }

    /// Reads field `name`, following `"__index"` metatable links, and
    /// captures the result. Absent fields and non-table receivers both
    /// read as the empty handle.
    pub fn read_field(&self, name: &str) -> Handle {
        let (vm, slot) = self.handle.require_live("TableView::read_field");
        let _guard = StackGuard::new(&vm);
        vm.push_pinned(slot);
        if !vm.peek(0).is_table() {
            vm.pop();
            return Handle::new();
        }
        vm.push_field(name);
        let field = Handle::from_stack(&vm);
        vm.pop();
        field
    }

    /// Writes field `name` directly into the table, without consulting
    /// metatables. Writing nil (an empty handle, `None`, unit) removes
    /// the field. On a non-table receiver the write is dropped.
    pub fn write_field<T: ToVm>(&self, name: &str, value: T) {
        self.raw_set(name, value);
    }

    /// Raw write under an arbitrary key. Integers, booleans, strings
    /// and tables can key a table; nil cannot, and a key that cannot
    /// key a table is fatal.
    pub fn raw_set<K: ToVm, V: ToVm>(&self, key: K, value: V) {
        let (vm, slot) = self.handle.require_live("TableView::raw_set");
        let _guard = StackGuard::new(&vm);
        vm.push_pinned(slot);
        if !vm.peek(0).is_table() {
            vm.pop();
            return;
        }
        key.push_to_vm(&vm);
        value.push_to_vm(&vm);
        vm.raw_set_kv();
        vm.pop();
    }

    /// A named-field accessor tied to this view's lifetime.
    pub fn field<'a>(&'a self, name: &'a str) -> Field<'a> {
        assert!(!self.handle.is_empty(), "TableView::field: view is empty");
        Field { table: self, name }
    }
}

impl Deref for TableView {
    type Target = Handle;

    fn deref(&self) -> &Handle {
        &self.handle
    }
}

impl From<Handle> for TableView {
    fn from(handle: Handle) -> TableView {
        TableView { handle }
    }
}

impl From<TableView> for Handle {
    fn from(view: TableView) -> Handle {
        view.handle
    }
}

/// One field of one table, named but not yet read. Reads and writes go
/// through the owning view; the borrow keeps the accessor from
/// outliving it.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    table: &'a TableView,
    name: &'a str,
}

impl Field<'_> {
    /// Captures the field's current value.
    pub fn get(&self) -> Handle {
        self.table.read_field(self.name)
    }

    /// Overwrites the field.
    pub fn set<T: ToVm>(&self, value: T) {
        self.table.write_field(self.name, value);
    }

    pub fn name(&self) -> &str {
        self.name
    }
}

impl From<Field<'_>> for Handle {
    fn from(field: Field<'_>) -> Handle {
        field.get()
    }
}
