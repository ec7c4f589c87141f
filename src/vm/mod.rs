//! The value engine underneath the handle layer.
//!
//! A [`VM`] owns three pieces of state: an operand stack through which
//! every host interaction flows, a registry of pinned values that the
//! collector must treat as roots, and the arena of tables. The `VM`
//! type itself is a cheap clone over shared state; handles keep a weak
//! reference to that state so they can release their registration on
//! drop without keeping the engine alive.
//!
//! All state is single-threaded. `VM` is `!Send` by construction, and
//! debug builds additionally pin every stack-touching operation to the
//! thread that created the engine.

pub mod native;
pub mod registry;
pub mod table;
pub mod value;

pub use native::{NativeFn, NativeSig};
pub use registry::Slot;
pub use table::{Table, TableId, TableKey};
pub use value::Value;

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::thread::{self, ThreadId};

use registry::Registry;
use table::TableStore;

/// Metatable lookups follow at most this many `"__index"` links before
/// giving up, so cyclic metatable chains terminate.
const MAX_INDEX_DEPTH: usize = 100;

const DEFAULT_STACK_CAPACITY: usize = 64;

pub(crate) type SharedState = Rc<RefCell<VmState>>;
pub(crate) type WeakState = Weak<RefCell<VmState>>;

/// Handle-facing facade over the engine state.
///
/// Cloning a `VM` clones the facade, not the engine: all clones see the
/// same stack, registry and tables. The engine's state is dropped when
/// the last facade goes away; handles outliving it degrade safely.
#[derive(Clone)]
pub struct VM {
    state: SharedState,
}

impl Default for VM {
    fn default() -> Self {
        VM::new()
    }
}

impl VM {
    pub fn new() -> Self {
        VM::with_stack_capacity(DEFAULT_STACK_CAPACITY)
    }

    pub fn with_stack_capacity(capacity: usize) -> Self {
        VM {
            state: Rc::new(RefCell::new(VmState {
                stack: Vec::with_capacity(capacity),
                registry: Registry::new(),
                tables: TableStore::new(),
                owner: thread::current().id(),
            })),
        }
    }

    pub(crate) fn from_shared(state: SharedState) -> Self {
        VM { state }
    }

    pub(crate) fn downgrade(&self) -> WeakState {
        Rc::downgrade(&self.state)
    }

    pub(crate) fn shares_state_with(&self, weak: &WeakState) -> bool {
        weak.upgrade()
            .is_some_and(|state| Rc::ptr_eq(&state, &self.state))
    }

    /// Current operand stack height.
    pub fn stack_height(&self) -> usize {
        self.state.borrow().stack_height()
    }

    /// Pushes a value onto the operand stack.
    pub fn push(&self, value: Value) {
        self.state.borrow_mut().push(value);
    }

    /// Pops the top of the operand stack. Underflow is fatal.
    pub fn pop(&self) -> Value {
        self.state.borrow_mut().pop()
    }

    /// Reads the value `depth` entries below the top without removing
    /// it. `peek(0)` is the top of the stack.
    pub fn peek(&self, depth: usize) -> Value {
        self.state.borrow().peek(depth)
    }

    /// Pushes a copy of the value `depth` entries below the top.
    pub fn push_copy(&self, depth: usize) {
        self.state.borrow_mut().push_copy(depth);
    }

    /// Pops the top of the stack and pins it in the registry. Popping
    /// nil pins nothing and returns `None`: nil needs no root, and the
    /// absence of a slot is how "no value" is represented downstream.
    pub fn pin_from_stack(&self) -> Option<Slot> {
        self.state.borrow_mut().pin_from_stack()
    }

    /// Pushes the value pinned in `slot` onto the stack.
    pub fn push_pinned(&self, slot: Slot) {
        self.state.borrow_mut().push_pinned(slot);
    }

    /// Releases a registration made by [`VM::pin_from_stack`].
    pub fn unpin(&self, slot: Slot) {
        self.state.borrow_mut().unpin(slot);
    }

    /// Number of live registry pins.
    pub fn live_pins(&self) -> usize {
        self.state.borrow().registry.live_count()
    }

    /// Number of pins ever made on this VM.
    pub fn total_pins(&self) -> usize {
        self.state.borrow().registry.total_pins()
    }

    /// Number of tables ever created on this VM.
    pub fn tables_created(&self) -> usize {
        self.state.borrow().tables.len()
    }

    /// Allocates a fresh empty table and pushes it.
    pub fn push_new_table(&self) {
        self.state.borrow_mut().push_new_table();
    }

    /// Reads field `name` of the table at the top of the stack and
    /// pushes the result, following `"__index"` metatable links. The
    /// receiver must be a table; the caller checks that first.
    pub fn push_field(&self, name: &str) {
        self.state.borrow_mut().push_field(name);
    }

    /// Raw keyed read. Expects `[.., table, key]`, pops the key and
    /// pushes `table[key]` without consulting metatables. Absent keys
    /// read as nil.
    pub fn raw_get_kv(&self) {
        self.state.borrow_mut().raw_get_kv();
    }

    /// Raw keyed write. Expects `[.., table, key, value]` and pops the
    /// key and value, leaving the table. Metatables are not consulted.
    /// Writing nil removes the key. A value that cannot key a table is
    /// fatal.
    pub fn raw_set_kv(&self) {
        self.state.borrow_mut().raw_set_kv();
    }

    /// Pushes the metatable of the value at the top of the stack and
    /// returns true, or pushes nothing and returns false if the value
    /// has none.
    pub fn push_metatable(&self) -> bool {
        self.state.borrow_mut().push_metatable()
    }

    /// Expects `[.., receiver, meta]` and pops `meta`, installing it as
    /// the receiver's metatable. A nil `meta` clears the metatable.
    /// Non-table receivers and non-table `meta` values are ignored.
    pub fn set_metatable_from_stack(&self) {
        self.state.borrow_mut().set_metatable_from_stack();
    }

    /// Snapshot of the keys of the table at `depth`. Order is
    /// unspecified.
    pub fn table_keys(&self, depth: usize) -> Vec<TableKey> {
        self.state.borrow().table_keys(depth)
    }
}

pub(crate) struct VmState {
    stack: Vec<Value>,
    registry: Registry,
    tables: TableStore,
    owner: ThreadId,
}

impl VmState {
    fn check_affinity(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "VM state touched from a thread other than its owner"
        );
    }

    fn stack_height(&self) -> usize {
        self.check_affinity();
        self.stack.len()
    }

    #[inline(always)]
    fn push(&mut self, value: Value) {
        self.check_affinity();
        self.stack.push(value);
    }

    #[inline(always)]
    fn pop(&mut self) -> Value {
        self.check_affinity();
        self.stack.pop().expect("VM::pop: operand stack is empty")
    }

    #[inline(always)]
    fn peek(&self, depth: usize) -> Value {
        self.check_affinity();
        let height = self.stack.len();
        assert!(
            depth < height,
            "VM::peek: depth {depth} is below the bottom of the stack"
        );
        self.stack[height - 1 - depth].clone()
    }

    fn push_copy(&mut self, depth: usize) {
        let copy = self.peek(depth);
        self.stack.push(copy);
    }

    fn pin_from_stack(&mut self) -> Option<Slot> {
        let value = self.pop();
        if value.is_nil() {
            return None;
        }
        Some(self.registry.pin(value))
    }

    fn push_pinned(&mut self, slot: Slot) {
        let value = self.registry.fetch(slot);
        self.push(value);
    }

    fn unpin(&mut self, slot: Slot) {
        self.check_affinity();
        self.registry.unpin(slot);
    }

    fn push_new_table(&mut self) {
        self.check_affinity();
        let id = self.tables.alloc(Table::new());
        self.stack.push(Value::Table(id));
    }

    fn push_field(&mut self, name: &str) {
        let Value::Table(id) = self.peek(0) else {
            panic!("VM::push_field: receiver is not a table");
        };
        let value = self.lookup(id, &TableKey::Str(name.into()));
        self.stack.push(value);
    }

    /// Field lookup with `"__index"` chasing. Only table-valued
    /// `"__index"` entries are followed; function-valued ones would
    /// need call machinery this engine does not have, so they read as
    /// absent.
    fn lookup(&self, table: TableId, key: &TableKey) -> Value {
        let index_key = TableKey::Str("__index".into());
        let mut current = table;
        for _ in 0..MAX_INDEX_DEPTH {
            if let Some(value) = self.tables.get(current).entries.get(key) {
                return value.clone();
            }
            let Some(meta) = self.tables.get(current).metatable else {
                return Value::Nil;
            };
            match self.tables.get(meta).entries.get(&index_key) {
                Some(Value::Table(next)) => current = *next,
                _ => return Value::Nil,
            }
        }
        Value::Nil
    }

    fn raw_get_kv(&mut self) {
        let key = self.pop();
        let Value::Table(id) = self.peek(0) else {
            panic!("VM::raw_get_kv: receiver is not a table");
        };
        let value = match key.to_table_key() {
            Some(key) => self
                .tables
                .get(id)
                .entries
                .get(&key)
                .cloned()
                .unwrap_or(Value::Nil),
            None => Value::Nil,
        };
        self.stack.push(value);
    }

    fn raw_set_kv(&mut self) {
        let value = self.pop();
        let key = self.pop();
        let Value::Table(id) = self.peek(0) else {
            panic!("VM::raw_set_kv: receiver is not a table");
        };
        let Some(key) = key.to_table_key() else {
            panic!("VM::raw_set_kv: {} cannot key a table", key.type_name());
        };
        if value.is_nil() {
            self.tables.get_mut(id).entries.remove(&key);
        } else {
            self.tables.get_mut(id).entries.insert(key, value);
        }
    }

    fn push_metatable(&mut self) -> bool {
        if let Value::Table(id) = self.peek(0) {
            if let Some(meta) = self.tables.get(id).metatable {
                self.stack.push(Value::Table(meta));
                return true;
            }
        }
        false
    }

    fn set_metatable_from_stack(&mut self) {
        let meta = self.pop();
        let Value::Table(id) = self.peek(0) else {
            return;
        };
        match meta {
            Value::Table(m) => self.tables.get_mut(id).metatable = Some(m),
            Value::Nil => self.tables.get_mut(id).metatable = None,
            _ => {}
        }
    }

    fn table_keys(&self, depth: usize) -> Vec<TableKey> {
        let Value::Table(id) = self.peek(depth) else {
            panic!("VM::table_keys: value is not a table");
        };
        self.tables.get(id).entries.keys().cloned().collect()
    }
}
