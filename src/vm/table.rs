use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::vm::value::Value;

/// Index of a table in the [`TableStore`]. Copyable and hashable so a
/// table can itself key another table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub(crate) u32);

impl TableId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Keys a table entry. Unlike [`Value`], every variant is hashable:
/// values that cannot key a table (nil, non-integral floats, functions)
/// are rejected before a `TableKey` is ever built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Boolean(bool),
    Integer(i64),
    Str(Rc<str>),
    Table(TableId),
}

impl TableKey {
    /// The value this key denotes, for pushing it back onto the stack.
    pub fn to_value(&self) -> Value {
        match self {
            TableKey::Boolean(b) => Value::Boolean(*b),
            TableKey::Integer(i) => Value::Integer(*i),
            TableKey::Str(s) => Value::String(s.clone()),
            TableKey::Table(id) => Value::Table(*id),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKey::Boolean(b) => write!(f, "{b}"),
            TableKey::Integer(i) => write!(f, "{i}"),
            TableKey::Str(s) => write!(f, "\"{s}\""),
            TableKey::Table(id) => write!(f, "table#{}", id.index()),
        }
    }
}

/// One table: a hash of entries plus an optional metatable link.
/// Entries never hold nil; storing nil under a key removes the key.
#[derive(Debug, Default)]
pub struct Table {
    pub(crate) entries: HashMap<TableKey, Value>,
    pub(crate) metatable: Option<TableId>,
}

impl Table {
    pub(crate) fn new() -> Self {
        Table::default()
    }
}

/// Arena of all tables created through a VM. Tables are never freed:
/// collecting them is the engine's concern, not the embedding layer's,
/// and the ids handed out here stay valid for the life of the VM.
#[derive(Debug, Default)]
pub(crate) struct TableStore {
    tables: Vec<Table>,
}

impl TableStore {
    pub(crate) fn new() -> Self {
        TableStore::default()
    }

    pub(crate) fn alloc(&mut self, table: Table) -> TableId {
        let id = TableId(self.tables.len() as u32);
        self.tables.push(table);
        id
    }

    pub(crate) fn get(&self, id: TableId) -> &Table {
        &self.tables[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0 as usize]
    }

    pub(crate) fn len(&self) -> usize {
        self.tables.len()
    }
}
