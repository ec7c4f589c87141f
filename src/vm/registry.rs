use crate::vm::value::Value;

/// A registry slot. The embedding layer stores these inside handles;
/// the slot itself carries no lifetime information, so using one after
/// it has been released is a bug the registry traps on access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(pub(crate) u32);

impl Slot {
    pub fn index(self) -> u32 {
        self.0
    }

    #[cfg(test)]
    pub fn new_for_test(index: u32) -> Self {
        Slot(index)
    }
}

/// Pins VM values so the collector treats them as roots for as long as
/// the host holds a registration. Released slots go on a free list and
/// are reused by later pins.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    slots: Vec<Option<Value>>,
    free_list: Vec<u32>,
    total_pins: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry::default()
    }

    /// Pins `value` and returns its slot. Nil never reaches the
    /// registry; callers collapse it to "no registration" first.
    pub(crate) fn pin(&mut self, value: Value) -> Slot {
        debug_assert!(!value.is_nil(), "Registry::pin: nil is never pinned");
        self.total_pins += 1;
        if let Some(index) = self.free_list.pop() {
            self.slots[index as usize] = Some(value);
            Slot(index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(value));
            Slot(index)
        }
    }

    /// Releases a pinned slot, making it available for reuse.
    pub(crate) fn unpin(&mut self, slot: Slot) {
        let released = self.slots[slot.0 as usize].take();
        assert!(released.is_some(), "Registry::unpin: slot is not pinned");
        self.free_list.push(slot.0);
    }

    /// The value pinned in `slot`.
    pub(crate) fn fetch(&self, slot: Slot) -> Value {
        self.slots[slot.0 as usize]
            .as_ref()
            .expect("Registry::fetch: slot is not pinned")
            .clone()
    }

    /// Number of currently pinned slots.
    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of pins ever made, including released ones.
    pub(crate) fn total_pins(&self) -> usize {
        self.total_pins
    }
}
