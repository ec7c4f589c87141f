use tether::vm::{VM, Value};

#[test]
fn pinning_pops_and_collapses_nil() {
    let vm = VM::new();
    vm.push(Value::Nil);
    assert_eq!(vm.pin_from_stack(), None);

    vm.push(Value::Integer(1));
    let slot = vm.pin_from_stack().expect("non-nil values pin");
    assert_eq!(vm.stack_height(), 0);
    assert_eq!(slot.index(), 0);
}

#[test]
fn freed_slots_are_reused_lifo() {
    let vm = VM::new();
    vm.push(Value::Integer(1));
    let a = vm.pin_from_stack().unwrap();
    vm.push(Value::Integer(2));
    let b = vm.pin_from_stack().unwrap();

    vm.unpin(a);
    vm.unpin(b);

    vm.push(Value::Integer(3));
    let c = vm.pin_from_stack().unwrap();
    assert_eq!(c, b, "the most recently freed slot comes back first");

    vm.push(Value::Integer(4));
    let d = vm.pin_from_stack().unwrap();
    assert_eq!(d, a);

    assert_eq!(vm.live_pins(), 2);
    assert_eq!(vm.total_pins(), 4);
}

#[test]
fn pinned_values_can_materialize_any_number_of_times() {
    let vm = VM::new();
    vm.push(Value::String("rooted".into()));
    let slot = vm.pin_from_stack().unwrap();

    for _ in 0..3 {
        vm.push_pinned(slot);
        assert_eq!(vm.pop(), Value::String("rooted".into()));
    }
    assert_eq!(vm.live_pins(), 1);
    vm.unpin(slot);
}

#[test]
fn counters_distinguish_live_from_total() {
    let vm = VM::new();
    for i in 0..4 {
        vm.push(Value::Integer(i));
        let slot = vm.pin_from_stack().unwrap();
        if i % 2 == 0 {
            vm.unpin(slot);
        }
    }
    assert_eq!(vm.live_pins(), 2);
    assert_eq!(vm.total_pins(), 4);
}

#[test]
#[should_panic(expected = "slot is not pinned")]
fn releasing_twice_is_fatal() {
    let vm = VM::new();
    vm.push(Value::Integer(1));
    let slot = vm.pin_from_stack().unwrap();
    vm.unpin(slot);
    vm.unpin(slot);
}

#[test]
#[should_panic(expected = "slot is not pinned")]
fn materializing_a_freed_slot_is_fatal() {
    let vm = VM::new();
    vm.push(Value::Integer(1));
    let slot = vm.pin_from_stack().unwrap();
    vm.unpin(slot);
    vm.push_pinned(slot);
}
