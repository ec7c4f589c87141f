use tether::handle::{FromVm, Handle, TableView, ToVm, TypeMismatch};
use tether::vm::{VM, Value};

/// A host type with hand-written conversions, the way an embedding
/// application would bridge its own records.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

impl ToVm for Point {
    fn push_to_vm(&self, vm: &VM) {
        vm.push_new_table();
        vm.push(Value::String("x".into()));
        vm.push(Value::Integer(self.x));
        vm.raw_set_kv();
        vm.push(Value::String("y".into()));
        vm.push(Value::Integer(self.y));
        vm.raw_set_kv();
    }
}

impl FromVm for Point {
    fn read_from_vm(vm: &VM, depth: usize) -> Result<Self, TypeMismatch> {
        let receiver = vm.peek(depth);
        if !receiver.is_table() {
            return Err(TypeMismatch::new("point table", receiver.type_name()));
        }
        vm.push_copy(depth);

        vm.push(Value::String("x".into()));
        vm.raw_get_kv();
        let x = i64::read_from_vm(vm, 0);
        vm.pop();

        vm.push(Value::String("y".into()));
        vm.raw_get_kv();
        let y = i64::read_from_vm(vm, 0);
        vm.pop();

        vm.pop();
        match (x, y) {
            (Ok(x), Ok(y)) => Ok(Point { x, y }),
            _ => Err(TypeMismatch::new("point table", "table")),
        }
    }
}

#[test]
fn custom_converters_round_trip() {
    let vm = VM::new();
    let p = Point { x: 3, y: -4 };

    let h = Handle::from_host(&vm, p);
    assert_eq!(h.cast::<Point>(), Ok(p));
    assert_eq!(vm.stack_height(), 0);

    // the pushed shape is an ordinary table other layers can see
    let view = TableView::from(h);
    assert_eq!(view.read_field("x").cast::<i64>(), Ok(3));
    assert_eq!(view.read_field("y").cast::<i64>(), Ok(-4));
}

#[test]
fn custom_converters_report_bad_shapes() {
    let vm = VM::new();
    assert_eq!(
        Handle::from_host(&vm, 5i64).cast::<Point>(),
        Err(TypeMismatch::new("point table", "integer"))
    );

    let partial = TableView::create(&vm);
    partial.write_field("x", 1i64);
    assert!(partial.cast::<Point>().is_err(), "a missing field is a miss");
    assert_eq!(vm.stack_height(), 0);
}

#[test]
fn handles_are_their_own_converters() {
    let vm = VM::new();
    let original = Handle::from_host(&vm, "shared value");

    let rewrapped = Handle::from_host(&vm, &original);
    assert_eq!(rewrapped.debug_str(), original.debug_str());
    assert_eq!(vm.live_pins(), 2, "re-wrapping registers independently");

    let via_cast = original.cast::<Handle>().unwrap();
    assert_eq!(via_cast.debug_str(), original.debug_str());
    assert_eq!(vm.live_pins(), 3);

    drop(original);
    assert_eq!(rewrapped.cast::<String>(), Ok("shared value".to_owned()));
    assert_eq!(via_cast.cast::<String>(), Ok("shared value".to_owned()));
}

#[test]
fn empty_handles_push_nil_and_stay_empty() {
    let vm = VM::new();
    let rewrapped = Handle::from_host(&vm, &Handle::new());
    assert!(rewrapped.is_empty());
    assert_eq!(vm.total_pins(), 0);
}

#[test]
fn table_views_convert_like_handles() {
    let vm = VM::new();
    let t = TableView::create(&vm);
    t.write_field("k", 1i64);

    let h = Handle::from_host(&vm, &t);
    let back = h.cast::<TableView>().unwrap();
    assert_eq!(back.read_field("k").cast::<i64>(), Ok(1));

    // wrapping a non-table only bites once a field op runs
    let lax = Handle::from_host(&vm, 7i64).cast::<TableView>().unwrap();
    assert!(lax.read_field("k").is_empty());
}

#[test]
fn reads_can_address_any_depth() {
    let vm = VM::new();
    Point { x: 1, y: 2 }.push_to_vm(&vm);
    vm.push(Value::Integer(99));

    assert_eq!(Point::read_from_vm(&vm, 1), Ok(Point { x: 1, y: 2 }));
    assert_eq!(i64::read_from_vm(&vm, 0), Ok(99));
    assert_eq!(vm.stack_height(), 2, "depth reads must not disturb the stack");

    vm.pop();
    vm.pop();
}
