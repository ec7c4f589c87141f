use tether::handle::{Handle, TableView};
use tether::vm::{VM, Value};

#[test]
fn create_allocates_a_fresh_table() {
    let vm = VM::new();
    let t = TableView::create(&vm);
    assert!(!t.is_empty());
    assert_eq!(vm.tables_created(), 1);
    assert_eq!(t.debug_str(), "table#0");
    assert_eq!(vm.stack_height(), 0);
}

#[test]
fn fields_round_trip() {
    let vm = VM::new();
    let t = TableView::create(&vm);

    t.write_field("hp", 42i64);
    assert_eq!(t.read_field("hp").cast::<i64>(), Ok(42));
    assert!(t.read_field("missing").is_empty());

    t.write_field("hp", 43i64);
    assert_eq!(t.read_field("hp").cast::<i64>(), Ok(43));
    assert_eq!(vm.stack_height(), 0);
}

#[test]
fn writing_nil_removes_the_field() {
    let vm = VM::new();
    let t = TableView::create(&vm);
    t.write_field("k", 1i64);
    t.write_field("k", None::<i64>);
    assert!(t.read_field("k").is_empty());
}

#[test]
fn non_table_receivers_are_lenient() {
    let vm = VM::new();
    let v = TableView::from(Handle::from_host(&vm, 5i64));
    let pins = vm.live_pins();

    assert!(v.read_field("x").is_empty());
    v.write_field("x", 1i64);

    assert_eq!(vm.live_pins(), pins, "a dropped write must not register anything");
    assert_eq!(vm.stack_height(), 0);
    assert_eq!(v.cast::<i64>(), Ok(5), "the wrapped value is untouched");
}

#[test]
fn field_accessors_read_and_write() {
    let vm = VM::new();
    let t = TableView::create(&vm);

    t.field("name").set("borja");
    assert_eq!(t.field("name").get().cast::<String>(), Ok("borja".to_owned()));

    let captured = Handle::from(t.field("name"));
    assert_eq!(captured.cast::<String>(), Ok("borja".to_owned()));
    assert_eq!(t.field("name").name(), "name");
}

#[test]
fn raw_set_accepts_non_string_keys() {
    let vm = VM::new();
    let t = TableView::create(&vm);
    let other = TableView::create(&vm);

    t.raw_set(1i64, "one");
    t.raw_set(true, 10i64);
    t.raw_set(other.handle(), "by-table");

    t.push_value_to_stack();
    vm.push(Value::Integer(1));
    vm.raw_get_kv();
    assert_eq!(vm.pop(), Value::String("one".into()));

    vm.push(Value::Boolean(true));
    vm.raw_get_kv();
    assert_eq!(vm.pop(), Value::Integer(10));

    other.push_value_to_stack();
    vm.raw_get_kv();
    assert_eq!(vm.pop(), Value::String("by-table".into()));

    vm.pop();
    assert_eq!(vm.stack_height(), 0);
}

#[test]
fn reads_follow_index_links_but_writes_do_not() {
    let vm = VM::new();
    let defaults = TableView::create(&vm);
    let meta = TableView::create(&vm);
    let t = TableView::create(&vm);

    defaults.write_field("greeting", "hi");
    meta.write_field("__index", defaults.handle());
    t.set_metatable(meta.handle());

    assert_eq!(t.read_field("greeting").cast::<String>(), Ok("hi".to_owned()));

    t.write_field("greeting", "own");
    assert_eq!(t.read_field("greeting").cast::<String>(), Ok("own".to_owned()));
    assert_eq!(
        defaults.read_field("greeting").cast::<String>(),
        Ok("hi".to_owned()),
        "writes are raw and must not travel the chain"
    );
}

#[test]
fn handles_nest_inside_tables() {
    let vm = VM::new();
    let t = TableView::create(&vm);
    let inner = Handle::from_host(&vm, 99i64);
    let nested = TableView::create(&vm);

    t.write_field("inner", &inner);
    t.write_field("nested", nested.handle());

    assert_eq!(t.read_field("inner").cast::<i64>(), Ok(99));
    assert_eq!(t.read_field("nested").debug_str(), nested.debug_str());
}

#[test]
fn views_wrap_and_unwrap_handles() {
    let vm = VM::new();
    let h = Handle::from_host(&vm, 3i64);
    let rendering = h.debug_str();

    let view = TableView::from(h);
    assert!(!view.is_empty());
    assert_eq!(view.handle().debug_str(), rendering);

    let back: Handle = view.into_handle();
    assert_eq!(back.debug_str(), rendering);
}

#[test]
fn view_clones_see_the_same_table() {
    let vm = VM::new();
    let t = TableView::create(&vm);
    let alias = t.clone();

    t.write_field("shared", 1i64);
    assert_eq!(alias.read_field("shared").cast::<i64>(), Ok(1));
    assert_eq!(vm.live_pins(), 2, "two views, two registrations, one table");
}

#[test]
#[should_panic(expected = "handle is empty")]
fn reading_through_an_empty_view_is_fatal() {
    let view = TableView::from(Handle::new());
    let _ = view.read_field("x");
}

#[test]
#[should_panic(expected = "handle is empty")]
fn writing_through_an_empty_view_is_fatal() {
    let view = TableView::from(Handle::new());
    view.write_field("x", 1i64);
}

#[test]
#[should_panic(expected = "view is empty")]
fn field_accessor_on_an_empty_view_is_fatal() {
    let view = TableView::from(Handle::new());
    let _ = view.field("x");
}

#[test]
#[should_panic(expected = "cannot key a table")]
fn nil_keys_are_rejected() {
    let vm = VM::new();
    let t = TableView::create(&vm);
    t.raw_set(None::<i64>, 1i64);
}
