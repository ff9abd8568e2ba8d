use std::{
	any::Any,
	panic::{self, AssertUnwindSafe},
	rc::Rc,
};

use tether::{shadow_clone, Bindable, ConversionError, Error, Number};
use _validator::Validator;

fn record<T: 'static + Clone>(
	v: &Rc<Validator<(&'static str, Option<T>, T)>>,
	name: &'static str,
	cell: &Bindable<T>,
) {
	let v = Rc::clone(v);
	cell.on_value_changed(move |old, new| v.push((name, old.cloned(), new.clone())));
}

#[test]
fn chained_binding_converges_both_ways() {
	let a = Bindable::new(1);
	let b = Bindable::new(2);
	let c = Bindable::new(3);

	a.bind_to(&b);
	b.bind_to(&c);
	assert_eq!((a.get(), b.get(), c.get()), (3, 3, 3));

	a.set(5);
	assert_eq!((b.get(), c.get()), (5, 5));

	c.set(9);
	assert_eq!((a.get(), b.get()), (9, 9));
}

#[test]
fn bind_to_takes_the_targets_value() {
	let v = Rc::new(Validator::new());
	let a = Bindable::new("a");
	let b = Bindable::new("b");
	record(&v, "a", &a);
	record(&v, "b", &b);

	a.bind_to(&b);
	v.expect([("a", Some("a"), "b")]);
	assert!(a.bind_target().is_some_and(|target| target.ptr_eq(&b)));
	assert!(a.is_bound_to(&b));
	assert!(b.is_bound_to(&a));
	assert!(b.bind_target().is_none());

	b.set("c");
	v.expect([("b", Some("b"), "c"), ("a", Some("b"), "c")]);
}

#[test]
fn listeners_run_in_registration_order_before_peers() {
	let v = Rc::new(Validator::new());
	let a = Bindable::new(0);
	let b = Bindable::new(0);
	b.bind_to(&a);
	record(&v, "a1", &a);
	record(&v, "b", &b);
	record(&v, "a2", &a);

	a.set(1);
	v.expect([("a1", Some(0), 1), ("a2", Some(0), 1), ("b", Some(0), 1)]);
}

#[test]
fn equal_values_are_not_propagated() {
	let v = Rc::new(Validator::new());
	let a = Bindable::new(String::from("same"));
	let b = Bindable::new(String::from("same"));
	record(&v, "a", &a);
	record(&v, "b", &b);

	a.bind_to(&b);
	a.set(String::from("same"));
	v.expect([]);
	assert!(!a.ptr_eq(&b));
}

#[test]
fn binding_to_self_or_a_peer_changes_nothing() {
	let v = Rc::new(Validator::new());
	let a = Bindable::new(1);
	let b = Bindable::new(2);
	record(&v, "a", &a);

	a.bind_to(&a);
	assert_eq!(a.peer_count(), 0);
	assert!(a.bind_target().is_none());

	a.bind_to(&b);
	v.expect([("a", Some(1), 2)]);
	a.bind_to(&b);
	b.bind_to(&a);
	assert_eq!((a.peer_count(), b.peer_count()), (1, 1));
	assert!(b.bind_target().is_none());
	assert_eq!(a.listener_count(), 1);

	b.set(3);
	v.expect([("a", Some(2), 3)]);
}

#[test]
fn rebinding_replaces_the_target() {
	let a = Bindable::new(0);
	let b = Bindable::new(1);
	let c = Bindable::new(2);

	a.bind_to(&b);
	a.bind_to(&c);
	assert_eq!(a.get(), 2);
	assert!(!a.is_bound_to(&b));
	assert!(a.bind_target().is_some_and(|target| target.ptr_eq(&c)));

	b.set(10);
	assert_eq!(a.get(), 2);
}

#[test]
fn unbind_from_checks_the_target() {
	let a = Bindable::new(0);
	let b = Bindable::new(0);
	let c = Bindable::new(0);
	a.bind_to(&b);

	let error = a.unbind_from(&c).unwrap_err();
	assert!(matches!(error, Error::NotBoundTo { .. }));
	assert!(a.is_bound_to(&b));

	a.unbind_from(&b).unwrap();
	assert!(!a.is_bound_to(&b));
	assert!(!b.is_bound_to(&a));
	assert!(a.bind_target().is_none());

	b.set(1);
	assert_eq!(a.get(), 0);

	// Without a target, there's nothing to be inconsistent with.
	a.unbind_from(&c).unwrap();
	a.unbind_from(&a).unwrap();
}

#[test]
fn unbind_bindings_clears_both_directions() {
	let hub = Bindable::new(0);
	let spokes: Vec<_> = (0..3).map(|_| Bindable::new(0)).collect();
	for spoke in &spokes {
		spoke.bind_to(&hub);
	}
	assert_eq!(hub.live_peer_count(), 3);

	hub.unbind_bindings();
	assert_eq!(hub.peer_count(), 0);
	for spoke in &spokes {
		assert_eq!(spoke.peer_count(), 0);
		assert!(spoke.bind_target().is_none());
	}

	hub.set(1);
	assert!(spokes.iter().all(|spoke| spoke.get() == 0));
}

#[test]
fn unbind_bindings_drops_released_peers() {
	let hub = Bindable::new(0);
	let kept = Bindable::new(0);
	kept.bind_to(&hub);
	Bindable::new(0).bind_to(&hub);
	assert_eq!((hub.peer_count(), hub.live_peer_count()), (2, 1));

	hub.unbind_bindings();
	assert_eq!(hub.peer_count(), 0);
	assert_eq!(kept.peer_count(), 0);
}

#[test]
fn run_once_reports_no_old_value() {
	let v = Rc::new(Validator::new());
	let a = Bindable::new(7);
	a.on_value_changed_run_once({
		shadow_clone!(v);
		move |old, new| v.push((old.copied(), *new))
	});
	v.expect([(None, 7)]);

	a.set(8);
	v.expect([(Some(7), 8)]);
}

#[test]
fn set_internal_skips_one_listener_on_this_cell_only() {
	let v = Rc::new(Validator::new());
	let a = Bindable::new(0);
	let b = Bindable::new(0);
	b.bind_to(&a);

	let persist = a.on_value_changed({
		shadow_clone!(v);
		move |_, new| v.push(("persist", *new))
	});
	a.on_value_changed({
		shadow_clone!(v);
		move |_, new| v.push(("a", *new))
	});
	b.on_value_changed({
		shadow_clone!(v);
		move |_, new| v.push(("b", *new))
	});

	a.set_internal(4, persist);
	v.expect([("a", 4), ("b", 4)]);

	a.set(5);
	v.expect([("persist", 5), ("a", 5), ("b", 5)]);
}

#[test]
fn removed_listeners_stop_firing() {
	let v = Rc::new(Validator::new());
	let a = Bindable::new(0);
	let id = a.on_value_changed({
		shadow_clone!(v);
		move |_, new| v.push(*new)
	});

	a.set(1);
	assert!(a.remove_listener(id));
	assert!(!a.remove_listener(id));
	a.set(2);
	v.expect([1]);
}

#[test]
fn dispose_releases_listener_captures() {
	let captured = Rc::new(());
	let a = Bindable::new(0);
	let b = Bindable::new(0);
	a.bind_to(&b);
	a.on_value_changed({
		shadow_clone!(captured);
		move |_, _| assert!(Rc::strong_count(&captured) > 1)
	});
	assert_eq!(Rc::strong_count(&captured), 2);

	a.dispose();
	assert_eq!(Rc::strong_count(&captured), 1);
	assert_eq!(a.listener_count(), 0);
	assert_eq!((a.peer_count(), b.peer_count()), (0, 0));
	assert!(a.bind_target().is_none());
}

#[test]
fn listeners_may_mutate_cells() {
	let a = Bindable::new(0);
	let doubled = Bindable::new(0);
	a.on_value_changed({
		shadow_clone!(doubled);
		move |_, new| doubled.set(new * 2)
	});

	// Listeners may also write back to the cell that notified them.
	a.on_value_changed({
		shadow_clone!(a);
		move |_, new| a.set(new - new % 2)
	});

	a.set(3);
	assert_eq!(a.get(), 2);
	assert_eq!(doubled.get(), 4);
}

#[test]
fn write_backs_reach_peers() {
	let a = Bindable::new(0);
	let b = Bindable::new(0);
	let c = Bindable::new(0);
	b.bind_to(&a);
	c.bind_to(&a);
	a.on_value_changed({
		shadow_clone!(a);
		move |_, new| a.set(*new.min(&10))
	});

	a.set(20);
	assert_eq!((a.get(), b.get(), c.get()), (10, 10, 10));

	b.set(30);
	assert_eq!((a.get(), b.get(), c.get()), (10, 10, 10));
}

#[test]
fn listener_panics_propagate_after_the_value_was_stored() {
	let v = Rc::new(Validator::new());
	let a = Bindable::new(0);
	let b = Bindable::new(0);
	b.bind_to(&a);
	a.on_value_changed(|_, _| panic!("bad listener"));
	record(&v, "a", &a);

	let result = panic::catch_unwind(AssertUnwindSafe(|| a.set(1)));
	assert!(result.is_err());
	assert_eq!(a.get(), 1);
	assert_eq!(b.get(), 0);
	v.expect([]);
}

#[test]
fn bind_to_dyn_rejects_other_types() {
	let a = Bindable::new(1_i32);
	let text = Bindable::new(String::new());
	let b = Bindable::new(2_i32);

	let error = a.bind_to_dyn(&text).unwrap_err();
	assert!(matches!(error, Error::InvalidArgument { .. }));
	assert_eq!(a.peer_count(), 0);

	a.bind_to_dyn(&b).unwrap();
	assert_eq!(a.get(), 2);
}

#[test]
fn runtime_typed_assignment() {
	let a = Bindable::new(1_i64);

	a.set_any(Box::new(5_i64)).unwrap();
	assert_eq!(a.get(), 5);

	let error = a.set_any(Box::new("five") as Box<dyn Any>).unwrap_err();
	assert!(matches!(
		error,
		Error::Conversion(ConversionError::TypeMismatch { expected: "i64" })
	));
	assert_eq!(a.get(), 5);
}

#[test]
fn numbers_are_coerced_losslessly() {
	let a = Bindable::new(0_i32);

	a.set_number(Number::F64(4.0)).unwrap();
	assert_eq!(a.get(), 4);
	a.set_number(Number::I64(-12)).unwrap();
	assert_eq!(a.get(), -12);

	let error = a.set_number(Number::F64(4.5)).unwrap_err();
	assert!(matches!(
		error,
		Error::Conversion(ConversionError::Lossy { .. })
	));
	assert!(a.set_number(Number::I64(i64::MAX)).is_err());
	assert_eq!(a.get(), -12);
}

#[test]
fn weak_handles_do_not_keep_cells_alive() {
	let a = Bindable::new(0);
	let b = Bindable::new(0);
	a.bind_to(&b);

	let weak = b.downgrade();
	assert!(weak.upgrade().is_some());
	drop(b);
	assert!(weak.upgrade().is_none());
	assert!(a.bind_target().is_none());
	assert_eq!(a.live_peer_count(), 0);
}
