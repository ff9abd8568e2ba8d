use std::rc::Rc;

use tether::{shadow_clone, BindableList, ChangeReason, Error};
use _validator::Validator;

type Events<T> = Rc<Validator<(&'static str, Vec<T>, ChangeReason)>>;

fn record<T: 'static + Clone>(v: &Events<T>, name: &'static str, list: &BindableList<T>) {
	let v = Rc::clone(v);
	list.on_list_changed(move |changed, reason| v.push((name, changed.to_vec(), reason)));
}

#[test]
fn diffs_replay_onto_peers() {
	let v: Events<&str> = Rc::new(Validator::new());
	let a = BindableList::new();
	let b = BindableList::new();
	a.bind_to(&b);
	record(&v, "a", &a);
	record(&v, "b", &b);

	b.add("x");
	assert_eq!(a.to_vec(), ["x"]);
	v.expect([
		("b", vec!["x"], ChangeReason::Add),
		("a", vec!["x"], ChangeReason::Add),
	]);

	assert!(b.remove_all(&["x"]));
	assert!(a.is_empty());
	assert!(b.is_empty());
	v.expect([
		("b", vec!["x"], ChangeReason::Remove),
		("a", vec!["x"], ChangeReason::Remove),
	]);
}

#[test]
fn bind_to_replaces_contents_without_merging() {
	let v: Events<i32> = Rc::new(Validator::new());
	let a = BindableList::from(vec![1, 2]);
	let b = BindableList::from(vec![3]);
	record(&v, "a", &a);
	record(&v, "b", &b);

	a.bind_to(&b);
	assert_eq!(a.to_vec(), [3]);
	assert_eq!(b.to_vec(), [3]);
	v.expect([
		("a", vec![1, 2], ChangeReason::Remove),
		("a", vec![3], ChangeReason::Add),
	]);

	a.add(4);
	assert_eq!(b.to_vec(), [3, 4]);
}

#[test]
fn binding_to_self_or_a_peer_changes_nothing() {
	let a = BindableList::from(vec![1]);
	let b = BindableList::from(vec![2]);

	a.bind_to(&a);
	assert_eq!((a.to_vec(), a.peer_count()), (vec![1], 0));

	a.bind_to(&b);
	b.bind_to(&a);
	a.bind_to(&b);
	assert_eq!((a.peer_count(), b.peer_count()), (1, 1));
	assert_eq!(b.to_vec(), [2]);
}

#[test]
fn earlier_peers_stay_bound() {
	let a = BindableList::new();
	let b = BindableList::new();
	let c = BindableList::new();
	a.bind_to(&b);
	a.bind_to(&c);

	c.add('c');
	assert_eq!(a.to_vec(), ['c']);
	assert_eq!(b.to_vec(), ['c']);
}

#[test]
fn each_list_applies_a_diff_once() {
	let v: Events<u8> = Rc::new(Validator::new());
	let lists: Vec<_> = (0..4).map(|_| BindableList::new()).collect();
	// Fully connected.
	for (i, list) in lists.iter().enumerate() {
		for other in &lists[i + 1..] {
			list.bind_to(other);
		}
	}
	for (list, name) in lists.iter().zip(["0", "1", "2", "3"]) {
		record(&v, name, list);
	}

	lists[2].add_all([1, 1]);
	for list in &lists {
		assert_eq!(list.to_vec(), [1, 1]);
	}
	v.expect([
		("2", vec![1, 1], ChangeReason::Add),
		("0", vec![1, 1], ChangeReason::Add),
		("1", vec![1, 1], ChangeReason::Add),
		("3", vec![1, 1], ChangeReason::Add),
	]);
}

#[test]
fn insert_rejects_duplicates_but_add_does_not() {
	let list = BindableList::new();
	assert!(list.insert(0, "item"));
	assert!(!list.insert(0, "item"));
	assert_eq!(list.len(), 1);

	list.add("item");
	list.add_at(0, "item");
	assert_eq!(list.to_vec(), ["item"; 3]);
}

#[test]
fn none_elements_still_make_one_element_events() {
	let v: Events<Option<&str>> = Rc::new(Validator::new());
	let list = BindableList::new();
	record(&v, "list", &list);

	list.add(None);
	list.add(Some("x"));
	assert!(list.remove(&None));
	v.expect([
		("list", vec![None], ChangeReason::Add),
		("list", vec![Some("x")], ChangeReason::Add),
		("list", vec![None], ChangeReason::Remove),
	]);
}

#[test]
fn set_is_a_remove_then_an_add() {
	let v: Events<&str> = Rc::new(Validator::new());
	let a = BindableList::from(vec!["a", "b", "c"]);
	let peer = BindableList::new();
	peer.bind_to(&a);
	record(&v, "a", &a);

	assert_eq!(a.set(1, "B"), "b");
	assert_eq!(a.to_vec(), ["a", "B", "c"]);
	assert_eq!(peer.to_vec(), ["a", "c", "B"]);
	v.expect([
		("a", vec!["b"], ChangeReason::Remove),
		("a", vec!["B"], ChangeReason::Add),
	]);
}

#[test]
fn removals_carry_every_occurrence() {
	let v: Events<char> = Rc::new(Validator::new());
	let a = BindableList::from(vec!['x', 'y', 'x', 'z']);
	let b = BindableList::new();
	b.bind_to(&a);
	record(&v, "b", &b);

	assert!(a.remove_all(&['x']));
	assert_eq!(b.to_vec(), ['y', 'z']);
	v.expect([("b", vec!['x', 'x'], ChangeReason::Remove)]);

	assert!(a.retain_all(&['z']));
	assert_eq!(b.to_vec(), ['z']);
	v.expect([("b", vec!['y'], ChangeReason::Remove)]);

	a.clear();
	assert!(b.is_empty());
	v.expect([("b", vec!['z'], ChangeReason::Remove)]);
}

#[test]
fn no_op_mutations_emit_nothing() {
	let v: Events<i32> = Rc::new(Validator::new());
	let list = BindableList::from(vec![1]);
	record(&v, "list", &list);

	assert!(!list.remove(&2));
	assert!(!list.remove_all(&[2, 3]));
	assert!(!list.retain_all(&[1]));
	assert!(!list.add_all([]));
	assert!(!list.add_all_at(0, []));
	assert_eq!(list.remove_at(5), None);
	list.remove_at(0);
	list.clear();
	v.expect([("list", vec![1], ChangeReason::Remove)]);
}

#[test]
fn positional_additions() {
	let v: Events<i32> = Rc::new(Validator::new());
	let list = BindableList::from(vec![1, 4]);
	record(&v, "list", &list);

	assert!(list.add_all_at(1, [2, 3]));
	assert_eq!(list.to_vec(), [1, 2, 3, 4]);
	assert_eq!(list.remove_at(0), Some(1));
	v.expect([
		("list", vec![2, 3], ChangeReason::Add),
		("list", vec![1], ChangeReason::Remove),
	]);
}

#[test]
fn queries() {
	let list: BindableList<_> = "abcab".chars().collect();
	assert_eq!(list.get(1), Some('b'));
	assert_eq!(list.get(5), None);
	assert_eq!(list.index_of(&'b'), Some(1));
	assert_eq!(list.last_index_of(&'b'), Some(4));
	assert_eq!(list.index_of(&'z'), None);
	assert!(list.contains(&'c'));
	assert!(list.contains_all(&['a', 'c']));
	assert!(!list.contains_all(&['a', 'z']));
	assert_eq!(list.sub_list(1..3), ['b', 'c']);
	assert_eq!(list.sub_list(3..), ['a', 'b']);
	assert_eq!(list.with(<[char]>::len), 5);
}

#[test]
fn run_once_reports_current_items() {
	let v: Events<i32> = Rc::new(Validator::new());
	let empty = BindableList::new();
	let full = BindableList::from(vec![1, 2]);
	for (list, name) in [(&empty, "empty"), (&full, "full")] {
		list.on_list_changed_run_once({
			shadow_clone!(v);
			move |changed, reason| v.push((name, changed.to_vec(), reason))
		});
	}
	v.expect([
		("empty", vec![], ChangeReason::Add),
		("full", vec![1, 2], ChangeReason::Add),
	]);
}

#[test]
fn unbinding_stops_replay() {
	let a = BindableList::new();
	let b = BindableList::new();
	let c = BindableList::new();
	a.bind_to(&b);
	c.bind_to(&b);

	assert!(a.unbind_from(&b));
	assert!(!a.unbind_from(&b));
	b.add(1);
	assert!(a.is_empty());
	assert_eq!(c.to_vec(), [1]);

	b.unbind_bindings();
	b.add(2);
	assert_eq!(c.to_vec(), [1]);
	assert_eq!((b.peer_count(), c.peer_count()), (0, 0));
}

#[test]
fn dispose_drops_listeners_and_links() {
	let captured = Rc::new(());
	let a = BindableList::<i32>::new();
	let b = BindableList::new();
	a.bind_to(&b);
	a.on_list_changed({
		shadow_clone!(captured);
		move |_, _| assert!(Rc::strong_count(&captured) > 1)
	});

	a.dispose();
	assert_eq!(Rc::strong_count(&captured), 1);
	assert_eq!(a.listener_count(), 0);
	assert!(!b.is_bound_to(&a));
}

#[test]
fn listeners_may_start_nested_diffs() {
	let a = BindableList::new();
	let b = BindableList::new();
	a.bind_to(&b);
	b.on_list_changed({
		shadow_clone!(b);
		move |changed, reason| {
			if reason == ChangeReason::Add && changed == ["ping"] {
				b.add("pong");
			}
		}
	});

	a.add("ping");
	assert_eq!(a.to_vec(), ["ping", "pong"]);
	assert_eq!(b.to_vec(), ["ping", "pong"]);
}

#[test]
fn bind_to_dyn_rejects_other_types() {
	let a = BindableList::from(vec![1_u8]);
	let other = BindableList::from(vec!["1"]);
	assert!(matches!(
		a.bind_to_dyn(&other),
		Err(Error::InvalidArgument { .. })
	));

	let same = BindableList::from(vec![2_u8]);
	a.bind_to_dyn(&same).unwrap();
	assert_eq!(a.to_vec(), [2]);
}
