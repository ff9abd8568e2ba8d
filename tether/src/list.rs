use std::{
	any,
	cell::RefCell,
	collections::HashSet,
	fmt::{self, Debug, Formatter},
	mem,
	ops::{Bound, RangeBounds},
	rc::{Rc, Weak},
	slice,
};

use tether_runtime::WeakPeers;

use crate::{
	listener::{ListenerId, Listeners},
	AnyBindable, Error, ListCursor, Result,
};

/// What a list diff did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeReason {
	/// The items were added. On peers, they are appended.
	Add,
	/// The items were removed. On peers, one equal occurrence per item is removed.
	Remove,
}

type ListListener<T> = dyn Fn(&[T], ChangeReason);

pub(crate) struct ListInner<T> {
	items: RefCell<Vec<T>>,
	listeners: RefCell<Listeners<ListListener<T>>>,
	peers: RefCell<WeakPeers<ListInner<T>>>,
}

/// A shared list cell that forwards diffs to the lists bound to it.
///
/// Every mutation stores the change, then emits one `(items, reason)` event per
/// [`ChangeReason`]. A mutation that changes nothing emits nothing, and no event is ever empty.
///
/// Peers don't exchange positions. An [`Add`](`ChangeReason::Add`) is appended on each peer,
/// and a [`Remove`](`ChangeReason::Remove`) removes the first equal occurrence of each item.
/// Each list in a peer group applies a given diff exactly once.
///
/// Unlike [`Bindable`](`crate::Bindable`), list bindings are symmetric only: there is no bind target.
pub struct BindableList<T> {
	inner: Rc<ListInner<T>>,
}

/// A non-owning handle to a [`BindableList`].
pub struct WeakBindableList<T> {
	inner: Weak<ListInner<T>>,
}

impl<T> Clone for BindableList<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<T> Clone for WeakBindableList<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Weak::clone(&self.inner),
		}
	}
}

impl<T> WeakBindableList<T> {
	/// Recovers a strong handle, iff the list is still alive.
	#[must_use]
	pub fn upgrade(&self) -> Option<BindableList<T>> {
		self.inner.upgrade().map(|inner| BindableList { inner })
	}
}

impl<T> Debug for WeakBindableList<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("WeakBindableList")
			.field(&self.inner.as_ptr())
			.finish()
	}
}

impl<T: Debug> Debug for BindableList<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut debug = f.debug_struct("BindableList");
		match self.inner.items.try_borrow() {
			Ok(items) => debug.field("items", &*items),
			Err(_) => debug.field("items", &"<borrowed>"),
		};
		debug
			.field("peers", &self.inner.peers.borrow().len())
			.field("listeners", &self.inner.listeners.borrow().len())
			.finish_non_exhaustive()
	}
}

impl<T: 'static> Default for BindableList<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: 'static> From<Vec<T>> for BindableList<T> {
	fn from(items: Vec<T>) -> Self {
		Self {
			inner: Rc::new(ListInner {
				items: RefCell::new(items),
				listeners: RefCell::new(Listeners::new()),
				peers: RefCell::new(WeakPeers::new()),
			}),
		}
	}
}

impl<T: 'static> FromIterator<T> for BindableList<T> {
	fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
		Self::from(iter.into_iter().collect::<Vec<_>>())
	}
}

/// Cells that already applied the diff currently travelling through a peer group.
struct Wave<T> {
	visited: HashSet<*const ListInner<T>>,
}

impl<T: 'static + Clone + PartialEq> ListInner<T> {
	fn emit(&self, changed: &[T], reason: ChangeReason) {
		debug_assert!(!changed.is_empty());
		let mut wave = Wave {
			visited: HashSet::from([std::ptr::from_ref(self)]),
		};
		self.trigger_change(&mut wave, changed, reason);
	}

	fn trigger_change(&self, wave: &mut Wave<T>, changed: &[T], reason: ChangeReason) {
		self.peers.borrow_mut().record_trigger();

		let listeners = self.listeners.borrow().snapshot(None);
		for listener in listeners {
			listener(changed, reason);
		}

		let peers = self.peers.borrow().live();
		for peer in peers {
			peer.sync_change(wave, changed, reason);
		}
	}

	fn sync_change(&self, wave: &mut Wave<T>, changed: &[T], reason: ChangeReason) {
		if !wave.visited.insert(std::ptr::from_ref(self)) {
			return;
		}
		self.apply(changed, reason);
		tracing::trace!(
			cell = ?std::ptr::from_ref(self),
			?reason,
			len = changed.len(),
			"replayed list diff"
		);
		self.trigger_change(wave, changed, reason);
	}

	fn apply(&self, changed: &[T], reason: ChangeReason) {
		let mut items = self.items.borrow_mut();
		match reason {
			ChangeReason::Add => items.extend_from_slice(changed),
			ChangeReason::Remove => {
				for item in changed {
					if let Some(index) = items.iter().position(|existing| existing == item) {
						items.remove(index);
					}
				}
			}
		}
	}
}

fn link<T>(a: &Rc<ListInner<T>>, b: &Rc<ListInner<T>>) {
	a.peers.borrow_mut().insert(b);
	b.peers.borrow_mut().insert(a);
}

fn unlink<T>(a: &Rc<ListInner<T>>, b: &Rc<ListInner<T>>) -> bool {
	let removed = a.peers.borrow_mut().remove(b);
	b.peers.borrow_mut().remove(a) || removed
}

impl<T: 'static> BindableList<T> {
	/// Creates a new empty, unbound list.
	#[must_use]
	pub fn new() -> Self {
		Self::from(Vec::new())
	}

	/// Borrows the items for the duration of `f`.
	///
	/// # Panics
	///
	/// Iff `f` tries to mutate this list.
	pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
		f(&self.inner.items.borrow())
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.inner.items.borrow().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.inner.items.borrow().is_empty()
	}

	/// Registers a listener that's called with each diff.
	pub fn on_list_changed(&self, listener: impl 'static + Fn(&[T], ChangeReason)) -> ListenerId {
		self.inner.listeners.borrow_mut().push(Rc::new(listener))
	}

	/// Removes a listener. Returns whether it was registered on this list.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let removed = self.inner.listeners.borrow_mut().remove(id);
		removed.is_some()
	}

	/// Drops all listeners (and anything they captured).
	pub fn unbind_listeners(&self) {
		let listeners = self.inner.listeners.borrow_mut().take_all();
		drop(listeners);
	}

	/// Removes the peer link between this list and `other`, if there is one.
	///
	/// Returns whether they were linked.
	pub fn unbind_from(&self, other: &BindableList<T>) -> bool {
		let unbound = unlink(&self.inner, &other.inner);
		if unbound {
			tracing::debug!(
				cell = ?Rc::as_ptr(&self.inner),
				peer = ?Rc::as_ptr(&other.inner),
				"unbound list peer"
			);
		}
		unbound
	}

	/// Removes every peer link of this list, in both directions.
	pub fn unbind_bindings(&self) {
		let peers = self.inner.peers.borrow().live();
		for peer in &peers {
			unlink(&self.inner, peer);
		}
		self.inner.peers.borrow_mut().clear();
	}

	/// [`unbind_bindings`](`BindableList::unbind_bindings`) and [`unbind_listeners`](`BindableList::unbind_listeners`).
	pub fn unbind_all(&self) {
		self.unbind_bindings();
		self.unbind_listeners();
	}

	/// Same as [`unbind_all`](`BindableList::unbind_all`).
	pub fn dispose(&self) {
		self.unbind_all();
	}

	/// Whether `other` is a live peer of this list.
	#[must_use]
	pub fn is_bound_to(&self, other: &BindableList<T>) -> bool {
		self.inner.peers.borrow().contains(&other.inner)
	}

	/// Number of peer handles stored, including released ones that weren't compacted yet.
	#[must_use]
	pub fn peer_count(&self) -> usize {
		self.inner.peers.borrow().len()
	}

	/// Number of peers that are still alive.
	#[must_use]
	pub fn live_peer_count(&self) -> usize {
		self.inner.peers.borrow().live_len()
	}

	/// Number of registered listeners.
	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.inner.listeners.borrow().len()
	}

	/// Whether `self` and `other` are handles to the same list.
	#[must_use]
	pub fn ptr_eq(&self, other: &BindableList<T>) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// Creates a non-owning handle to this list.
	#[must_use]
	pub fn downgrade(&self) -> WeakBindableList<T> {
		WeakBindableList {
			inner: Rc::downgrade(&self.inner),
		}
	}
}

impl<T: 'static + Clone> BindableList<T> {
	/// Clones the item at `index`.
	#[must_use]
	pub fn get(&self, index: usize) -> Option<T> {
		self.inner.items.borrow().get(index).cloned()
	}

	/// Clones all items.
	#[must_use]
	pub fn to_vec(&self) -> Vec<T> {
		self.inner.items.borrow().clone()
	}

	/// Clones the items in `range`.
	///
	/// # Panics
	///
	/// Iff `range` is out of bounds, like slice indexing.
	#[must_use]
	pub fn sub_list(&self, range: impl RangeBounds<usize>) -> Vec<T> {
		let bounds: (Bound<usize>, Bound<usize>) =
			(range.start_bound().cloned(), range.end_bound().cloned());
		self.inner.items.borrow()[bounds].to_vec()
	}

	/// Like [`on_list_changed`](`BindableList::on_list_changed`), but also calls `listener` right away
	/// with a copy of the current items and [`ChangeReason::Add`], even if there are none.
	pub fn on_list_changed_run_once(
		&self,
		listener: impl 'static + Fn(&[T], ChangeReason),
	) -> ListenerId {
		let listener: Rc<ListListener<T>> = Rc::new(listener);
		let id = self.inner.listeners.borrow_mut().push(Rc::clone(&listener));
		listener(&self.to_vec(), ChangeReason::Add);
		id
	}
}

impl<T: 'static + PartialEq> BindableList<T> {
	#[must_use]
	pub fn contains(&self, item: &T) -> bool {
		self.inner.items.borrow().contains(item)
	}

	#[must_use]
	pub fn contains_all(&self, items: &[T]) -> bool {
		let own = self.inner.items.borrow();
		items.iter().all(|item| own.contains(item))
	}

	#[must_use]
	pub fn index_of(&self, item: &T) -> Option<usize> {
		self.inner
			.items
			.borrow()
			.iter()
			.position(|existing| existing == item)
	}

	#[must_use]
	pub fn last_index_of(&self, item: &T) -> Option<usize> {
		self.inner
			.items
			.borrow()
			.iter()
			.rposition(|existing| existing == item)
	}
}

impl<T: 'static + Clone + PartialEq> BindableList<T> {
	pub(crate) fn emit(&self, changed: &[T], reason: ChangeReason) {
		self.inner.emit(changed, reason);
	}

	pub(crate) fn items(&self) -> &RefCell<Vec<T>> {
		&self.inner.items
	}

	/// Appends `item`.
	pub fn add(&self, item: T) {
		self.inner.items.borrow_mut().push(item.clone());
		self.emit(slice::from_ref(&item), ChangeReason::Add);
	}

	/// Inserts `item` at `index`, shifting later items back.
	///
	/// Duplicates are allowed. See [`insert`](`BindableList::insert`) for the checked variant.
	///
	/// # Panics
	///
	/// Iff `index > len`.
	pub fn add_at(&self, index: usize, item: T) {
		self.inner.items.borrow_mut().insert(index, item.clone());
		self.emit(slice::from_ref(&item), ChangeReason::Add);
	}

	/// Inserts `item` at `index`, unless an equal item is already present.
	///
	/// Returns whether it was inserted.
	///
	/// # Panics
	///
	/// Iff `index > len` and `item` is not a duplicate.
	pub fn insert(&self, index: usize, item: T) -> bool {
		{
			let mut items = self.inner.items.borrow_mut();
			if items.contains(&item) {
				return false;
			}
			items.insert(index, item.clone());
		}
		self.emit(slice::from_ref(&item), ChangeReason::Add);
		true
	}

	/// Appends all of `items`, as one event.
	///
	/// Returns whether anything was added.
	pub fn add_all(&self, items: impl IntoIterator<Item = T>) -> bool {
		let added: Vec<T> = items.into_iter().collect();
		if added.is_empty() {
			return false;
		}
		self.inner.items.borrow_mut().extend_from_slice(&added);
		self.emit(&added, ChangeReason::Add);
		true
	}

	/// Inserts all of `items` at `index`, in order, as one event.
	///
	/// Returns whether anything was added.
	///
	/// # Panics
	///
	/// Iff `index > len`.
	pub fn add_all_at(&self, index: usize, items: impl IntoIterator<Item = T>) -> bool {
		let added: Vec<T> = items.into_iter().collect();
		{
			let mut items = self.inner.items.borrow_mut();
			assert!(
				index <= items.len(),
				"insertion index (is {index}) should be <= len (is {})",
				items.len()
			);
			if added.is_empty() {
				return false;
			}
			items.splice(index..index, added.iter().cloned());
		}
		self.emit(&added, ChangeReason::Add);
		true
	}

	/// Removes and returns the item at `index`, or [`None`] if it's out of bounds.
	pub fn remove_at(&self, index: usize) -> Option<T> {
		let removed = {
			let mut items = self.inner.items.borrow_mut();
			(index < items.len()).then(|| items.remove(index))
		}?;
		self.emit(slice::from_ref(&removed), ChangeReason::Remove);
		Some(removed)
	}

	/// Removes the first item equal to `item`.
	///
	/// Returns whether there was one.
	pub fn remove(&self, item: &T) -> bool {
		let removed = {
			let mut items = self.inner.items.borrow_mut();
			items
				.iter()
				.position(|existing| existing == item)
				.map(|index| items.remove(index))
		};
		match removed {
			Some(removed) => {
				self.emit(slice::from_ref(&removed), ChangeReason::Remove);
				true
			}
			None => false,
		}
	}

	/// Removes every item equal to any of `items`, as one event carrying each removed occurrence.
	///
	/// Returns whether anything was removed.
	pub fn remove_all(&self, items: &[T]) -> bool {
		self.remove_where(|item| items.contains(item))
	}

	/// Removes every item *not* equal to any of `items`, as one event.
	///
	/// Returns whether anything was removed.
	pub fn retain_all(&self, items: &[T]) -> bool {
		self.remove_where(|item| !items.contains(item))
	}

	fn remove_where(&self, mut predicate: impl FnMut(&T) -> bool) -> bool {
		let mut removed = Vec::new();
		self.inner.items.borrow_mut().retain(|item| {
			if predicate(item) {
				removed.push(item.clone());
				false
			} else {
				true
			}
		});
		if removed.is_empty() {
			return false;
		}
		self.emit(&removed, ChangeReason::Remove);
		true
	}

	/// Removes all items, as one event.
	pub fn clear(&self) {
		let removed = mem::take(&mut *self.inner.items.borrow_mut());
		if !removed.is_empty() {
			self.emit(&removed, ChangeReason::Remove);
		}
	}

	/// Replaces the item at `index` and returns the previous one.
	///
	/// This emits a [`Remove`](`ChangeReason::Remove`) of the previous item, then an
	/// [`Add`](`ChangeReason::Add`) of `item`. On peers that means the new item ends up at the end.
	///
	/// # Panics
	///
	/// Iff `index >= len`.
	pub fn set(&self, index: usize, item: T) -> T {
		let old = mem::replace(&mut self.inner.items.borrow_mut()[index], item.clone());
		self.emit(slice::from_ref(&old), ChangeReason::Remove);
		self.emit(slice::from_ref(&item), ChangeReason::Add);
		old
	}

	/// Binds this list to `other`.
	///
	/// This list is cleared and takes a copy of `other`'s items (emitting the corresponding
	/// events to its *current* peers), then the two become peers. Earlier peers stay bound.
	///
	/// Binding a list to itself or to a current peer does nothing.
	pub fn bind_to(&self, other: &BindableList<T>) {
		if self.ptr_eq(other) || self.is_bound_to(other) {
			return;
		}

		self.clear();
		self.add_all(other.to_vec());
		link(&self.inner, &other.inner);
		tracing::debug!(
			cell = ?Rc::as_ptr(&self.inner),
			peer = ?Rc::as_ptr(&other.inner),
			"bound list"
		);
	}

	/// [`bind_to`](`BindableList::bind_to`) through a type-erased handle.
	///
	/// # Errors
	///
	/// [`Error::InvalidArgument`] iff `other` is not a `BindableList<T>`.
	pub fn bind_to_dyn(&self, other: &dyn AnyBindable) -> Result<()> {
		let Some(other) = other.as_any().downcast_ref::<BindableList<T>>() else {
			return Err(Error::invalid_argument(format!(
				"can't bind a `BindableList<{}>` to a cell of `{}`",
				any::type_name::<T>(),
				other.value_type_name(),
			)));
		};
		self.bind_to(other);
		Ok(())
	}

	/// A [`ListCursor`] before the first item.
	#[must_use]
	pub fn cursor(&self) -> ListCursor<'_, T> {
		ListCursor::new(self, 0)
	}

	/// A [`ListCursor`] before the item at `index`.
	#[must_use]
	pub fn cursor_at(&self, index: usize) -> ListCursor<'_, T> {
		ListCursor::new(self, index)
	}
}
