use std::{
	any::{self, Any},
	cell::RefCell,
	fmt::{self, Debug, Formatter},
	mem,
	rc::{Rc, Weak},
};

use num_traits::NumCast;
use tether_runtime::WeakPeers;

use crate::{
	listener::{ListenerId, Listeners},
	AnyBindable, ConversionError, Error, Number, Result,
};

type ValueListener<T> = dyn Fn(Option<&T>, &T);

pub(crate) struct Inner<T> {
	value: RefCell<T>,
	listeners: RefCell<Listeners<ValueListener<T>>>,
	peers: RefCell<WeakPeers<Inner<T>>>,
	bind_target: RefCell<Option<Weak<Inner<T>>>>,
}

/// A shared value cell that can be bound to other cells of the same type.
///
/// Cloning a [`Bindable`] yields another handle to the *same* cell.
/// Bound cells (peers) only hold [weak](`WeakBindable`) handles to each other.
///
/// Setting a cell to a new value notifies its listeners, then hands the value to every peer,
/// which does the same in turn. The cell the change started on is remembered through the whole
/// wave, and a cell that already holds an equal value stops it, so rings and fully connected
/// groups settle after each cell was updated once.
///
/// Listener panics are not caught. The value is always stored before any listener runs.
pub struct Bindable<T> {
	inner: Rc<Inner<T>>,
}

/// A non-owning handle to a [`Bindable`].
pub struct WeakBindable<T> {
	inner: Weak<Inner<T>>,
}

impl<T> Clone for Bindable<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<T> Clone for WeakBindable<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Weak::clone(&self.inner),
		}
	}
}

impl<T> WeakBindable<T> {
	/// Recovers a strong handle, iff the cell is still alive.
	#[must_use]
	pub fn upgrade(&self) -> Option<Bindable<T>> {
		self.inner.upgrade().map(|inner| Bindable { inner })
	}
}

impl<T> Debug for WeakBindable<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("WeakBindable")
			.field(&self.inner.as_ptr())
			.finish()
	}
}

impl<T: Default + 'static> Default for Bindable<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

impl<T: 'static> From<T> for Bindable<T> {
	fn from(value: T) -> Self {
		Self::new(value)
	}
}

impl<T: Debug> Debug for Bindable<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut debug = f.debug_struct("Bindable");
		match self.inner.value.try_borrow() {
			Ok(value) => debug.field("value", &*value),
			Err(_) => debug.field("value", &"<borrowed>"),
		};
		debug
			.field("peers", &self.inner.peers.borrow().len())
			.field("listeners", &self.inner.listeners.borrow().len())
			.finish_non_exhaustive()
	}
}

fn describe<T>(inner: &Rc<Inner<T>>) -> String {
	format!("Bindable<{}>@{:p}", any::type_name::<T>(), Rc::as_ptr(inner))
}

fn link<T>(a: &Rc<Inner<T>>, b: &Rc<Inner<T>>) {
	a.peers.borrow_mut().insert(b);
	b.peers.borrow_mut().insert(a);
}

fn unlink<T>(a: &Rc<Inner<T>>, b: &Rc<Inner<T>>) {
	a.peers.borrow_mut().remove(b);
	b.peers.borrow_mut().remove(a);
}

impl<T> Inner<T> {
	fn bind_target(&self) -> Option<Rc<Inner<T>>> {
		self.bind_target.borrow().as_ref().and_then(Weak::upgrade)
	}

	fn clear_bind_target_if(&self, target: &Rc<Inner<T>>) {
		let mut bind_target = self.bind_target.borrow_mut();
		if bind_target
			.as_ref()
			.is_some_and(|current| current.as_ptr() == Rc::as_ptr(target))
		{
			*bind_target = None;
		}
	}
}

impl<T: 'static + Clone + PartialEq> Inner<T> {
	/// Stores `value` iff it differs from the current one, returning the previous value.
	fn assign(&self, value: &T) -> Option<T> {
		let mut current = self.value.borrow_mut();
		if *current == *value {
			return None;
		}
		Some(mem::replace(&mut *current, value.clone()))
	}

	fn trigger_value_change(&self, source: &Self, old: &T, new: &T, skip: Option<ListenerId>) {
		self.peers.borrow_mut().record_trigger();

		let listeners = self.listeners.borrow().snapshot(skip);
		for listener in listeners {
			listener(Some(old), new);
		}

		let peers = self.peers.borrow().live();
		for peer in peers {
			// A nested change already reached every peer with the newer value.
			if *self.value.borrow() != *new {
				return;
			}
			if std::ptr::eq(&*peer, source) || std::ptr::eq(&*peer, self) {
				continue;
			}
			peer.sync_value(source, new);
		}
	}

	fn sync_value(&self, source: &Self, new: &T) {
		if std::ptr::eq(source, self) {
			return;
		}
		let Some(old) = self.assign(new) else {
			return;
		};
		tracing::trace!(
			cell = ?std::ptr::from_ref(self),
			source = ?std::ptr::from_ref(source),
			"synchronised peer value"
		);
		self.trigger_value_change(source, &old, new, None);
	}
}

impl<T: 'static> Bindable<T> {
	/// Creates a new unbound cell holding `value`.
	pub fn new(value: T) -> Self {
		Self {
			inner: Rc::new(Inner {
				value: RefCell::new(value),
				listeners: RefCell::new(Listeners::new()),
				peers: RefCell::new(WeakPeers::new()),
				bind_target: RefCell::new(None),
			}),
		}
	}

	/// Borrows the current value for the duration of `f`.
	///
	/// # Panics
	///
	/// Iff `f` tries to change this cell's value.
	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&self.inner.value.borrow())
	}

	/// Registers a listener that's called with `(Some(old), new)` after each change.
	pub fn on_value_changed(&self, listener: impl 'static + Fn(Option<&T>, &T)) -> ListenerId {
		self.inner.listeners.borrow_mut().push(Rc::new(listener))
	}

	/// Removes a listener. Returns whether it was registered on this cell.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let removed = self.inner.listeners.borrow_mut().remove(id);
		removed.is_some()
	}

	/// Drops all listeners (and anything they captured).
	pub fn unbind_listeners(&self) {
		let listeners = self.inner.listeners.borrow_mut().take_all();
		drop(listeners);
	}

	/// Unbinds this cell from `other`, which must be its current [bind target](`Bindable::bind_target`).
	///
	/// Nothing happens if this cell has no live bind target or if `other` is this cell.
	///
	/// # Errors
	///
	/// [`Error::NotBoundTo`] iff this cell is bound to a different cell.
	pub fn unbind_from(&self, other: &Bindable<T>) -> Result<()> {
		if self.ptr_eq(other) {
			return Ok(());
		}
		let Some(current) = self.inner.bind_target() else {
			*self.inner.bind_target.borrow_mut() = None;
			return Ok(());
		};
		if !Rc::ptr_eq(&current, &other.inner) {
			return Err(Error::NotBoundTo {
				requested: describe(&other.inner),
				current: describe(&current),
			});
		}

		unlink(&self.inner, &current);
		*self.inner.bind_target.borrow_mut() = None;
		tracing::debug!(
			cell = ?Rc::as_ptr(&self.inner),
			target = ?Rc::as_ptr(&current),
			"unbound from target"
		);
		Ok(())
	}

	/// Removes every peer link of this cell, in both directions.
	///
	/// Peers that were bound *to* this cell forget it as their bind target.
	pub fn unbind_bindings(&self) {
		let peers = self.inner.peers.borrow().live();
		for peer in &peers {
			unlink(&self.inner, peer);
			peer.clear_bind_target_if(&self.inner);
			self.inner.clear_bind_target_if(peer);
		}
		self.inner.peers.borrow_mut().clear();
		if !peers.is_empty() {
			tracing::debug!(
				cell = ?Rc::as_ptr(&self.inner),
				peers = peers.len(),
				"unbound all peers"
			);
		}
	}

	/// [`unbind_bindings`](`Bindable::unbind_bindings`), [`unbind_listeners`](`Bindable::unbind_listeners`),
	/// then forgets the bind target even if it was already released.
	pub fn unbind_all(&self) {
		self.unbind_bindings();
		self.unbind_listeners();
		*self.inner.bind_target.borrow_mut() = None;
	}

	/// Same as [`unbind_all`](`Bindable::unbind_all`).
	///
	/// Call this on cells whose listeners capture something that should be released with the cell.
	pub fn dispose(&self) {
		self.unbind_all();
	}

	/// The cell this one was last [bound to](`Bindable::bind_to`), if it's still bound and alive.
	#[must_use]
	pub fn bind_target(&self) -> Option<Bindable<T>> {
		self.inner.bind_target().map(|inner| Bindable { inner })
	}

	/// Whether `other` is a live peer of this cell, in either direction.
	#[must_use]
	pub fn is_bound_to(&self, other: &Bindable<T>) -> bool {
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

	/// Whether `self` and `other` are handles to the same cell.
	///
	/// This is identity, not value equality: distinct cells holding equal values are not `ptr_eq`.
	#[must_use]
	pub fn ptr_eq(&self, other: &Bindable<T>) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// Creates a non-owning handle to this cell.
	#[must_use]
	pub fn downgrade(&self) -> WeakBindable<T> {
		WeakBindable {
			inner: Rc::downgrade(&self.inner),
		}
	}
}

impl<T: 'static + Clone> Bindable<T> {
	/// Clones the current value.
	#[must_use]
	pub fn get(&self) -> T {
		self.inner.value.borrow().clone()
	}

	/// Like [`on_value_changed`](`Bindable::on_value_changed`), but also calls `listener` right away
	/// with `(None, current)`.
	pub fn on_value_changed_run_once(
		&self,
		listener: impl 'static + Fn(Option<&T>, &T),
	) -> ListenerId {
		let listener: Rc<ValueListener<T>> = Rc::new(listener);
		let id = self.inner.listeners.borrow_mut().push(Rc::clone(&listener));
		listener(None, &self.get());
		id
	}
}

impl<T: 'static + Clone + PartialEq> Bindable<T> {
	/// Stores `value` and propagates it through the peer group.
	///
	/// Does nothing if the current value is equal to `value`.
	pub fn set(&self, value: T) {
		if let Some(old) = self.inner.assign(&value) {
			self.inner
				.trigger_value_change(&self.inner, &old, &value, None);
		}
	}

	/// Like [`set`](`Bindable::set`), but the listener `skip` is not notified on this cell.
	///
	/// This is the assignment path for an owner that mirrors the cell into some store through a
	/// listener and now pushes a value *from* that store, which must not be echoed back.
	pub fn set_internal(&self, value: T, skip: ListenerId) {
		if let Some(old) = self.inner.assign(&value) {
			self.inner
				.trigger_value_change(&self.inner, &old, &value, Some(skip));
		}
	}

	/// Binds this cell to `other`.
	///
	/// Afterwards the two are peers: a change on either one reaches the other. This cell takes
	/// `other`'s current value right away, and `other` becomes its [bind target](`Bindable::bind_target`),
	/// replacing (and unbinding from) any previous target.
	///
	/// Binding a cell to itself or to a current peer does nothing.
	pub fn bind_to(&self, other: &Bindable<T>) {
		if self.ptr_eq(other) || self.is_bound_to(other) {
			return;
		}

		let previous = self.inner.bind_target.borrow_mut().take();
		if let Some(previous) = previous.as_ref().and_then(Weak::upgrade) {
			unlink(&self.inner, &previous);
		}

		link(&self.inner, &other.inner);
		*self.inner.bind_target.borrow_mut() = Some(Rc::downgrade(&other.inner));
		tracing::debug!(
			cell = ?Rc::as_ptr(&self.inner),
			target = ?Rc::as_ptr(&other.inner),
			"bound to target"
		);

		self.set(other.get());
	}

	/// [`bind_to`](`Bindable::bind_to`) through a type-erased handle.
	///
	/// # Errors
	///
	/// [`Error::InvalidArgument`] iff `other` is not a `Bindable<T>`.
	pub fn bind_to_dyn(&self, other: &dyn AnyBindable) -> Result<()> {
		let Some(other) = other.as_any().downcast_ref::<Bindable<T>>() else {
			return Err(Error::invalid_argument(format!(
				"can't bind a `Bindable<{}>` to a cell of `{}`",
				any::type_name::<T>(),
				other.value_type_name(),
			)));
		};
		self.bind_to(other);
		Ok(())
	}

	/// Runtime-typed [`set`](`Bindable::set`).
	///
	/// # Errors
	///
	/// [`ConversionError::TypeMismatch`] iff `value` is not a `T`.
	pub fn set_any(&self, value: Box<dyn Any>) -> Result<()> {
		let value = value
			.downcast::<T>()
			.map_err(|_| ConversionError::TypeMismatch {
				expected: any::type_name::<T>(),
			})?;
		self.set(*value);
		Ok(())
	}
}

impl<T: 'static + NumCast + Copy + PartialEq> Bindable<T> {
	/// [`set`](`Bindable::set`)s a numeric reading, if it [coerces](`Number::coerce`) to `T` without loss.
	///
	/// # Errors
	///
	/// [`ConversionError::Lossy`] iff it doesn't.
	pub fn set_number(&self, value: Number) -> Result<()> {
		self.set(value.coerce()?);
		Ok(())
	}
}
