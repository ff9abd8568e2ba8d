//! Non-owning peer bookkeeping.
//!
//! A [`WeakPeers`] never keeps its targets alive. A handle whose target was dropped is
//! *logically* absent right away (it's skipped by [`WeakPeers::live`] and never matches in
//! [`WeakPeers::contains`]) but only *physically* removed by compaction, which runs
//! amortised through [`WeakPeers::record_trigger`].

use std::{
	fmt::{self, Debug, Formatter},
	rc::{Rc, Weak},
};

/// Every this many [recorded triggers](`WeakPeers::record_trigger`), released handles are dropped.
///
/// Fixed, not configurable.
pub const COMPACTION_INTERVAL: u32 = 5;

/// An ordered set of weak handles, compared by target identity.
pub struct WeakPeers<X: ?Sized> {
	handles: Vec<Weak<X>>,
	triggers: u32,
}

impl<X: ?Sized> Default for WeakPeers<X> {
	fn default() -> Self {
		Self::new()
	}
}

impl<X: ?Sized> Debug for WeakPeers<X> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakPeers")
			.field("len", &self.handles.len())
			.field("live_len", &self.live_len())
			.field("triggers", &self.triggers)
			.finish()
	}
}

fn addr<X: ?Sized>(ptr: *const X) -> *const () {
	ptr.cast::<()>()
}

impl<X: ?Sized> WeakPeers<X> {
	/// Creates an empty registry.
	#[must_use]
	pub const fn new() -> Self {
		Self {
			handles: Vec::new(),
			triggers: 0,
		}
	}

	fn position(&self, target: &Rc<X>) -> Option<usize> {
		let target = addr(Rc::as_ptr(target));
		self.handles
			.iter()
			.position(|handle| handle.strong_count() > 0 && addr(handle.as_ptr()) == target)
	}

	/// Whether `target` is registered, by identity.
	#[must_use]
	pub fn contains(&self, target: &Rc<X>) -> bool {
		self.position(target).is_some()
	}

	/// Registers a weak handle to `target`.
	///
	/// Returns `false` (and changes nothing) iff `target` is already present.
	pub fn insert(&mut self, target: &Rc<X>) -> bool {
		if self.contains(target) {
			return false;
		}
		self.handles.push(Rc::downgrade(target));
		true
	}

	/// Unregisters `target`, by identity.
	///
	/// Returns whether a handle was removed.
	pub fn remove(&mut self, target: &Rc<X>) -> bool {
		match self.position(target) {
			Some(index) => {
				self.handles.remove(index);
				true
			}
			None => false,
		}
	}

	/// Strong references to every live target, in registration order.
	#[must_use]
	pub fn live(&self) -> Vec<Rc<X>> {
		self.handles.iter().filter_map(Weak::upgrade).collect()
	}

	/// Number of stored handles, *including* released ones that weren't compacted yet.
	#[must_use]
	pub fn len(&self) -> usize {
		self.handles.len()
	}

	/// Number of handles whose target is still alive.
	#[must_use]
	pub fn live_len(&self) -> usize {
		self.handles
			.iter()
			.filter(|handle| handle.strong_count() > 0)
			.count()
	}

	/// Whether no handles (live or released) are stored.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}

	/// Drops every handle.
	pub fn clear(&mut self) {
		self.handles.clear();
	}

	/// Physically drops released handles. Survivors keep their relative order.
	///
	/// Returns how many handles were dropped. Calling this again right away returns `0`.
	pub fn remove_released(&mut self) -> usize {
		let before = self.handles.len();
		self.handles.retain(|handle| handle.strong_count() > 0);
		before - self.handles.len()
	}

	/// Counts one triggered change.
	///
	/// On every [`COMPACTION_INTERVAL`]th call, this compacts the registry and returns how many
	/// released handles were dropped. Otherwise it returns `0`.
	pub fn record_trigger(&mut self) -> usize {
		self.triggers += 1;
		if self.triggers < COMPACTION_INTERVAL {
			return 0;
		}
		self.triggers = 0;

		let released = self.remove_released();
		if released > 0 {
			tracing::debug!(
				released,
				remaining = self.handles.len(),
				"compacted peer registry"
			);
		}
		released
	}
}
