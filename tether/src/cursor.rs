use std::{mem, slice};

use crate::{BindableList, ChangeReason};

/// A bidirectional cursor over a [`BindableList`] that can mutate it in place.
///
/// The cursor sits *between* items. [`next`](`Iterator::next`) and [`previous`](`ListCursor::previous`)
/// yield clones and remember the yielded position, which [`remove`](`ListCursor::remove`) and
/// [`set`](`ListCursor::set`) then act on. Every mutation emits exactly the events the equivalent
/// direct call on the list would, so peers and listeners can't tell the difference.
///
/// The list isn't borrowed between calls. If something else mutates it meanwhile, positions
/// are simply re-checked against its current length.
pub struct ListCursor<'a, T> {
	list: &'a BindableList<T>,
	next: usize,
	last: Option<usize>,
}

impl<'a, T: 'static + Clone + PartialEq> ListCursor<'a, T> {
	pub(crate) fn new(list: &'a BindableList<T>, index: usize) -> Self {
		Self {
			list,
			next: index,
			last: None,
		}
	}

	#[must_use]
	pub fn has_next(&self) -> bool {
		self.next < self.list.len()
	}

	#[must_use]
	pub fn has_previous(&self) -> bool {
		self.next > 0
	}

	/// Index of the item [`next`](`Iterator::next`) would yield.
	#[must_use]
	pub fn next_index(&self) -> usize {
		self.next
	}

	/// Index of the item [`previous`](`ListCursor::previous`) would yield.
	#[must_use]
	pub fn previous_index(&self) -> Option<usize> {
		self.next.checked_sub(1)
	}

	/// Steps back over one item and returns it.
	pub fn previous(&mut self) -> Option<T> {
		let index = self.next.checked_sub(1)?;
		let item = self.list.get(index)?;
		self.next = index;
		self.last = Some(index);
		Some(item)
	}

	/// Removes the item last yielded by `next` or `previous`.
	///
	/// Returns [`None`] if nothing was yielded since the last `remove` or [`add`](`ListCursor::add`).
	pub fn remove(&mut self) -> Option<T> {
		let index = self.last.take()?;
		let removed = {
			let mut items = self.list.items().borrow_mut();
			(index < items.len()).then(|| items.remove(index))
		}?;
		if index < self.next {
			self.next -= 1;
		}
		self.list
			.emit(slice::from_ref(&removed), ChangeReason::Remove);
		Some(removed)
	}

	/// Replaces the item last yielded by `next` or `previous`, returning the previous value.
	///
	/// Like [`BindableList::set`], this emits a [`Remove`](`ChangeReason::Remove`) then an [`Add`](`ChangeReason::Add`).
	pub fn set(&mut self, item: T) -> Option<T> {
		let index = self.last?;
		let old = {
			let mut items = self.list.items().borrow_mut();
			let slot = items.get_mut(index)?;
			mem::replace(slot, item.clone())
		};
		self.list.emit(slice::from_ref(&old), ChangeReason::Remove);
		self.list.emit(slice::from_ref(&item), ChangeReason::Add);
		Some(old)
	}

	/// Inserts `item` right before the cursor, so [`next`](`Iterator::next`) is unaffected.
	pub fn add(&mut self, item: T) {
		let index = {
			let mut items = self.list.items().borrow_mut();
			let index = self.next.min(items.len());
			items.insert(index, item.clone());
			index
		};
		self.next = index + 1;
		self.last = None;
		self.list.emit(slice::from_ref(&item), ChangeReason::Add);
	}
}

impl<T: 'static + Clone + PartialEq> Iterator for ListCursor<'_, T> {
	type Item = T;

	fn next(&mut self) -> Option<T> {
		let item = self.list.get(self.next)?;
		self.last = Some(self.next);
		self.next += 1;
		Some(item)
	}
}
