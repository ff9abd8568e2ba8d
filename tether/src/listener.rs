use std::rc::Rc;

/// Identifies one registered listener on the cell it was registered on.
///
/// Ids are only meaningful for the cell that returned them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Callbacks in registration order.
///
/// Callers invoke a [`snapshot`](`Listeners::snapshot`) after releasing their borrow,
/// so callbacks are free to (un)register listeners or mutate the cell they're attached to.
pub(crate) struct Listeners<F: ?Sized> {
	entries: Vec<(ListenerId, Rc<F>)>,
	next_id: u64,
}

impl<F: ?Sized> Listeners<F> {
	pub(crate) const fn new() -> Self {
		Self {
			entries: Vec::new(),
			next_id: 0,
		}
	}

	pub(crate) fn push(&mut self, listener: Rc<F>) -> ListenerId {
		let id = ListenerId(self.next_id);
		self.next_id += 1;
		self.entries.push((id, listener));
		id
	}

	/// Returns the removed callback so that it can be dropped outside the caller's borrow.
	#[must_use]
	pub(crate) fn remove(&mut self, id: ListenerId) -> Option<Rc<F>> {
		let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
		Some(self.entries.remove(index).1)
	}

	/// Like [`remove`](`Listeners::remove`), for all of them.
	#[must_use]
	pub(crate) fn take_all(&mut self) -> Vec<Rc<F>> {
		self.entries.drain(..).map(|(_, listener)| listener).collect()
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	pub(crate) fn snapshot(&self, skip: Option<ListenerId>) -> Vec<Rc<F>> {
		self.entries
			.iter()
			.filter(|(id, _)| Some(*id) != skip)
			.map(|(_, listener)| Rc::clone(listener))
			.collect()
	}
}
