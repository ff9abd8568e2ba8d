use std::{
	cell::{Cell, RefCell},
	error::Error,
	rc::Rc,
};

use serde_json::Value;

/// Any failure a backend reports.
pub type BackendError = Box<dyn Error + Send + Sync>;

/// Where a [`ConfigStore`](`crate::ConfigStore`)'s document is loaded from and saved to.
pub trait ConfigBackend {
	/// Reads the whole document.
	///
	/// # Errors
	///
	/// Whenever the storage can't be read.
	fn load(&mut self) -> Result<Value, BackendError>;

	/// Replaces the stored document.
	///
	/// # Errors
	///
	/// Whenever the storage can't be written.
	fn save(&mut self, document: &Value) -> Result<(), BackendError>;
}

/// A [`ConfigBackend`] that keeps the document in memory.
///
/// Clones share the same document, so a clone kept outside the store can inspect or edit it.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
	stored: Rc<RefCell<Value>>,
	saves: Rc<Cell<usize>>,
}

impl MemoryBackend {
	#[must_use]
	pub fn new(document: Value) -> Self {
		Self {
			stored: Rc::new(RefCell::new(document)),
			saves: Rc::default(),
		}
	}

	/// A copy of the stored document.
	#[must_use]
	pub fn contents(&self) -> Value {
		self.stored.borrow().clone()
	}

	/// Replaces the stored document, as if the file had been edited.
	pub fn replace(&self, document: Value) {
		*self.stored.borrow_mut() = document;
	}

	/// How often [`save`](`ConfigBackend::save`) was called.
	#[must_use]
	pub fn save_count(&self) -> usize {
		self.saves.get()
	}
}

impl ConfigBackend for MemoryBackend {
	fn load(&mut self) -> Result<Value, BackendError> {
		Ok(self.contents())
	}

	fn save(&mut self, document: &Value) -> Result<(), BackendError> {
		self.replace(document.clone());
		self.saves.set(self.saves.get() + 1);
		Ok(())
	}
}
