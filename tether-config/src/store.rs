use std::{
	any::{self, Any, TypeId},
	cell::{Cell, RefCell},
	collections::BTreeMap,
	fmt::{self, Debug, Formatter},
	rc::{Rc, Weak},
};

use serde::Serialize;
use serde_json::Value;
use tether::{Bindable, BindableList, ListenerId};

use crate::{
	value::{insert, lookup, read, read_list},
	ConfigBackend, ConfigNode, ConfigOption, ConfigValue, Error, Result,
};

/// A cell owned by the store, seen without its value type.
trait Entry {
	fn as_any(&self) -> &dyn Any;

	/// The type the cell's value is written and read as.
	fn value_type(&self) -> TypeId;

	/// Pushes a freshly loaded value into the cell without persisting it again.
	fn reload(&self, value: Option<&Value>);
}

struct ValueEntry<T> {
	node: ConfigNode,
	cell: Bindable<T>,
	persist: ListenerId,
	default: T,
}

impl<T: ConfigValue> Entry for ValueEntry<T> {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn value_type(&self) -> TypeId {
		TypeId::of::<T>()
	}

	fn reload(&self, value: Option<&Value>) {
		let next = match value.map(read::<T>) {
			None => self.default.clone(),
			Some(Ok(next)) => next,
			Some(Err(error)) => {
				tracing::warn!(
					node = %self.node,
					%error,
					expected = any::type_name::<T>(),
					"can't load config value, keeping the current one"
				);
				return;
			}
		};
		self.cell.set_internal(next, self.persist);
	}
}

struct ListEntry<T> {
	node: ConfigNode,
	list: BindableList<T>,
	reloading: Rc<Cell<bool>>,
	default: Vec<T>,
}

impl<T: ConfigValue> Entry for ListEntry<T> {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn value_type(&self) -> TypeId {
		TypeId::of::<Vec<T>>()
	}

	fn reload(&self, value: Option<&Value>) {
		let items = match value {
			Some(value) => read_list(&self.node, value),
			None => self.default.clone(),
		};
		if self.list.with(|current| current == items.as_slice()) {
			return;
		}

		self.reloading.set(true);
		let _reloading = scopeguard::guard(&self.reloading, |reloading| reloading.set(false));
		self.list.clear();
		self.list.add_all(items);
	}
}

type RefreshHook = dyn Fn(&ConfigStore);

struct State {
	backend: Box<dyn ConfigBackend>,
	document: Value,
	entries: BTreeMap<ConfigNode, Rc<dyn Entry>>,
	defaults: BTreeMap<ConfigNode, Value>,
	on_refresh: Vec<Rc<RefreshHook>>,
}

impl State {
	/// Writes `value` into the document and saves it. Returns the stored form.
	fn write(&mut self, node: &ConfigNode, value: &impl Serialize) -> Result<Value> {
		let value = serde_json::to_value(value)?;
		insert(&mut self.document, node, value.clone());
		self.save()?;
		Ok(value)
	}

	fn save(&mut self) -> Result<()> {
		self.backend.save(&self.document).map_err(Error::Backend)
	}
}

/// Writes a cell's new value. Runs inside cell listeners, so failures can only be logged.
fn persist(state: &Weak<RefCell<State>>, node: &ConfigNode, value: &impl Serialize) {
	let Some(state) = state.upgrade() else {
		return;
	};
	let written = state.borrow_mut().write(node, value);
	if let Err(error) = written {
		tracing::warn!(%node, %error, "can't persist config value");
	}
}

fn normalize(document: Value) -> Value {
	if document.is_null() {
		Value::Object(serde_json::Map::new())
	} else {
		document
	}
}

/// A configuration document whose nodes are exposed as binding cells.
///
/// The store owns one cell per node it handed out. Each cell has exactly one listener of the
/// store's, which writes and saves every change. Values the store pushes into its cells itself
/// (through [`set`](`ConfigStore::set`) or [`reload`](`ConfigStore::reload`)) skip that listener.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct ConfigStore {
	state: Rc<RefCell<State>>,
}

impl Debug for ConfigStore {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let state = self.state.borrow();
		f.debug_struct("ConfigStore")
			.field("document", &state.document)
			.field("entries", &state.entries.keys().collect::<Vec<_>>())
			.finish_non_exhaustive()
	}
}

impl ConfigStore {
	/// Creates a store and loads its document from `backend`.
	///
	/// # Errors
	///
	/// [`Error::Backend`] iff loading fails.
	pub fn new(mut backend: impl 'static + ConfigBackend) -> Result<Self> {
		let document = normalize(backend.load().map_err(Error::Backend)?);
		Ok(Self {
			state: Rc::new(RefCell::new(State {
				backend: Box::new(backend),
				document,
				entries: BTreeMap::new(),
				defaults: BTreeMap::new(),
				on_refresh: Vec::new(),
			})),
		})
	}

	/// A copy of the in-memory document.
	#[must_use]
	pub fn document(&self) -> Value {
		self.state.borrow().document.clone()
	}

	fn stored(&self, node: &ConfigNode) -> Option<Value> {
		lookup(&self.state.borrow().document, node).cloned()
	}

	fn entry(&self, node: &ConfigNode) -> Option<Rc<dyn Entry>> {
		self.state.borrow().entries.get(node).cloned()
	}

	fn register_default<T: ConfigValue>(&self, option: &ConfigOption<T>) -> Result<()> {
		if option.is_excluded_from_init() {
			return Ok(());
		}
		let default = serde_json::to_value(option.default_value())?;
		self.state
			.borrow_mut()
			.defaults
			.insert(option.node().clone(), default);
		Ok(())
	}

	/// The stored value for `option`, or [`None`] if the node is missing or `null`.
	///
	/// # Errors
	///
	/// [`Error::Json`] or [`Error::Engine`] iff the stored value doesn't fit `T`.
	pub fn get<T: ConfigValue>(&self, option: &ConfigOption<T>) -> Result<Option<T>> {
		self.stored(option.node()).as_ref().map(read).transpose()
	}

	/// Like [`get`](`ConfigStore::get`), but a missing value is replaced with the option's
	/// default, which is also written to the document.
	///
	/// # Errors
	///
	/// Iff the stored value doesn't fit `T` or writing the default fails.
	pub fn get_or_default<T: ConfigValue>(&self, option: &ConfigOption<T>) -> Result<T> {
		self.register_default(option)?;
		if let Some(value) = self.get(option)? {
			return Ok(value);
		}
		let default = option.default_value();
		self.state.borrow_mut().write(option.node(), &default)?;
		Ok(default)
	}

	/// Writes `value`, saves, and updates the node's cell if there is one.
	///
	/// The cell's own persisting listener is skipped, but its other listeners and its peers see the change.
	///
	/// # Errors
	///
	/// [`Error::TypeMismatch`] iff the node has a cell of another type, in which case nothing is written.
	/// Otherwise iff `value` can't be serialised or saving fails.
	pub fn set<T: ConfigValue>(&self, option: &ConfigOption<T>, value: &T) -> Result<()> {
		let node = option.node();
		let entry = self.entry(node);
		if let Some(entry) = &entry {
			if entry.value_type() != TypeId::of::<T>() {
				return Err(Error::TypeMismatch {
					node: node.clone(),
					expected: any::type_name::<T>(),
				});
			}
		}

		let stored = self.state.borrow_mut().write(node, value)?;
		if let Some(entry) = entry {
			entry.reload(Some(&stored));
		}
		Ok(())
	}

	/// Saves the document as it is.
	///
	/// # Errors
	///
	/// [`Error::Backend`] iff saving fails.
	pub fn save(&self) -> Result<()> {
		self.state.borrow_mut().save()
	}

	/// The store's cell for `option`, created on first request.
	///
	/// A new cell starts with the stored value, or the option's default if there is none,
	/// and writes every later change back.
	///
	/// # Errors
	///
	/// [`Error::TypeMismatch`] iff the node already has a cell of another type,
	/// or as [`get_or_default`](`ConfigStore::get_or_default`).
	pub fn bindable<T: ConfigValue>(&self, option: &ConfigOption<T>) -> Result<Bindable<T>> {
		let node = option.node();
		if let Some(entry) = self.entry(node) {
			return entry
				.as_any()
				.downcast_ref::<ValueEntry<T>>()
				.map(|entry| entry.cell.clone())
				.ok_or_else(|| Error::TypeMismatch {
					node: node.clone(),
					expected: any::type_name::<T>(),
				});
		}

		let cell = Bindable::new(self.get_or_default(option)?);
		let persisting = cell.on_value_changed({
			let state = Rc::downgrade(&self.state);
			let node = node.clone();
			move |_, new| persist(&state, &node, new)
		});
		let entry = ValueEntry {
			node: node.clone(),
			cell: cell.clone(),
			persist: persisting,
			default: option.default_value(),
		};
		self.state
			.borrow_mut()
			.entries
			.insert(node.clone(), Rc::new(entry));
		tracing::debug!(%node, value_type = any::type_name::<T>(), "created config cell");
		Ok(cell)
	}

	/// The store's list for `option`, created on first request.
	///
	/// Stored elements that don't fit `T` are dropped with a warning.
	/// Every diff on the list writes the whole list back.
	///
	/// # Errors
	///
	/// [`Error::TypeMismatch`] iff the node already has a cell of another type.
	pub fn bindable_list<T: ConfigValue>(
		&self,
		option: &ConfigOption<Vec<T>>,
	) -> Result<BindableList<T>> {
		let node = option.node();
		if let Some(entry) = self.entry(node) {
			return entry
				.as_any()
				.downcast_ref::<ListEntry<T>>()
				.map(|entry| entry.list.clone())
				.ok_or_else(|| Error::TypeMismatch {
					node: node.clone(),
					expected: any::type_name::<Vec<T>>(),
				});
		}

		self.register_default(option)?;
		let items = match self.stored(node) {
			Some(stored) => read_list(node, &stored),
			None => {
				let default = option.default_value();
				self.state.borrow_mut().write(node, &default)?;
				default
			}
		};

		let list = BindableList::from(items);
		let reloading = Rc::new(Cell::new(false));
		list.on_list_changed({
			let state = Rc::downgrade(&self.state);
			let list = list.downgrade();
			let reloading = Rc::clone(&reloading);
			let node = node.clone();
			move |_, _| {
				if reloading.get() {
					return;
				}
				if let Some(list) = list.upgrade() {
					persist(&state, &node, &list.to_vec());
				}
			}
		});
		let entry = ListEntry {
			node: node.clone(),
			list: list.clone(),
			reloading,
			default: option.default_value(),
		};
		self.state
			.borrow_mut()
			.entries
			.insert(node.clone(), Rc::new(entry));
		tracing::debug!(%node, value_type = any::type_name::<T>(), "created config list");
		Ok(list)
	}

	/// Binds `cell` to the store's cell for `option`. `cell` takes on the stored value.
	///
	/// # Errors
	///
	/// As [`bindable`](`ConfigStore::bindable`).
	pub fn bind<T: ConfigValue>(&self, cell: &Bindable<T>, option: &ConfigOption<T>) -> Result<()> {
		cell.bind_to(&self.bindable(option)?);
		Ok(())
	}

	/// Binds `list` to the store's list for `option`. `list` takes on the stored items.
	///
	/// # Errors
	///
	/// As [`bindable_list`](`ConfigStore::bindable_list`).
	pub fn bind_list<T: ConfigValue>(
		&self,
		list: &BindableList<T>,
		option: &ConfigOption<Vec<T>>,
	) -> Result<()> {
		list.bind_to(&self.bindable_list(option)?);
		Ok(())
	}

	/// Registers a hook that runs after each [`reload`](`ConfigStore::reload`).
	pub fn on_refresh(&self, hook: impl 'static + Fn(&ConfigStore)) {
		self.state.borrow_mut().on_refresh.push(Rc::new(hook));
	}

	/// Like [`on_refresh`](`ConfigStore::on_refresh`), but also runs `hook` right away.
	pub fn on_refresh_run_once(&self, hook: impl 'static + Fn(&ConfigStore)) {
		let hook: Rc<RefreshHook> = Rc::new(hook);
		self.state.borrow_mut().on_refresh.push(Rc::clone(&hook));
		hook(self);
	}

	/// Loads the document from the backend again and pushes its values into every cell.
	///
	/// Numbers are converted losslessly. A value that doesn't fit its cell is logged and
	/// skipped, and a missing value resets its cell to the option's default. None of this is
	/// written back. The refresh hooks run last.
	///
	/// # Errors
	///
	/// [`Error::Backend`] iff loading fails. Nothing is updated in that case.
	pub fn reload(&self) -> Result<()> {
		let (document, entries) = {
			let mut state = self.state.borrow_mut();
			let document = normalize(state.backend.load().map_err(Error::Backend)?);
			state.document = document.clone();
			let entries: Vec<_> = state
				.entries
				.iter()
				.map(|(node, entry)| (node.clone(), Rc::clone(entry)))
				.collect();
			(document, entries)
		};

		for (node, entry) in &entries {
			entry.reload(lookup(&document, node));
		}
		tracing::debug!(entries = entries.len(), "reloaded configuration");

		let hooks = self.state.borrow().on_refresh.clone();
		for hook in hooks {
			hook(self);
		}
		Ok(())
	}

	/// Writes the default of every option the store has seen, except those flagged
	/// [`EXCLUDE_FROM_INIT`](`crate::EXCLUDE_FROM_INIT`), then [`reload`](`ConfigStore::reload`)s.
	///
	/// # Errors
	///
	/// [`Error::Backend`] iff saving or loading fails.
	pub fn restore_defaults(&self) -> Result<()> {
		{
			let mut state = self.state.borrow_mut();
			let state = &mut *state;
			for (node, default) in &state.defaults {
				insert(&mut state.document, node, default.clone());
			}
			state.save()?;
		}
		tracing::debug!("restored config defaults");
		self.reload()
	}
}
