use std::{
	fmt::{self, Debug, Formatter},
	rc::Rc,
};

use crate::ConfigNode;

/// Flag for options whose stored value [`ConfigStore::restore_defaults`](`crate::ConfigStore::restore_defaults`) leaves alone.
pub const EXCLUDE_FROM_INIT: &str = "exclude_from_init";

/// A [`ConfigNode`] with a default value and a set of flags.
pub struct ConfigOption<T> {
	node: ConfigNode,
	default: Rc<dyn Fn() -> T>,
	flags: Vec<String>,
}

impl<T> Clone for ConfigOption<T> {
	fn clone(&self) -> Self {
		Self {
			node: self.node.clone(),
			default: Rc::clone(&self.default),
			flags: self.flags.clone(),
		}
	}
}

impl<T> Debug for ConfigOption<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConfigOption")
			.field("node", &self.node)
			.field("flags", &self.flags)
			.finish_non_exhaustive()
	}
}

impl<T: 'static + Clone> ConfigOption<T> {
	pub fn new(node: ConfigNode, default: T) -> Self {
		Self::with_default_fn(node, move || default.clone())
	}
}

impl<T> ConfigOption<T> {
	/// Like [`new`](`ConfigOption::new`), but computes the default value each time it's needed.
	pub fn with_default_fn(node: ConfigNode, default: impl 'static + Fn() -> T) -> Self {
		Self {
			node,
			default: Rc::new(default),
			flags: Vec::new(),
		}
	}

	#[must_use]
	pub fn node(&self) -> &ConfigNode {
		&self.node
	}

	#[must_use]
	pub fn default_value(&self) -> T {
		(self.default)()
	}

	/// Adds `flag`, unless an ASCII-case-insensitively equal one is present.
	#[must_use]
	pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
		let flag = flag.into();
		if !self.contains_flag(&flag) {
			self.flags.push(flag);
		}
		self
	}

	/// Whether `flag` is present, ignoring ASCII case.
	#[must_use]
	pub fn contains_flag(&self, flag: &str) -> bool {
		self.flags
			.iter()
			.any(|existing| existing.eq_ignore_ascii_case(flag))
	}

	/// Adds the [`EXCLUDE_FROM_INIT`] flag.
	#[must_use]
	pub fn exclude_from_init(self) -> Self {
		self.with_flag(EXCLUDE_FROM_INIT)
	}

	#[must_use]
	pub fn is_excluded_from_init(&self) -> bool {
		self.contains_flag(EXCLUDE_FROM_INIT)
	}
}
