use std::any::{self, Any};

use crate::{Bindable, BindableList};

/// An object-safe view of any binding cell, for storing heterogeneous cells side by side.
///
/// Recover the concrete handle with [`.as_any()`](`AnyBindable::as_any`)`.downcast_ref()`.
pub trait AnyBindable {
	/// The concrete cell handle, e.g. a [`Bindable<T>`].
	fn as_any(&self) -> &dyn Any;

	/// Name of the value type the cell declares, for diagnostics.
	fn value_type_name(&self) -> &'static str;
}

impl<T: 'static> AnyBindable for Bindable<T> {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn value_type_name(&self) -> &'static str {
		any::type_name::<T>()
	}
}

impl<T: 'static> AnyBindable for BindableList<T> {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn value_type_name(&self) -> &'static str {
		any::type_name::<Vec<T>>()
	}
}
