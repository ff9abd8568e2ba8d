#![warn(clippy::pedantic)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]

mod backend;
pub use backend::{BackendError, ConfigBackend, MemoryBackend};

mod error;
pub use error::{Error, Result};

mod node;
pub use node::ConfigNode;

mod option;
pub use option::{ConfigOption, EXCLUDE_FROM_INIT};

mod store;
pub use store::ConfigStore;

mod value;
pub use value::ConfigValue;

pub mod prelude {
	//! Extension methods that bind cells to a [`ConfigStore`](`crate::ConfigStore`).

	use ext_trait::extension;
	use tether::{Bindable, BindableList};

	use crate::{ConfigOption, ConfigStore, ConfigValue, Result};

	#[extension(pub trait BindableConfigExt)]
	impl<T: ConfigValue> Bindable<T> {
		/// Binds this cell to `store`'s cell for `option`, taking on the stored value.
		fn bind_to_config(&self, store: &ConfigStore, option: &ConfigOption<T>) -> Result<()> {
			store.bind(self, option)
		}
	}

	#[extension(pub trait BindableListConfigExt)]
	impl<T: ConfigValue> BindableList<T> {
		/// Binds this list to `store`'s list for `option`, taking on the stored items.
		fn bind_to_config(&self, store: &ConfigStore, option: &ConfigOption<Vec<T>>) -> Result<()> {
			store.bind_list(self, option)
		}
	}
}
