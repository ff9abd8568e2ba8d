#![warn(clippy::pedantic)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]

mod bindable;
pub use bindable::{Bindable, WeakBindable};

mod list;
pub use list::{BindableList, ChangeReason, WeakBindableList};

mod cursor;
pub use cursor::ListCursor;

mod listener;
pub use listener::ListenerId;

pub mod coerce;
pub use coerce::Number;

mod erased;
pub use erased::AnyBindable;

mod error;
pub use error::{ConversionError, Error, Result};

pub use tether_runtime::COMPACTION_INTERVAL;

/// Shadows each listed identifier with its `.clone()`.
///
/// Handy right before a `move` closure that should capture clones of cell handles.
///
/// ```
/// use tether::{shadow_clone, Bindable};
///
/// let a = Bindable::new(1);
/// let b = Bindable::new(0);
/// a.on_value_changed({
/// 	shadow_clone!(b);
/// 	move |_, new| b.set(*new * 2)
/// });
/// a.set(2);
/// assert_eq!(b.get(), 4);
/// ```
#[macro_export]
macro_rules! shadow_clone {
	($($ident:ident),*$(,)?) => {
		$(let $ident = ::core::clone::Clone::clone(&$ident);)*
	};
}
