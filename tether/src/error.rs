use thiserror::Error;

use crate::Number;

/// Shorthand for results carrying an [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported by binding operations.
///
/// None of these are transient: each one means the caller used the API incorrectly.
#[derive(Debug, Error)]
pub enum Error {
	/// An argument had the wrong concrete type, e.g. binding a `Bindable<i32>` to a `Bindable<String>`.
	#[error("invalid argument: {message}")]
	InvalidArgument {
		/// What was wrong with the argument.
		message: String,
	},

	/// `unbind_from` named a cell that isn't the current bind target.
	#[error("not bound to {requested}; the current bind target is {current}")]
	NotBoundTo {
		/// The cell passed to `unbind_from`.
		requested: String,
		/// The actual bind target.
		current: String,
	},

	/// A runtime-typed value couldn't be stored.
	#[error(transparent)]
	Conversion(#[from] ConversionError),
}

impl Error {
	pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
		Self::InvalidArgument {
			message: message.into(),
		}
	}
}

/// A runtime-typed value doesn't fit a cell's declared type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
	/// The value is of an unrelated type.
	#[error("expected a value of type `{expected}`")]
	TypeMismatch {
		/// Name of the declared type.
		expected: &'static str,
	},

	/// The value is numeric, but can't be represented exactly as the declared numeric type.
	#[error("{value} can't be represented exactly as `{target}`")]
	Lossy {
		/// The rejected reading.
		value: Number,
		/// Name of the declared type.
		target: &'static str,
	},
}
