use thiserror::Error;

use crate::{BackendError, ConfigNode};

/// Shorthand for results carrying an [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported by the configuration store.
#[derive(Debug, Error)]
pub enum Error {
	/// A node path segment was rejected.
	#[error("invalid config node segment {segment:?}: {reason}")]
	InvalidNode {
		/// The offending segment.
		segment: String,
		/// Why it was rejected.
		reason: &'static str,
	},

	/// A node already has a cell of another type.
	#[error("config node `{node}` is already bound to a cell of a type other than `{expected}`")]
	TypeMismatch {
		/// The node that was requested.
		node: ConfigNode,
		/// Name of the requested type.
		expected: &'static str,
	},

	/// A value couldn't be (de)serialised.
	#[error(transparent)]
	Json(#[from] serde_json::Error),

	/// A binding operation failed, e.g. a lossy numeric conversion.
	#[error(transparent)]
	Engine(#[from] tether::Error),

	/// The backend couldn't load or save the document.
	#[error("config backend failed: {0}")]
	Backend(#[source] BackendError),
}
