use std::{
	fmt::{self, Display, Formatter},
	str::FromStr,
};

use crate::{Error, Result};

/// A validated path into the configuration document, e.g. `render.distance`.
///
/// Segments are never empty or blank and never contain `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigNode {
	segments: Vec<String>,
}

fn validate(segment: String) -> Result<String> {
	let reason = if segment.trim().is_empty() {
		"segments must not be empty or blank"
	} else if segment.contains('.') {
		"segments must not contain '.'"
	} else {
		return Ok(segment);
	};
	Err(Error::InvalidNode { segment, reason })
}

impl ConfigNode {
	/// A top-level node.
	///
	/// # Errors
	///
	/// [`Error::InvalidNode`] iff `segment` is blank or contains `.`.
	pub fn new(segment: impl Into<String>) -> Result<Self> {
		Ok(Self {
			segments: vec![validate(segment.into())?],
		})
	}

	/// A node below this one.
	///
	/// # Errors
	///
	/// [`Error::InvalidNode`] iff `segment` is blank or contains `.`.
	pub fn child(&self, segment: impl Into<String>) -> Result<Self> {
		let mut segments = self.segments.clone();
		segments.push(validate(segment.into())?);
		Ok(Self { segments })
	}

	#[must_use]
	pub fn segments(&self) -> &[String] {
		&self.segments
	}
}

impl Display for ConfigNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.segments.join("."))
	}
}

impl FromStr for ConfigNode {
	type Err = Error;

	fn from_str(path: &str) -> Result<Self> {
		let segments = path
			.split('.')
			.map(|segment| validate(segment.to_owned()))
			.collect::<Result<_>>()?;
		Ok(Self { segments })
	}
}
