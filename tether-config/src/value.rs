use std::collections::{BTreeMap, HashMap};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tether::{ConversionError, Number};

use crate::{ConfigNode, Result};

/// A type that can live in a configuration cell.
///
/// Implement this with an empty `impl` for your own serialisable types.
/// Numeric types additionally accept numbers of any width, as long as the value fits exactly.
pub trait ConfigValue: 'static + Clone + PartialEq + Serialize + DeserializeOwned {
	/// Converts a numeric reading, for types that represent numbers.
	///
	/// Returns [`None`] for types that don't, which then go through plain deserialisation.
	fn from_number(_number: Number) -> Option<Result<Self, ConversionError>> {
		None
	}
}

macro_rules! numeric {
	($($ty:ty),*$(,)?) => {$(
		impl ConfigValue for $ty {
			fn from_number(number: Number) -> Option<Result<Self, ConversionError>> {
				Some(number.coerce())
			}
		}
	)*};
}

numeric!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl ConfigValue for bool {}
impl ConfigValue for char {}
impl ConfigValue for String {}
impl ConfigValue for Value {}
impl<T: ConfigValue> ConfigValue for Vec<T> {}
impl<T: ConfigValue> ConfigValue for BTreeMap<String, T> {}
impl<T: ConfigValue> ConfigValue for HashMap<String, T> {}

impl<T: ConfigValue> ConfigValue for Option<T> {
	fn from_number(number: Number) -> Option<Result<Self, ConversionError>> {
		T::from_number(number).map(|converted| converted.map(Some))
	}
}

fn reading(number: &serde_json::Number) -> Option<Number> {
	number
		.as_i64()
		.map(Number::I64)
		.or_else(|| number.as_u64().map(Number::U64))
		.or_else(|| number.as_f64().map(Number::F64))
}

/// Reads a stored value as `T`, coercing numbers losslessly.
pub(crate) fn read<T: ConfigValue>(value: &Value) -> Result<T> {
	if let Value::Number(number) = value {
		if let Some(converted) = reading(number).and_then(T::from_number) {
			return converted.map_err(|error| tether::Error::from(error).into());
		}
	}
	Ok(serde_json::from_value(value.clone())?)
}

/// Reads a stored list, dropping (and logging) elements that don't fit `T`.
pub(crate) fn read_list<T: ConfigValue>(node: &ConfigNode, value: &Value) -> Vec<T> {
	let Value::Array(items) = value else {
		tracing::warn!(%node, "expected a list, ignoring stored value");
		return Vec::new();
	};
	items
		.iter()
		.filter_map(|item| match read(item) {
			Ok(item) => Some(item),
			Err(error) => {
				tracing::warn!(%node, %error, "dropped list element of the wrong type");
				None
			}
		})
		.collect()
}

/// The value at `node`, if there is one and it isn't `null`.
pub(crate) fn lookup<'a>(document: &'a Value, node: &ConfigNode) -> Option<&'a Value> {
	node.segments()
		.iter()
		.try_fold(document, |value, segment| value.get(segment))
		.filter(|value| !value.is_null())
}

/// Stores `value` at `node`, replacing any non-object values on the way.
pub(crate) fn insert(document: &mut Value, node: &ConfigNode, value: Value) {
	let mut current = document;
	for segment in node.segments() {
		if !current.is_object() {
			*current = Value::Object(serde_json::Map::new());
		}
		current = &mut current[segment.as_str()];
	}
	*current = value;
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn node(path: &str) -> ConfigNode {
		path.parse().unwrap()
	}

	#[test]
	fn numbers_coerce_losslessly() {
		assert_eq!(read::<u8>(&json!(3.0)).unwrap(), 3);
		assert_eq!(read::<f32>(&json!(7)).unwrap(), 7.0);
		assert_eq!(read::<Option<i64>>(&json!(-2)).unwrap(), Some(-2));
		assert!(read::<u8>(&json!(300)).is_err());
		assert!(read::<i32>(&json!(0.5)).is_err());
	}

	#[test]
	fn other_values_deserialize() {
		assert_eq!(read::<String>(&json!("text")).unwrap(), "text");
		assert_eq!(read::<Vec<u8>>(&json!([1, 2])).unwrap(), [1, 2]);
		assert!(read::<String>(&json!(1)).is_err());
		assert!(read::<bool>(&json!("true")).is_err());
	}

	#[test]
	fn lists_drop_misfits() {
		let items: Vec<u8> = read_list(&node("list"), &json!([1, "two", 3.0, 4.5]));
		assert_eq!(items, [1, 3]);
		assert!(read_list::<u8>(&node("list"), &json!({})).is_empty());
	}

	#[test]
	fn paths() {
		let mut document = json!({ "a": 1 });
		insert(&mut document, &node("a.b.c"), json!(true));
		insert(&mut document, &node("d"), json!(null));
		assert_eq!(document, json!({ "a": { "b": { "c": true } }, "d": null }));

		assert_eq!(lookup(&document, &node("a.b.c")), Some(&json!(true)));
		assert_eq!(lookup(&document, &node("a.x")), None);
		assert_eq!(lookup(&document, &node("d")), None);
	}
}
