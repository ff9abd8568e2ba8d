//! Lossless numeric coercion.
//!
//! Serialised configuration only knows "a number". [`Number`] keeps the width it was read with,
//! and [`Number::coerce`] turns it into whatever numeric type a cell declares, but only if that
//! doesn't change the value.

use std::{
	any,
	fmt::{self, Display, Formatter},
};

use num_traits::{NumCast, ToPrimitive};

use crate::ConversionError;

/// A runtime-typed numeric reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
	I16(i16),
	I32(i32),
	I64(i64),
	U64(u64),
	F32(f32),
	F64(f64),
}

impl Display for Number {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Number::I16(v) => Display::fmt(v, f),
			Number::I32(v) => Display::fmt(v, f),
			Number::I64(v) => Display::fmt(v, f),
			Number::U64(v) => Display::fmt(v, f),
			Number::F32(v) => Display::fmt(v, f),
			Number::F64(v) => Display::fmt(v, f),
		}
	}
}

macro_rules! from_primitive {
	($($primitive:ty => $variant:ident),*$(,)?) => {$(
		impl From<$primitive> for Number {
			fn from(value: $primitive) -> Self {
				Self::$variant(value)
			}
		}
	)*};
}

from_primitive! {
	i16 => I16,
	i32 => I32,
	i64 => I64,
	u64 => U64,
	f32 => F32,
	f64 => F64,
}

fn is_nan(value: impl ToPrimitive) -> bool {
	value.to_f64().is_some_and(f64::is_nan)
}

/// Converts `value` to `T` and back, accepting only an exact round trip.
fn exact<S, T>(value: S) -> Option<T>
where
	S: NumCast + PartialEq + Copy,
	T: NumCast + Copy,
{
	let converted = T::from(value)?;
	let round_trip = S::from(converted)?;
	(round_trip == value || (is_nan(value) && is_nan(round_trip))).then_some(converted)
}

impl Number {
	/// Converts this reading to `T` without loss.
	///
	/// Widening always succeeds. Narrowing succeeds iff the value fits exactly: `3.0_f64` becomes
	/// `3_i32`, but `3.5_f64`, `i64::MAX as f32` and `-1` as `u64` are all rejected.
	/// NaN only converts to float types.
	///
	/// # Errors
	///
	/// [`ConversionError::Lossy`] iff the conversion would truncate, round or overflow.
	///
	/// ```
	/// use tether::Number;
	///
	/// assert_eq!(Number::F64(3.0).coerce::<i32>(), Ok(3));
	/// assert!(Number::F64(3.5).coerce::<i32>().is_err());
	/// assert_eq!(Number::I32(7).coerce::<f64>(), Ok(7.0));
	/// ```
	pub fn coerce<T: NumCast + Copy>(self) -> Result<T, ConversionError> {
		let converted = match self {
			Number::I16(v) => exact(v),
			Number::I32(v) => exact(v),
			Number::I64(v) => exact(v),
			Number::U64(v) => exact(v),
			Number::F32(v) => exact(v),
			Number::F64(v) => exact(v),
		};
		converted.ok_or(ConversionError::Lossy {
			value: self,
			target: any::type_name::<T>(),
		})
	}
}
