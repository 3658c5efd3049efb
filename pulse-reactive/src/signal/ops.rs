//! Signal operators

// Imports
use crate::effect_stack;

/// Signal with
pub trait SignalWith {
	/// Value type
	type Value: ?Sized;

	/// Uses the signal value, tracking it
	fn with<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&Self::Value) -> O;

	/// Uses the signal value, without tracking it
	fn with_raw<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&Self::Value) -> O,
	{
		effect_stack::untracked(|| self.with(f))
	}
}

/// Signal get
pub trait SignalGet<T> {
	/// Gets the signal value, by copying it.
	fn get(&self) -> T;

	/// Gets the signal value, by copying it, without tracking it.
	fn get_raw(&self) -> T;
}

impl<S, T> SignalGet<T> for S
where
	S: SignalWith<Value = T>,
	T: Copy,
{
	fn get(&self) -> T {
		self.with(|value| *value)
	}

	fn get_raw(&self) -> T {
		self.with_raw(|value| *value)
	}
}

/// Signal cloned
pub trait SignalGetCloned<T> {
	/// Gets the signal value, by cloning it.
	fn get_cloned(&self) -> T;

	/// Gets the signal value, by cloning it, without tracking it.
	fn get_cloned_raw(&self) -> T;
}

impl<S, T> SignalGetCloned<T> for S
where
	S: SignalWith<Value = T>,
	T: Clone,
{
	fn get_cloned(&self) -> T {
		self.with(T::clone)
	}

	fn get_cloned_raw(&self) -> T {
		self.with_raw(T::clone)
	}
}

/// Signal update
pub trait SignalUpdate {
	/// Value type
	type Value: ?Sized;

	/// Updates the signal value.
	///
	/// Always notifies all subscribers.
	fn update<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&mut Self::Value) -> O;
}

/// Signal set
pub trait SignalSet<Value> {
	/// Sets the signal value.
	///
	/// Only notifies subscribers if the value changed.
	fn set(&self, new_value: Value);
}

/// Signal replace
pub trait SignalReplace<Value> {
	/// Replaces the signal value, returning the previous value
	fn replace(&self, new_value: Value) -> Value;
}
