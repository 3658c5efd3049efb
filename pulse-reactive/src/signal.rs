//! Observable
//!
//! A single value, tracked whenever it's read and triggered whenever it's
//! written.

// Modules
pub mod ops;

// Exports
pub use self::ops::{SignalGet, SignalGetCloned, SignalReplace, SignalSet, SignalUpdate, SignalWith};

// Imports
use {
	crate::dep::Dep,
	core::{cell::RefCell, fmt, mem},
	std::rc::Rc,
};

/// Inner
struct Inner<T> {
	/// Value
	value: RefCell<T>,

	/// Dependency
	dep: Dep,
}

/// Observable value
pub struct Observable<T> {
	/// Inner
	inner: Rc<Inner<T>>,
}

impl<T> Observable<T> {
	/// Creates a new observable
	#[track_caller]
	pub fn new(value: T) -> Self {
		Self {
			inner: Rc::new(Inner {
				value: RefCell::new(value),
				dep:   Dep::new(),
			}),
		}
	}

	/// Returns the dependency of this observable
	#[must_use]
	pub fn dep(&self) -> &Dep {
		&self.inner.dep
	}

	/// Returns the number of subscribers of this observable
	#[must_use]
	pub fn subscriber_count(&self) -> usize {
		self.inner.dep.subscriber_count()
	}

	/// Returns the version of this observable
	#[must_use]
	pub fn version(&self) -> u64 {
		self.inner.dep.version()
	}

	/// Returns if both observables are the same
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl<T> Clone for Observable<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut s = f.debug_struct("Observable");
		match self.inner.value.try_borrow() {
			Ok(value) => s.field("value", &*value).finish(),
			Err(_) => s.finish_non_exhaustive(),
		}
	}
}

impl<T: Default> Default for Observable<T> {
	#[track_caller]
	fn default() -> Self {
		Self::new(T::default())
	}
}

impl<T> SignalWith for Observable<T> {
	type Value = T;

	fn with<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&Self::Value) -> O,
	{
		self.inner.dep.track();
		let value = self
			.inner
			.value
			.try_borrow()
			.expect("Cannot use observable value while updating it");
		f(&value)
	}
}

impl<T> SignalUpdate for Observable<T> {
	type Value = T;

	fn update<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&mut Self::Value) -> O,
	{
		let output = {
			let mut value = self
				.inner
				.value
				.try_borrow_mut()
				.expect("Cannot update observable value while using it");
			f(&mut value)
		};
		self.inner.dep.trigger();

		output
	}
}

impl<T: PartialEq> SignalSet<T> for Observable<T> {
	fn set(&self, new_value: T) {
		let old_value = {
			let mut value = self
				.inner
				.value
				.try_borrow_mut()
				.expect("Cannot set observable value while using it");
			match *value == new_value {
				true => return,
				false => mem::replace(&mut *value, new_value),
			}
		};
		drop(old_value);

		self.inner.dep.trigger();
	}
}

impl<T> SignalReplace<T> for Observable<T> {
	fn replace(&self, new_value: T) -> T {
		self.update(|value| mem::replace(value, new_value))
	}
}
