//! Location

// Imports
use core::fmt;
#[cfg(debug_assertions)]
use core::panic::Location;

/// Location
///
/// Only carries the actual source location with `debug_assertions`.
#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct Loc {
	/// Inner location
	#[cfg(debug_assertions)]
	location: &'static Location<'static>,
}

impl Loc {
	/// Gets the caller's location
	#[track_caller]
	#[must_use]
	pub fn caller() -> Self {
		Self {
			#[cfg(debug_assertions)]
			location: Location::caller(),
		}
	}
}

impl fmt::Display for Loc {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		#[cfg(debug_assertions)]
		{
			fmt::Display::fmt(&self.location, f)
		}

		#[cfg(not(debug_assertions))]
		f.pad("<optimized out>")
	}
}

impl fmt::Debug for Loc {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}
