//! Effect stack

// Imports
use crate::{graph::EffectId, world};

/// Pushes an effect to the stack.
///
/// Pushing `None` suspends tracking until it's popped.
pub(crate) fn push(effect: Option<EffectId>) {
	world::with_effect_stack(|stack| stack.push(effect));
}

/// Pops an effect from the stack
pub(crate) fn pop() {
	world::with_effect_stack(|stack| stack.pop()).expect("Missing added effect");
}

/// Returns the effect currently gathering dependencies, if any
#[must_use]
pub fn running() -> Option<EffectId> {
	world::with_effect_stack(|stack| stack.last().copied().flatten())
}

/// Returns if reads are currently being tracked
#[must_use]
pub fn is_tracking() -> bool {
	self::running().is_some()
}

/// Runs `f` without tracking any reads
pub fn untracked<F, O>(f: F) -> O
where
	F: FnOnce() -> O,
{
	self::push(None);
	scopeguard::defer! {
		self::pop();
	}

	f()
}
