//! Effect runner

// Imports
use super::Effect;

/// Effect run
pub trait EffectRun {
	/// Runs the effect
	fn run(&self, ctx: EffectRunCtx<'_>) -> anyhow::Result<()>;
}

impl<F> EffectRun for F
where
	F: Fn(),
{
	fn run(&self, _ctx: EffectRunCtx<'_>) -> anyhow::Result<()> {
		self();
		Ok(())
	}
}

/// Fallible effect function.
///
/// Errors returned are reported to the scheduler.
#[derive(Clone, Copy, Debug)]
pub struct Fallible<F>(pub F);

impl<F> EffectRun for Fallible<F>
where
	F: Fn() -> anyhow::Result<()>,
{
	fn run(&self, _ctx: EffectRunCtx<'_>) -> anyhow::Result<()> {
		(self.0)()
	}
}

/// Effect run context
#[derive(Clone, Copy, Debug)]
pub struct EffectRunCtx<'a> {
	/// Effect being run
	effect: &'a Effect,
}

impl<'a> EffectRunCtx<'a> {
	/// Creates a new context
	pub(crate) const fn new(effect: &'a Effect) -> Self {
		Self { effect }
	}

	/// Returns the effect being run
	#[must_use]
	pub const fn effect(&self) -> &'a Effect {
		self.effect
	}
}
