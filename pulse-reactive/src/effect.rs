//! Effect
//!
//! An effect is a function that is re-run whenever
//! one of it's dependencies changes.
//!
//! Dependencies are gathered anew on every run, so reads that stop happening
//! stop re-running the effect.

// Modules
mod run;
#[cfg(test)]
mod tests;

// Exports
pub use self::run::{EffectRun, EffectRunCtx, Fallible};

// Imports
use {
	crate::{
		computed,
		effect_stack,
		error::ResultReportExt,
		graph::{CellId, EffectFlags, EffectId, EffectKind},
		loc::Loc,
		scheduler::{self, JobKey},
		scope,
		world,
	},
	core::{fmt, mem},
	std::rc::Rc,
};

/// Effect scheduler.
///
/// Called with the effect instead of queueing it whenever it's notified.
pub type EffectScheduler = Rc<dyn Fn(&Effect) -> anyhow::Result<()>>;

/// Effect options
#[derive(Clone, Default, derive_more::Debug)]
pub struct EffectOptions {
	/// Custom scheduler
	#[debug(skip)]
	pub scheduler: Option<EffectScheduler>,

	/// Whether the effect may notify itself while running
	pub allow_recurse: bool,

	/// Whether to skip the initial run
	pub lazy: bool,
}

/// Effect
#[derive(Clone)]
pub struct Effect {
	/// Id
	id: EffectId,

	/// Runner
	run: Rc<dyn EffectRun>,
}

impl Effect {
	/// Creates a new effect and runs it.
	///
	/// The effect belongs to the current scope, if any.
	#[track_caller]
	pub fn new<F>(run: F) -> Self
	where
		F: EffectRun + 'static,
	{
		Self::with_options(run, EffectOptions::default())
	}

	/// Creates a new fallible effect and runs it.
	#[track_caller]
	pub fn new_fallible<F>(run: F) -> Self
	where
		F: Fn() -> anyhow::Result<()> + 'static,
	{
		Self::new(Fallible(run))
	}

	/// Creates a new effect with options.
	///
	/// Unless lazy, the effect is run, and any error reported.
	#[track_caller]
	pub fn with_options<F>(run: F, options: EffectOptions) -> Self
	where
		F: EffectRun + 'static,
	{
		let defined_loc = Loc::caller();
		let run = Rc::new(run) as Rc<dyn EffectRun>;
		let mut flags = EffectFlags::ACTIVE | EffectFlags::TRACKING;
		flags.set(EffectFlags::ALLOW_RECURSE, options.allow_recurse);

		let scope = scope::current_id();
		let id = world::with_graph(|graph| {
			graph.add_effect(
				EffectKind::Effect(Rc::clone(&run)),
				flags,
				options.scheduler,
				scope,
				defined_loc,
			)
		});
		let effect = Self { id, run };

		if !options.lazy {
			effect.run().report();
		}

		effect
	}

	/// Creates an effect handle from it's parts
	pub(crate) const fn from_parts(id: EffectId, run: Rc<dyn EffectRun>) -> Self {
		Self { id, run }
	}

	/// Creates an effect handle from it's id, if it's still alive
	pub(crate) fn from_id(id: EffectId) -> Option<Self> {
		world::with_graph(|graph| match &graph.effects.get(id)?.kind {
			EffectKind::Effect(run) => Some(Self::from_parts(id, Rc::clone(run))),
			EffectKind::Computed { .. } => None,
		})
	}

	/// Returns the id of this effect
	#[must_use]
	pub const fn id(&self) -> EffectId {
		self.id
	}

	/// Returns where this effect was defined
	#[must_use]
	pub fn defined_loc(&self) -> Option<Loc> {
		world::with_graph(|graph| graph.effects.get(self.id).map(|effect| effect.defined_loc))
	}

	/// Returns the creation order of this effect.
	///
	/// Effects created later have a higher order, and queued effects run in
	/// ascending order.
	#[must_use]
	pub fn order(&self) -> Option<u64> {
		world::with_graph(|graph| graph.effects.get(self.id).map(|effect| effect.order))
	}

	/// Returns if this effect hasn't been stopped
	#[must_use]
	pub fn is_active(&self) -> bool {
		world::with_graph(|graph| graph.is_active(self.id))
	}

	/// Returns if this effect is currently running
	#[must_use]
	pub fn is_running(&self) -> bool {
		world::with_graph(|graph| {
			graph
				.effects
				.get(self.id)
				.is_some_and(|effect| effect.flags.contains(EffectFlags::RUNNING))
		})
	}

	/// Returns if any dependency changed since the last run
	#[must_use]
	pub fn is_dirty(&self) -> bool {
		self::is_dirty(self.id)
	}

	/// Returns the cells this effect depends on, in the order they were read
	#[must_use]
	pub fn deps(&self) -> Vec<CellId> {
		world::with_graph(|graph| {
			graph
				.deps(self.id)
				.into_iter()
				.map(|link_id| graph.links[link_id].cell)
				.collect()
		})
	}

	/// Runs this effect, gathering it's dependencies.
	///
	/// Cleanups registered during the previous run are run first, and the run
	/// itself is batched.
	/// A stopped effect still runs, but without tracking anything.
	pub fn run(&self) -> anyhow::Result<()> {
		let cleanups = world::with_graph(|graph| {
			let effect = graph
				.effects
				.get_mut(self.id)
				.filter(|effect| effect.flags.contains(EffectFlags::ACTIVE))?;
			effect.flags |= EffectFlags::RUNNING;
			let cleanups = mem::take(&mut effect.cleanups);
			graph.prepare_deps(self.id);

			Some(cleanups)
		});
		let Some(cleanups) = cleanups else {
			return effect_stack::untracked(|| self.run.run(EffectRunCtx::new(self)));
		};

		effect_stack::untracked(|| {
			for cleanup in cleanups {
				cleanup();
			}
		});

		// Note: Anything notified while running is only dispatched after we finish
		scheduler::start_batch();
		scopeguard::defer! {
			match std::thread::panicking() {
				true => scheduler::abort_batch(),
				false => scheduler::end_batch_implicit(),
			}
		}

		effect_stack::push(Some(self.id));
		scopeguard::defer! {
			effect_stack::pop();
			world::with_graph(|graph| {
				graph.cleanup_deps(self.id);
				if let Some(effect) = graph.effects.get_mut(self.id) {
					effect.flags.remove(EffectFlags::RUNNING);
				}
			});
		}

		tracing::trace!(effect = ?self.id, "Running effect");
		self.run.run(EffectRunCtx::new(self))
	}

	/// Runs this effect if any dependency changed since the last run
	pub fn run_if_dirty(&self) -> anyhow::Result<()> {
		match self.is_dirty() {
			true => self.run(),
			false => Ok(()),
		}
	}

	/// Stops this effect.
	///
	/// Removes it from all it's dependencies and runs it's cleanups.
	pub fn stop(&self) {
		self::stop_id(self.id);
	}

	/// Pauses this effect.
	///
	/// Notifications are held until [`Effect::resume`].
	pub fn pause(&self) {
		self::pause_id(self.id);
	}

	/// Resumes this effect.
	///
	/// If it was notified while paused, it's scheduled now.
	pub fn resume(&self) {
		self::resume_id(self.id);
	}

	/// Adds a callback to run once this effect is stopped
	pub(crate) fn on_stop<F>(&self, f: F)
	where
		F: FnOnce() + 'static,
	{
		let f = Box::new(f) as Box<dyn FnOnce()>;
		world::with_graph(|graph| match graph.effects.get_mut(self.id) {
			Some(effect) if effect.flags.contains(EffectFlags::ACTIVE) => effect.on_stop.push(f),
			_ => graph.garbage.push(Box::new(f)),
		});
	}
}

impl PartialEq for Effect {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for Effect {}

impl fmt::Debug for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Effect").field("id", &self.id).finish_non_exhaustive()
	}
}

/// Returns the effect currently gathering dependencies, if any
#[must_use]
pub fn running() -> Option<Effect> {
	effect_stack::running().and_then(Effect::from_id)
}

/// Registers a cleanup for the running effect.
///
/// The cleanup runs before the effect's next run, or once it's stopped.
pub fn on_effect_cleanup<F>(f: F)
where
	F: FnOnce() + 'static,
{
	let Some(effect_id) = effect_stack::running() else {
		tracing::warn!("`on_effect_cleanup` was called without a running effect, ignoring");
		return;
	};

	let f = Box::new(f) as Box<dyn FnOnce()>;
	world::with_graph(|graph| match graph.effects.get_mut(effect_id) {
		Some(effect) => effect.cleanups.push(f),
		None => graph.garbage.push(Box::new(f)),
	});
}

/// Returns if any dependency of an effect changed since it's last run.
///
/// Computed dependencies are re-validated, which may re-compute them.
pub(crate) fn is_dirty(effect_id: EffectId) -> bool {
	let deps = world::with_graph(|graph| {
		graph
			.deps(effect_id)
			.into_iter()
			.map(|link_id| {
				let cell = graph.links[link_id].cell;
				(link_id, graph.cells.get(cell).and_then(|cell| cell.computed))
			})
			.collect::<Vec<_>>()
	});

	let is_outdated = |link_id| {
		world::with_graph(|graph| match graph.links.get(link_id) {
			Some(link) => graph.cells.get(link.cell).map(|cell| cell.version) != link.version,
			None => true,
		})
	};
	deps.into_iter().any(|(link_id, computed)| {
		if is_outdated(link_id) {
			return true;
		}

		match computed {
			Some(computed) => {
				computed::refresh(computed);
				is_outdated(link_id)
			},
			None => false,
		}
	})
}

/// Runs an effect if it's alive and dirty
pub(crate) fn run_if_dirty(effect_id: EffectId) -> anyhow::Result<()> {
	match Effect::from_id(effect_id) {
		Some(effect) if effect.is_active() => effect.run_if_dirty(),
		_ => Ok(()),
	}
}

/// Stops an effect
pub(crate) fn stop_id(effect_id: EffectId) {
	let stopped = world::with_graph(|graph| graph.stop_effect(effect_id));
	scheduler::invalidate_job(JobKey::Effect(effect_id));

	effect_stack::untracked(|| {
		for cleanup in stopped.cleanups {
			cleanup();
		}
		for on_stop in stopped.on_stop {
			on_stop();
		}
	});
}

/// Pauses an effect
pub(crate) fn pause_id(effect_id: EffectId) {
	world::with_graph(|graph| {
		if let Some(effect) = graph.effects.get_mut(effect_id) {
			effect.flags |= EffectFlags::PAUSED;
		}
	});
}

/// Resumes an effect
pub(crate) fn resume_id(effect_id: EffectId) {
	let was_notified = world::with_graph(|graph| {
		if let Some(effect) = graph.effects.get_mut(effect_id) {
			effect.flags.remove(EffectFlags::PAUSED);
		}
		graph.paused.shift_remove(&effect_id)
	});

	if was_notified {
		scheduler::schedule_effect(effect_id);
	}
}
