//! Watchers
//!
//! A watcher runs a callback whenever the value of a source changes.
//!
//! Unlike plain effects, watchers are flushed according to their
//! [`FlushMode`]: before the owner's update, after the run queue, or
//! synchronously as soon as they're notified.

// Imports
use {
	crate::{
		effect::{Effect, EffectOptions, EffectScheduler},
		effect_stack,
		error::ResultReportExt,
		loc::Loc,
		scheduler::{self, Job, JobKey},
	},
	core::{cell::RefCell, fmt},
	std::rc::Rc,
};

/// Flush mode
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub enum FlushMode {
	/// Runs before the updates of it's owner (and anything queued after)
	#[default]
	Pre,

	/// Runs after the run queue is flushed
	Post,

	/// Runs as soon as it's notified
	Sync,
}

/// Watch options
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub struct WatchOptions {
	/// Flush mode
	pub flush: FlushMode,

	/// Whether to run the callback with the initial value
	pub immediate: bool,

	/// Whether to stop after the first callback
	pub once: bool,
}

impl WatchOptions {
	/// Sets the flush mode
	#[must_use]
	pub const fn with_flush(mut self, flush: FlushMode) -> Self {
		self.flush = flush;
		self
	}

	/// Sets whether to run the callback with the initial value
	#[must_use]
	pub const fn with_immediate(mut self, immediate: bool) -> Self {
		self.immediate = immediate;
		self
	}

	/// Sets whether to stop after the first callback
	#[must_use]
	pub const fn with_once(mut self, once: bool) -> Self {
		self.once = once;
		self
	}
}

/// Watch cleanup registration.
///
/// Passed to watch callbacks to register a cleanup, which runs before the
/// next callback, or once the watcher is stopped.
#[derive(Default)]
pub struct WatchCleanup {
	/// Cleanup
	cleanup: Option<Box<dyn FnOnce()>>,
}

impl WatchCleanup {
	/// Registers the cleanup, replacing any previous one
	pub fn on_cleanup<F>(&mut self, f: F)
	where
		F: FnOnce() + 'static,
	{
		self.cleanup = Some(Box::new(f));
	}
}

impl fmt::Debug for WatchCleanup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WatchCleanup")
			.field("registered", &self.cleanup.is_some())
			.finish()
	}
}

/// Watch handle
#[derive(Clone, Debug)]
pub struct WatchHandle {
	/// Effect
	effect: Effect,
}

impl WatchHandle {
	/// Returns the effect of this watcher
	#[must_use]
	pub const fn effect(&self) -> &Effect {
		&self.effect
	}

	/// Returns if this watcher hasn't been stopped
	#[must_use]
	pub fn is_active(&self) -> bool {
		self.effect.is_active()
	}

	/// Stops this watcher, running the pending cleanup, if any
	pub fn stop(&self) {
		self.effect.stop();
	}

	/// Pauses this watcher
	pub fn pause(&self) {
		self.effect.pause();
	}

	/// Resumes this watcher.
	///
	/// If the source changed while paused, the callback is scheduled now.
	pub fn resume(&self) {
		self.effect.resume();
	}
}

/// Watcher state
struct Watcher<T, S, C> {
	/// Source
	source: S,

	/// Callback
	callback: RefCell<C>,

	/// Value produced by the last run of the source
	latest: RefCell<Option<T>>,

	/// Value passed to the last callback
	old_value: RefCell<Option<T>>,

	/// Cleanup registered by the last callback
	cleanup: RefCell<Option<Box<dyn FnOnce()>>>,

	/// Whether to stop after the first callback
	once: bool,
}

impl<T, S, C> Watcher<T, S, C>
where
	T: PartialEq + 'static,
	S: Fn() -> T + 'static,
	C: FnMut(&T, Option<&T>, &mut WatchCleanup) + 'static,
{
	/// Runs the source, storing the value
	fn run_source(&self) {
		let value = (self.source)();
		*self.latest.borrow_mut() = Some(value);
	}

	/// Runs the watcher job.
	///
	/// Re-runs the source if it's dirty (or this is the initial run), and calls
	/// the callback if the value changed.
	fn run_job(&self, effect: &Effect, initial: bool) -> anyhow::Result<()> {
		if !effect.is_active() || (!initial && !effect.is_dirty()) {
			return Ok(());
		}
		let Ok(mut callback) = self.callback.try_borrow_mut() else {
			tracing::warn!("Watch callback triggered it's own watcher, ignoring");
			return Ok(());
		};

		effect.run()?;
		let Some(new_value) = self.latest.borrow_mut().take() else {
			return Ok(());
		};
		let changed = self.old_value.borrow().as_ref() != Some(&new_value);
		if !initial && !changed {
			return Ok(());
		}

		if let Some(cleanup) = self.cleanup.borrow_mut().take() {
			effect_stack::untracked(cleanup);
		}

		let old_value = self.old_value.borrow_mut().take();
		let mut cleanup = WatchCleanup::default();
		effect_stack::untracked(|| callback(&new_value, old_value.as_ref(), &mut cleanup));
		drop(callback);
		*self.cleanup.borrow_mut() = cleanup.cleanup;
		*self.old_value.borrow_mut() = Some(new_value);

		if self.once {
			effect.stop();
		}

		Ok(())
	}

	/// Runs the pending cleanup, if any
	fn run_cleanup(&self) {
		let cleanup = self.cleanup.borrow_mut().take();
		if let Some(cleanup) = cleanup {
			cleanup();
		}
	}
}

/// Creates the scheduler that flushes a job according to `flush`
fn job_scheduler<J>(flush: FlushMode, defined_loc: Loc, job: J) -> EffectScheduler
where
	J: Fn(&Effect) -> anyhow::Result<()> + 'static,
{
	let job = Rc::new(job);
	let owner = scheduler::current_owner();
	match flush {
		FlushMode::Sync => Rc::new(move |effect: &Effect| job(effect)),
		FlushMode::Pre => Rc::new(move |effect: &Effect| {
			let effect = effect.clone();
			let job = Rc::clone(&job);
			let id = owner.unwrap_or(u64::MAX);
			scheduler::queue_job(
				Job::new(JobKey::Effect(effect.id()), id, move || job(&effect))
					.with_pre(true)
					.with_defined_loc(defined_loc),
			);
			Ok(())
		}),
		FlushMode::Post => Rc::new(move |effect: &Effect| {
			let effect = effect.clone();
			let job = Rc::clone(&job);
			let id = owner.unwrap_or(u64::MAX);
			scheduler::queue_post_flush_cb(
				Job::new(JobKey::Effect(effect.id()), id, move || job(&effect)).with_defined_loc(defined_loc),
			);
			Ok(())
		}),
	}
}

/// Watches a source, calling `callback` whenever it's value changes.
///
/// The callback receives the new value, the previous value (`None` on the
/// initial call with [`WatchOptions::immediate`]), and a [`WatchCleanup`].
/// Reads within the callback aren't tracked.
#[track_caller]
pub fn watch<T, S, C>(source: S, callback: C, options: WatchOptions) -> WatchHandle
where
	T: PartialEq + 'static,
	S: Fn() -> T + 'static,
	C: FnMut(&T, Option<&T>, &mut WatchCleanup) + 'static,
{
	let defined_loc = Loc::caller();
	let watcher = Rc::new(Watcher {
		source,
		callback: RefCell::new(callback),
		latest: RefCell::new(None),
		old_value: RefCell::new(None),
		cleanup: RefCell::new(None),
		once: options.once,
	});

	let job = {
		let watcher = Rc::clone(&watcher);
		move |effect: &Effect| watcher.run_job(effect, false)
	};
	let effect = Effect::with_options(
		{
			let watcher = Rc::clone(&watcher);
			move || watcher.run_source()
		},
		EffectOptions {
			scheduler: Some(self::job_scheduler(options.flush, defined_loc, job)),
			allow_recurse: false,
			lazy: true,
		},
	);

	{
		let watcher = Rc::clone(&watcher);
		effect.on_stop(move || watcher.run_cleanup());
	}

	match options.immediate {
		true => watcher.run_job(&effect, true).report(),
		false => {
			effect.run().report();
			let initial = watcher.latest.borrow_mut().take();
			*watcher.old_value.borrow_mut() = initial;
		},
	}

	WatchHandle { effect }
}

/// Runs `f` now and whenever any of it's dependencies change.
///
/// Cleanups may be registered within with [`on_effect_cleanup`](crate::on_effect_cleanup).
#[track_caller]
pub fn watch_effect<F>(f: F, flush: FlushMode) -> WatchHandle
where
	F: Fn() + 'static,
{
	let defined_loc = Loc::caller();
	let job = |effect: &Effect| match effect.is_active() {
		true => effect.run_if_dirty(),
		false => Ok(()),
	};
	let effect = Effect::with_options(f, EffectOptions {
		scheduler: Some(self::job_scheduler(flush, defined_loc, job)),
		allow_recurse: false,
		lazy: true,
	});

	match flush {
		FlushMode::Post => {
			let initial = effect.clone();
			scheduler::queue_post_flush_cb(
				Job::new(JobKey::Effect(effect.id()), u64::MAX, move || initial.run()).with_defined_loc(defined_loc),
			);
		},
		FlushMode::Pre | FlushMode::Sync => effect.run().report(),
	}

	WatchHandle { effect }
}
