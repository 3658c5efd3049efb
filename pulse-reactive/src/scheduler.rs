//! Scheduler
//!
//! Every trigger opens an implicit batch, and the outermost batch to close
//! dispatches the notified effects and flushes the run queue.
//!
//! The run queue is kept sorted by job id (effects use their creation order),
//! with "pre" jobs running before others with the same id, so that owners run
//! before whatever they own. Jobs are de-duplicated by key while queued.
//!
//! After the run queue is empty, post-flush callbacks run, ordered by id.

// Imports
use {
	crate::{
		effect::{self, Effect, EffectScheduler},
		error::FlushError,
		graph::{Batched, EffectFlags, EffectId, EffectKind},
		loc::Loc,
		world,
	},
	core::{
		borrow::Borrow,
		cmp::Reverse,
		hash::{Hash, Hasher},
		iter,
		mem,
	},
	itertools::Itertools,
	priority_queue::PriorityQueue,
	std::{
		collections::{HashMap, HashSet},
		rc::Rc,
	},
};

/// Maximum number of times a job may run within a single flush
pub const RECURSION_LIMIT: usize = 100;

/// Job key.
///
/// Jobs with the same key are only queued once.
#[derive(PartialEq, Eq, Clone, Copy, Hash, Debug)]
#[derive(derive_more::From)]
pub enum JobKey {
	/// Effect
	Effect(EffectId),

	/// Custom job
	Custom(u64),
}

impl JobKey {
	/// Creates a new unique custom key
	#[must_use]
	pub fn unique() -> Self {
		world::with_scheduler(|scheduler| {
			let key = scheduler.next_custom_key;
			scheduler.next_custom_key += 1;
			Self::Custom(key)
		})
	}
}

/// Job
#[derive(Clone, derive_more::Debug)]
pub struct Job {
	/// Key
	key: JobKey,

	/// Id, determining the run order
	id: u64,

	/// Whether this job runs before others with the same id
	pre: bool,

	/// Whether this job may re-queue itself while running
	allow_recurse: bool,

	/// Where this job was defined
	defined_loc: Loc,

	/// Function
	#[debug(skip)]
	run: Rc<dyn Fn() -> anyhow::Result<()>>,
}

impl Job {
	/// Creates a new job
	#[track_caller]
	pub fn new<F>(key: JobKey, id: u64, run: F) -> Self
	where
		F: Fn() -> anyhow::Result<()> + 'static,
	{
		Self {
			key,
			id,
			pre: false,
			allow_recurse: false,
			defined_loc: Loc::caller(),
			run: Rc::new(run),
		}
	}

	/// Sets whether this job runs before others with the same id
	#[must_use]
	pub fn with_pre(mut self, pre: bool) -> Self {
		self.pre = pre;
		self
	}

	/// Sets whether this job may re-queue itself while running
	#[must_use]
	pub fn with_allow_recurse(mut self, allow_recurse: bool) -> Self {
		self.allow_recurse = allow_recurse;
		self
	}

	/// Sets where this job was defined
	#[must_use]
	pub(crate) fn with_defined_loc(mut self, defined_loc: Loc) -> Self {
		self.defined_loc = defined_loc;
		self
	}

	/// Returns the key of this job
	#[must_use]
	pub const fn key(&self) -> JobKey {
		self.key
	}

	/// Returns the id of this job
	#[must_use]
	pub const fn id(&self) -> u64 {
		self.id
	}

	/// Returns whether this job is a "pre" job
	#[must_use]
	pub const fn is_pre(&self) -> bool {
		self.pre
	}

	/// Creates the job for running an effect
	fn effect(effect_id: EffectId, order: u64, allow_recurse: bool, defined_loc: Loc) -> Self {
		Self::new(JobKey::Effect(effect_id), order, move || effect::run_if_dirty(effect_id))
			.with_allow_recurse(allow_recurse)
			.with_defined_loc(defined_loc)
	}
}

/// Post-flush callback in the pending queue
struct PostItem(Job);

impl PartialEq for PostItem {
	fn eq(&self, other: &Self) -> bool {
		self.0.key == other.0.key
	}
}

impl Eq for PostItem {}

impl Hash for PostItem {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.key.hash(state);
	}
}

impl Borrow<JobKey> for PostItem {
	fn borrow(&self) -> &JobKey {
		&self.0.key
	}
}

/// Error handler
type ErrorHandler = Rc<dyn Fn(&FlushError)>;

/// Scheduler state
#[derive(Default)]
pub struct Scheduler {
	/// Batch depth
	batch_depth: usize,

	/// Whether currently dispatching batched effects
	dispatching: bool,

	/// Batched effects
	pub(crate) batched: Batched,

	/// Run queue, sorted by id
	queue: Vec<Job>,

	/// Keys of all queued jobs
	queued: HashSet<JobKey>,

	/// Index of the next job to run
	flush_index: usize,

	/// Whether currently flushing
	is_flushing: bool,

	/// Pending post-flush callbacks
	post_pending: PriorityQueue<PostItem, Reverse<(u64, u64)>>,

	/// Next sequence number for post-flush callbacks
	post_seq: u64,

	/// Number of times each job ran during the current flush
	run_counts: HashMap<JobKey, usize>,

	/// Error handler
	error_handler: Option<ErrorHandler>,

	/// First unhandled error raised outside of any flush with a caller
	pending_error: Option<FlushError>,

	/// First error raised within each flush with a caller, innermost last
	error_frames: Vec<Option<FlushError>>,

	/// Current owner id, for "pre" jobs
	owner: Option<u64>,

	/// Next custom job key
	next_custom_key: u64,
}

impl Scheduler {
	/// Returns if nothing is batching, dispatching or flushing
	const fn is_idle(&self) -> bool {
		self.batch_depth == 0 && !self.dispatching && !self.is_flushing
	}

	/// Inserts a job into the run queue, keeping it sorted
	fn insert_job(&mut self, job: Job) {
		if !self.queued.insert(job.key) {
			return;
		}

		let push_back = self
			.queue
			.last()
			.is_none_or(|last| !job.pre && job.id >= last.id);
		match push_back {
			true => self.queue.push(job),
			false => {
				let start = self.flush_index.min(self.queue.len());
				let idx = start +
					self.queue[start..]
						.partition_point(|other| other.id < job.id || (other.id == job.id && other.pre));
				self.queue.insert(idx, job);
			},
		}
	}

	/// Takes the next job to run
	fn next_job(&mut self) -> Option<Job> {
		let job = self.queue.get(self.flush_index)?.clone();
		self.flush_index += 1;
		Some(job)
	}

	/// Resets the run queue after a flush
	fn reset_queue(&mut self) {
		self.queue.clear();
		self.queued.clear();
		self.flush_index = 0;
		self.is_flushing = false;
		self.run_counts.clear();
	}
}

/// Snapshot of the scheduler state
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub struct SchedulerState {
	/// Batch depth
	pub batch_depth: usize,

	/// Number of jobs waiting in the run queue
	pub queued: usize,

	/// Number of pending post-flush callbacks
	pub post_queued: usize,

	/// Whether currently flushing
	pub is_flushing: bool,
}

/// Returns a snapshot of the scheduler state
#[must_use]
pub fn state() -> SchedulerState {
	world::with_scheduler(|scheduler| SchedulerState {
		batch_depth: scheduler.batch_depth,
		queued:      scheduler.queue.len().saturating_sub(scheduler.flush_index),
		post_queued: scheduler.post_pending.len(),
		is_flushing: scheduler.is_flushing,
	})
}

/// Starts a batch.
///
/// Effects notified while any batch is open are only dispatched once the
/// outermost batch ends.
pub fn start_batch() {
	world::with_scheduler(|scheduler| scheduler.batch_depth += 1);
}

/// Ends a batch.
///
/// If this was the outermost batch, dispatches all notified effects and
/// flushes the run queue, returning the first unhandled error raised.
pub fn end_batch() -> Result<(), FlushError> {
	let should_dispatch = world::with_scheduler(|scheduler| {
		scheduler.batch_depth = scheduler
			.batch_depth
			.checked_sub(1)
			.expect("Attempted to end a batch that wasn't started");
		scheduler.batch_depth == 0 && !scheduler.dispatching
	});
	if !should_dispatch {
		return Ok(());
	}

	self::collect_errors(|| {
		self::dispatch_batched();
		self::flush_jobs();
	})
}

/// Ends a batch without dispatching anything.
///
/// Used when unwinding, where no user code should run.
pub(crate) fn abort_batch() {
	world::with_scheduler(|scheduler| scheduler.batch_depth = scheduler.batch_depth.saturating_sub(1));
}

/// Ends a batch with no caller to return errors to.
///
/// Unhandled errors are kept until [`take_error`].
pub(crate) fn end_batch_implicit() {
	if let Err(err) = self::end_batch() {
		self::stash(err);
	}
}

/// Runs `f` within a batch
pub fn batch<F, O>(f: F) -> Result<O, FlushError>
where
	F: FnOnce() -> O,
{
	self::start_batch();
	let guard = scopeguard::guard_on_unwind((), |()| self::abort_batch());
	let output = f();
	scopeguard::ScopeGuard::into_inner(guard);

	self::end_batch()?;
	Ok(output)
}

/// Flushes the run queue, if not already flushing
pub fn flush() -> Result<(), FlushError> {
	self::collect_errors(self::flush_jobs)
}

/// Flushes the run queue with no caller to return errors to
fn flush_implicit() {
	if let Err(err) = self::flush() {
		self::stash(err);
	}
}

/// Queues a job.
///
/// If nothing is batching or flushing, the queue is flushed immediately.
pub fn queue_job(job: Job) {
	let should_flush = world::with_scheduler(|scheduler| {
		scheduler.insert_job(job);
		scheduler.is_idle()
	});
	if should_flush {
		self::flush_implicit();
	}
}

/// Queues a callback to run after the run queue is flushed.
///
/// Callbacks run in id order, and only once per key.
pub fn queue_post_flush_cb(job: Job) {
	let should_flush = world::with_scheduler(|scheduler| {
		let seq = scheduler.post_seq;
		scheduler.post_seq += 1;
		let priority = Reverse((job.id, seq));
		scheduler.post_pending.push_increase(PostItem(job), priority);
		scheduler.is_idle()
	});
	if should_flush {
		self::flush_implicit();
	}
}

/// Removes a job from the run queue and the post-flush callbacks
pub fn invalidate_job(key: JobKey) {
	world::with_scheduler(|scheduler| {
		if scheduler.queued.remove(&key) {
			let start = scheduler.flush_index.min(scheduler.queue.len());
			if let Some(offset) = scheduler.queue[start..].iter().position(|job| job.key == key) {
				scheduler.queue.remove(start + offset);
			}
		}
		scheduler.post_pending.remove(&key);
	});
}

/// Sets the error handler.
///
/// While set, every error raised by a job is passed to it instead of being
/// returned to the caller.
pub fn set_error_handler<F>(handler: F)
where
	F: Fn(&FlushError) + 'static,
{
	world::with_scheduler(|scheduler| scheduler.error_handler = Some(Rc::new(handler)));
}

/// Removes the error handler
pub fn clear_error_handler() {
	let handler = world::with_scheduler(|scheduler| scheduler.error_handler.take());
	drop(handler);
}

/// Takes the first unhandled error raised with no caller to return it to
pub fn take_error() -> Option<FlushError> {
	world::with_scheduler(|scheduler| scheduler.pending_error.take())
}

/// Reports an error raised by a job
pub fn report(err: FlushError) {
	let handler = world::with_scheduler(|scheduler| scheduler.error_handler.clone());
	match handler {
		Some(handler) => handler(&err),
		None => self::stash(err),
	}
}

/// Keeps an unhandled error.
///
/// Within a flush with a caller, it's returned to that caller, otherwise it's
/// kept until [`take_error`].
fn stash(err: FlushError) {
	world::with_scheduler(|scheduler| {
		let slot = match scheduler.error_frames.last_mut() {
			Some(frame) => frame,
			None => &mut scheduler.pending_error,
		};
		match *slot {
			Some(_) => tracing::error!(?err, "Unhandled error while another one is pending"),
			None => *slot = Some(err),
		}
	});
}

/// Runs `f`, returning the first unhandled error it raised.
///
/// Errors raised before `f` ran are left pending.
fn collect_errors<F>(f: F) -> Result<(), FlushError>
where
	F: FnOnce(),
{
	world::with_scheduler(|scheduler| scheduler.error_frames.push(None));
	let guard = scopeguard::guard_on_unwind((), |()| {
		world::with_scheduler(|scheduler| scheduler.error_frames.pop());
	});
	f();
	scopeguard::ScopeGuard::into_inner(guard);

	world::with_scheduler(|scheduler| {
		scheduler
			.error_frames
			.pop()
			.expect("Error frame was popped by someone else")
	})
	.map_or(Ok(()), Err)
}

/// Runs `f` with `owner` as the current owner.
///
/// "Pre" watchers created within are ordered by this owner.
pub fn with_owner<F, O>(owner: u64, f: F) -> O
where
	F: FnOnce() -> O,
{
	let prev_owner = world::with_scheduler(|scheduler| scheduler.owner.replace(owner));
	scopeguard::defer! {
		world::with_scheduler(|scheduler| scheduler.owner = prev_owner);
	}

	f()
}

/// Returns the current owner
#[must_use]
pub fn current_owner() -> Option<u64> {
	world::with_scheduler(|scheduler| scheduler.owner)
}

/// Schedules a single effect as if it was notified
pub(crate) fn schedule_effect(effect_id: EffectId) {
	self::start_batch();
	world::with_scheduler(|scheduler| scheduler.batched.effects.push(effect_id));
	self::end_batch_implicit();
}

/// Dispatches all batched effects
fn dispatch_batched() {
	world::with_scheduler(|scheduler| scheduler.dispatching = true);
	scopeguard::defer! {
		world::with_scheduler(|scheduler| scheduler.dispatching = false);
	}

	loop {
		let batched = world::with_scheduler(|scheduler| mem::take(&mut scheduler.batched));
		if batched.is_empty() {
			break;
		}

		world::with_graph(|graph| {
			for &effect_id in batched.computed.iter().chain(&batched.effects) {
				if let Some(effect) = graph.effects.get_mut(effect_id) {
					effect.flags.remove(EffectFlags::NOTIFIED);
				}
			}
		});

		// Note: Notification pushed subscribers in reverse, so this
		//       dispatches them in the order they subscribed.
		for effect_id in batched.effects.into_iter().rev() {
			self::dispatch_effect(effect_id);
		}
	}
}

/// Dispatches a single effect
fn dispatch_effect(effect_id: EffectId) {
	/// Dispatch action
	enum Action {
		Schedule(EffectScheduler, Effect, Loc),
		Queue(Job),
	}

	let action = world::with_graph(|graph| {
		let effect = graph.effects.get(effect_id)?;
		if !effect.flags.contains(EffectFlags::ACTIVE) {
			return None;
		}
		if effect.flags.contains(EffectFlags::PAUSED) {
			graph.paused.insert(effect_id);
			return None;
		}

		let EffectKind::Effect(run) = &effect.kind else {
			return None;
		};
		let action = match &effect.scheduler {
			Some(scheduler) => Action::Schedule(
				Rc::clone(scheduler),
				Effect::from_parts(effect_id, Rc::clone(run)),
				effect.defined_loc,
			),
			None => Action::Queue(Job::effect(
				effect_id,
				effect.order,
				effect.flags.contains(EffectFlags::ALLOW_RECURSE),
				effect.defined_loc,
			)),
		};
		Some(action)
	});

	match action {
		Some(Action::Schedule(scheduler, effect, defined_loc)) => {
			tracing::trace!("Scheduling effect defined at {defined_loc}");
			if let Err(err) = scheduler(&effect) {
				self::report(FlushError::Job { defined_loc, err });
			}
		},
		Some(Action::Queue(job)) => world::with_scheduler(|scheduler| scheduler.insert_job(job)),
		None => (),
	}
}

/// Flushes the run queue, then the post-flush callbacks, until both are empty
fn flush_jobs() {
	let start = world::with_scheduler(|scheduler| {
		let has_work = !scheduler.queue.is_empty() || !scheduler.post_pending.is_empty();
		if scheduler.is_flushing || !has_work {
			return false;
		}

		scheduler.is_flushing = true;
		true
	});
	if !start {
		return;
	}
	scopeguard::defer! {
		world::with_scheduler(Scheduler::reset_queue);
	}

	loop {
		tracing::trace!(
			"Flushing run queue: [{}]",
			world::with_scheduler(|scheduler| scheduler.queue[scheduler.flush_index..]
				.iter()
				.map(|job| job.defined_loc)
				.format(", ")
				.to_string())
		);

		while let Some(job) = world::with_scheduler(Scheduler::next_job) {
			let run_count = world::with_scheduler(|scheduler| {
				let run_count = scheduler.run_counts.entry(job.key).or_default();
				*run_count += 1;
				*run_count
			});
			if run_count > RECURSION_LIMIT {
				world::with_scheduler(|scheduler| scheduler.queued.remove(&job.key));
				self::report(FlushError::RecursionLimit {
					defined_loc: job.defined_loc,
					limit:       RECURSION_LIMIT,
				});
				continue;
			}

			if job.allow_recurse {
				world::with_scheduler(|scheduler| scheduler.queued.remove(&job.key));
			}
			let res = (job.run)();
			if !job.allow_recurse {
				world::with_scheduler(|scheduler| scheduler.queued.remove(&job.key));
			}

			if let Err(err) = res {
				self::report(FlushError::Job {
					defined_loc: job.defined_loc,
					err,
				});
			}
		}

		world::with_scheduler(|scheduler| {
			scheduler.queue.clear();
			scheduler.flush_index = 0;
		});
		self::flush_post_flush_cbs();

		let done = world::with_scheduler(|scheduler| scheduler.queue.is_empty() && scheduler.post_pending.is_empty());
		if done {
			break;
		}
	}
}

/// Runs all pending post-flush callbacks.
///
/// Callbacks queued while these run are left for the next round.
fn flush_post_flush_cbs() {
	let pending = world::with_scheduler(|scheduler| {
		iter::from_fn(|| scheduler.post_pending.pop().map(|(PostItem(job), _)| job)).collect::<Vec<_>>()
	});

	for job in pending {
		if let Err(err) = (job.run)() {
			self::report(FlushError::Job {
				defined_loc: job.defined_loc,
				err,
			});
		}
	}
}
