//! Watcher tests

// Imports
use {
	core::cell::{Cell, RefCell},
	pretty_assertions::assert_eq,
	pulse_reactive::{
		Effect,
		FlushMode,
		Job,
		JobKey,
		Observable,
		SignalGet,
		SignalSet,
		WatchOptions,
		batch,
		on_effect_cleanup,
		scheduler,
		watch,
		watch_effect,
	},
};

thread_local! {
	/// Calls received by callbacks
	static CALLS: RefCell<Vec<(usize, Option<usize>)>> = const { RefCell::new(vec![]) };

	/// Order in which things ran
	static ORDER: RefCell<Vec<&'static str>> = const { RefCell::new(vec![]) };
}

/// Records a callback call
fn record(new_value: &usize, old_value: Option<&usize>) {
	CALLS.with_borrow_mut(|calls| calls.push((*new_value, old_value.copied())));
}

/// Takes all recorded calls
fn take_calls() -> Vec<(usize, Option<usize>)> {
	CALLS.take()
}

/// Logs `name` to the order
fn log(name: &'static str) {
	ORDER.with_borrow_mut(|order| order.push(name));
}

/// Ensures the callback receives the new and old values, once per flush
#[test]
fn basic() {
	let a = Observable::new(1_usize);
	let _handle = watch(
		{
			let a = a.clone();
			move || a.get()
		},
		|new_value, old_value, _| self::record(new_value, old_value),
		WatchOptions::default(),
	);
	assert!(self::take_calls().is_empty(), "Callback was called without `immediate`");

	batch(|| {
		a.set(2);
		a.set(3);
	})
	.expect("Batch shouldn't fail");
	assert_eq!(self::take_calls(), [(3, Some(1))]);

	a.set(4);
	assert_eq!(self::take_calls(), [(4, Some(3))]);
}

/// Ensures `immediate` calls the callback with the initial value
#[test]
fn immediate() {
	let a = Observable::new(1_usize);
	let _handle = watch(
		{
			let a = a.clone();
			move || a.get()
		},
		|new_value, old_value, _| self::record(new_value, old_value),
		WatchOptions::default().with_immediate(true),
	);
	assert_eq!(self::take_calls(), [(1, None)]);

	a.set(2);
	assert_eq!(self::take_calls(), [(2, Some(1))]);
}

/// Ensures `once` stops the watcher after the first callback
#[test]
fn once() {
	let a = Observable::new(1_usize);
	let handle = watch(
		{
			let a = a.clone();
			move || a.get()
		},
		|new_value, old_value, _| self::record(new_value, old_value),
		WatchOptions::default().with_once(true),
	);

	a.set(2);
	a.set(3);
	assert_eq!(self::take_calls(), [(2, Some(1))]);
	assert!(!handle.is_active(), "Watcher wasn't stopped after it's first callback");
	assert_eq!(a.subscriber_count(), 0);
}

/// Ensures the callback isn't called if the source value didn't change
#[test]
fn unchanged() {
	let a = Observable::new(0_usize);
	let _handle = watch(
		{
			let a = a.clone();
			move || a.get() % 2
		},
		|new_value, old_value, _| self::record(new_value, old_value),
		WatchOptions::default(),
	);

	a.set(2);
	assert!(self::take_calls().is_empty(), "Callback was called without a change");

	a.set(3);
	assert_eq!(self::take_calls(), [(1, Some(0))]);
}

/// Ensures cleanups run before the next callback and once stopped
#[test]
fn cleanup() {
	thread_local! {
		static CLEANUPS: Cell<usize> = const { Cell::new(0) };
	}

	let a = Observable::new(0_usize);
	let handle = watch(
		{
			let a = a.clone();
			move || a.get()
		},
		|_, _, cleanup| cleanup.on_cleanup(|| CLEANUPS.set(CLEANUPS.get() + 1)),
		WatchOptions::default(),
	);

	a.set(1);
	assert_eq!(CLEANUPS.get(), 0);

	a.set(2);
	assert_eq!(CLEANUPS.get(), 1, "Cleanup didn't run before the next callback");

	handle.stop();
	assert_eq!(CLEANUPS.get(), 2, "Cleanup didn't run when stopped");
}

/// Ensures watchers flush according to their mode
#[test]
fn flush_modes() {
	let a = Observable::new(0_usize);
	let _pre = watch(
		{
			let a = a.clone();
			move || a.get()
		},
		|_, _, _| self::log("pre"),
		WatchOptions::default().with_flush(FlushMode::Pre),
	);
	let _post = watch(
		{
			let a = a.clone();
			move || a.get()
		},
		|_, _, _| self::log("post"),
		WatchOptions::default().with_flush(FlushMode::Post),
	);
	let _sync = watch(
		{
			let a = a.clone();
			move || a.get()
		},
		|_, _, _| self::log("sync"),
		WatchOptions::default().with_flush(FlushMode::Sync),
	);

	batch(|| {
		scheduler::queue_job(Job::new(JobKey::Custom(0), 0, || {
			self::log("job");
			Ok(())
		}));
		a.set(1);
	})
	.expect("Batch shouldn't fail");

	assert_eq!(ORDER.take(), ["sync", "job", "pre", "post"]);
}

/// Ensures "pre" watchers run before the jobs of their owner
#[test]
fn pre_owner() {
	let a = Observable::new(0_usize);
	let _handle = scheduler::with_owner(5, || {
		watch(
			{
				let a = a.clone();
				move || a.get()
			},
			|_, _, _| self::log("pre"),
			WatchOptions::default(),
		)
	});

	batch(|| {
		scheduler::queue_job(Job::new(JobKey::Custom(0), 5, || {
			self::log("update");
			Ok(())
		}));
		a.set(1);
	})
	.expect("Batch shouldn't fail");

	assert_eq!(ORDER.take(), ["pre", "update"]);
}

/// Ensures "post" watchers run after effects
#[test]
fn post_after_effects() {
	let a = Observable::new(0_usize);
	let _post = watch(
		{
			let a = a.clone();
			move || a.get()
		},
		|_, _, _| self::log("post"),
		WatchOptions::default().with_flush(FlushMode::Post),
	);
	let _effect = Effect::new({
		let a = a.clone();
		move || {
			_ = a.get();
			self::log("effect");
		}
	});
	ORDER.take();

	a.set(1);
	assert_eq!(ORDER.take(), ["effect", "post"]);
}

/// Ensures paused watchers only call back once resumed
#[test]
fn pause_resume() {
	let a = Observable::new(0_usize);
	let handle = watch(
		{
			let a = a.clone();
			move || a.get()
		},
		|new_value, old_value, _| self::record(new_value, old_value),
		WatchOptions::default(),
	);

	handle.pause();
	a.set(1);
	a.set(2);
	assert!(self::take_calls().is_empty(), "Paused watcher called back");

	handle.resume();
	assert_eq!(self::take_calls(), [(2, Some(0))]);
}

/// Ensures `watch_effect` runs immediately and on every change
#[test]
fn effect() {
	thread_local! {
		static RUNS: Cell<usize> = const { Cell::new(0) };
		static CLEANUPS: Cell<usize> = const { Cell::new(0) };
	}

	let a = Observable::new(0_usize);
	let handle = watch_effect(
		{
			let a = a.clone();
			move || {
				_ = a.get();
				RUNS.set(RUNS.get() + 1);
				on_effect_cleanup(|| CLEANUPS.set(CLEANUPS.get() + 1));
			}
		},
		FlushMode::Pre,
	);
	assert_eq!(RUNS.get(), 1);

	a.set(1);
	assert_eq!((RUNS.get(), CLEANUPS.get()), (2, 1));

	handle.stop();
	assert_eq!(CLEANUPS.get(), 2);
	a.set(2);
	assert_eq!(RUNS.get(), 2, "Stopped watcher was run");
}

/// Ensures "post" `watch_effect`s only run their first time after a flush
#[test]
fn effect_post() {
	thread_local! {
		static RUNS: Cell<usize> = const { Cell::new(0) };
	}

	batch(|| {
		let _handle = watch_effect(|| RUNS.set(RUNS.get() + 1), FlushMode::Post);
		assert_eq!(RUNS.get(), 0, "Post effect ran before the flush");
	})
	.expect("Batch shouldn't fail");
	assert_eq!(RUNS.get(), 1);
}
