//! Tests

// Imports
use {
	super::{super::effect, *},
	crate::{Observable, SignalGet, SignalSet, SignalUpdate, scheduler},
	core::cell::{Cell, RefCell},
};

/// Ensures effects are executed
#[test]
fn run() {
	thread_local! {
		static COUNT: Cell<usize> = const { Cell::new(0) };
	}

	assert_eq!(COUNT.get(), 0);
	let effect = Effect::new(|| COUNT.set(COUNT.get() + 1));
	assert_eq!(COUNT.get(), 1);
	effect.run().expect("Effect shouldn't fail");
	assert_eq!(COUNT.get(), 2);
}

/// Ensures lazy effects aren't run on creation
#[test]
fn lazy() {
	thread_local! {
		static COUNT: Cell<usize> = const { Cell::new(0) };
	}

	let effect = Effect::with_options(|| COUNT.set(COUNT.get() + 1), EffectOptions {
		lazy: true,
		..EffectOptions::default()
	});
	assert_eq!(COUNT.get(), 0, "Lazy effect was run on creation");

	effect.run().expect("Effect shouldn't fail");
	assert_eq!(COUNT.get(), 1);
}

/// Ensures the effect returned by `effect::running` is the one being run.
#[test]
fn running() {
	thread_local! {
		static RUNNING: RefCell<Option<Effect>> = const { RefCell::new(None) };
	}

	let effect = Effect::new(|| {
		let running = effect::running().expect("Effect wasn't running");
		RUNNING.set(Some(running));
	});

	let running = RUNNING.take().expect("Running effect missing");
	assert_eq!(effect, running);
	assert_eq!(effect::running(), None, "Effect was still running after it finished");
}

/// Ensures the effect returned by `effect::running` is the innermost one,
/// while running stacked effects
#[test]
fn running_stacked() {
	thread_local! {
		static RUNNING_TOP: RefCell<Option<Effect>> = const { RefCell::new(None) };
		static RUNNING_BOTTOM: RefCell<Option<Effect>> = const { RefCell::new(None) };
	}

	let effect = Effect::new(|| {
		RUNNING_TOP.set(effect::running());

		let effect = Effect::new(|| RUNNING_BOTTOM.set(effect::running()));
		let running_bottom = RUNNING_BOTTOM.take().expect("Running effect missing");
		assert_eq!(effect, running_bottom);
		effect.stop();

		// The outer effect must be running again after the inner one finished
		assert_eq!(effect::running(), RUNNING_TOP.with_borrow(Clone::clone));
	});

	let running_top = RUNNING_TOP.take().expect("Running effect missing");
	assert_eq!(effect, running_top);
}

/// Ensures dependencies not read during a run are dropped
#[test]
fn deps_pruned() {
	let use_a = Observable::new(true);
	let a = Observable::new(1_usize);
	let b = Observable::new(2_usize);

	let effect = Effect::new({
		let (use_a, a, b) = (use_a.clone(), a.clone(), b.clone());
		move || match use_a.get() {
			true => {
				_ = a.get();
			},
			false => {
				_ = b.get();
			},
		}
	});
	assert_eq!(effect.deps(), [use_a.dep().cell(), a.dep().cell()]);
	assert_eq!(b.subscriber_count(), 0);

	use_a.set(false);
	assert_eq!(effect.deps(), [use_a.dep().cell(), b.dep().cell()]);
	assert_eq!(a.subscriber_count(), 0, "Unread dependency wasn't dropped");
	assert_eq!(b.subscriber_count(), 1);
}

/// Ensures reading the same dependency multiple times only links it once
#[test]
fn deps_deduplicated() {
	let a = Observable::new(1_usize);

	let effect = Effect::new({
		let a = a.clone();
		move || {
			_ = a.get();
			_ = a.get();
		}
	});

	assert_eq!(effect.deps(), [a.dep().cell()]);
	assert_eq!(a.subscriber_count(), 1);
}

/// Ensures cleanups run before the next run and once stopped
#[test]
fn cleanup() {
	thread_local! {
		static CLEANUPS: Cell<usize> = const { Cell::new(0) };
	}

	let a = Observable::new(0_usize);
	let effect = Effect::new({
		let a = a.clone();
		move || {
			_ = a.get();
			effect::on_effect_cleanup(|| CLEANUPS.set(CLEANUPS.get() + 1));
		}
	});
	assert_eq!(CLEANUPS.get(), 0);

	a.set(1);
	assert_eq!(CLEANUPS.get(), 1, "Cleanup didn't run before the next run");

	effect.stop();
	assert_eq!(CLEANUPS.get(), 2, "Cleanup didn't run when stopped");

	a.set(2);
	assert_eq!(CLEANUPS.get(), 2, "Stopped effect was run");
}

/// Ensures stopped effects are removed from the graph
#[test]
fn stop() {
	thread_local! {
		static COUNT: Cell<usize> = const { Cell::new(0) };
	}

	let a = Observable::new(0_usize);
	let effect = Effect::new({
		let a = a.clone();
		move || {
			_ = a.get();
			COUNT.set(COUNT.get() + 1);
		}
	});

	effect.stop();
	assert!(!effect.is_active());
	assert_eq!(a.subscriber_count(), 0);

	a.set(1);
	assert_eq!(COUNT.get(), 1, "Stopped effect was run");

	// Running it manually still works, but doesn't track anything
	effect.run().expect("Effect shouldn't fail");
	assert_eq!(COUNT.get(), 2);
	assert_eq!(a.subscriber_count(), 0, "Stopped effect tracked a dependency");
}

/// Ensures paused effects only run once resumed
#[test]
fn pause_resume() {
	thread_local! {
		static COUNT: Cell<usize> = const { Cell::new(0) };
	}

	let a = Observable::new(0_usize);
	let effect = Effect::new({
		let a = a.clone();
		move || {
			_ = a.get();
			COUNT.set(COUNT.get() + 1);
		}
	});

	effect.pause();
	a.set(1);
	a.set(2);
	assert_eq!(COUNT.get(), 1, "Paused effect was run");

	effect.resume();
	assert_eq!(COUNT.get(), 2, "Resumed effect wasn't run exactly once");

	effect.resume();
	assert_eq!(COUNT.get(), 2, "Resuming twice re-ran the effect");
}

/// Ensures effects don't re-trigger themselves, unless allowed to
#[test]
fn recurse() {
	thread_local! {
		static COUNT: Cell<usize> = const { Cell::new(0) };
	}

	let a = Observable::new(0_usize);
	let _effect = Effect::new({
		let a = a.clone();
		move || {
			COUNT.set(COUNT.get() + 1);
			_ = a.get();
			a.update(|value| *value += 1);
		}
	});
	assert_eq!(COUNT.get(), 1, "Effect re-triggered itself");

	let b = Observable::new(0_usize);
	let _effect = Effect::with_options(
		{
			let b = b.clone();
			move || {
				if b.get() < 3 {
					b.update(|value| *value += 1);
				}
			}
		},
		EffectOptions {
			allow_recurse: true,
			..EffectOptions::default()
		},
	);
	assert_eq!(b.get(), 3, "Recursive effect didn't re-run until stable");
}

/// Ensures errors from fallible effects are reported
#[test]
fn fallible() {
	let a = Observable::new(0_usize);
	let _effect = Effect::new_fallible({
		let a = a.clone();
		move || match a.get() {
			0 => Ok(()),
			value => anyhow::bail!("Bad value: {value}"),
		}
	});
	assert!(scheduler::take_error().is_none());

	a.set(5);
	let err = scheduler::take_error().expect("Effect error wasn't reported");
	assert!(format!("{:?}", anyhow::Error::from(err)).contains("Bad value: 5"));
}

/// Ensures `on_effect_cleanup` outside of an effect is ignored
#[test]
fn cleanup_outside_effect() {
	thread_local! {
		static CLEANUPS: Cell<usize> = const { Cell::new(0) };
	}

	effect::on_effect_cleanup(|| CLEANUPS.set(CLEANUPS.get() + 1));
	assert_eq!(CLEANUPS.get(), 0);
}
