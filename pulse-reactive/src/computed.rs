//! Computed
//!
//! A computed value is both an effect and a cell: it tracks the values it's
//! computed from, and is tracked by whoever reads it.
//!
//! Computeds are lazy. They're only re-computed when read after one of their
//! dependencies changed, and only notify their readers when the re-computed
//! value is different.

// Imports
use {
	crate::{
		dep,
		effect,
		effect_stack,
		graph::{CellId, ComputedRun, EffectFlags, EffectId, EffectKind},
		loc::Loc,
		signal::SignalWith,
		world,
	},
	core::{cell::RefCell, fmt},
	std::rc::Rc,
};

/// Inner
struct Inner<T> {
	/// Effect
	effect: EffectId,

	/// Cell
	cell: CellId,

	/// Value
	value: Rc<RefCell<Option<T>>>,
}

/// Computed value
pub struct Computed<T> {
	/// Inner
	inner: Rc<Inner<T>>,
}

impl<T> Computed<T> {
	/// Creates a new computed value.
	///
	/// The value isn't computed until first read.
	#[track_caller]
	pub fn new<F>(f: F) -> Self
	where
		T: PartialEq + 'static,
		F: Fn() -> T + 'static,
	{
		let defined_loc = Loc::caller();
		let value = Rc::new(RefCell::new(None));
		let run = Rc::new(ComputedFn {
			value: Rc::clone(&value),
			f,
		});

		let (effect, cell) = world::with_graph(|graph| {
			let cell = graph.add_cell(defined_loc, false);
			let effect = graph.add_effect(
				EffectKind::Computed { run, cell },
				EffectFlags::ACTIVE | EffectFlags::DIRTY,
				None,
				None,
				defined_loc,
			);
			graph.cells[cell].computed = Some(effect);

			(effect, cell)
		});

		Self {
			inner: Rc::new(Inner { effect, cell, value }),
		}
	}

	/// Returns the cell of this computed
	#[must_use]
	pub fn cell(&self) -> CellId {
		self.inner.cell
	}

	/// Returns the version of this computed.
	///
	/// Bumped only when a re-computation produces a different value.
	#[must_use]
	pub fn version(&self) -> u64 {
		world::with_graph(|graph| graph.cells.get(self.inner.cell).map_or(0, |cell| cell.version))
	}

	/// Returns if this computed is currently subscribed to it's dependencies.
	///
	/// Computeds only subscribe while they themselves have subscribers.
	#[must_use]
	pub fn is_tracking(&self) -> bool {
		world::with_graph(|graph| {
			graph
				.effects
				.get(self.inner.effect)
				.is_some_and(|effect| effect.flags.contains(EffectFlags::TRACKING))
		})
	}

	/// Returns the number of subscribers of this computed
	#[must_use]
	pub fn subscriber_count(&self) -> usize {
		world::with_graph(|graph| graph.subscriber_count(self.inner.cell))
	}
}

impl<T> Clone for Computed<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Computed")
			.field("value", &*self.inner.value.borrow())
			.finish()
	}
}

impl<T> SignalWith for Computed<T> {
	type Value = T;

	#[track_caller]
	fn with<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&Self::Value) -> O,
	{
		let link = dep::track_cell(self.inner.cell);
		self::refresh(self.inner.effect);

		// Note: The link was created before the refresh, which may have bumped
		//       our version, so we catch it up.
		if let Some(link) = link {
			world::with_graph(|graph| graph.sync_link_version(link));
		}

		let value = self.inner.value.borrow();
		let value = value.as_ref().expect("Computed value should be evaluated after refreshing");
		f(value)
	}
}

impl<T> Drop for Inner<T> {
	fn drop(&mut self) {
		let effect = self.effect;
		let cell = self.cell;
		world::try_with_graph(|graph| {
			let stopped = graph.stop_effect(effect);
			graph.garbage.push(Box::new(stopped.cleanups));
			graph.garbage.push(Box::new(stopped.on_stop));
			graph.release_cell(cell);
		});
	}
}

/// Computed function
struct ComputedFn<T, F> {
	/// Value
	value: Rc<RefCell<Option<T>>>,

	/// Function
	f: F,
}

impl<T, F> ComputedRun for ComputedFn<T, F>
where
	T: PartialEq,
	F: Fn() -> T,
{
	fn recompute(&self) -> bool {
		let new_value = (self.f)();

		let mut value = self.inner_value();
		let changed = value.as_ref().is_none_or(|value| *value != new_value);
		let old_value = match changed {
			true => value.replace(new_value),
			false => None,
		};
		drop(value);
		drop(old_value);

		changed
	}
}

impl<T, F> ComputedFn<T, F> {
	/// Borrows the value mutably
	fn inner_value(&self) -> core::cell::RefMut<'_, Option<T>> {
		self.value
			.try_borrow_mut()
			.expect("Cannot re-compute a computed while it's value is borrowed")
	}
}

/// Refreshes a computed, re-computing it if any dependency changed.
///
/// Bumps the computed's version if the value changed.
pub(crate) fn refresh(effect_id: EffectId) {
	let state = world::with_graph(|graph| {
		let global_version = graph.global_version;
		let effect = graph.effects.get_mut(effect_id)?;

		// If we're subscribed and weren't notified, nothing changed
		if effect.flags.contains(EffectFlags::TRACKING) && !effect.flags.contains(EffectFlags::DIRTY) {
			return None;
		}
		effect.flags.remove(EffectFlags::DIRTY);

		// If nothing at all changed since we were last validated, neither did we
		if effect.global_version == global_version {
			return None;
		}
		effect.global_version = global_version;

		let EffectKind::Computed { run, cell } = &effect.kind else {
			return None;
		};
		Some((
			Rc::clone(run),
			*cell,
			effect.flags.contains(EffectFlags::EVALUATED),
			effect.deps_head.is_some(),
		))
	});
	let Some((run, cell, evaluated, has_deps)) = state else {
		return;
	};

	if evaluated && (!has_deps || !effect::is_dirty(effect_id)) {
		return;
	}

	world::with_graph(|graph| {
		if let Some(effect) = graph.effects.get_mut(effect_id) {
			effect.flags |= EffectFlags::RUNNING;
		}
		graph.prepare_deps(effect_id);
	});
	effect_stack::push(Some(effect_id));
	scopeguard::defer! {
		effect_stack::pop();
		world::with_graph(|graph| {
			graph.cleanup_deps(effect_id);
			if let Some(effect) = graph.effects.get_mut(effect_id) {
				effect.flags.remove(EffectFlags::RUNNING);
			}
		});
	}

	let changed = run.recompute();
	if changed {
		world::with_graph(|graph| {
			if let Some(effect) = graph.effects.get_mut(effect_id) {
				effect.flags |= EffectFlags::EVALUATED;
			}
			if let Some(cell) = graph.cells.get_mut(cell) {
				cell.version += 1;
			}
		});
	}
}
