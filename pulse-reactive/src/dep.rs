//! Dependency cell
//!
//! The primitive every observable value is built on: reading tracks it, and
//! triggering it notifies everyone who read it.

// Imports
use {
	crate::{
		effect_stack,
		graph::{CellId, LinkId},
		loc::Loc,
		scheduler,
		world,
	},
	std::rc::Rc,
};

/// Inner
#[derive(Debug)]
struct Inner {
	/// Cell
	cell: CellId,

	/// Where this dependency was defined
	defined_loc: Loc,
}

/// Dependency cell
#[derive(Clone, Debug)]
pub struct Dep {
	/// Inner
	inner: Rc<Inner>,
}

impl Dep {
	/// Creates a new dependency cell
	#[track_caller]
	#[must_use]
	pub fn new() -> Self {
		let defined_loc = Loc::caller();
		let cell = world::with_graph(|graph| graph.add_cell(defined_loc, false));

		Self {
			inner: Rc::new(Inner { cell, defined_loc }),
		}
	}

	/// Returns the cell of this dependency
	#[must_use]
	pub fn cell(&self) -> CellId {
		self.inner.cell
	}

	/// Returns where this dependency was defined
	#[must_use]
	pub fn defined_loc(&self) -> Loc {
		self.inner.defined_loc
	}

	/// Tracks this dependency in the running effect, if any
	pub fn track(&self) {
		self::track_cell(self.inner.cell);
	}

	/// Triggers this dependency, notifying all subscribers
	pub fn trigger(&self) {
		self::trigger_cell(self.inner.cell);
	}

	/// Returns the version of this dependency
	#[must_use]
	pub fn version(&self) -> u64 {
		world::with_graph(|graph| graph.cells.get(self.inner.cell).map_or(0, |cell| cell.version))
	}

	/// Returns the number of subscribers of this dependency
	#[must_use]
	pub fn subscriber_count(&self) -> usize {
		world::with_graph(|graph| graph.subscriber_count(self.inner.cell))
	}
}

impl Default for Dep {
	#[track_caller]
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for Inner {
	fn drop(&mut self) {
		let cell = self.cell;
		world::try_with_graph(|graph| graph.release_cell(cell));
	}
}

/// Tracks a cell in the running effect, if any.
///
/// Returns the link between them.
pub(crate) fn track_cell(cell: CellId) -> Option<LinkId> {
	let effect = effect_stack::running()?;
	world::with_graph(|graph| graph.track(cell, effect))
}

/// Triggers a cell, notifying all it's subscribers
pub(crate) fn trigger_cell(cell: CellId) {
	let has_subs = world::with_graph(|graph| {
		graph.global_version += 1;
		let Some(cell) = graph.cells.get_mut(cell) else {
			return false;
		};
		cell.version += 1;

		cell.subs_tail.is_some()
	});
	if !has_subs {
		return;
	}

	scheduler::start_batch();
	let running = effect_stack::running();
	world::with_graph(|graph| {
		world::with_scheduler(|scheduler| graph.notify_subs(cell, running, &mut scheduler.batched));
	});
	scheduler::end_batch_implicit();
}
