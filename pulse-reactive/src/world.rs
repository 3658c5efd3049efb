//! World
//!
//! The per-thread reactive state: the dependency graph, the scheduler, and the
//! stacks of running effects and current scopes.

// Imports
use {
	crate::{
		effect,
		graph::{EffectId, Graph, ScopeId},
		scheduler::Scheduler,
		scope::EffectScope,
	},
	core::{any::Any, cell::RefCell, mem},
};

/// Reactive world
struct World {
	/// Dependency graph
	graph: RefCell<Graph>,

	/// Scheduler
	scheduler: RefCell<Scheduler>,

	/// Running effects.
	///
	/// `None` entries suspend tracking.
	effect_stack: RefCell<Vec<Option<EffectId>>>,

	/// Current scopes
	scope_stack: RefCell<Vec<ScopeId>>,
}

impl World {
	/// Creates a new world
	fn new() -> Self {
		Self {
			graph:        RefCell::new(Graph::new()),
			scheduler:    RefCell::new(Scheduler::default()),
			effect_stack: RefCell::new(vec![]),
			scope_stack:  RefCell::new(vec![]),
		}
	}

	/// Uses the graph mutably.
	///
	/// Anything the graph discarded while borrowed is only dropped afterwards,
	/// since dropping it may need the graph again.
	fn with_graph<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&mut Graph) -> O,
	{
		let (output, garbage) = {
			let mut graph = self
				.graph
				.try_borrow_mut()
				.expect("Cannot access the dependency graph while it's being modified");
			let output = f(&mut graph);
			(output, mem::take(&mut graph.garbage))
		};
		drop(garbage);

		output
	}
}

thread_local! {
	/// World
	static WORLD: World = World::new();
}

/// Uses the graph mutably
pub(crate) fn with_graph<F, O>(f: F) -> O
where
	F: FnOnce(&mut Graph) -> O,
{
	WORLD.with(|world| world.with_graph(f))
}

/// Uses the graph mutably, if it's still accessible.
///
/// Used by destructors, which may run while the thread is being torn down.
pub(crate) fn try_with_graph<F, O>(f: F) -> Option<O>
where
	F: FnOnce(&mut Graph) -> O,
{
	WORLD
		.try_with(|world| match world.graph.try_borrow_mut() {
			Ok(graph) => {
				drop(graph);
				Some(world.with_graph(f))
			},
			Err(_) => {
				tracing::warn!("Dependency graph was busy during drop, leaking entry");
				None
			},
		})
		.ok()
		.flatten()
}

/// Uses the scheduler mutably
pub(crate) fn with_scheduler<F, O>(f: F) -> O
where
	F: FnOnce(&mut Scheduler) -> O,
{
	WORLD.with(|world| {
		let mut scheduler = world
			.scheduler
			.try_borrow_mut()
			.expect("Cannot access the scheduler while it's being modified");
		f(&mut scheduler)
	})
}

/// Uses the effect stack mutably
pub(crate) fn with_effect_stack<F, O>(f: F) -> O
where
	F: FnOnce(&mut Vec<Option<EffectId>>) -> O,
{
	WORLD.with(|world| f(&mut world.effect_stack.borrow_mut()))
}

/// Uses the scope stack mutably
pub(crate) fn with_scope_stack<F, O>(f: F) -> O
where
	F: FnOnce(&mut Vec<ScopeId>) -> O,
{
	WORLD.with(|world| f(&mut world.scope_stack.borrow_mut()))
}

/// Initializes the reactive world of this thread.
///
/// The world is created lazily on first use, so this is only needed to
/// control when that happens.
pub fn init() {
	WORLD.with(|_| tracing::debug!("Initialized reactive world"));
}

/// Shuts down the reactive world of this thread.
///
/// Stops every scope and effect, releases every cell and resets the scheduler.
/// Handles created before remain valid to drop, but are inert.
pub fn shutdown() {
	// Stop all scopes from the roots down, then any effect outside of a scope
	let root_scopes = self::with_graph(|graph| {
		graph
			.scopes
			.iter()
			.filter(|(_, scope)| scope.parent.is_none())
			.map(|(scope_id, _)| scope_id)
			.collect::<Vec<_>>()
	});
	for scope_id in root_scopes {
		EffectScope::from_id(scope_id).stop();
	}

	let effects = self::with_graph(|graph| graph.effects.keys().collect::<Vec<_>>());
	for effect_id in effects {
		effect::stop_id(effect_id);
	}

	// Then clear everything.
	// Note: Clearing instead of replacing the arenas keeps their slot versions,
	//       so ids held by old handles never alias new entries.
	self::with_graph(|graph| {
		let effects = graph.effects.drain().map(|(_, effect)| effect.kind).collect::<Vec<_>>();
		graph.garbage.push(Box::new(effects) as Box<dyn Any>);
		let scopes = graph.scopes.drain().map(|(_, scope)| scope.cleanups).collect::<Vec<_>>();
		graph.garbage.push(Box::new(scopes));
		graph.cells.clear();
		graph.links.clear();
		graph.paused.clear();
	});

	let scheduler = self::with_scheduler(mem::take);
	drop(scheduler);
	self::with_effect_stack(Vec::clear);
	self::with_scope_stack(Vec::clear);

	tracing::debug!("Shut down reactive world");
}

/// Exports the dependency graph of this thread as a dot graph.
#[must_use]
pub fn export_dot() -> String {
	self::with_graph(|graph| graph.export_dot())
}

/// Number of entries alive in the world
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub struct WorldStats {
	/// Cells
	pub cells: usize,

	/// Effects, including computeds
	pub effects: usize,

	/// Links
	pub links: usize,

	/// Scopes
	pub scopes: usize,
}

/// Returns the number of entries alive in the world of this thread
#[must_use]
pub fn stats() -> WorldStats {
	self::with_graph(|graph| WorldStats {
		cells:   graph.cells.len(),
		effects: graph.effects.len(),
		links:   graph.links.len(),
		scopes:  graph.scopes.len(),
	})
}
