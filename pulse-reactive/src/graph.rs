//! Dependency graph
//!
//! Cells and effects are connected through links, each of which sits in two
//! intrusive doubly-linked lists at once: the effect's dependency list (in read
//! order) and the cell's subscriber list. A link is only part of the subscriber
//! list while its effect is tracking; computeds that lose their last subscriber
//! keep their dependency links but leave every subscriber list.

// Imports
use {
	crate::{effect::EffectRun, loc::Loc},
	core::any::Any,
	indexmap::IndexSet,
	slotmap::SlotMap,
	std::rc::Rc,
};

slotmap::new_key_type! {
	/// Dependency cell id
	pub struct CellId;

	/// Effect id
	pub struct EffectId;

	/// Link id
	pub struct LinkId;

	/// Effect scope id
	pub struct ScopeId;
}

bitflags::bitflags! {
	/// Effect flags
	#[derive(PartialEq, Eq, Clone, Copy, Debug)]
	pub struct EffectFlags: u16 {
		/// Not stopped
		const ACTIVE = 1 << 0;

		/// Currently running
		const RUNNING = 1 << 1;

		/// Subscribed to its dependencies
		const TRACKING = 1 << 2;

		/// Waiting in the batch to be dispatched
		const NOTIFIED = 1 << 3;

		/// Computed value must be re-validated
		const DIRTY = 1 << 4;

		/// May notify itself while running
		const ALLOW_RECURSE = 1 << 5;

		/// Notifications are held until resumed
		const PAUSED = 1 << 6;

		/// Computed value has been evaluated at least once
		const EVALUATED = 1 << 7;
	}
}

/// Computed runner
pub(crate) trait ComputedRun {
	/// Re-computes the value, returning whether it changed
	fn recompute(&self) -> bool;
}

/// Scheduler callback of an effect
pub(crate) type SchedulerFn = crate::effect::EffectScheduler;

/// Dependency cell
pub(crate) struct CellNode {
	/// Version, bumped on every change
	pub version: u64,

	/// First link of the subscriber list
	pub subs_head: Option<LinkId>,

	/// Last link of the subscriber list
	pub subs_tail: Option<LinkId>,

	/// Number of links pointing at this cell, subscribed or not
	pub link_count: usize,

	/// Link of the currently running effect
	pub active_link: Option<LinkId>,

	/// Computed this cell belongs to
	pub computed: Option<EffectId>,

	/// Whether to release this cell once no link points at it
	pub release_when_unused: bool,

	/// Where this cell was defined
	pub defined_loc: Loc,
}

/// Link between a cell and an effect
pub(crate) struct Link {
	/// Cell
	pub cell: CellId,

	/// Effect
	pub effect: EffectId,

	/// Cell version last observed by the effect.
	///
	/// `None` while the effect is running and hasn't read the cell yet.
	pub version: Option<u64>,

	/// Whether this link is part of the cell's subscriber list
	pub subscribed: bool,

	pub prev_sub: Option<LinkId>,
	pub next_sub: Option<LinkId>,
	pub prev_dep: Option<LinkId>,
	pub next_dep: Option<LinkId>,

	/// Cell's active link before this effect started running
	pub prev_active_link: Option<LinkId>,
}

/// Effect kind
pub(crate) enum EffectKind {
	/// Side effect
	Effect(Rc<dyn EffectRun>),

	/// Computed value, with it's own cell
	Computed { run: Rc<dyn ComputedRun>, cell: CellId },
}

/// Effect
pub(crate) struct EffectNode {
	pub flags: EffectFlags,

	/// Creation order
	pub order: u64,

	/// First link of the dependency list
	pub deps_head: Option<LinkId>,

	/// Last link of the dependency list
	pub deps_tail: Option<LinkId>,

	pub kind: EffectKind,

	/// Custom scheduler
	pub scheduler: Option<SchedulerFn>,

	/// Cleanups to run before the next run, or when stopped
	pub cleanups: Vec<Box<dyn FnOnce()>>,

	/// Callbacks to run when stopped
	pub on_stop: Vec<Box<dyn FnOnce()>>,

	/// Owning scope
	pub scope: Option<ScopeId>,

	/// Global version this computed was last validated at
	pub global_version: u64,

	/// Where this effect was defined
	pub defined_loc: Loc,
}

/// Effect scope
pub(crate) struct ScopeNode {
	pub parent: Option<ScopeId>,
	pub effects: IndexSet<EffectId>,
	pub children: IndexSet<ScopeId>,
	pub cleanups: Vec<Box<dyn FnOnce()>>,
	pub paused: bool,
	pub defined_loc: Loc,
}

/// Effects notified during a batch
#[derive(Default)]
pub(crate) struct Batched {
	/// Effects to dispatch
	pub effects: Vec<EffectId>,

	/// Computeds to reset
	pub computed: Vec<EffectId>,
}

impl Batched {
	/// Returns if nothing is batched
	pub fn is_empty(&self) -> bool {
		self.effects.is_empty() && self.computed.is_empty()
	}
}

/// Parts of a stopped effect that must run or be dropped outside the graph
#[derive(Default)]
pub(crate) struct Stopped {
	pub cleanups: Vec<Box<dyn FnOnce()>>,
	pub on_stop: Vec<Box<dyn FnOnce()>>,
}

/// Dependency graph
pub(crate) struct Graph {
	pub cells: SlotMap<CellId, CellNode>,
	pub effects: SlotMap<EffectId, EffectNode>,
	pub links: SlotMap<LinkId, Link>,
	pub scopes: SlotMap<ScopeId, ScopeNode>,

	/// Global version, bumped on every cell trigger
	pub global_version: u64,

	/// Next creation order
	pub next_order: u64,

	/// Effects notified while paused
	pub paused: IndexSet<EffectId>,

	/// Values removed from the graph, to be dropped once it's no longer borrowed
	pub garbage: Vec<Box<dyn Any>>,
}

impl Graph {
	/// Creates an empty graph
	pub fn new() -> Self {
		Self {
			cells:          SlotMap::with_key(),
			effects:        SlotMap::with_key(),
			links:          SlotMap::with_key(),
			scopes:         SlotMap::with_key(),
			global_version: 0,
			next_order:     0,
			paused:         IndexSet::new(),
			garbage:        vec![],
		}
	}

	/// Allocates the next creation order
	pub fn alloc_order(&mut self) -> u64 {
		let order = self.next_order;
		self.next_order += 1;
		order
	}

	/// Adds a cell
	pub fn add_cell(&mut self, defined_loc: Loc, release_when_unused: bool) -> CellId {
		self.cells.insert(CellNode {
			version: 0,
			subs_head: None,
			subs_tail: None,
			link_count: 0,
			active_link: None,
			computed: None,
			release_when_unused,
			defined_loc,
		})
	}

	/// Adds an effect
	pub fn add_effect(
		&mut self,
		kind: EffectKind,
		flags: EffectFlags,
		scheduler: Option<SchedulerFn>,
		scope: Option<ScopeId>,
		defined_loc: Loc,
	) -> EffectId {
		let order = self.alloc_order();
		let effect = self.effects.insert(EffectNode {
			flags,
			order,
			deps_head: None,
			deps_tail: None,
			kind,
			scheduler,
			cleanups: vec![],
			on_stop: vec![],
			scope,
			global_version: self.global_version.wrapping_sub(1),
			defined_loc,
		});

		if let Some(scope) = scope.and_then(|scope| self.scopes.get_mut(scope)) {
			scope.effects.insert(effect);
		}

		effect
	}

	/// Returns the cell of a computed
	pub fn computed_cell(&self, effect: EffectId) -> Option<CellId> {
		match self.effects.get(effect)?.kind {
			EffectKind::Computed { cell, .. } => Some(cell),
			EffectKind::Effect(_) => None,
		}
	}

	/// Returns if an effect exists and is active
	pub fn is_active(&self, effect: EffectId) -> bool {
		self.effects
			.get(effect)
			.is_some_and(|node| node.flags.contains(EffectFlags::ACTIVE))
	}

	/// Returns the dependencies of an effect, in read order
	pub fn deps(&self, effect: EffectId) -> Vec<LinkId> {
		let mut deps = vec![];
		let mut cur = self.effects.get(effect).and_then(|node| node.deps_head);
		while let Some(link_id) = cur {
			deps.push(link_id);
			cur = self.links[link_id].next_dep;
		}

		deps
	}

	/// Sets a link's observed version to it's cell's current version
	pub fn sync_link_version(&mut self, link_id: LinkId) {
		if let Some(link) = self.links.get_mut(link_id) {
			link.version = self.cells.get(link.cell).map(|cell| cell.version);
		}
	}

	/// Returns the number of subscribers of a cell
	pub fn subscriber_count(&self, cell: CellId) -> usize {
		let mut count = 0;
		let mut cur = self.cells.get(cell).and_then(|node| node.subs_tail);
		while let Some(link_id) = cur {
			count += 1;
			cur = self.links[link_id].prev_sub;
		}

		count
	}

	/// Tracks `cell` as a dependency of `effect`.
	///
	/// Returns the link between both, unless the effect can't track anything.
	pub fn track(&mut self, cell_id: CellId, effect_id: EffectId) -> Option<LinkId> {
		let effect = self.effects.get(effect_id)?;
		if !effect.flags.contains(EffectFlags::ACTIVE) {
			return None;
		}
		let tracking = effect.flags.contains(EffectFlags::TRACKING);
		let cell = self.cells.get(cell_id)?;

		// If the cell's active link already belongs to this effect, refresh it
		let existing = cell
			.active_link
			.filter(|&link_id| self.links.get(link_id).is_some_and(|link| link.effect == effect_id));
		if let Some(link_id) = existing {
			let version = cell.version;
			if self.links[link_id].version.is_none() {
				self.links[link_id].version = Some(version);
				self.move_dep_to_tail(link_id);
			}

			return Some(link_id);
		}

		// Otherwise create a new link at the end of the dependency list
		let prev_active_link = cell.active_link;
		let version = cell.version;
		let deps_tail = effect.deps_tail;
		let link_id = self.links.insert(Link {
			cell: cell_id,
			effect: effect_id,
			version: Some(version),
			subscribed: false,
			prev_sub: None,
			next_sub: None,
			prev_dep: deps_tail,
			next_dep: None,
			prev_active_link,
		});
		match deps_tail {
			Some(tail) => self.links[tail].next_dep = Some(link_id),
			None => self.effects[effect_id].deps_head = Some(link_id),
		}
		self.effects[effect_id].deps_tail = Some(link_id);

		let cell = &mut self.cells[cell_id];
		cell.active_link = Some(link_id);
		cell.link_count += 1;

		tracing::trace!(
			"Adding effect dependency\nEffect: {}\nCell  : {}",
			self.effects[effect_id].defined_loc,
			self.cells[cell_id].defined_loc,
		);

		if tracking {
			self.subscribe(link_id);
		}

		Some(link_id)
	}

	/// Moves a dependency link to the end of it's effect's dependency list
	fn move_dep_to_tail(&mut self, link_id: LinkId) {
		let Link {
			effect,
			prev_dep,
			next_dep,
			..
		} = self.links[link_id];
		let Some(next_dep) = next_dep else {
			return;
		};

		// Unlink it
		self.links[next_dep].prev_dep = prev_dep;
		match prev_dep {
			Some(prev_dep) => self.links[prev_dep].next_dep = Some(next_dep),
			None => self.effects[effect].deps_head = Some(next_dep),
		}

		// Then append it
		let tail = self.effects[effect].deps_tail;
		let link = &mut self.links[link_id];
		link.prev_dep = tail;
		link.next_dep = None;
		if let Some(tail) = tail {
			self.links[tail].next_dep = Some(link_id);
		}
		self.effects[effect].deps_tail = Some(link_id);
	}

	/// Adds a link to it's cell's subscriber list.
	///
	/// If the cell belongs to a computed that had no subscribers, the
	/// computed starts tracking its own dependencies.
	fn subscribe(&mut self, link_id: LinkId) {
		let link = &self.links[link_id];
		if link.subscribed {
			return;
		}
		let cell_id = link.cell;

		// If this is the first subscriber of a computed, it starts tracking
		let cell = &self.cells[cell_id];
		let first_computed_sub = cell.computed.filter(|_| cell.subs_tail.is_none());
		if let Some(computed) = first_computed_sub {
			if let Some(node) = self.effects.get_mut(computed) {
				node.flags |= EffectFlags::TRACKING | EffectFlags::DIRTY;
			}
			for dep in self.deps(computed) {
				self.subscribe(dep);
			}
		}

		let cell = &mut self.cells[cell_id];
		let tail = cell.subs_tail.replace(link_id);
		if cell.subs_head.is_none() {
			cell.subs_head = Some(link_id);
		}

		let link = &mut self.links[link_id];
		link.subscribed = true;
		link.prev_sub = tail;
		link.next_sub = None;
		if let Some(tail) = tail {
			self.links[tail].next_sub = Some(link_id);
		}
	}

	/// Removes a link from it's cell's subscriber list.
	///
	/// If the cell belongs to a computed that just lost it's last subscriber,
	/// the computed stops tracking its own dependencies.
	fn unsubscribe(&mut self, link_id: LinkId) {
		let link = &mut self.links[link_id];
		if !link.subscribed {
			return;
		}
		link.subscribed = false;
		let Link {
			cell: cell_id,
			prev_sub,
			next_sub,
			..
		} = *link;
		link.prev_sub = None;
		link.next_sub = None;

		match prev_sub {
			Some(prev_sub) => self.links[prev_sub].next_sub = next_sub,
			None => self.cells[cell_id].subs_head = next_sub,
		}
		match next_sub {
			Some(next_sub) => self.links[next_sub].prev_sub = prev_sub,
			None => self.cells[cell_id].subs_tail = prev_sub,
		}

		// If this was the last subscriber of a computed, it stops tracking
		let cell = &self.cells[cell_id];
		let last_computed_sub = cell.computed.filter(|_| cell.subs_tail.is_none());
		if let Some(computed) = last_computed_sub {
			if let Some(node) = self.effects.get_mut(computed) {
				node.flags.remove(EffectFlags::TRACKING);
			}
			for dep in self.deps(computed) {
				self.unsubscribe(dep);
			}
		}
	}

	/// Destroys a link, removing it from both lists
	fn destroy_link(&mut self, link_id: LinkId) {
		self.unsubscribe(link_id);

		let link = self.links.remove(link_id).expect("Link was already destroyed");
		match link.prev_dep {
			Some(prev_dep) => self.links[prev_dep].next_dep = link.next_dep,
			None =>
				if let Some(effect) = self.effects.get_mut(link.effect) {
					effect.deps_head = link.next_dep;
				},
		}
		match link.next_dep {
			Some(next_dep) => self.links[next_dep].prev_dep = link.prev_dep,
			None =>
				if let Some(effect) = self.effects.get_mut(link.effect) {
					effect.deps_tail = link.prev_dep;
				},
		}

		let cell = &mut self.cells[link.cell];
		if cell.active_link == Some(link_id) {
			cell.active_link = link.prev_active_link;
		}
		cell.link_count -= 1;
		if cell.link_count == 0 && cell.release_when_unused {
			self.remove_cell(link.cell);
		}
	}

	/// Removes a cell that no link points at anymore.
	///
	/// If the cell belonged to a (disposed) computed, the computed goes with it.
	fn remove_cell(&mut self, cell_id: CellId) {
		let Some(cell) = self.cells.remove(cell_id) else {
			return;
		};
		debug_assert_eq!(cell.link_count, 0, "Removed a cell that still had links");

		tracing::trace!("Releasing cell defined at {}", cell.defined_loc);
		if let Some(node) = cell.computed.and_then(|computed| self.effects.remove(computed)) {
			self.garbage.push(Box::new(node.kind));
		}
	}

	/// Marks a cell as no longer owned, releasing it immediately if unused
	pub fn release_cell(&mut self, cell_id: CellId) {
		let Some(cell) = self.cells.get_mut(cell_id) else {
			return;
		};
		cell.release_when_unused = true;
		if cell.link_count == 0 {
			self.remove_cell(cell_id);
		}
	}

	/// Prepares the dependencies of an effect for a new run.
	///
	/// Every link is marked as not yet observed, and becomes the active link of
	/// its cell so re-reads can find it.
	pub fn prepare_deps(&mut self, effect: EffectId) {
		for link_id in self.deps(effect) {
			let cell_id = self.links[link_id].cell;
			let prev_active_link = self.cells[cell_id].active_link.replace(link_id);

			let link = &mut self.links[link_id];
			link.version = None;
			link.prev_active_link = prev_active_link;
		}
	}

	/// Cleans up the dependencies of an effect after a run.
	///
	/// Links that weren't observed during the run are destroyed, and every
	/// cell's active link is restored.
	pub fn cleanup_deps(&mut self, effect: EffectId) {
		let mut cur = self.effects.get(effect).and_then(|node| node.deps_tail);
		while let Some(link_id) = cur {
			let link = &mut self.links[link_id];
			cur = link.prev_dep;
			let cell_id = link.cell;
			let unobserved = link.version.is_none();
			let prev_active_link = link.prev_active_link.take();

			if let Some(cell) = self.cells.get_mut(cell_id) {
				if cell.active_link == Some(link_id) {
					cell.active_link = prev_active_link.filter(|&link_id| self.links.contains_key(link_id));
				}
			}

			if unobserved {
				self.destroy_link(link_id);
			}
		}
	}

	/// Stops an effect, removing it from the graph.
	///
	/// Returns it's cleanups and stop callbacks, which should be run once the
	/// graph is no longer borrowed.
	pub fn stop_effect(&mut self, effect_id: EffectId) -> Stopped {
		let Some(effect) = self.effects.get(effect_id) else {
			return Stopped::default();
		};
		if !effect.flags.contains(EffectFlags::ACTIVE) {
			return Stopped::default();
		}

		for link_id in self.deps(effect_id) {
			self.destroy_link(link_id);
		}
		self.paused.shift_remove(&effect_id);

		// Computeds keep their node (and cell) until their cell is released
		let effect = &mut self.effects[effect_id];
		effect.flags.remove(EffectFlags::ACTIVE | EffectFlags::TRACKING);
		let stopped = Stopped {
			cleanups: effect.cleanups.drain(..).collect(),
			on_stop:  effect.on_stop.drain(..).collect(),
		};
		if let Some(scope) = effect.scope.and_then(|scope| self.scopes.get_mut(scope)) {
			scope.effects.shift_remove(&effect_id);
		}

		if matches!(effect.kind, EffectKind::Effect(_)) {
			let node = self.effects.remove(effect_id).expect("Effect was just accessed");
			self.garbage.push(Box::new(node.kind));
			if let Some(scheduler) = node.scheduler {
				self.garbage.push(Box::new(scheduler));
			}
		}

		stopped
	}

	/// Notifies all subscribers of a cell, in reverse subscription order.
	///
	/// Computeds propagate the notification to their own subscribers.
	pub fn notify_subs(&mut self, cell_id: CellId, running: Option<EffectId>, batched: &mut Batched) {
		let mut cur = self.cells.get(cell_id).and_then(|cell| cell.subs_tail);
		while let Some(link_id) = cur {
			let link = &self.links[link_id];
			cur = link.prev_sub;
			let effect_id = link.effect;

			if self.notify(effect_id, running, batched) {
				if let Some(cell) = self.computed_cell(effect_id) {
					self.notify_subs(cell, running, batched);
				}
			}
		}
	}

	/// Notifies an effect.
	///
	/// Returns whether the effect is a computed whose subscribers should also be notified.
	fn notify(&mut self, effect_id: EffectId, running: Option<EffectId>, batched: &mut Batched) -> bool {
		let Some(effect) = self.effects.get_mut(effect_id) else {
			return false;
		};

		match effect.kind {
			EffectKind::Computed { .. } => {
				effect.flags |= EffectFlags::DIRTY;
				if effect.flags.contains(EffectFlags::NOTIFIED) || running == Some(effect_id) {
					return false;
				}

				effect.flags |= EffectFlags::NOTIFIED;
				batched.computed.push(effect_id);
				true
			},
			EffectKind::Effect(_) => {
				if effect.flags.contains(EffectFlags::RUNNING) && !effect.flags.contains(EffectFlags::ALLOW_RECURSE) {
					return false;
				}

				if !effect.flags.contains(EffectFlags::NOTIFIED) {
					effect.flags |= EffectFlags::NOTIFIED;
					batched.effects.push(effect_id);
				}
				false
			},
		}
	}

	/// Exports the dependency graph as a dot graph.
	pub fn export_dot(&self) -> String {
		let mut graph = petgraph::Graph::<String, &'static str>::new();
		let cells = self
			.cells
			.iter()
			.map(|(cell_id, cell)| {
				let node = graph.add_node(format!("Cell({}, v{})", cell.defined_loc, cell.version));
				(cell_id, node)
			})
			.collect::<std::collections::HashMap<_, _>>();
		let effects = self
			.effects
			.iter()
			.map(|(effect_id, effect)| {
				let label = match effect.kind {
					EffectKind::Effect(_) => format!("Effect({})", effect.defined_loc),
					EffectKind::Computed { .. } => format!("Computed({})", effect.defined_loc),
				};
				(effect_id, graph.add_node(label))
			})
			.collect::<std::collections::HashMap<_, _>>();

		for link in self.links.values() {
			let label = match link.subscribed {
				true => "sub",
				false => "dep",
			};
			graph.add_edge(cells[&link.cell], effects[&link.effect], label);
		}
		for (effect_id, effect) in &self.effects {
			if let EffectKind::Computed { cell, .. } = effect.kind {
				graph.add_edge(effects[&effect_id], cells[&cell], "value");
			}
		}

		petgraph::dot::Dot::new(&graph).to_string()
	}
}
