//! Effect scope
//!
//! Scopes own every effect created while they're current, along with any
//! child scope, so they can all be stopped together.

// Imports
use {
	crate::{
		effect,
		effect_stack,
		graph::{EffectId, ScopeId, ScopeNode},
		loc::Loc,
		world,
	},
	indexmap::IndexSet,
};

/// Effect scope
#[derive(PartialEq, Eq, Clone, Copy, Hash, Debug)]
pub struct EffectScope {
	/// Id
	id: ScopeId,
}

impl EffectScope {
	/// Creates a new scope, owned by the current scope, if any
	#[track_caller]
	#[must_use]
	pub fn new() -> Self {
		Self::create(self::current_id(), Loc::caller())
	}

	/// Creates a new scope not owned by any other scope
	#[track_caller]
	#[must_use]
	pub fn detached() -> Self {
		Self::create(None, Loc::caller())
	}

	/// Creates a new scope
	fn create(parent: Option<ScopeId>, defined_loc: Loc) -> Self {
		let id = world::with_graph(|graph| {
			let paused = parent
				.and_then(|parent| graph.scopes.get(parent))
				.is_some_and(|parent| parent.paused);
			let id = graph.scopes.insert(ScopeNode {
				parent,
				effects: IndexSet::new(),
				children: IndexSet::new(),
				cleanups: vec![],
				paused,
				defined_loc,
			});
			if let Some(parent) = parent.and_then(|parent| graph.scopes.get_mut(parent)) {
				parent.children.insert(id);
			}

			id
		});

		Self { id }
	}

	/// Creates a scope handle from it's id
	pub(crate) const fn from_id(id: ScopeId) -> Self {
		Self { id }
	}

	/// Returns the id of this scope
	#[must_use]
	pub const fn id(&self) -> ScopeId {
		self.id
	}

	/// Returns if this scope hasn't been stopped
	#[must_use]
	pub fn is_active(&self) -> bool {
		world::with_graph(|graph| graph.scopes.contains_key(self.id))
	}

	/// Returns if this scope is paused
	#[must_use]
	pub fn is_paused(&self) -> bool {
		world::with_graph(|graph| graph.scopes.get(self.id).is_some_and(|scope| scope.paused))
	}

	/// Returns the number of effects owned directly by this scope
	#[must_use]
	pub fn effect_count(&self) -> usize {
		world::with_graph(|graph| graph.scopes.get(self.id).map_or(0, |scope| scope.effects.len()))
	}

	/// Runs `f` with this scope as the current scope.
	///
	/// Returns `None` without running `f` if this scope was stopped.
	pub fn run<F, O>(&self, f: F) -> Option<O>
	where
		F: FnOnce() -> O,
	{
		if !self.is_active() {
			tracing::warn!("Cannot run an inactive effect scope");
			return None;
		}

		world::with_scope_stack(|stack| stack.push(self.id));
		scopeguard::defer! {
			world::with_scope_stack(|stack| stack.pop()).expect("Missing pushed scope");
		}

		Some(f())
	}

	/// Stops this scope.
	///
	/// Stops all owned effects, runs all cleanups, then stops all child scopes.
	pub fn stop(&self) {
		let scope = world::with_graph(|graph| {
			let scope = graph.scopes.remove(self.id)?;
			if let Some(parent) = scope.parent.and_then(|parent| graph.scopes.get_mut(parent)) {
				parent.children.shift_remove(&self.id);
			}

			Some(scope)
		});
		let Some(scope) = scope else {
			return;
		};
		tracing::trace!("Stopping effect scope defined at {}", scope.defined_loc);

		for effect_id in scope.effects {
			effect::stop_id(effect_id);
		}

		effect_stack::untracked(|| {
			for cleanup in scope.cleanups {
				cleanup();
			}
		});

		for child in scope.children {
			Self::from_id(child).stop();
		}
	}

	/// Pauses all effects in this scope and it's children
	pub fn pause(&self) {
		let Some((effects, children)) = self.set_paused(true) else {
			return;
		};

		for effect_id in effects {
			effect::pause_id(effect_id);
		}
		for child in children {
			Self::from_id(child).pause();
		}
	}

	/// Resumes all effects in this scope and it's children
	pub fn resume(&self) {
		let Some((effects, children)) = self.set_paused(false) else {
			return;
		};

		for effect_id in effects {
			effect::resume_id(effect_id);
		}
		for child in children {
			Self::from_id(child).resume();
		}
	}

	/// Sets whether this scope is paused.
	///
	/// Returns the effects and children to propagate to, if it changed.
	fn set_paused(&self, paused: bool) -> Option<(Vec<EffectId>, Vec<ScopeId>)> {
		world::with_graph(|graph| {
			let scope = graph.scopes.get_mut(self.id)?;
			if scope.paused == paused {
				return None;
			}
			scope.paused = paused;

			Some((
				scope.effects.iter().copied().collect(),
				scope.children.iter().copied().collect(),
			))
		})
	}
}

impl Default for EffectScope {
	#[track_caller]
	fn default() -> Self {
		Self::new()
	}
}

/// Returns the id of the current scope
pub(crate) fn current_id() -> Option<ScopeId> {
	world::with_scope_stack(|stack| stack.last().copied())
}

/// Returns the current scope
#[must_use]
pub fn current_scope() -> Option<EffectScope> {
	self::current_id().map(EffectScope::from_id)
}

/// Registers a cleanup on the current scope, run once it's stopped
pub fn on_scope_dispose<F>(f: F)
where
	F: FnOnce() + 'static,
{
	let Some(scope_id) = self::current_id() else {
		tracing::warn!("`on_scope_dispose` was called without a current scope, ignoring");
		return;
	};

	let f = Box::new(f) as Box<dyn FnOnce()>;
	world::with_graph(|graph| match graph.scopes.get_mut(scope_id) {
		Some(scope) => scope.cleanups.push(f),
		None => graph.garbage.push(Box::new(f)),
	});
}
