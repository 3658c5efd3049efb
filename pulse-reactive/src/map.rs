//! Observable map
//!
//! A map that tracks reads per key. Each key gets it's own cell, created the
//! first time it's read by an effect and released once no effect depends on
//! it anymore, so maps with many keys only pay for the keys being observed.


// Imports
use {
	crate::{
		dep::{self, Dep},
		effect_stack,
		graph::CellId,
		loc::Loc,
		scheduler,
		world,
	},
	core::{
		borrow::Borrow,
		cell::{Cell, RefCell},
		fmt,
		hash::Hash,
	},
	indexmap::IndexMap,
	std::{collections::HashMap, rc::Rc},
};

/// Minimum number of cells before released ones are pruned
const MIN_PRUNE_LEN: usize = 8;

/// Inner
struct Inner<K, V> {
	/// Values
	values: RefCell<IndexMap<K, V>>,

	/// Cells of all observed keys
	key_cells: RefCell<HashMap<K, CellId>>,

	/// Number of cells left after the last prune
	pruned_len: Cell<usize>,

	/// Dependency for the set of keys
	keys_dep: Dep,

	/// Dependency for any change
	iter_dep: Dep,

	/// Where this map was defined
	defined_loc: Loc,
}

/// Observable map
pub struct ObservableMap<K, V> {
	/// Inner
	inner: Rc<Inner<K, V>>,
}

impl<K, V> ObservableMap<K, V>
where
	K: Hash + Eq + Clone,
{
	/// Creates a new, empty, map
	#[track_caller]
	#[must_use]
	pub fn new() -> Self {
		Self::from_values(IndexMap::new())
	}

	/// Creates a new map from values
	#[track_caller]
	#[must_use]
	pub fn from_values(values: IndexMap<K, V>) -> Self {
		Self {
			inner: Rc::new(Inner {
				values:      RefCell::new(values),
				key_cells:   RefCell::new(HashMap::new()),
				pruned_len:  Cell::new(0),
				keys_dep:    Dep::new(),
				iter_dep:    Dep::new(),
				defined_loc: Loc::caller(),
			}),
		}
	}

	/// Uses the value of a key, tracking that key
	pub fn with_value<Q, F, O>(&self, key: &Q, f: F) -> O
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
		F: FnOnce(Option<&V>) -> O,
	{
		self.track_key(key);
		let values = self.inner.values.borrow();
		f(values.get(key))
	}

	/// Gets the value of a key, tracking that key
	pub fn get<Q>(&self, key: &Q) -> Option<V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
		V: Clone,
	{
		self.with_value(key, |value| value.cloned())
	}

	/// Returns if a key is present, tracking that key
	pub fn contains_key<Q>(&self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
	{
		self.with_value(key, |value| value.is_some())
	}

	/// Returns the number of entries, tracking the set of keys
	#[must_use]
	pub fn len(&self) -> usize {
		self.inner.keys_dep.track();
		self.inner.values.borrow().len()
	}

	/// Returns if there are no entries, tracking the set of keys
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns all keys, in insertion order, tracking the set of keys
	#[must_use]
	pub fn keys(&self) -> Vec<K> {
		self.inner.keys_dep.track();
		self.inner.values.borrow().keys().cloned().collect()
	}

	/// Returns all entries, in insertion order, tracking any change
	#[must_use]
	pub fn entries(&self) -> Vec<(K, V)>
	where
		V: Clone,
	{
		self.inner.iter_dep.track();
		self.inner
			.values
			.borrow()
			.iter()
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect()
	}

	/// Inserts a value, returning the previous one.
	///
	/// Only notifies the key's subscribers if the value changed.
	pub fn insert(&self, key: K, value: V) -> Option<V>
	where
		V: PartialEq,
	{
		let (old_value, changed) = {
			let mut values = self.inner.values.borrow_mut();
			match values.get_mut(&key) {
				Some(cur_value) if *cur_value == value => (None, false),
				Some(cur_value) => (Some(core::mem::replace(cur_value, value)), true),
				None => {
					values.insert(key.clone(), value);
					(None, true)
				},
			}
		};
		if !changed {
			return None;
		}

		let added = old_value.is_none();
		scheduler::start_batch();
		self.trigger_key(&key);
		if added {
			self.inner.keys_dep.trigger();
		}
		self.inner.iter_dep.trigger();
		scheduler::end_batch_implicit();

		old_value
	}

	/// Removes a key, returning it's value
	pub fn remove<Q>(&self, key: &Q) -> Option<V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let value = self.inner.values.borrow_mut().shift_remove(key)?;

		scheduler::start_batch();
		self.trigger_key(key);
		self.inner.keys_dep.trigger();
		self.inner.iter_dep.trigger();
		scheduler::end_batch_implicit();

		Some(value)
	}

	/// Removes all entries
	pub fn clear(&self) {
		let values = core::mem::take(&mut *self.inner.values.borrow_mut());
		if values.is_empty() {
			return;
		}

		scheduler::start_batch();
		for key in values.keys() {
			self.trigger_key(key);
		}
		self.inner.keys_dep.trigger();
		self.inner.iter_dep.trigger();
		scheduler::end_batch_implicit();
	}

	/// Returns the number of keys that currently have a cell.
	///
	/// Cells are released once no effect depends on their key.
	#[must_use]
	pub fn tracked_keys(&self) -> usize {
		self.prune_cells();
		self.inner.key_cells.borrow().len()
	}

	/// Tracks a key in the running effect, if any
	fn track_key<Q>(&self, key: &Q)
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
	{
		if !effect_stack::is_tracking() {
			return;
		}

		let cell = self.inner.key_cells.borrow().get(key).copied();
		let cell = match cell.filter(|&cell| world::with_graph(|graph| graph.cells.contains_key(cell))) {
			Some(cell) => cell,
			None => {
				let defined_loc = self.inner.defined_loc;
				let cell = world::with_graph(|graph| graph.add_cell(defined_loc, true));

				// Forget released cells once the table doubles
				let len = self.inner.key_cells.borrow().len();
				if len >= 2 * self.inner.pruned_len.get().max(MIN_PRUNE_LEN) {
					self.prune_cells();
				}
				self.inner.key_cells.borrow_mut().insert(key.to_owned(), cell);
				cell
			},
		};

		dep::track_cell(cell);
	}

	/// Triggers a key, if anything observes it
	fn trigger_key<Q>(&self, key: &Q)
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let cell = self.inner.key_cells.borrow().get(key).copied();
		if let Some(cell) = cell {
			dep::trigger_cell(cell);
		}
	}

	/// Forgets all cells that were released
	fn prune_cells(&self) {
		let mut key_cells = self.inner.key_cells.borrow_mut();
		world::with_graph(|graph| key_cells.retain(|_, cell| graph.cells.contains_key(*cell)));
		self.inner.pruned_len.set(key_cells.len());
	}
}

impl<K, V> Clone for ObservableMap<K, V> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<K, V> Default for ObservableMap<K, V>
where
	K: Hash + Eq + Clone,
{
	#[track_caller]
	fn default() -> Self {
		Self::new()
	}
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ObservableMap<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.inner.values.borrow().iter()).finish()
	}
}

impl<K, V> Drop for Inner<K, V> {
	fn drop(&mut self) {
		let key_cells = self.key_cells.get_mut();
		world::try_with_graph(|graph| {
			for &cell in key_cells.values() {
				graph.release_cell(cell);
			}
		});
	}
}
