//! Children diffing

// Imports
use {
	super::{Mounted, Reconciler},
	crate::{
		backend::Backend,
		error::ReconcileError,
		lis,
		node::{Key, PatchFlags, VNode},
	},
	core::{iter, mem},
	itertools::Itertools,
	std::collections::HashMap,
};

impl<B: Backend + 'static> Reconciler<B> {
	/// Patches the children of a node.
	///
	/// Children are diffed by key if `flags` says so, or if any of them have a key.
	pub(super) fn patch_children(
		&self,
		old: &mut Vec<Mounted<B>>,
		new: &[VNode],
		flags: PatchFlags,
		parent: &B::Handle,
		anchor: Option<&B::Handle>,
	) -> Result<(), ReconcileError> {
		let keyed = !flags.contains(PatchFlags::UNKEYED) &&
			(flags.contains(PatchFlags::KEYED) ||
				new.iter().any(|node| node.key().is_some()) ||
				old.iter().any(|node| node.vnode.key().is_some()));

		match keyed {
			true => self.patch_keyed_children(old, new, parent, anchor),
			false => self.patch_unkeyed_children(old, new, parent, anchor),
		}
	}

	/// Patches children by position
	fn patch_unkeyed_children(
		&self,
		old: &mut Vec<Mounted<B>>,
		new: &[VNode],
		parent: &B::Handle,
		anchor: Option<&B::Handle>,
	) -> Result<(), ReconcileError> {
		let common_len = old.len().min(new.len());
		for (mounted, node) in old.iter_mut().zip(new) {
			self.patch(mounted, node.clone(), parent)?;
		}

		if old.len() > new.len() {
			for mounted in old.drain(common_len..).collect::<Vec<_>>() {
				self.unmount(mounted, true);
			}
		} else {
			for node in &new[common_len..] {
				let mounted = self.mount(node.clone(), parent, anchor)?;
				old.push(mounted);
			}
		}

		Ok(())
	}

	/// Patches children by key.
	///
	/// Moves as few children as possible: only those outside of the longest
	/// increasing subsequence of their previous positions.
	fn patch_keyed_children(
		&self,
		old_children: &mut Vec<Mounted<B>>,
		new: &[VNode],
		parent: &B::Handle,
		anchor: Option<&B::Handle>,
	) -> Result<(), ReconcileError> {
		let mut old = mem::take(old_children).into_iter().map(Some).collect::<Vec<_>>();
		let mut placed = iter::repeat_with(|| None).take(new.len()).collect::<Vec<_>>();

		// Note: Even on error, we keep every node still mounted, so they may be unmounted later.
		let res = self.patch_keyed_children_inner(&mut old, &mut placed, new, parent, anchor);
		*old_children = placed.into_iter().chain(old).flatten().collect();

		res
	}

	/// Patches children by key, moving them from `old` into `placed`
	fn patch_keyed_children_inner(
		&self,
		old: &mut [Option<Mounted<B>>],
		placed: &mut [Option<Mounted<B>>],
		new: &[VNode],
		parent: &B::Handle,
		end_anchor: Option<&B::Handle>,
	) -> Result<(), ReconcileError> {
		let mut start = 0;
		let mut old_end = old.len();
		let mut new_end = new.len();

		// Sync the common prefix
		while start < old_end && start < new_end {
			let Some(mounted) = old[start].take_if(|mounted| mounted.vnode.is_same_type(&new[start])) else {
				break;
			};
			self.patch_into(mounted, &new[start], parent, &mut placed[start])?;
			start += 1;
		}

		// Sync the common suffix
		while start < old_end && start < new_end {
			let Some(mounted) = old[old_end - 1].take_if(|mounted| mounted.vnode.is_same_type(&new[new_end - 1]))
			else {
				break;
			};
			self.patch_into(mounted, &new[new_end - 1], parent, &mut placed[new_end - 1])?;
			old_end -= 1;
			new_end -= 1;
		}

		// If only new nodes are left, mount them
		if start >= old_end {
			let anchor = self.anchor_at(placed, new_end, end_anchor)?;
			for idx in start..new_end {
				placed[idx] = Some(self.mount(new[idx].clone(), parent, anchor.as_ref())?);
			}
			return Ok(());
		}

		// If only old nodes are left, unmount them
		if start >= new_end {
			for mounted in old[start..old_end].iter_mut().filter_map(Option::take) {
				self.unmount(mounted, true);
			}
			return Ok(());
		}

		// Otherwise, match the remaining old nodes to the new ones by key
		let new_start = start;
		let duplicates = new[new_start..new_end]
			.iter()
			.filter_map(VNode::key)
			.duplicates()
			.collect::<Vec<_>>();
		if !duplicates.is_empty() {
			tracing::warn!(
				"Found duplicate keys among children, only the last child with each key will be patched: {}",
				duplicates.iter().format(", ")
			);
		}
		let key_to_new_idx = (new_start..new_end)
			.filter_map(|idx| Some((new[idx].key()?, idx)))
			.collect::<HashMap<&Key, usize>>();

		// For each remaining new node, the index of it's old node plus one, or `0` if it's new
		let mut new_to_old = vec![0_usize; new_end - new_start];
		let mut patched = 0;
		let mut moved = false;
		let mut max_new_idx = 0;
		for old_idx in start..old_end {
			let Some(mounted) = old[old_idx].take() else {
				continue;
			};
			if patched >= new_to_old.len() {
				self.unmount(mounted, true);
				continue;
			}

			let new_idx = match mounted.vnode.key() {
				Some(key) => key_to_new_idx.get(key).copied(),
				None => (new_start..new_end).find(|&idx| {
					new_to_old[idx - new_start] == 0 &&
						new[idx].key().is_none() && mounted.vnode.is_same_type(&new[idx])
				}),
			};
			let Some(new_idx) = new_idx.filter(|&idx| new_to_old[idx - new_start] == 0) else {
				self.unmount(mounted, true);
				continue;
			};

			new_to_old[new_idx - new_start] = old_idx + 1;
			match new_idx >= max_new_idx {
				true => max_new_idx = new_idx,
				false => moved = true,
			}
			self.patch_into(mounted, &new[new_idx], parent, &mut placed[new_idx])?;
			patched += 1;
		}

		// Then, from the back, mount the new nodes and move the nodes outside of
		// the longest increasing subsequence, since those are already in order.
		let stable = match moved {
			true => lis::longest_increasing_subsequence(&new_to_old),
			false => vec![],
		};
		let mut stable = stable.into_iter().rev().peekable();
		for (offset, &old_idx) in new_to_old.iter().enumerate().rev() {
			let new_idx = new_start + offset;
			let anchor = self.anchor_at(placed, new_idx + 1, end_anchor)?;

			if old_idx == 0 {
				placed[new_idx] = Some(self.mount(new[new_idx].clone(), parent, anchor.as_ref())?);
			} else if moved && stable.next_if_eq(&offset).is_none() {
				let mounted = placed[new_idx].as_ref().expect("Matched node wasn't placed");
				self.move_node(mounted, parent, anchor.as_ref())?;
			}
		}

		Ok(())
	}

	/// Patches `mounted` with `node` and places it into `slot`, even on error
	fn patch_into(
		&self,
		mut mounted: Mounted<B>,
		node: &VNode,
		parent: &B::Handle,
		slot: &mut Option<Mounted<B>>,
	) -> Result<(), ReconcileError> {
		let res = self.patch(&mut mounted, node.clone(), parent);
		*slot = Some(mounted);
		res
	}

	/// Returns the anchor to insert before, for a node placed before `idx`
	fn anchor_at(
		&self,
		placed: &[Option<Mounted<B>>],
		idx: usize,
		end_anchor: Option<&B::Handle>,
	) -> Result<Option<B::Handle>, ReconcileError> {
		match placed.get(idx) {
			Some(mounted) => {
				let mounted = mounted.as_ref().expect("Nodes after the current one should be placed");
				self.first_host(mounted).map(Some)
			},
			None => Ok(end_anchor.cloned()),
		}
	}
}
