//! Reconciler
//!
//! Mounts tree descriptions through a backend, and patches mounted trees to
//! match new descriptions.
//!
//! A mounted tree mirrors the description it was mounted from, keeping the
//! backend handle of each node. Fragments are delimited by two empty text
//! nodes, so they can be moved and inserted into like any other node.

// Modules
mod children;
#[cfg(test)]
mod tests;

// Imports
use {
	crate::{
		backend::Backend,
		component::Instance,
		error::ReconcileError,
		node::{Attrs, PatchFlags, VNode, VNodeKind},
	},
	core::{cell::RefCell, fmt, mem},
	std::rc::Rc,
};

/// Mounted node
pub struct Mounted<B: Backend> {
	/// Description this node was last patched with
	vnode: VNode,

	/// Handle.
	///
	/// For fragments, this is the start anchor.
	/// For components, this is `None`, since they're represented by their tree.
	handle: Option<B::Handle>,

	/// End anchor, for fragments
	end: Option<B::Handle>,

	/// Children
	children: Vec<Self>,

	/// Component instance
	instance: Option<Rc<Instance<B>>>,
}

impl<B: Backend> Mounted<B> {
	/// Returns the description this node was last patched with
	#[must_use]
	pub const fn vnode(&self) -> &VNode {
		&self.vnode
	}

	/// Returns the backend handle of this node.
	///
	/// For fragments, this is their start anchor, and for components, `None`.
	#[must_use]
	pub const fn handle(&self) -> Option<&B::Handle> {
		self.handle.as_ref()
	}

	/// Returns the mounted children of this node
	#[must_use]
	pub fn children(&self) -> &[Self] {
		&self.children
	}

	/// Creates a mounted node without children
	fn leaf(vnode: VNode, handle: B::Handle) -> Self {
		Self {
			vnode,
			handle: Some(handle),
			end: None,
			children: vec![],
			instance: None,
		}
	}

	/// Returns an error for a missing handle of this node
	fn missing_handle(&self) -> ReconcileError {
		ReconcileError::MissingHandle {
			kind: self.vnode.kind().name(),
		}
	}
}

impl<B: Backend> fmt::Debug for Mounted<B> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Mounted")
			.field("vnode", &self.vnode)
			.field("handle", &self.handle)
			.field("end", &self.end)
			.field("children", &self.children)
			.field("component", &self.instance.is_some())
			.finish()
	}
}

/// Reconciler
pub struct Reconciler<B> {
	/// Backend
	backend: Rc<RefCell<B>>,
}

impl<B> Reconciler<B> {
	/// Creates a new reconciler over a shared backend
	#[must_use]
	pub const fn new(backend: Rc<RefCell<B>>) -> Self {
		Self { backend }
	}

	/// Returns the backend
	#[must_use]
	pub const fn backend(&self) -> &Rc<RefCell<B>> {
		&self.backend
	}

	/// Uses the backend mutably.
	///
	/// The backend is only borrowed for the duration of `f`, so components
	/// may be mounted in between calls.
	fn with_backend<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&mut B) -> O,
	{
		let mut backend = self
			.backend
			.try_borrow_mut()
			.expect("Backend was borrowed while reconciling");
		f(&mut backend)
	}
}

impl<B: Backend + 'static> Reconciler<B> {
	/// Mounts a node into `parent`, before `anchor`, or at the end if `None`
	pub fn mount(&self, vnode: VNode, parent: &B::Handle, anchor: Option<&B::Handle>) -> Result<Mounted<B>, ReconcileError> {
		let mounted = match vnode.kind() {
			VNodeKind::Text(text) => {
				let handle = self.with_backend(|backend| {
					let handle = backend.create_text(text);
					backend.insert(&handle, parent, anchor);
					handle
				});
				Mounted::leaf(vnode.clone(), handle)
			},
			VNodeKind::Comment(text) => {
				let handle = self.with_backend(|backend| {
					let handle = backend.create_comment(text);
					backend.insert(&handle, parent, anchor);
					handle
				});
				Mounted::leaf(vnode.clone(), handle)
			},
			VNodeKind::Element { tag, attrs, children } => {
				let handle = self.with_backend(|backend| {
					let handle = backend.create_element(tag);
					for (name, value) in attrs {
						backend.set_attribute(&handle, name, value);
					}
					handle
				});

				// Note: Children are mounted before inserting, so the element is only
				//       inserted once it's complete.
				let children = self.mount_children(children, &handle, None)?;
				self.with_backend(|backend| backend.insert(&handle, parent, anchor));

				Mounted {
					vnode: vnode.clone(),
					handle: Some(handle),
					end: None,
					children,
					instance: None,
				}
			},
			VNodeKind::Fragment { children } => {
				let (start, end) = self.with_backend(|backend| {
					let start = backend.create_text("");
					let end = backend.create_text("");
					backend.insert(&start, parent, anchor);
					backend.insert(&end, parent, anchor);
					(start, end)
				});
				let children = self.mount_children(children, parent, Some(&end))?;

				Mounted {
					vnode: vnode.clone(),
					handle: Some(start),
					end: Some(end),
					children,
					instance: None,
				}
			},
			VNodeKind::Component { component, props } => {
				let instance = Instance::mount(self.clone(), component, props.clone(), parent, anchor)?;

				Mounted {
					vnode: vnode.clone(),
					handle: None,
					end: None,
					children: vec![],
					instance: Some(instance),
				}
			},
		};
		tracing::trace!(kind = vnode.kind().name(), "Mounted node");

		Ok(mounted)
	}

	/// Mounts several nodes, in order, before `anchor`
	fn mount_children(
		&self,
		children: &[VNode],
		parent: &B::Handle,
		anchor: Option<&B::Handle>,
	) -> Result<Vec<Mounted<B>>, ReconcileError> {
		children
			.iter()
			.map(|child| self.mount(child.clone(), parent, anchor))
			.collect()
	}

	/// Patches a mounted node to match `new`.
	///
	/// Nodes of a different type are unmounted, with `new` mounted in their place.
	pub fn patch(&self, old: &mut Mounted<B>, new: VNode, parent: &B::Handle) -> Result<(), ReconcileError> {
		if old.vnode.ptr_eq(&new) {
			return Ok(());
		}

		if !old.vnode.is_same_type(&new) {
			let anchor = self.next_host(old)?;
			let mounted = self.mount(new, parent, anchor.as_ref())?;
			let old = mem::replace(old, mounted);
			self.unmount(old, true);
			return Ok(());
		}

		if new.flags().contains(PatchFlags::STATIC) {
			old.vnode = new;
			return Ok(());
		}

		let Mounted {
			vnode: old_vnode,
			handle,
			end,
			children,
			instance,
		} = old;
		match (old_vnode.kind(), new.kind()) {
			(VNodeKind::Text(old_text), VNodeKind::Text(new_text)) |
			(VNodeKind::Comment(old_text), VNodeKind::Comment(new_text)) => {
				if old_text != new_text {
					let handle = handle.as_ref().ok_or(ReconcileError::MissingHandle {
						kind: new.kind().name(),
					})?;
					self.with_backend(|backend| backend.set_text(handle, new_text));
				}
			},
			(
				VNodeKind::Element { attrs: old_attrs, .. },
				VNodeKind::Element {
					attrs: new_attrs,
					children: new_children,
					..
				},
			) => {
				let handle = handle
					.clone()
					.ok_or(ReconcileError::MissingHandle { kind: "element" })?;
				if !new.flags().contains(PatchFlags::STATIC_ATTRS) {
					self.patch_attrs(&handle, old_attrs, new_attrs);
				}
				self.patch_children(children, new_children, new.flags(), &handle, None)?;
			},
			(VNodeKind::Fragment { .. }, VNodeKind::Fragment { children: new_children }) => {
				let end = end.clone().ok_or(ReconcileError::MissingHandle { kind: "fragment" })?;
				self.patch_children(children, new_children, new.flags(), parent, Some(&end))?;
			},
			(VNodeKind::Component { .. }, VNodeKind::Component { props, .. }) => {
				let instance = instance
					.as_ref()
					.ok_or(ReconcileError::MissingHandle { kind: "component" })?;
				instance.set_props(props.clone());
			},
			(old_kind, new_kind) => unreachable!(
				"Nodes of the same type had different kinds: {} and {}",
				old_kind.name(),
				new_kind.name()
			),
		}
		*old_vnode = new;

		Ok(())
	}

	/// Patches the attributes of an element
	fn patch_attrs(&self, handle: &B::Handle, old: &Attrs, new: &Attrs) {
		self.with_backend(|backend| {
			for (name, value) in new {
				if old.get(name) != Some(value) {
					backend.set_attribute(handle, name, value);
				}
			}
			for name in old.keys() {
				if !new.contains_key(name) {
					backend.remove_attribute(handle, name);
				}
			}
		});
	}

	/// Unmounts a node.
	///
	/// If `remove` is `false`, the node is expected to be removed along with
	/// an ancestor, so only components are torn down.
	pub fn unmount(&self, mounted: Mounted<B>, remove: bool) {
		let Mounted {
			vnode,
			handle,
			end,
			children,
			instance,
		} = mounted;
		if let Some(instance) = instance {
			instance.unmount(remove);
			return;
		}

		match vnode.kind() {
			VNodeKind::Element { .. } => {
				for child in children {
					self.unmount(child, false);
				}
				if let Some(handle) = handle.filter(|_| remove) {
					self.with_backend(|backend| backend.remove(&handle));
				}
			},
			VNodeKind::Fragment { .. } => {
				if let Some(start) = handle.filter(|_| remove) {
					self.with_backend(|backend| backend.remove(&start));
				}
				for child in children {
					self.unmount(child, remove);
				}
				if let Some(end) = end.filter(|_| remove) {
					self.with_backend(|backend| backend.remove(&end));
				}
			},
			VNodeKind::Text(_) | VNodeKind::Comment(_) | VNodeKind::Component { .. } => {
				if let Some(handle) = handle.filter(|_| remove) {
					self.with_backend(|backend| backend.remove(&handle));
				}
			},
		}
		tracing::trace!(kind = vnode.kind().name(), "Unmounted node");
	}

	/// Moves a mounted node into `parent`, before `anchor`, or at the end if `None`
	pub fn move_node(&self, mounted: &Mounted<B>, parent: &B::Handle, anchor: Option<&B::Handle>) -> Result<(), ReconcileError> {
		if let Some(instance) = &mounted.instance {
			return instance.move_to(parent, anchor);
		}

		let handle = mounted.handle.as_ref().ok_or_else(|| mounted.missing_handle())?;
		self.with_backend(|backend| backend.insert(handle, parent, anchor));
		if let VNodeKind::Fragment { .. } = mounted.vnode.kind() {
			for child in &mounted.children {
				self.move_node(child, parent, anchor)?;
			}
			let end = mounted.end.as_ref().ok_or_else(|| mounted.missing_handle())?;
			self.with_backend(|backend| backend.insert(end, parent, anchor));
		}

		Ok(())
	}

	/// Returns the first backend node of a mounted node
	pub(crate) fn first_host(&self, mounted: &Mounted<B>) -> Result<B::Handle, ReconcileError> {
		match &mounted.instance {
			Some(instance) => instance.first_host(),
			None => mounted.handle.clone().ok_or_else(|| mounted.missing_handle()),
		}
	}

	/// Returns the last backend node of a mounted node
	pub(crate) fn last_host(&self, mounted: &Mounted<B>) -> Result<B::Handle, ReconcileError> {
		match (&mounted.instance, mounted.vnode.kind()) {
			(Some(instance), _) => instance.last_host(),
			(None, VNodeKind::Fragment { .. }) => mounted.end.clone().ok_or_else(|| mounted.missing_handle()),
			(None, _) => mounted.handle.clone().ok_or_else(|| mounted.missing_handle()),
		}
	}

	/// Returns the backend node after a mounted node
	pub(crate) fn next_host(&self, mounted: &Mounted<B>) -> Result<Option<B::Handle>, ReconcileError> {
		let last = self.last_host(mounted)?;
		Ok(self.with_backend(|backend| backend.next_sibling_of(&last)))
	}

	/// Returns the backend parent of a mounted node
	pub(crate) fn parent_of(&self, mounted: &Mounted<B>) -> Result<B::Handle, ReconcileError> {
		let first = self.first_host(mounted)?;
		self.with_backend(|backend| backend.parent_of(&first))
			.ok_or(ReconcileError::MissingParent)
	}
}

impl<B> Clone for Reconciler<B> {
	fn clone(&self) -> Self {
		Self {
			backend: Rc::clone(&self.backend),
		}
	}
}

impl<B> fmt::Debug for Reconciler<B> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Reconciler").finish_non_exhaustive()
	}
}
