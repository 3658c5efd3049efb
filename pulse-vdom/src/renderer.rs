//! Renderer
//!
//! Renders trees into containers of a backend, keeping the tree last rendered
//! into each container so the next render only patches it.

// Imports
use {
	crate::{
		backend::Backend,
		error::RenderError,
		node::VNode,
		reconcile::{Mounted, Reconciler},
	},
	core::{cell::RefCell, fmt},
	pulse_reactive::scheduler,
	std::{collections::HashMap, rc::Rc},
};

/// Renderer
pub struct Renderer<B: Backend> {
	/// Reconciler
	reconciler: Reconciler<B>,

	/// Tree rendered into each container
	roots: RefCell<HashMap<B::Handle, Mounted<B>>>,
}

impl<B: Backend + 'static> Renderer<B> {
	/// Creates a new renderer
	#[must_use]
	pub fn new(backend: B) -> Self {
		Self::from_shared(Rc::new(RefCell::new(backend)))
	}

	/// Creates a new renderer over a shared backend
	#[must_use]
	pub fn from_shared(backend: Rc<RefCell<B>>) -> Self {
		Self {
			reconciler: Reconciler::new(backend),
			roots:      RefCell::new(HashMap::new()),
		}
	}

	/// Returns the reconciler
	#[must_use]
	pub const fn reconciler(&self) -> &Reconciler<B> {
		&self.reconciler
	}

	/// Uses the backend.
	///
	/// # Panics
	/// Panics if called while reconciling.
	pub fn with_backend<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&mut B) -> O,
	{
		let mut backend = self
			.reconciler
			.backend()
			.try_borrow_mut()
			.expect("Cannot use the backend while reconciling");
		f(&mut backend)
	}

	/// Renders `vnode` into `container`.
	///
	/// Patches the tree previously rendered into it, if any. Rendering `None`
	/// unmounts it. The whole render is batched, so any update it causes is
	/// flushed before returning.
	pub fn render(&self, container: &B::Handle, vnode: Option<VNode>) -> Result<(), RenderError> {
		let prev = self.roots.borrow_mut().remove(container);
		let res = scheduler::batch(|| match (prev, vnode) {
			(None, None) => Ok(()),
			(Some(prev), None) => {
				self.reconciler.unmount(prev, true);
				Ok(())
			},
			(None, Some(vnode)) => {
				let mounted = self.reconciler.mount(vnode, container, None)?;
				self.roots.borrow_mut().insert(container.clone(), mounted);
				Ok(())
			},
			(Some(mut prev), Some(vnode)) => {
				let res = self.reconciler.patch(&mut prev, vnode, container);
				self.roots.borrow_mut().insert(container.clone(), prev);
				res
			},
		});
		tracing::debug!(?container, "Rendered");

		res??;
		Ok(())
	}

	/// Returns the tree rendered into `container`, if any
	pub fn with_root<F, O>(&self, container: &B::Handle, f: F) -> O
	where
		F: FnOnce(Option<&Mounted<B>>) -> O,
	{
		let roots = self.roots.borrow();
		f(roots.get(container))
	}

	/// Unmounts every tree rendered
	pub fn clear(&self) -> Result<(), RenderError> {
		let containers = self.roots.borrow().keys().cloned().collect::<Vec<_>>();
		for container in containers {
			self.render(&container, None)?;
		}

		Ok(())
	}
}

impl<B: Backend> fmt::Debug for Renderer<B> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Renderer")
			.field("roots", &self.roots.borrow().len())
			.finish_non_exhaustive()
	}
}
