//! Virtual tree for `pulse`
//!
//! A [`VNode`] is an immutable description of a tree. The [`Reconciler`]
//! mounts descriptions through a [`Backend`] and, on every update, patches
//! the mounted tree with the minimal set of edits needed to match the new
//! description. Keyed children are moved according to the longest increasing
//! subsequence of their previous positions, so only the nodes outside of it
//! are moved.
//!
//! [`Component`]s render their own tree inside an effect of `pulse-reactive`,
//! and are re-rendered by the scheduler whenever anything they read changes.

// Modules
pub mod backend;
pub mod component;
pub mod error;
pub mod lis;
pub mod node;
pub mod reconcile;
pub mod renderer;

// Exports
pub use self::{
	backend::{Backend, MemoryBackend, NodeId, Op, OpCounts},
	component::{Component, Props, on_mounted, on_unmounted, on_updated},
	error::{ReconcileError, RenderError},
	node::{AttrValue, Attrs, Key, PatchFlags, VNode, VNodeKind},
	reconcile::{Mounted, Reconciler},
	renderer::Renderer,
};
