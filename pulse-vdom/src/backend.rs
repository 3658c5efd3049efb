//! Render backend
//!
//! The reconciler only touches the output medium through this trait.

// Modules
pub mod memory;

// Exports
pub use self::memory::{MemoryBackend, NodeId, Op, OpCounts};

// Imports
use {
	crate::node::AttrValue,
	core::{fmt, hash::Hash},
};

/// Render backend
pub trait Backend {
	/// Node handle
	type Handle: Clone + Eq + Hash + fmt::Debug + 'static;

	/// Creates an element
	fn create_element(&mut self, tag: &str) -> Self::Handle;

	/// Creates a text node
	fn create_text(&mut self, text: &str) -> Self::Handle;

	/// Creates a comment node
	fn create_comment(&mut self, text: &str) -> Self::Handle;

	/// Sets the text of a text or comment node
	fn set_text(&mut self, handle: &Self::Handle, text: &str);

	/// Sets an attribute of an element
	fn set_attribute(&mut self, handle: &Self::Handle, name: &str, value: &AttrValue);

	/// Removes an attribute of an element
	fn remove_attribute(&mut self, handle: &Self::Handle, name: &str);

	/// Inserts a node into `parent`, before `anchor`, or at the end if `None`.
	///
	/// If the node already has a parent, it's moved.
	fn insert(&mut self, handle: &Self::Handle, parent: &Self::Handle, anchor: Option<&Self::Handle>);

	/// Removes a node from it's parent
	fn remove(&mut self, handle: &Self::Handle);

	/// Returns the parent of a node
	fn parent_of(&self, handle: &Self::Handle) -> Option<Self::Handle>;

	/// Returns the node after this one in it's parent
	fn next_sibling_of(&self, handle: &Self::Handle) -> Option<Self::Handle>;
}
