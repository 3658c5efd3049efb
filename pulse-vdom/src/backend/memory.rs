//! In-memory backend
//!
//! Keeps the rendered tree in an arena, and logs every operation applied to
//! it, so renders can be inspected without any real output medium.

// Imports
use {
	super::Backend,
	crate::node::AttrValue,
	core::fmt::Write,
	indexmap::IndexMap,
	slotmap::SlotMap,
};

slotmap::new_key_type! {
	/// Node id
	pub struct NodeId;
}

/// Node kind
#[derive(Clone, Debug)]
enum NodeKind {
	/// Element
	Element {
		/// Tag
		tag: String,

		/// Attributes
		attrs: IndexMap<String, AttrValue>,
	},

	/// Text
	Text(String),

	/// Comment
	Comment(String),
}

/// Node
#[derive(Clone, Debug)]
struct Node {
	/// Kind
	kind: NodeKind,

	/// Parent
	parent: Option<NodeId>,

	/// Children
	children: Vec<NodeId>,
}

/// Operation
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Op {
	/// Created a node
	Create(NodeId),

	/// Inserted a detached node
	Insert(NodeId),

	/// Moved an attached node
	Move(NodeId),

	/// Removed a node
	Remove(NodeId),

	/// Set the text of a node
	SetText(NodeId, String),

	/// Set an attribute
	SetAttr(NodeId, String),

	/// Removed an attribute
	RemoveAttr(NodeId, String),
}

/// Number of operations applied, per kind
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub struct OpCounts {
	/// Created nodes
	pub creates: usize,

	/// Inserted nodes
	pub inserts: usize,

	/// Moved nodes
	pub moves: usize,

	/// Removed nodes
	pub removes: usize,

	/// Text writes
	pub texts: usize,

	/// Attribute writes and removals
	pub attrs: usize,
}

impl OpCounts {
	/// Returns the total number of operations that changed the tree.
	///
	/// Creating a node isn't counted, since it isn't visible until inserted.
	#[must_use]
	pub const fn edits(&self) -> usize {
		self.inserts + self.moves + self.removes + self.texts + self.attrs
	}
}

/// In-memory backend
#[derive(Clone, Default, Debug)]
pub struct MemoryBackend {
	/// Nodes
	nodes: SlotMap<NodeId, Node>,

	/// Operations applied
	ops: Vec<Op>,
}

impl MemoryBackend {
	/// Creates a new, empty, backend
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a detached element to render into.
	///
	/// Doesn't log any operation.
	pub fn create_root(&mut self, tag: &str) -> NodeId {
		self.add_node(NodeKind::Element {
			tag:   tag.to_owned(),
			attrs: IndexMap::new(),
		})
	}

	/// Returns all operations applied since the last [`Self::clear_ops`]
	#[must_use]
	pub fn ops(&self) -> &[Op] {
		&self.ops
	}

	/// Clears the operation log
	pub fn clear_ops(&mut self) {
		self.ops.clear();
	}

	/// Returns the number of operations applied, per kind
	#[must_use]
	pub fn op_counts(&self) -> OpCounts {
		self.ops.iter().fold(OpCounts::default(), |mut counts, op| {
			match op {
				Op::Create(_) => counts.creates += 1,
				Op::Insert(_) => counts.inserts += 1,
				Op::Move(_) => counts.moves += 1,
				Op::Remove(_) => counts.removes += 1,
				Op::SetText(..) => counts.texts += 1,
				Op::SetAttr(..) | Op::RemoveAttr(..) => counts.attrs += 1,
			}
			counts
		})
	}

	/// Returns the number of nodes alive, including detached ones
	#[must_use]
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Returns the children of a node
	#[must_use]
	pub fn children_of(&self, node: NodeId) -> &[NodeId] {
		match self.nodes.get(node) {
			Some(node) => &node.children,
			None => &[],
		}
	}

	/// Returns the text of a text or comment node
	#[must_use]
	pub fn text_of(&self, node: NodeId) -> Option<&str> {
		match &self.nodes.get(node)?.kind {
			NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
			NodeKind::Element { .. } => None,
		}
	}

	/// Serializes a node and it's children
	#[must_use]
	pub fn to_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		self.write_html(node, &mut html);
		html
	}

	/// Serializes the children of a node
	#[must_use]
	pub fn inner_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		for &child in self.children_of(node) {
			self.write_html(child, &mut html);
		}
		html
	}

	/// Writes the html of a node
	fn write_html(&self, node: NodeId, html: &mut String) {
		let Some(node) = self.nodes.get(node) else {
			return;
		};

		match &node.kind {
			NodeKind::Element { tag, attrs } => {
				html.push('<');
				html.push_str(tag);
				for (name, value) in attrs {
					match value {
						AttrValue::Bool(false) => (),
						AttrValue::Bool(true) => write!(html, " {name}").expect("Writing to a string can't fail"),
						value => write!(html, " {name}=\"{value}\"").expect("Writing to a string can't fail"),
					}
				}
				html.push('>');
				for &child in &node.children {
					self.write_html(child, html);
				}
				write!(html, "</{tag}>").expect("Writing to a string can't fail");
			},
			NodeKind::Text(text) => html.push_str(text),
			NodeKind::Comment(text) => write!(html, "<!--{text}-->").expect("Writing to a string can't fail"),
		}
	}

	/// Adds a node to the arena
	fn add_node(&mut self, kind: NodeKind) -> NodeId {
		self.nodes.insert(Node {
			kind,
			parent: None,
			children: vec![],
		})
	}

	/// Creates a node, logging it
	fn create(&mut self, kind: NodeKind) -> NodeId {
		let node = self.add_node(kind);
		self.ops.push(Op::Create(node));
		node
	}

	/// Detaches a node from it's parent
	fn detach(&mut self, node: NodeId) {
		let Some(parent) = self.nodes.get_mut(node).and_then(|node| node.parent.take()) else {
			return;
		};
		if let Some(parent) = self.nodes.get_mut(parent) {
			parent.children.retain(|&child| child != node);
		}
	}

	/// Frees a node and all it's children
	fn free(&mut self, node: NodeId) {
		let Some(node) = self.nodes.remove(node) else {
			return;
		};
		for child in node.children {
			self.free(child);
		}
	}
}

impl Backend for MemoryBackend {
	type Handle = NodeId;

	fn create_element(&mut self, tag: &str) -> Self::Handle {
		self.create(NodeKind::Element {
			tag:   tag.to_owned(),
			attrs: IndexMap::new(),
		})
	}

	fn create_text(&mut self, text: &str) -> Self::Handle {
		self.create(NodeKind::Text(text.to_owned()))
	}

	fn create_comment(&mut self, text: &str) -> Self::Handle {
		self.create(NodeKind::Comment(text.to_owned()))
	}

	fn set_text(&mut self, handle: &Self::Handle, text: &str) {
		let Some(node) = self.nodes.get_mut(*handle) else {
			tracing::warn!(?handle, "Attempted to set the text of a missing node");
			return;
		};
		match &mut node.kind {
			NodeKind::Text(cur_text) | NodeKind::Comment(cur_text) => text.clone_into(cur_text),
			NodeKind::Element { .. } => {
				tracing::warn!(?handle, "Attempted to set the text of an element");
				return;
			},
		}
		self.ops.push(Op::SetText(*handle, text.to_owned()));
	}

	fn set_attribute(&mut self, handle: &Self::Handle, name: &str, value: &AttrValue) {
		let Some(NodeKind::Element { attrs, .. }) = self.nodes.get_mut(*handle).map(|node| &mut node.kind) else {
			tracing::warn!(?handle, "Attempted to set an attribute of a node that isn't an element");
			return;
		};
		attrs.insert(name.to_owned(), value.clone());
		self.ops.push(Op::SetAttr(*handle, name.to_owned()));
	}

	fn remove_attribute(&mut self, handle: &Self::Handle, name: &str) {
		let Some(NodeKind::Element { attrs, .. }) = self.nodes.get_mut(*handle).map(|node| &mut node.kind) else {
			tracing::warn!(?handle, "Attempted to remove an attribute of a node that isn't an element");
			return;
		};
		if attrs.shift_remove(name).is_some() {
			self.ops.push(Op::RemoveAttr(*handle, name.to_owned()));
		}
	}

	fn insert(&mut self, handle: &Self::Handle, parent: &Self::Handle, anchor: Option<&Self::Handle>) {
		let node = *handle;
		let Some(was_attached) = self.nodes.get(node).map(|node| node.parent.is_some()) else {
			tracing::warn!(?handle, "Attempted to insert a missing node");
			return;
		};
		if !self.nodes.contains_key(*parent) {
			tracing::warn!(?parent, "Attempted to insert into a missing node");
			return;
		}

		self.detach(node);
		let siblings = &mut self.nodes[*parent].children;
		let idx = anchor
			.and_then(|anchor| siblings.iter().position(|sibling| sibling == anchor))
			.unwrap_or(siblings.len());
		siblings.insert(idx, node);
		self.nodes[node].parent = Some(*parent);

		self.ops.push(match was_attached {
			true => Op::Move(node),
			false => Op::Insert(node),
		});
	}

	fn remove(&mut self, handle: &Self::Handle) {
		if !self.nodes.contains_key(*handle) {
			return;
		}

		self.detach(*handle);
		self.free(*handle);
		self.ops.push(Op::Remove(*handle));
	}

	fn parent_of(&self, handle: &Self::Handle) -> Option<Self::Handle> {
		self.nodes.get(*handle)?.parent
	}

	fn next_sibling_of(&self, handle: &Self::Handle) -> Option<Self::Handle> {
		let parent = self.nodes.get(*handle)?.parent?;
		let siblings = &self.nodes.get(parent)?.children;
		let idx = siblings.iter().position(|sibling| sibling == handle)?;
		siblings.get(idx + 1).copied()
	}
}

#[cfg(test)]
mod tests {
	use {super::*, pretty_assertions::assert_eq};

	/// Ensures inserting an attached node counts as a move
	#[test]
	fn insert_move() {
		let mut backend = MemoryBackend::new();
		let root = backend.create_root("ul");
		let a = backend.create_text("a");
		let b = backend.create_text("b");
		backend.insert(&a, &root, None);
		backend.insert(&b, &root, None);
		assert_eq!(backend.inner_html(root), "ab");

		backend.insert(&b, &root, Some(&a));
		assert_eq!(backend.inner_html(root), "ba");
		assert_eq!(backend.op_counts(), OpCounts {
			creates: 2,
			inserts: 2,
			moves: 1,
			..OpCounts::default()
		});
		assert_eq!(backend.next_sibling_of(&b), Some(a));
		assert_eq!(backend.next_sibling_of(&a), None);
	}

	/// Ensures removing a node frees all it's children
	#[test]
	fn remove_frees() {
		let mut backend = MemoryBackend::new();
		let root = backend.create_root("div");
		let span = backend.create_element("span");
		let text = backend.create_text("x");
		backend.insert(&text, &span, None);
		backend.insert(&span, &root, None);
		assert_eq!(backend.node_count(), 3);

		backend.remove(&span);
		assert_eq!(backend.node_count(), 1, "Children weren't freed");
		assert_eq!(backend.inner_html(root), "");
	}

	/// Ensures elements are serialized with their attributes
	#[test]
	fn html() {
		let mut backend = MemoryBackend::new();
		let root = backend.create_root("div");
		let input = backend.create_element("input");
		backend.set_attribute(&input, "type", &AttrValue::from("checkbox"));
		backend.set_attribute(&input, "checked", &AttrValue::Bool(true));
		backend.set_attribute(&input, "disabled", &AttrValue::Bool(false));
		backend.insert(&input, &root, None);
		let comment = backend.create_comment("if");
		backend.insert(&comment, &root, None);

		assert_eq!(
			backend.to_html(root),
			r#"<div><input type="checkbox" checked></input><!--if--></div>"#
		);
	}
}
