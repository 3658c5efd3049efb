//! Tree description
//!
//! Nodes are cheap to clone and compare by identity first, so re-using a
//! node from a previous render skips it entirely.

// Imports
use {
	crate::component::Component,
	core::fmt,
	indexmap::IndexMap,
	std::rc::Rc,
};

/// Node key.
///
/// Keyed children are matched by key instead of by position.
#[derive(PartialEq, Eq, Clone, Hash, Debug)]
#[derive(derive_more::Display)]
pub enum Key {
	/// Integer
	#[display("{_0}")]
	Int(i64),

	/// String
	#[display("{_0:?}")]
	Str(Rc<str>),
}

#[duplicate::duplicate_item(
	Ty;
	[i8];
	[i16];
	[i32];
	[i64];
	[u8];
	[u16];
	[u32];
)]
impl From<Ty> for Key {
	fn from(value: Ty) -> Self {
		Self::Int(i64::from(value))
	}
}

#[duplicate::duplicate_item(
	Ty;
	[&'_ str];
	[String];
	[Rc<str>];
)]
impl From<Ty> for Key {
	fn from(value: Ty) -> Self {
		Self::Str(value.into())
	}
}

/// Attribute value
#[derive(PartialEq, Eq, Clone, Hash, Debug)]
#[derive(derive_more::Display)]
pub enum AttrValue {
	/// String
	#[display("{_0}")]
	Str(Rc<str>),

	/// Integer
	#[display("{_0}")]
	Int(i64),

	/// Boolean.
	///
	/// Backends should treat `false` as the attribute being absent.
	#[display("{_0}")]
	Bool(bool),
}

#[duplicate::duplicate_item(
	Ty;
	[&'_ str];
	[String];
	[Rc<str>];
)]
impl From<Ty> for AttrValue {
	fn from(value: Ty) -> Self {
		Self::Str(value.into())
	}
}

#[duplicate::duplicate_item(
	Ty;
	[i8];
	[i16];
	[i32];
	[i64];
	[u8];
	[u16];
	[u32];
)]
impl From<Ty> for AttrValue {
	fn from(value: Ty) -> Self {
		Self::Int(i64::from(value))
	}
}

impl From<bool> for AttrValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

/// Attributes, in insertion order
pub type Attrs = IndexMap<Rc<str>, AttrValue>;

bitflags::bitflags! {
	/// Patch flags.
	///
	/// Hints that let the reconciler skip work.
	#[derive(PartialEq, Eq, Clone, Copy, Hash, Default, Debug)]
	pub struct PatchFlags: u8 {
		/// Node never changes, so the previously mounted subtree is re-used as-is
		const STATIC = 1 << 0;

		/// Attributes never change
		const STATIC_ATTRS = 1 << 1;

		/// Children are always diffed by key
		const KEYED = 1 << 2;

		/// Children are always diffed by position
		const UNKEYED = 1 << 3;
	}
}

/// Node kind
#[derive(PartialEq, Clone, Debug)]
pub enum VNodeKind {
	/// Text
	Text(Rc<str>),

	/// Comment, or placeholder
	Comment(Rc<str>),

	/// Element
	Element {
		/// Tag
		tag: Rc<str>,

		/// Attributes
		attrs: Attrs,

		/// Children
		children: Vec<VNode>,
	},

	/// Fragment
	Fragment {
		/// Children
		children: Vec<VNode>,
	},

	/// Component instance
	Component {
		/// Component
		component: Component,

		/// Props
		props: Attrs,
	},
}

impl VNodeKind {
	/// Returns the name of this kind
	#[must_use]
	pub const fn name(&self) -> &'static str {
		match self {
			Self::Text(_) => "text",
			Self::Comment(_) => "comment",
			Self::Element { .. } => "element",
			Self::Fragment { .. } => "fragment",
			Self::Component { .. } => "component",
		}
	}
}

/// Inner
#[derive(PartialEq, Clone, Debug)]
struct Inner {
	/// Kind
	kind: VNodeKind,

	/// Key
	key: Option<Key>,

	/// Patch flags
	flags: PatchFlags,
}

/// Node
#[derive(PartialEq, Clone)]
pub struct VNode {
	/// Inner
	inner: Rc<Inner>,
}

impl VNode {
	/// Creates a node from it's kind
	#[must_use]
	pub fn new(kind: VNodeKind) -> Self {
		Self {
			inner: Rc::new(Inner {
				kind,
				key: None,
				flags: PatchFlags::empty(),
			}),
		}
	}

	/// Creates a text node
	pub fn text(text: impl Into<Rc<str>>) -> Self {
		Self::new(VNodeKind::Text(text.into()))
	}

	/// Creates a comment node
	pub fn comment(text: impl Into<Rc<str>>) -> Self {
		Self::new(VNodeKind::Comment(text.into()))
	}

	/// Creates an element without attributes or children
	pub fn element(tag: impl Into<Rc<str>>) -> Self {
		Self::new(VNodeKind::Element {
			tag:      tag.into(),
			attrs:    Attrs::new(),
			children: vec![],
		})
	}

	/// Creates a fragment
	pub fn fragment<I>(children: I) -> Self
	where
		I: IntoIterator<Item = Self>,
	{
		Self::new(VNodeKind::Fragment {
			children: children.into_iter().collect(),
		})
	}

	/// Creates a component node without props
	#[must_use]
	pub fn component(component: &Component) -> Self {
		Self::new(VNodeKind::Component {
			component: component.clone(),
			props:     Attrs::new(),
		})
	}

	/// Adds a key to this node
	#[must_use]
	pub fn with_key(mut self, key: impl Into<Key>) -> Self {
		self.inner_mut().key = Some(key.into());
		self
	}

	/// Adds patch flags to this node
	#[must_use]
	pub fn with_flags(mut self, flags: PatchFlags) -> Self {
		self.inner_mut().flags |= flags;
		self
	}

	/// Adds an attribute to this node.
	///
	/// For components, this adds a prop.
	#[must_use]
	pub fn with_attr(mut self, name: impl Into<Rc<str>>, value: impl Into<AttrValue>) -> Self {
		match &mut self.inner_mut().kind {
			VNodeKind::Element { attrs, .. } | VNodeKind::Component { props: attrs, .. } => {
				attrs.insert(name.into(), value.into());
			},
			kind => tracing::warn!("Attempted to add an attribute to a {} node, ignoring", kind.name()),
		}

		self
	}

	/// Adds a child to this node
	#[must_use]
	pub fn with_child(self, child: Self) -> Self {
		self.with_children([child])
	}

	/// Adds several children to this node
	#[must_use]
	pub fn with_children<I>(mut self, new_children: I) -> Self
	where
		I: IntoIterator<Item = Self>,
	{
		match &mut self.inner_mut().kind {
			VNodeKind::Element { children, .. } | VNodeKind::Fragment { children } => children.extend(new_children),
			kind => tracing::warn!("Attempted to add children to a {} node, ignoring", kind.name()),
		}

		self
	}

	/// Returns the kind of this node
	#[must_use]
	pub fn kind(&self) -> &VNodeKind {
		&self.inner.kind
	}

	/// Returns the key of this node
	#[must_use]
	pub fn key(&self) -> Option<&Key> {
		self.inner.key.as_ref()
	}

	/// Returns the patch flags of this node
	#[must_use]
	pub fn flags(&self) -> PatchFlags {
		self.inner.flags
	}

	/// Returns the children of this node
	#[must_use]
	pub fn children(&self) -> &[Self] {
		match &self.inner.kind {
			VNodeKind::Element { children, .. } | VNodeKind::Fragment { children } => children,
			VNodeKind::Text(_) | VNodeKind::Comment(_) | VNodeKind::Component { .. } => &[],
		}
	}

	/// Returns if this node is the same instance as `other`
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// Returns if `other` describes the same node as this one, so it may be
	/// patched in place instead of being re-mounted.
	#[must_use]
	pub fn is_same_type(&self, other: &Self) -> bool {
		if self.inner.key != other.inner.key {
			return false;
		}

		match (&self.inner.kind, &other.inner.kind) {
			(VNodeKind::Text(_), VNodeKind::Text(_)) |
			(VNodeKind::Comment(_), VNodeKind::Comment(_)) |
			(VNodeKind::Fragment { .. }, VNodeKind::Fragment { .. }) => true,
			(VNodeKind::Element { tag: lhs, .. }, VNodeKind::Element { tag: rhs, .. }) => lhs == rhs,
			(VNodeKind::Component { component: lhs, .. }, VNodeKind::Component { component: rhs, .. }) => lhs == rhs,
			_ => false,
		}
	}

	/// Returns the inner node mutably, cloning it if shared
	fn inner_mut(&mut self) -> &mut Inner {
		Rc::make_mut(&mut self.inner)
	}
}

impl fmt::Debug for VNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut s = f.debug_struct("VNode");
		s.field("kind", &self.inner.kind);
		if let Some(key) = &self.inner.key {
			s.field("key", key);
		}
		if !self.inner.flags.is_empty() {
			s.field("flags", &self.inner.flags);
		}
		s.finish()
	}
}
