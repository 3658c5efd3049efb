//! Tests

// Imports
use {
	crate::{
		backend::{MemoryBackend, NodeId, OpCounts},
		node::{PatchFlags, VNode},
		renderer::Renderer,
	},
	pretty_assertions::assert_eq,
};

/// Creates a renderer with a root container
fn setup() -> (Renderer<MemoryBackend>, NodeId) {
	let mut backend = MemoryBackend::new();
	let root = backend.create_root("div");
	(Renderer::new(backend), root)
}

/// Renders `vnode` and returns the operations it took
fn render(renderer: &Renderer<MemoryBackend>, root: NodeId, vnode: Option<VNode>) -> OpCounts {
	renderer.with_backend(MemoryBackend::clear_ops);
	renderer.render(&root, vnode).expect("Unable to render");
	renderer.with_backend(|backend| backend.op_counts())
}

/// Returns the html of the root's children
fn html(renderer: &Renderer<MemoryBackend>, root: NodeId) -> String {
	renderer.with_backend(|backend| backend.inner_html(root))
}

/// Ensures text is updated in place
#[test]
fn text_update() {
	let (renderer, root) = self::setup();
	self::render(&renderer, root, Some(VNode::element("p").with_child(VNode::text("a"))));
	assert_eq!(self::html(&renderer, root), "<p>a</p>");

	let ops = self::render(&renderer, root, Some(VNode::element("p").with_child(VNode::text("b"))));
	assert_eq!(self::html(&renderer, root), "<p>b</p>");
	assert_eq!(ops, OpCounts {
		texts: 1,
		..OpCounts::default()
	});
}

/// Ensures only changed attributes are written
#[test]
fn attrs_diff() {
	let (renderer, root) = self::setup();
	self::render(
		&renderer,
		root,
		Some(VNode::element("a").with_attr("class", "x").with_attr("id", "y").with_attr("href", "/")),
	);

	let ops = self::render(
		&renderer,
		root,
		Some(VNode::element("a").with_attr("class", "z").with_attr("href", "/").with_attr("title", "t")),
	);
	assert_eq!(self::html(&renderer, root), r#"<a class="z" href="/" title="t"></a>"#);
	assert_eq!(ops.attrs, 3, "Expected `class` and `title` to be set and `id` removed: {ops:?}");
	assert_eq!(ops.edits(), 3, "Expected only attribute writes: {ops:?}");
}

/// Ensures fragments are moved along with all of their nodes
#[test]
fn fragment_move() {
	let (renderer, root) = self::setup();
	let pair = || VNode::fragment([VNode::text("a"), VNode::text("b")]).with_key(1);
	self::render(
		&renderer,
		root,
		Some(VNode::element("ul").with_children([VNode::text("c").with_key(2), pair()])),
	);
	assert_eq!(self::html(&renderer, root), "<ul>cab</ul>");

	let ops = self::render(
		&renderer,
		root,
		Some(VNode::element("ul").with_children([pair(), VNode::text("c").with_key(2)])),
	);
	assert_eq!(self::html(&renderer, root), "<ul>abc</ul>");
	assert_eq!(ops.moves, 4, "Expected both anchors and both children to move: {ops:?}");
	assert_eq!(ops.edits(), 4, "Expected only moves: {ops:?}");
}

/// Ensures nodes of a different type are replaced in place
#[test]
fn type_change() {
	let (renderer, root) = self::setup();
	self::render(
		&renderer,
		root,
		Some(VNode::fragment([VNode::text("x"), VNode::element("div"), VNode::text("y")])),
	);
	assert_eq!(self::html(&renderer, root), "x<div></div>y");

	let ops = self::render(
		&renderer,
		root,
		Some(VNode::fragment([
			VNode::text("x"),
			VNode::element("span"),
			VNode::text("y"),
		])),
	);
	assert_eq!(self::html(&renderer, root), "x<span></span>y");
	assert_eq!(ops, OpCounts {
		creates: 1,
		inserts: 1,
		removes: 1,
		..OpCounts::default()
	});
}

/// Ensures static nodes are never patched
#[test]
fn static_reuse() {
	let (renderer, root) = self::setup();
	let header = |title: &str| {
		VNode::element("h1")
			.with_child(VNode::text(title))
			.with_flags(PatchFlags::STATIC)
	};
	self::render(&renderer, root, Some(header("a")));

	let ops = self::render(&renderer, root, Some(header("b")));
	assert_eq!(self::html(&renderer, root), "<h1>a</h1>", "Static node was patched");
	assert_eq!(ops.edits(), 0, "Static node was patched: {ops:?}");
}

/// Ensures re-rendering the same node does nothing
#[test]
fn same_node() {
	let (renderer, root) = self::setup();
	let node = VNode::element("ul").with_children((0..10).map(|idx| VNode::text(idx.to_string()).with_key(idx)));
	self::render(&renderer, root, Some(node.clone()));

	let ops = self::render(&renderer, root, Some(node));
	assert_eq!(ops, OpCounts::default());
}

/// Ensures rendering nothing removes and frees everything
#[test]
fn unmount() {
	let (renderer, root) = self::setup();
	self::render(
		&renderer,
		root,
		Some(VNode::element("div").with_children([
			VNode::fragment([VNode::text("a"), VNode::comment("b")]),
			VNode::element("span").with_child(VNode::text("c")),
		])),
	);

	self::render(&renderer, root, None);
	assert_eq!(self::html(&renderer, root), "");
	assert_eq!(
		renderer.with_backend(|backend| backend.node_count()),
		1,
		"Nodes were leaked"
	);
	renderer.with_root(&root, |mounted| assert!(mounted.is_none(), "Root tree was kept"));
}
