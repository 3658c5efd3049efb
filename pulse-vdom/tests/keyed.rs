//! Keyed children tests

// Imports
use {
	itertools::Itertools,
	pretty_assertions::assert_eq,
	proptest::prelude::*,
	pulse_vdom::{MemoryBackend, NodeId, OpCounts, PatchFlags, Renderer, VNode},
};

/// Creates a renderer with a root container
fn setup() -> (Renderer<MemoryBackend>, NodeId) {
	let mut backend = MemoryBackend::new();
	let root = backend.create_root("div");
	(Renderer::new(backend), root)
}

/// Creates a list with an item for each key
fn list<K: ToString>(keys: &[K]) -> VNode {
	VNode::element("ul").with_children(keys.iter().map(|key| {
		let key = key.to_string();
		VNode::element("li").with_key(key.as_str()).with_child(VNode::text(key))
	}))
}

/// Returns the expected html of a list
fn list_html<K: ToString>(keys: &[K]) -> String {
	format!(
		"<ul>{}</ul>",
		keys.iter().map(|key| format!("<li>{}</li>", key.to_string())).join("")
	)
}

/// Renders `vnode` and returns the operations it took
fn render(renderer: &Renderer<MemoryBackend>, root: NodeId, vnode: VNode) -> OpCounts {
	renderer.with_backend(MemoryBackend::clear_ops);
	renderer.render(&root, Some(vnode)).expect("Unable to render");
	renderer.with_backend(|backend| backend.op_counts())
}

/// Returns the html of the root's children
fn html(renderer: &Renderer<MemoryBackend>, root: NodeId) -> String {
	renderer.with_backend(|backend| backend.inner_html(root))
}

/// Returns the length of the longest increasing subsequence of `values`
fn lis_len(values: &[usize]) -> usize {
	let mut lens = vec![1_usize; values.len()];
	for idx in 0..values.len() {
		for before in 0..idx {
			if values[before] < values[idx] {
				lens[idx] = lens[idx].max(lens[before] + 1);
			}
		}
	}

	lens.into_iter().max().unwrap_or(0)
}

/// Ensures moving a single item only moves that item
#[test]
fn single_move() {
	let (renderer, root) = self::setup();
	self::render(&renderer, root, self::list(&["a", "b", "c", "d", "e"]));

	let ops = self::render(&renderer, root, self::list(&["a", "c", "d", "b", "e"]));
	assert_eq!(self::html(&renderer, root), self::list_html(&["a", "c", "d", "b", "e"]));
	assert_eq!(ops, OpCounts {
		moves: 1,
		..OpCounts::default()
	});
}

/// Ensures reversing a list keeps one item in place
#[test]
fn reverse() {
	let (renderer, root) = self::setup();
	self::render(&renderer, root, self::list(&[1, 2, 3, 4]));

	let ops = self::render(&renderer, root, self::list(&[4, 3, 2, 1]));
	assert_eq!(self::html(&renderer, root), self::list_html(&[4, 3, 2, 1]));
	assert_eq!(ops.moves, 3, "Expected all but one item to move: {ops:?}");
	assert_eq!(ops.creates + ops.removes, 0, "Items were re-created: {ops:?}");
}

/// Ensures new items are mounted and missing items are unmounted, without moving the rest
#[test]
fn add_remove() {
	let (renderer, root) = self::setup();
	self::render(&renderer, root, self::list(&["a", "b", "c"]));

	let ops = self::render(&renderer, root, self::list(&["d", "a", "c", "e"]));
	assert_eq!(self::html(&renderer, root), self::list_html(&["d", "a", "c", "e"]));
	assert_eq!(ops, OpCounts {
		creates: 4,
		inserts: 4,
		removes: 1,
		..OpCounts::default()
	});

	let ops = self::render(&renderer, root, self::list::<&str>(&[]));
	assert_eq!(self::html(&renderer, root), "<ul></ul>");
	assert_eq!(ops.removes, 4, "Expected every item to be removed: {ops:?}");
	assert_eq!(
		renderer.with_backend(|backend| backend.node_count()),
		2,
		"Removed items weren't freed"
	);
}

/// Ensures items are matched by key even if their position changes
#[test]
fn identity() {
	let (renderer, root) = self::setup();
	self::render(&renderer, root, self::list(&["a", "b", "c"]));
	let handles = |renderer: &Renderer<MemoryBackend>| {
		renderer.with_root(&root, |list| {
			list.expect("List should be rendered")
				.children()
				.iter()
				.map(|item| (item.vnode().key().cloned(), item.handle().copied()))
				.collect::<Vec<_>>()
		})
	};
	let before = handles(&renderer);

	self::render(&renderer, root, self::list(&["c", "a", "b"]));
	let after = handles(&renderer);
	for (key, handle) in &after {
		assert!(
			before.contains(&(key.clone(), *handle)),
			"Item {key:?} was given a new node: {before:?} -> {after:?}"
		);
	}
}

/// Ensures duplicate keys still render every child, in order
#[test]
fn duplicate_keys() {
	let (renderer, root) = self::setup();
	self::render(&renderer, root, self::list(&["a", "b", "c"]));

	self::render(&renderer, root, self::list(&["c", "a", "a"]));
	assert_eq!(self::html(&renderer, root), self::list_html(&["c", "a", "a"]));

	self::render(&renderer, root, self::list(&["a", "b", "c"]));
	assert_eq!(self::html(&renderer, root), self::list_html(&["a", "b", "c"]));
	assert_eq!(
		renderer.with_backend(|backend| backend.node_count()),
		8,
		"Unmatched duplicates weren't freed"
	);
}

/// Ensures the `KEYED` flag diffs unkeyed children by type
#[test]
fn keyed_flag_without_keys() {
	let (renderer, root) = self::setup();
	let node = |children: Vec<VNode>| VNode::element("div").with_flags(PatchFlags::KEYED).with_children(children);
	self::render(
		&renderer,
		root,
		node(vec![VNode::text("a"), VNode::element("hr"), VNode::text("b")]),
	);

	self::render(&renderer, root, node(vec![VNode::element("hr"), VNode::text("a")]));
	assert_eq!(self::html(&renderer, root), "<div><hr></hr>a</div>");
}

proptest! {
	/// Ensures any permutation is rendered correctly with as few moves as possible
	#[test]
	fn permutation(keys in (0_usize..16).prop_flat_map(|len| Just((0..len).collect::<Vec<_>>()).prop_shuffle())) {
		let (renderer, root) = self::setup();
		let initial = (0..keys.len()).collect::<Vec<_>>();
		self::render(&renderer, root, self::list(&initial));

		let ops = self::render(&renderer, root, self::list(&keys));
		prop_assert_eq!(self::html(&renderer, root), self::list_html(&keys));
		prop_assert_eq!(ops.creates + ops.removes, 0, "Items were re-created: {:?}", ops);

		let max_moves = keys.len() - self::lis_len(&keys);
		prop_assert!(ops.moves <= max_moves, "Expected at most {} moves, found {:?}", max_moves, ops);
	}

	/// Ensures switching between any two lists renders the new one, and re-rendering it does nothing
	#[test]
	fn random_lists(
		old in prop::sample::subsequence((0_u32..20).collect::<Vec<_>>(), 0..12).prop_shuffle(),
		new in prop::sample::subsequence((0_u32..20).collect::<Vec<_>>(), 0..12).prop_shuffle(),
	) {
		let (renderer, root) = self::setup();
		self::render(&renderer, root, self::list(&old));

		self::render(&renderer, root, self::list(&new));
		prop_assert_eq!(self::html(&renderer, root), self::list_html(&new));

		let ops = self::render(&renderer, root, self::list(&new));
		prop_assert_eq!(ops, OpCounts::default());
	}
}
