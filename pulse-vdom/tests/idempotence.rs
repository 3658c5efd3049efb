//! Idempotence tests

// Imports
use {
	core::cell::Cell,
	pretty_assertions::assert_eq,
	pulse_vdom::{Component, MemoryBackend, OpCounts, PatchFlags, Renderer, VNode},
};

thread_local! {
	/// Number of times the badge was rendered
	static BADGE_RENDERS: Cell<usize> = const { Cell::new(0) };
}

/// Creates the badge component
fn badge() -> Component {
	Component::new("Badge", |props| {
		let props = props.clone();
		move || {
			BADGE_RENDERS.set(BADGE_RENDERS.get() + 1);
			let label = props.get("label").map(|label| label.to_string()).unwrap_or_default();
			VNode::element("span").with_attr("class", "badge").with_child(VNode::text(label))
		}
	})
}

/// Creates a tree using every kind of node
fn tree(badge: &Component) -> VNode {
	VNode::element("main").with_attr("id", "app").with_children([
		VNode::comment("header"),
		VNode::element("h1")
			.with_flags(PatchFlags::STATIC)
			.with_child(VNode::text("Title")),
		VNode::element("ul").with_children((0..5).map(|idx| {
			VNode::element("li")
				.with_key(idx)
				.with_attr("data-idx", idx)
				.with_attr("hidden", idx % 2 == 0)
				.with_child(VNode::text(format!("Item {idx}")))
		})),
		VNode::fragment([VNode::text("a"), VNode::element("br"), VNode::text("b")]),
		VNode::component(badge).with_attr("label", "new"),
	])
}

/// Ensures re-rendering an equal tree doesn't touch the backend
#[test]
fn equal_tree() {
	let mut backend = MemoryBackend::new();
	let root = backend.create_root("body");
	let renderer = Renderer::new(backend);
	let badge = self::badge();

	renderer.render(&root, Some(self::tree(&badge))).expect("Unable to render");
	let html = renderer.with_backend(|backend| backend.inner_html(root));
	assert_eq!(BADGE_RENDERS.get(), 1);

	for _ in 0..3 {
		renderer.with_backend(MemoryBackend::clear_ops);
		renderer.render(&root, Some(self::tree(&badge))).expect("Unable to render");
		assert_eq!(renderer.with_backend(|backend| backend.op_counts()), OpCounts::default());
	}
	assert_eq!(renderer.with_backend(|backend| backend.inner_html(root)), html);
	assert_eq!(BADGE_RENDERS.get(), 1, "Component was re-rendered with equal props");
}

/// Ensures re-rendering after a change only applies that change
#[test]
fn single_change() {
	let mut backend = MemoryBackend::new();
	let root = backend.create_root("body");
	let renderer = Renderer::new(backend);
	let badge = self::badge();
	renderer.render(&root, Some(self::tree(&badge))).expect("Unable to render");

	renderer.with_backend(MemoryBackend::clear_ops);
	let changed = self::tree(&badge).with_attr("id", "other");
	renderer.render(&root, Some(changed)).expect("Unable to render");
	assert_eq!(renderer.with_backend(|backend| backend.op_counts()), OpCounts {
		attrs: 1,
		..OpCounts::default()
	});
}
