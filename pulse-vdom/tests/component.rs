//! Component tests

// Imports
use {
	core::cell::RefCell,
	pretty_assertions::assert_eq,
	pulse_reactive::{Effect, Observable, SignalGet, SignalSet, batch, world},
	pulse_vdom::{
		AttrValue,
		Component,
		MemoryBackend,
		NodeId,
		Renderer,
		VNode,
		on_mounted,
		on_unmounted,
		on_updated,
	},
};

thread_local! {
	/// Order in which things ran
	static ORDER: RefCell<Vec<String>> = const { RefCell::new(vec![]) };
}

/// Logs `event` to the order
fn log(event: impl Into<String>) {
	ORDER.with_borrow_mut(|order| order.push(event.into()));
}

/// Takes the order
fn take_order() -> Vec<String> {
	ORDER.take()
}

/// Creates a renderer with a root container
fn setup() -> (Renderer<MemoryBackend>, NodeId) {
	let mut backend = MemoryBackend::new();
	let root = backend.create_root("div");
	(Renderer::new(backend), root)
}

/// Returns the html of the root's children
fn html(renderer: &Renderer<MemoryBackend>, root: NodeId) -> String {
	renderer.with_backend(|backend| backend.inner_html(root))
}

/// Creates a component that renders `count`
fn counter(count: &Observable<usize>) -> Component {
	let count = count.clone();
	Component::new("Counter", move |_| {
		let count = count.clone();
		move || {
			self::log("render");
			VNode::text(count.get().to_string())
		}
	})
}

/// Ensures components re-render when anything they read changes
#[test]
fn rerender() {
	let (renderer, root) = self::setup();
	let count = Observable::new(0_usize);
	let counter = self::counter(&count);

	renderer
		.render(&root, Some(VNode::component(&counter)))
		.expect("Unable to render");
	assert_eq!(self::html(&renderer, root), "0");

	count.set(1);
	assert_eq!(self::html(&renderer, root), "1");

	batch(|| {
		count.set(2);
		count.set(3);
		assert_eq!(self::html(&renderer, root), "1", "Component re-rendered within a batch");
	})
	.expect("Batch shouldn't fail");
	assert_eq!(self::html(&renderer, root), "3");
	assert_eq!(self::take_order(), ["render", "render", "render"]);
}

/// Ensures components re-render only when their props change
#[test]
fn props() {
	let (renderer, root) = self::setup();
	let label = Component::new("Label", |props| {
		let props = props.clone();
		move || {
			self::log("render");
			let text = props.get("text").map(|text| text.to_string()).unwrap_or_default();
			VNode::element("label").with_child(VNode::text(text))
		}
	});
	let node = |text: &str| VNode::component(&label).with_attr("text", text);

	renderer.render(&root, Some(node("a"))).expect("Unable to render");
	assert_eq!(self::html(&renderer, root), "<label>a</label>");

	renderer.render(&root, Some(node("b"))).expect("Unable to render");
	assert_eq!(self::html(&renderer, root), "<label>b</label>");

	renderer.render(&root, Some(node("b"))).expect("Unable to render");
	assert_eq!(self::take_order(), ["render", "render"], "Component re-rendered with equal props");
}

/// Ensures lifecycle hooks run after the flush they're caused by
#[test]
fn hooks() {
	let (renderer, root) = self::setup();
	let count = Observable::new(0_usize);
	let component = Component::new("Hooks", {
		let count = count.clone();
		move |_| {
			on_mounted(|| self::log("mounted"));
			on_updated(|| self::log("updated"));
			on_unmounted(|| self::log("unmounted"));

			let count = count.clone();
			move || {
				self::log(format!("render {}", count.get()));
				VNode::text(count.get().to_string())
			}
		}
	});

	renderer
		.render(&root, Some(VNode::component(&component)))
		.expect("Unable to render");
	assert_eq!(self::take_order(), ["render 0", "mounted"]);

	batch(|| {
		count.set(1);
		count.set(2);
	})
	.expect("Batch shouldn't fail");
	assert_eq!(self::take_order(), ["render 2", "updated"]);

	renderer.render(&root, None).expect("Unable to render");
	assert_eq!(self::take_order(), ["unmounted"]);
	assert_eq!(self::html(&renderer, root), "");
}

/// Ensures parents are updated before their children, with children updated once
#[test]
fn parent_first() {
	let (renderer, root) = self::setup();
	let value = Observable::new(0_usize);
	let child = Component::new("Child", {
		let value = value.clone();
		move |props| {
			let props = props.clone();
			let value = value.clone();
			move || {
				let from_parent = props.get("value");
				self::log(format!("child {}", value.get()));
				VNode::text(format!("{}/{}", from_parent.unwrap_or(AttrValue::Int(-1)), value.get()))
			}
		}
	});
	let parent = Component::new("Parent", {
		let value = value.clone();
		move |_| {
			let value = value.clone();
			let child = child.clone();
			move || {
				self::log(format!("parent {}", value.get()));
				VNode::element("section").with_child(
					VNode::component(&child).with_attr("value", i64::try_from(value.get()).unwrap_or(i64::MAX)),
				)
			}
		}
	});

	renderer
		.render(&root, Some(VNode::component(&parent)))
		.expect("Unable to render");
	assert_eq!(self::html(&renderer, root), "<section>0/0</section>");
	assert_eq!(self::take_order(), ["parent 0", "child 0"]);

	value.set(1);
	assert_eq!(self::html(&renderer, root), "<section>1/1</section>");
	assert_eq!(
		self::take_order(),
		["parent 1", "child 1"],
		"Parent wasn't updated first, or child was updated more than once"
	);
}

/// Ensures effects created during setup are stopped on unmount
#[test]
fn unmount_stops_effects() {
	let (renderer, root) = self::setup();
	let count = Observable::new(0_usize);
	let component = Component::new("Watcher", {
		let count = count.clone();
		move |_| {
			let _effect = Effect::new({
				let count = count.clone();
				move || self::log(format!("effect {}", count.get()))
			});

			|| VNode::comment("watcher")
		}
	});

	renderer
		.render(&root, Some(VNode::component(&component)))
		.expect("Unable to render");
	assert_eq!(self::take_order(), ["effect 0"]);
	count.set(1);
	assert_eq!(self::take_order(), ["effect 1"]);

	renderer.render(&root, None).expect("Unable to render");
	count.set(2);
	assert!(self::take_order().is_empty(), "Effect ran after being unmounted");
	assert_eq!(count.subscriber_count(), 0, "Unmounted effects are still subscribed");
	assert_eq!(world::stats().effects, 0, "Effects were leaked");
}

/// Ensures keyed components are moved instead of re-created
#[test]
fn keyed_components() {
	let (renderer, root) = self::setup();
	let count = Observable::new(0_usize);
	let counter = self::counter(&count);
	let node = |keys: &[i32]| {
		VNode::element("ol").with_children(
			keys.iter()
				.map(|&key| VNode::component(&counter).with_key(key)),
		)
	};

	renderer.render(&root, Some(node(&[1, 2, 3]))).expect("Unable to render");
	assert_eq!(self::take_order().len(), 3);

	renderer.with_backend(MemoryBackend::clear_ops);
	renderer.render(&root, Some(node(&[3, 1, 2]))).expect("Unable to render");
	let ops = renderer.with_backend(|backend| backend.op_counts());
	assert_eq!(ops.moves, 1, "Expected a single component to move: {ops:?}");
	assert_eq!(ops.creates + ops.removes, 0, "Components were re-created: {ops:?}");
	assert!(self::take_order().is_empty(), "Components were re-rendered");

	count.set(5);
	assert_eq!(self::html(&renderer, root), "<ol>555</ol>");
}
