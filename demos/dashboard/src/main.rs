//! Dashboard demo
//!
//! Renders a task list into an in-memory backend, then changes it a few
//! times, logging the resulting html and the operations each change took.

// Imports
use {
	anyhow::Context,
	pulse_reactive::{
		Computed,
		Observable,
		SignalGet,
		SignalUpdate,
		SignalWith,
		WatchOptions,
		scheduler,
		watch,
	},
	pulse_vdom::{AttrValue, Component, MemoryBackend, NodeId, Renderer, VNode, on_mounted, on_unmounted},
};

/// Task
#[derive(PartialEq, Clone, Debug)]
struct Task {
	/// Id
	id: u32,

	/// Title
	title: &'static str,

	/// Whether it's done
	done: bool,
}

impl Task {
	/// Creates a pending task
	const fn new(id: u32, title: &'static str) -> Self {
		Self { id, title, done: false }
	}
}

fn main() -> Result<(), anyhow::Error> {
	pulse_logger::init();
	scheduler::set_error_handler(|err| tracing::error!(?err, "Unable to update"));

	let tasks = Observable::new(vec![
		Task::new(1, "Write the parser"),
		Task::new(2, "Review the scheduler"),
		Task::new(3, "Profile the diff"),
		Task::new(4, "Release"),
	]);
	let remaining = Computed::new({
		let tasks = tasks.clone();
		move || tasks.with(|tasks| tasks.iter().filter(|task| !task.done).count())
	});
	let _watcher = watch(
		{
			let remaining = remaining.clone();
			move || remaining.get()
		},
		|remaining, prev, _| tracing::info!(?prev, "{remaining} task(s) remaining"),
		WatchOptions::default(),
	);

	let mut backend = MemoryBackend::new();
	let root = backend.create_root("body");
	let renderer = Renderer::new(backend);
	let app = self::app(&tasks, &remaining);
	renderer
		.render(&root, Some(VNode::component(&app)))
		.context("Unable to render dashboard")?;
	self::log_step(&renderer, root, "Mounted");

	tasks.update(|tasks| {
		if let Some(task) = tasks.iter_mut().find(|task| task.id == 2) {
			task.done = true;
		}
	});
	self::log_step(&renderer, root, "Completed a task");

	tasks.update(|tasks| tasks.rotate_right(1));
	self::log_step(&renderer, root, "Moved the last task first");

	tasks.update(|tasks| tasks.retain(|task| task.id != 3));
	self::log_step(&renderer, root, "Removed a task");

	renderer.render(&root, None).context("Unable to unmount dashboard")?;
	self::log_step(&renderer, root, "Unmounted");

	Ok(())
}

/// Logs the html and operations since the last step
fn log_step(renderer: &Renderer<MemoryBackend>, root: NodeId, step: &str) {
	let (html, ops) = renderer.with_backend(|backend| {
		let res = (backend.inner_html(root), backend.op_counts());
		backend.clear_ops();
		res
	});
	tracing::info!(?ops, "{step}: {html}");
}

/// Creates the app component
fn app(tasks: &Observable<Vec<Task>>, remaining: &Computed<usize>) -> Component {
	let tasks = tasks.clone();
	let summary = self::summary(remaining);
	let item = self::task_item();
	Component::new("App", move |_| {
		let (tasks, summary, item) = (tasks.clone(), summary.clone(), item.clone());
		move || {
			let items = tasks.with(|tasks| {
				tasks
					.iter()
					.map(|task| {
						VNode::component(&item)
							.with_key(task.id)
							.with_attr("title", task.title)
							.with_attr("done", task.done)
					})
					.collect::<Vec<_>>()
			});

			VNode::element("main").with_children([
				VNode::element("h1").with_child(VNode::text("Tasks")),
				VNode::element("ul").with_children(items),
				VNode::component(&summary),
			])
		}
	})
}

/// Creates the component for a single task
fn task_item() -> Component {
	Component::new("TaskItem", |props| {
		let title = props.get_raw("title").map(|title| title.to_string()).unwrap_or_default();
		on_mounted({
			let title = title.clone();
			move || tracing::debug!("Mounted task {title:?}")
		});
		on_unmounted(move || tracing::debug!("Unmounted task {title:?}"));

		let props = props.clone();
		move || {
			let done = props.get("done") == Some(AttrValue::Bool(true));
			let title = props.get("title").map(|title| title.to_string()).unwrap_or_default();
			VNode::element("li")
				.with_attr("data-done", done)
				.with_child(VNode::text(title))
		}
	})
}

/// Creates the summary component
fn summary(remaining: &Computed<usize>) -> Component {
	let remaining = remaining.clone();
	Component::new("Summary", move |_| {
		let remaining = remaining.clone();
		move || match remaining.get() {
			0 => VNode::element("p").with_child(VNode::text("All done")),
			remaining => VNode::element("p").with_children([
				VNode::text(remaining.to_string()),
				VNode::comment("count"),
				VNode::text(" remaining"),
			]),
		}
	})
}
