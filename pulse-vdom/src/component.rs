//! Components
//!
//! A component is set up once per instance, returning a render function. The
//! render function runs inside the instance's effect, so the instance is
//! re-rendered whenever anything it read changes, including it's props.
//!
//! Updates are queued as jobs ordered by the instance's creation order, so
//! parents always update before their children. Anything created during
//! setup belongs to the instance's scope, and is stopped when it's unmounted.

// Imports
use {
	crate::{
		backend::Backend,
		error::ReconcileError,
		node::{AttrValue, Attrs, VNode},
		reconcile::{Mounted, Reconciler},
	},
	core::{
		cell::{OnceCell, RefCell},
		fmt,
	},
	pulse_reactive::{
		Effect,
		EffectOptions,
		EffectScheduler,
		EffectScope,
		Fallible,
		Job,
		JobKey,
		Observable,
		SignalSet,
		SignalWith,
		scheduler,
		untracked,
	},
	std::rc::Rc,
};

/// Render function
type RenderFn = Box<dyn Fn() -> VNode>;

/// Setup function
type SetupFn = dyn Fn(&Props) -> RenderFn;

/// Inner
struct Inner {
	/// Name
	name: &'static str,

	/// Setup
	setup: Box<SetupFn>,
}

/// Component
#[derive(Clone)]
pub struct Component {
	/// Inner
	inner: Rc<Inner>,
}

impl Component {
	/// Creates a new component.
	///
	/// `setup` runs once per instance, and returns the function that renders it.
	pub fn new<S, R>(name: &'static str, setup: S) -> Self
	where
		S: Fn(&Props) -> R + 'static,
		R: Fn() -> VNode + 'static,
	{
		let setup = move |props: &Props| Box::new(setup(props)) as RenderFn;
		Self {
			inner: Rc::new(Inner {
				name,
				setup: Box::new(setup),
			}),
		}
	}

	/// Returns the name of this component
	#[must_use]
	pub fn name(&self) -> &'static str {
		self.inner.name
	}
}

impl PartialEq for Component {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl fmt::Debug for Component {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Component").field(&self.inner.name).finish()
	}
}

/// Component props.
///
/// Set by the parent on every render, but only notify the instance if they
/// changed.
#[derive(Clone, Debug)]
pub struct Props {
	/// Attributes
	attrs: Observable<Attrs>,
}

impl Props {
	/// Gets a prop, tracking all props
	#[must_use]
	pub fn get(&self, name: &str) -> Option<AttrValue> {
		self.attrs.with(|attrs| attrs.get(name).cloned())
	}

	/// Gets a prop without tracking
	#[must_use]
	pub fn get_raw(&self, name: &str) -> Option<AttrValue> {
		self.attrs.with_raw(|attrs| attrs.get(name).cloned())
	}

	/// Uses all props, tracking them
	pub fn with<F, O>(&self, f: F) -> O
	where
		F: FnOnce(&Attrs) -> O,
	{
		self.attrs.with(f)
	}
}

/// Lifecycle hooks of an instance
#[derive(Default)]
struct Hooks {
	/// Run after the instance is first mounted
	mounted: RefCell<Vec<Rc<dyn Fn()>>>,

	/// Run after every update
	updated: RefCell<Vec<Rc<dyn Fn()>>>,

	/// Run after the instance is unmounted
	unmounted: RefCell<Vec<Box<dyn FnOnce()>>>,
}

thread_local! {
	/// Hooks of the instances being set up
	static SETUP_HOOKS: RefCell<Vec<Rc<Hooks>>> = const { RefCell::new(vec![]) };
}

/// Runs `f` with the hooks of the instance being set up, if any
fn with_setup_hooks<F>(hook: &'static str, f: F)
where
	F: FnOnce(&Hooks),
{
	let hooks = SETUP_HOOKS.with_borrow(|hooks| hooks.last().cloned());
	match hooks {
		Some(hooks) => f(&hooks),
		None => tracing::warn!("`{hook}` was called outside of a component setup, ignoring"),
	}
}

/// Registers a hook run after the component being set up is mounted
pub fn on_mounted<F>(f: F)
where
	F: Fn() + 'static,
{
	self::with_setup_hooks("on_mounted", |hooks| hooks.mounted.borrow_mut().push(Rc::new(f)));
}

/// Registers a hook run after every update of the component being set up
pub fn on_updated<F>(f: F)
where
	F: Fn() + 'static,
{
	self::with_setup_hooks("on_updated", |hooks| hooks.updated.borrow_mut().push(Rc::new(f)));
}

/// Registers a hook run after the component being set up is unmounted
pub fn on_unmounted<F>(f: F)
where
	F: FnOnce() + 'static,
{
	self::with_setup_hooks("on_unmounted", |hooks| hooks.unmounted.borrow_mut().push(Box::new(f)));
}

/// Component instance
pub(crate) struct Instance<B: Backend> {
	/// Component
	component: Component,

	/// Props
	props: Props,

	/// Scope
	scope: EffectScope,

	/// Render effect
	effect: OnceCell<Effect>,

	/// Render function
	render: OnceCell<RenderFn>,

	/// Rendered tree
	subtree: RefCell<Option<Mounted<B>>>,

	/// Where to mount the rendered tree on the first render
	mount_target: RefCell<Option<(B::Handle, Option<B::Handle>)>>,

	/// Hooks
	hooks: Rc<Hooks>,

	/// Key of the job running the `updated` hooks
	updated_key: JobKey,

	/// Reconciler
	reconciler: Reconciler<B>,
}

impl<B: Backend + 'static> Instance<B> {
	/// Mounts a new instance of `component` into `parent`, before `anchor`
	pub fn mount(
		reconciler: Reconciler<B>,
		component: &Component,
		props: Attrs,
		parent: &B::Handle,
		anchor: Option<&B::Handle>,
	) -> Result<Rc<Self>, ReconcileError> {
		let scope = EffectScope::detached();
		let instance = Rc::new(Self {
			component: component.clone(),
			props: Props {
				attrs: Observable::new(props),
			},
			scope,
			effect: OnceCell::new(),
			render: OnceCell::new(),
			subtree: RefCell::new(None),
			mount_target: RefCell::new(Some((parent.clone(), anchor.cloned()))),
			hooks: Rc::new(Hooks::default()),
			updated_key: JobKey::unique(),
			reconciler,
		});

		// Create the render effect first, so it's order is known during setup
		let effect = {
			let instance = Rc::downgrade(&instance);
			let run = Fallible(move || match instance.upgrade() {
				Some(instance) => instance.update(),
				None => Ok(()),
			});
			let options = EffectOptions {
				scheduler: Some(self::update_scheduler(component.name())),
				allow_recurse: false,
				lazy: true,
			};
			scope
				.run(|| Effect::with_options(run, options))
				.expect("Scope was just created")
		};
		let order = effect.order().expect("Effect was just created");
		let effect = instance.effect.get_or_init(|| effect);

		// Then setup the component within it's scope
		let render = {
			SETUP_HOOKS.with_borrow_mut(|hooks| hooks.push(Rc::clone(&instance.hooks)));
			scopeguard::defer! {
				SETUP_HOOKS.with_borrow_mut(|hooks| hooks.pop());
			}

			let setup = &component.inner.setup;
			let props = &instance.props;
			untracked(|| scheduler::with_owner(order, || scope.run(|| setup(props))))
				.expect("Scope was just created")
		};
		if instance.render.set(render).is_err() {
			unreachable!("Component was set up twice");
		}

		// Finally render it for the first time
		tracing::debug!(component = component.name(), "Mounting component");
		if let Err(err) = effect.run() {
			instance.scope.stop();
			return Err(ReconcileError::Component {
				name: component.name(),
				err,
			});
		}

		Ok(instance)
	}

	/// Renders this instance, and patches it's tree
	fn update(&self) -> anyhow::Result<()> {
		let Some(render) = self.render.get() else {
			anyhow::bail!("Component was rendered before being set up");
		};
		let tree = render();

		untracked(|| self.patch_subtree(tree))?;
		Ok(())
	}

	/// Patches the rendered tree, or mounts it, on the first render
	fn patch_subtree(&self, tree: VNode) -> Result<(), ReconcileError> {
		let mut subtree = self
			.subtree
			.try_borrow_mut()
			.expect("Component was updated while being reconciled");
		match &mut *subtree {
			Some(old) => {
				tracing::trace!(component = self.component.name(), "Updating component");
				let parent = self.reconciler.parent_of(old)?;
				self.reconciler.patch(old, tree, &parent)?;
				self.queue_hooks(&self.hooks.updated, self.updated_key);
			},
			None => {
				let (parent, anchor) = self
					.mount_target
					.take()
					.ok_or(ReconcileError::MissingHandle { kind: "component" })?;
				*subtree = Some(self.reconciler.mount(tree, &parent, anchor.as_ref())?);
				self.queue_hooks(&self.hooks.mounted, JobKey::unique());
			},
		}

		Ok(())
	}

	/// Queues hooks to run after the current flush
	fn queue_hooks(&self, hooks: &RefCell<Vec<Rc<dyn Fn()>>>, key: JobKey) {
		let hooks = hooks.borrow().clone();
		if hooks.is_empty() {
			return;
		}

		let id = self.order();
		scheduler::queue_post_flush_cb(Job::new(key, id, move || {
			for hook in &hooks {
				hook();
			}
			Ok(())
		}));
	}

	/// Returns the order of this instance
	fn order(&self) -> u64 {
		self.effect.get().and_then(Effect::order).unwrap_or(u64::MAX)
	}

	/// Sets the props of this instance.
	///
	/// If they changed, the instance is updated.
	pub fn set_props(&self, props: Attrs) {
		self.props.attrs.set(props);
	}

	/// Moves this instance's tree into `parent`, before `anchor`
	pub fn move_to(&self, parent: &B::Handle, anchor: Option<&B::Handle>) -> Result<(), ReconcileError> {
		let subtree = self.subtree.borrow();
		let subtree = subtree
			.as_ref()
			.ok_or(ReconcileError::MissingHandle { kind: "component" })?;
		self.reconciler.move_node(subtree, parent, anchor)
	}

	/// Returns the first backend node of this instance's tree
	pub fn first_host(&self) -> Result<B::Handle, ReconcileError> {
		let subtree = self.subtree.borrow();
		let subtree = subtree
			.as_ref()
			.ok_or(ReconcileError::MissingHandle { kind: "component" })?;
		self.reconciler.first_host(subtree)
	}

	/// Returns the last backend node of this instance's tree
	pub fn last_host(&self) -> Result<B::Handle, ReconcileError> {
		let subtree = self.subtree.borrow();
		let subtree = subtree
			.as_ref()
			.ok_or(ReconcileError::MissingHandle { kind: "component" })?;
		self.reconciler.last_host(subtree)
	}

	/// Unmounts this instance.
	///
	/// Stops everything created during setup, and the pending update, if any.
	pub fn unmount(&self, remove: bool) {
		tracing::debug!(component = self.component.name(), "Unmounting component");
		if let Some(effect) = self.effect.get() {
			scheduler::invalidate_job(JobKey::Effect(effect.id()));
		}
		scheduler::invalidate_job(self.updated_key);
		self.scope.stop();

		let subtree = self.subtree.borrow_mut().take();
		if let Some(subtree) = subtree {
			self.reconciler.unmount(subtree, remove);
		}

		let hooks = self.hooks.unmounted.take();
		if !hooks.is_empty() {
			let hooks = RefCell::new(hooks);
			scheduler::queue_post_flush_cb(Job::new(JobKey::unique(), self.order(), move || {
				for hook in hooks.take() {
					hook();
				}
				Ok(())
			}));
		}
	}
}

/// Creates the scheduler of an instance's render effect.
///
/// Instead of running the effect directly, queues an update job ordered by
/// the effect's creation order.
fn update_scheduler(name: &'static str) -> EffectScheduler {
	Rc::new(move |effect: &Effect| {
		let id = effect.order().unwrap_or(u64::MAX);
		let effect = effect.clone();
		tracing::trace!(component = name, "Queueing component update");
		scheduler::queue_job(Job::new(JobKey::Effect(effect.id()), id, move || match effect.is_active() {
			true => effect.run_if_dirty(),
			false => Ok(()),
		}));

		Ok(())
	})
}

impl<B: Backend> fmt::Debug for Instance<B> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instance")
			.field("component", &self.component)
			.field("props", &self.props)
			.field("scope", &self.scope)
			.finish_non_exhaustive()
	}
}
