//! Reactivity for `pulse`
//!
//! All reactive state lives in a per-thread world made of generational
//! arenas: dependency cells ([`Dep`]), effects ([`Effect`]), the links
//! between them, and effect scopes ([`EffectScope`]). Handles only carry
//! arena ids, so nothing here relies on garbage collection: cells are
//! released when their owners are dropped, effects when they (or their
//! scope) are stopped.
//!
//! Mutations trigger cells, cells notify effects, and the [`scheduler`]
//! batches the notified effects into a flush queue that runs each one at
//! most once per flush.

// Modules
pub mod computed;
pub mod dep;
pub mod effect;
pub mod effect_stack;
pub mod error;
mod graph;
pub mod loc;
pub mod map;
pub mod scheduler;
pub mod scope;
pub mod signal;
pub mod watch;
pub mod world;

// Exports
pub use self::{
	computed::Computed,
	dep::Dep,
	effect::{Effect, EffectOptions, EffectRun, EffectRunCtx, EffectScheduler, Fallible, on_effect_cleanup},
	effect_stack::{is_tracking, untracked},
	error::{FlushError, ResultReportExt},
	graph::{CellId, EffectId, ScopeId},
	loc::Loc,
	map::ObservableMap,
	scheduler::{Job, JobKey, batch, end_batch, flush, start_batch, take_error},
	scope::{EffectScope, current_scope, on_scope_dispose},
	signal::{Observable, SignalGet, SignalGetCloned, SignalReplace, SignalSet, SignalUpdate, SignalWith},
	watch::{FlushMode, WatchCleanup, WatchHandle, WatchOptions, watch, watch_effect},
	world::WorldStats,
};
