//! Errors

// Imports
use pulse_reactive::FlushError;

/// Reconciliation error
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
	/// A mounted node was missing it's backend handle
	#[error("Mounted {kind} node was missing it's backend handle")]
	MissingHandle {
		/// Node kind
		kind: &'static str,
	},

	/// A mounted node wasn't attached to any parent
	#[error("Mounted node wasn't attached to any parent")]
	MissingParent,

	/// A component failed to render
	#[error("Component {name:?} failed to render")]
	Component {
		/// Component name
		name: &'static str,

		/// Error
		#[source]
		err: anyhow::Error,
	},
}

/// Render error
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
	/// Unable to reconcile
	#[error("Unable to reconcile")]
	Reconcile(#[from] ReconcileError),

	/// Unable to flush the updates caused by the render
	#[error("Unable to flush updates")]
	Flush(#[from] FlushError),
}
