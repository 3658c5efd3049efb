//! Errors

// Imports
use crate::{loc::Loc, scheduler};

/// Error raised while flushing the run queue
#[derive(thiserror::Error, Debug)]
pub enum FlushError {
	/// A job (or effect) returned an error
	#[error("Job defined at {defined_loc} failed")]
	Job {
		/// Where the job was defined
		defined_loc: Loc,

		/// Inner error
		#[source]
		err: anyhow::Error,
	},

	/// A job kept re-queueing itself
	#[error("Job defined at {defined_loc} exceeded {limit} recursive updates within a single flush")]
	RecursionLimit {
		/// Where the job was defined
		defined_loc: Loc,

		/// Limit that was exceeded
		limit: usize,
	},
}

impl FlushError {
	/// Returns where the failing job was defined
	#[must_use]
	pub const fn defined_loc(&self) -> Loc {
		match *self {
			Self::Job { defined_loc, .. } | Self::RecursionLimit { defined_loc, .. } => defined_loc,
		}
	}
}

/// Extension trait to report effect errors that have no caller to return to.
#[extend::ext(name = ResultReportExt)]
pub impl Result<(), anyhow::Error> {
	/// Reports the error, if any, to the scheduler's error handler.
	///
	/// Without a handler, the error is kept until [`scheduler::take_error`] or
	/// the next flush with a caller.
	#[track_caller]
	fn report(self) {
		if let Err(err) = self {
			scheduler::report(FlushError::Job {
				defined_loc: Loc::caller(),
				err,
			});
		}
	}
}
