use miette::Diagnostic;
use thiserror::Error;

use crate::types::JobId;

/// Errors surfaced by [`JobClient`](super::JobClient) operations.
///
/// Stream-level failures never appear here; they are delivered in-band as
/// [`JobEvent::Error`](super::JobEvent::Error) so they stay scoped to the one
/// block that owns the job. Cancel failures are logged, not returned.
#[derive(Debug, Error, Diagnostic)]
pub enum JobClientError {
    /// The executor could not be reached or returned a transport error.
    #[error("executor request failed: {0}")]
    #[diagnostic(
        code(blockweave::jobs::transport),
        help("Check that the job executor is running and BLOCKWEAVE_API_BASE points at it.")
    )]
    Transport(#[from] reqwest::Error),

    /// The executor answered with a non-success status code.
    #[error("executor rejected the request: HTTP {status}")]
    #[diagnostic(code(blockweave::jobs::rejected))]
    Rejected { status: u16 },

    /// The executor has no record of the job.
    #[error("job not found: {job_id}")]
    #[diagnostic(code(blockweave::jobs::not_found))]
    NotFound { job_id: JobId },
}
