//! Job client: submit, stream, cancel, and recover generation jobs.
//!
//! Jobs are owned by an external executor reached over HTTP; this module
//! holds only references (`JobId`) and subscriptions. Incremental results
//! arrive over a Server-Sent Events stream which is parsed into typed
//! [`JobEvent`] values and delivered on a channel; see
//! [`JobClient::subscribe`].

mod client;
mod errors;
mod events;
mod subscription;
mod types;

pub use client::JobClient;
pub use errors::JobClientError;
pub use events::{JobEvent, SseFrame, SseParser};
pub use subscription::{JobSubscription, SubscriptionHandle};
pub use types::{
    ImageJobRequest, JobKind, JobRequest, JobResult, JobSnapshot, JobStatus, TextJobRequest,
};
