//! Search job cache.

mod job;
mod service;

pub use job::{JobStatus, SearchJob, SearchJobView, SearchUser};
pub use service::{InMemorySearchJobService, SearchJobError, SearchJobService, SearchJobSettings};
