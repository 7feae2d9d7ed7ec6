pub mod job;
pub mod priority;

pub use job::{Job, JobSummary};
pub use priority::Priority;
