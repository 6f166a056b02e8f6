pub mod engine;
pub mod error;
pub mod models;
pub mod store;

pub use engine::JobEngine;
pub use error::{JobError, JobResult};
pub use models::{Job, JobStatus, JobUpdate, OutputType};
pub use store::{FileJobStore, FileJobStoreBuilder};
