/*!
 * Translation jobs.
 *
 * - `model`: payloads, queue entries, events and reports
 * - `runner`: the state machine that runs one job
 * - `queue`: per-user FIFO queues and the registry that owns them
 * - `service`: the enqueue surface and event subscription
 */

pub mod model;
pub mod queue;
pub mod runner;
pub mod service;

pub use model::{JobEvent, JobPayload, JobReport, QueuedJob};
pub use queue::{QueueRegistry, UserQueue};
pub use runner::{DEFAULT_CHUNK_TIMEOUT, JobRunner};
pub use service::JobService;
