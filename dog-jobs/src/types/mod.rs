pub mod ids;
pub mod ctx;
pub mod message;
pub mod record;
pub mod events;

pub use ids::{JobId, LeaseToken};
pub use ctx::JobContext;
pub use message::TaskMessage;
pub use record::{Delivery, JobRecord, JobStatus};
pub use events::JobEvent;
