//! Producer side: resolve submission parameters and hand jobs to the broker.

pub mod dispatcher;
pub mod options;

pub use dispatcher::Dispatcher;
pub use options::{DispatchOption, DispatchOptions, ResolvedDispatch};
