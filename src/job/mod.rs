pub mod record;
pub mod state;

pub use record::{Job, ResourceKind};
pub use state::JobState;
