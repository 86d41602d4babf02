pub mod event_router;

pub use event_router::{EventBroadcast, EventRouter};
