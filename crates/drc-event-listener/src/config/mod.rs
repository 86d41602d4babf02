pub mod settings;

pub use settings::{EventListenerConfig, ListenerConfig, SolanaConfig};
