//! Reconnect Module - Verbindungsverlust auf Session-Ebene

mod supervisor;

pub use supervisor::{BackoffPolicy, ReconnectionSupervisor};
