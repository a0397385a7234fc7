//! Session Module - Zustand einer Call-Session
//!
//! Reine Datentypen; geschrieben wird nur vom `CallSessionController`.

mod types;

pub use types::*;
