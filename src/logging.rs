//! Logging-Setup über `tracing_subscriber`
//!
//! `RUST_LOG` hat Vorrang, sonst gilt [`DEFAULT_DIRECTIVES`].

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVES: &str = "call_coordinator=debug,tokio_tungstenite=warn,tungstenite=warn";

static INIT: OnceCell<()> = OnceCell::new();

/// Installiert den globalen Subscriber. Mehrfachaufrufe sind harmlos;
/// ist schon ein fremder Subscriber gesetzt, bleibt dieser aktiv.
pub fn init_logging() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

        if tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global subscriber already set");
        }
    });
}
