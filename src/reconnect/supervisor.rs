//! Überwacht die Signaling-Verbindung
//!
//! Bei Verlust geht genau einmal `ConnectionLost` in die Pipeline und ein
//! begrenzter Timer startet. Kommt die Verbindung zurück, folgt
//! `ConnectionRestored` und der Timer wird abgebrochen; läuft er ab,
//! liefert der Controller `ReconnectTimeout`. Session-State wird hier nie
//! geschrieben.

use crate::call::{ConnectionEvent, Input, SessionTimers, TimerKind};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// BACKOFF
// ============================================================================

/// Exponentielles Backoff für Verbindungsversuche des Transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    /// Wartezeit vor Versuch `attempt` (0-basiert)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt.min(16));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

// ============================================================================
// SUPERVISOR
// ============================================================================

#[derive(Debug, Default)]
struct SupervisorState {
    /// Verlust wurde gemeldet und noch nicht aufgehoben
    lost: bool,
}

#[derive(Debug)]
pub struct ReconnectionSupervisor {
    inputs: mpsc::UnboundedSender<Input>,
    timers: Arc<SessionTimers>,
    timeout: Duration,
    state: Mutex<SupervisorState>,
}

impl ReconnectionSupervisor {
    pub fn new(
        inputs: mpsc::UnboundedSender<Input>,
        timers: Arc<SessionTimers>,
        timeout: Duration,
    ) -> Self {
        Self {
            inputs,
            timers,
            timeout,
            state: Mutex::new(SupervisorState::default()),
        }
    }

    /// Vom Transport bei jeder Verbindungsänderung aufgerufen.
    /// Wiederholte Meldungen desselben Zustands werden ignoriert.
    pub fn connectivity_changed(&self, connected: bool) {
        let mut state = self.state.lock();

        match (connected, state.lost) {
            (false, false) => {
                state.lost = true;
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Signaling connection lost");
                self.timers.arm(TimerKind::Reconnect, self.timeout);
                self.emit(ConnectionEvent::ConnectionLost);
            }
            (true, true) => {
                state.lost = false;
                self.timers.cancel(TimerKind::Reconnect);
                tracing::info!("Signaling connection restored");
                self.emit(ConnectionEvent::ConnectionRestored);
            }
            _ => {}
        }
    }

    /// Session ist vorbei: Reconnect-Timer darf nichts mehr auslösen
    pub fn on_session_teardown(&self) {
        if self.timers.cancel(TimerKind::Reconnect) {
            tracing::debug!("Reconnect timer cancelled on teardown");
        }
    }

    pub fn is_lost(&self) -> bool {
        self.state.lock().lost
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.inputs.send(Input::Connection(event)).is_err() {
            tracing::debug!(?event, "Event pipeline closed, dropping connection event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::TimerFired;

    fn drain(rx: &mut mpsc::UnboundedReceiver<Input>) -> Vec<Input> {
        let mut out = Vec::new();
        while let Ok(input) = rx.try_recv() {
            out.push(input);
        }
        out
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(10), Duration::from_secs(30));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loss_is_deduplicated() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = Arc::new(SessionTimers::new(tx.clone()));
        let supervisor = ReconnectionSupervisor::new(tx, timers.clone(), Duration::from_secs(10));

        supervisor.connectivity_changed(false);
        supervisor.connectivity_changed(false);
        supervisor.connectivity_changed(true);
        supervisor.connectivity_changed(true);

        let events: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|i| match i {
                Input::Connection(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(
            events,
            vec![
                ConnectionEvent::ConnectionLost,
                ConnectionEvent::ConnectionRestored
            ]
        );
        assert!(!timers.is_armed(TimerKind::Reconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_reconnect_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = Arc::new(SessionTimers::new(tx.clone()));
        let supervisor = ReconnectionSupervisor::new(tx, timers.clone(), Duration::from_secs(10));

        supervisor.connectivity_changed(false);
        tokio::time::advance(Duration::from_secs(11)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        let fired: Vec<TimerFired> = drain(&mut rx)
            .into_iter()
            .filter_map(|i| match i {
                Input::Timer(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].kind, TimerKind::Reconnect);
        assert!(timers.take_if_current(&fired[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = Arc::new(SessionTimers::new(tx.clone()));
        let supervisor = ReconnectionSupervisor::new(tx, timers.clone(), Duration::from_secs(10));

        supervisor.connectivity_changed(false);
        supervisor.on_session_teardown();
        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(drain(&mut rx).iter().all(|i| !matches!(i, Input::Timer(_))));
        assert!(supervisor.is_lost());
    }
}
