//! Abbrechbare Timer einer Session
//!
//! Pro `TimerKind` ist höchstens ein Timer scharf. Jeder Timer hat ein
//! eigenes `CancellationToken` und eine fortlaufende ID; ein bereits in
//! die Queue gestellter Ablauf wird über [`SessionTimers::take_if_current`]
//! verworfen, wenn der Timer inzwischen abgebrochen oder neu gestartet
//! wurde. Drop bricht alles ab.

use super::events::{Input, TimerFired, TimerKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct ArmedTimer {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct TimersInner {
    next_id: u64,
    armed: HashMap<TimerKind, ArmedTimer>,
}

#[derive(Debug)]
pub struct SessionTimers {
    inputs: mpsc::UnboundedSender<Input>,
    inner: Mutex<TimersInner>,
}

impl SessionTimers {
    pub fn new(inputs: mpsc::UnboundedSender<Input>) -> Self {
        Self {
            inputs,
            inner: Mutex::new(TimersInner::default()),
        }
    }

    /// Startet (oder startet neu) den Timer dieser Art.
    ///
    /// Muss innerhalb einer Tokio-Runtime aufgerufen werden.
    pub fn arm(&self, kind: TimerKind, delay: Duration) -> u64 {
        let token = CancellationToken::new();
        let id = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            if let Some(previous) = inner.armed.insert(
                kind,
                ArmedTimer {
                    id,
                    token: token.clone(),
                },
            ) {
                previous.token.cancel();
            }
            id
        };

        // Deadline ab jetzt, nicht ab dem ersten Poll des Tasks
        let sleep = tokio::time::sleep(delay);
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = sleep => {
                    let _ = inputs.send(Input::Timer(TimerFired { kind, id }));
                }
            }
        });

        tracing::trace!(?kind, id, ?delay, "Timer armed");
        id
    }

    pub fn cancel(&self, kind: TimerKind) -> bool {
        match self.inner.lock().armed.remove(&kind) {
            Some(timer) => {
                timer.token.cancel();
                tracing::trace!(?kind, id = timer.id, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let mut inner = self.inner.lock();
        for (_, timer) in inner.armed.drain() {
            timer.token.cancel();
        }
    }

    /// `true` wenn der abgelaufene Timer noch der aktuelle ist;
    /// er gilt danach als verbraucht.
    pub fn take_if_current(&self, fired: &TimerFired) -> bool {
        let mut inner = self.inner.lock();
        match inner.armed.get(&fired.kind) {
            Some(timer) if timer.id == fired.id => {
                inner.armed.remove(&fired.kind);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.inner.lock().armed.contains_key(&kind)
    }

    pub fn armed_count(&self) -> usize {
        self.inner.lock().armed.len()
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
