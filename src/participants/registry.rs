//! Roster der entfernten Teilnehmer
//!
//! Tracks gehören der Media-Engine. Beim Entfernen eines Teilnehmers
//! wird für jeden gehaltenen Track `detach_track` aufgerufen, bevor der
//! Eintrag verschwindet.

use crate::engine::MediaEngine;
use crate::session::{CallParticipant, ParticipantPatch, ParticipantStatus, TrackHandle, UsersAmount};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ParticipantRegistry {
    participants: HashMap<String, CallParticipant>,
    engine: Arc<dyn MediaEngine>,
}

impl ParticipantRegistry {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            participants: HashMap::new(),
            engine,
        }
    }

    /// Legt den Teilnehmer an oder aktualisiert ihn
    pub fn upsert(&mut self, id: &str, patch: &ParticipantPatch) -> &CallParticipant {
        let participant = self
            .participants
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(participant = id, "Participant added");
                CallParticipant::new(id)
            });
        participant.apply(patch);
        participant
    }

    /// Hängt einen Track an. `false` wenn der Teilnehmer unbekannt ist.
    pub fn attach_track(&mut self, id: &str, track: TrackHandle) -> bool {
        let Some(participant) = self.participants.get_mut(id) else {
            return false;
        };

        let list = match track.kind {
            crate::session::MediaKind::Video => &mut participant.tracks.video,
            crate::session::MediaKind::Audio => &mut participant.tracks.audio,
        };
        if list.contains(&track) {
            return true;
        }
        self.engine.attach_track(id, &track);
        list.push(track);
        true
    }

    /// Entfernt den Teilnehmer und hängt vorher alle Tracks ab
    pub fn remove(&mut self, id: &str) -> Option<CallParticipant> {
        let participant = self.participants.remove(id)?;
        for track in participant.tracks.iter() {
            self.engine.detach_track(id, track);
        }
        tracing::debug!(participant = id, "Participant removed");
        Some(participant)
    }

    /// Behält nur die übergebenen IDs, alle anderen werden entfernt
    pub fn retain_ids(&mut self, ids: &[String]) {
        let stale: Vec<String> = self
            .participants
            .keys()
            .filter(|id| !ids.contains(id))
            .cloned()
            .collect();
        for id in stale {
            self.remove(&id);
        }
    }

    pub fn clear(&mut self) {
        let ids: Vec<String> = self.participants.keys().cloned().collect();
        for id in ids {
            self.remove(&id);
        }
    }

    pub fn users_amount(&self) -> UsersAmount {
        UsersAmount {
            active: self
                .participants
                .values()
                .filter(|p| p.status == ParticipantStatus::Active)
                .count(),
            total: self.participants.len(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&CallParticipant> {
        self.participants.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn snapshot(&self) -> HashMap<String, CallParticipant> {
        self.participants.clone()
    }
}

impl std::fmt::Debug for ParticipantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantRegistry")
            .field("participants", &self.participants.len())
            .field("users_amount", &self.users_amount())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::RecordingEngine;
    use crate::session::MediaKind;

    fn track(id: &str, kind: MediaKind) -> TrackHandle {
        TrackHandle {
            id: id.to_string(),
            kind,
        }
    }

    #[test]
    fn test_upsert_and_users_amount() {
        let mut registry = ParticipantRegistry::new(Arc::new(RecordingEngine::default()));
        registry.upsert("u1", &ParticipantPatch::status(ParticipantStatus::Active));
        registry.upsert("u2", &ParticipantPatch::status(ParticipantStatus::Loading));
        registry.upsert("u2", &ParticipantPatch {
            is_audio_muted: Some(false),
            ..Default::default()
        });

        assert_eq!(registry.users_amount(), UsersAmount { active: 1, total: 2 });
        let u2 = registry.get("u2").unwrap();
        assert_eq!(u2.status, ParticipantStatus::Loading);
        assert!(u2.has_audio_been_activated);
    }

    #[test]
    fn test_remove_detaches_every_track() {
        let engine = Arc::new(RecordingEngine::default());
        let mut registry = ParticipantRegistry::new(engine.clone());
        registry.upsert("u1", &ParticipantPatch::default());
        assert!(registry.attach_track("u1", track("v1", MediaKind::Video)));
        assert!(registry.attach_track("u1", track("a1", MediaKind::Audio)));
        assert!(!registry.attach_track("ghost", track("a9", MediaKind::Audio)));

        let removed = registry.remove("u1").unwrap();
        assert_eq!(removed.tracks.video.len(), 1);

        let mut detached = engine.detached();
        detached.sort();
        assert_eq!(detached, vec!["detach:u1:a1", "detach:u1:v1"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_track_is_attached_once() {
        let engine = Arc::new(RecordingEngine::default());
        let mut registry = ParticipantRegistry::new(engine.clone());
        registry.upsert("u1", &ParticipantPatch::default());
        registry.attach_track("u1", track("v1", MediaKind::Video));
        registry.attach_track("u1", track("v1", MediaKind::Video));

        assert_eq!(registry.get("u1").unwrap().tracks.video.len(), 1);
        assert_eq!(engine.calls(), vec!["attach:u1:v1"]);
    }

    #[test]
    fn test_retain_ids_and_clear_detach() {
        let engine = Arc::new(RecordingEngine::default());
        let mut registry = ParticipantRegistry::new(engine.clone());
        for id in ["u1", "u2", "u3"] {
            registry.upsert(id, &ParticipantPatch::default());
            registry.attach_track(id, track(&format!("{}-a", id), MediaKind::Audio));
        }

        registry.retain_ids(&["u2".to_string()]);
        assert!(registry.contains("u2"));
        assert_eq!(registry.len(), 1);
        assert_eq!(engine.detached().len(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(engine.detached().len(), 3);
    }
}
