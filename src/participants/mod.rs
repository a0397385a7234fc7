//! Participants Module - Roster der entfernten Teilnehmer

mod registry;

pub use registry::ParticipantRegistry;
