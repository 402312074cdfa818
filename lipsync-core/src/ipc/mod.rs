//! Serializable reports handed to hosts (debug overlays, trace files).
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` with camelCase
//! field names so a browser or game-engine host can mirror them directly.

pub mod events;
