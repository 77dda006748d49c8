//! # Intent
//!
//! Turns an imperative phrase (`open valve MECH-VALVE-TURN-UN-IN-11`) into
//! an [`IntentRecord`]: command, element heads with their tag-numbers, and
//! prepositions, each in a numbered slot.

pub mod builder;
pub mod record;

pub use builder::{BuildState, IntentBuilder};
pub use record::{ElementRef, IntentRecord, SlotKey, SlotValue};
