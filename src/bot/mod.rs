//! Bot module for handling Telegram interactions
//!
//! - `message_handler`: intake flow for photo messages
//! - `ui_builder`: formats diagnosis replies
//! - `runner`: dispatcher setup and process entry points

pub mod message_handler;
pub mod runner;
pub mod ui_builder;

pub use message_handler::{photo_handler, ChatTransport, IncomingPhoto, IntakeHandler, IntakeOutcome};
pub use runner::{run_bot, start};
pub use ui_builder::{format_confidence, format_diagnosis, format_diagnosis_plain};
