//! # Skin Diagnosis Telegram Bot
//!
//! A Telegram bot that classifies photos of skin lesions with a pretrained
//! image model, optionally asks a generative-text API how severe the
//! predicted condition is, and replies with a formatted diagnosis.

pub mod bot;
pub mod classifier;
pub mod conditions;
pub mod config;
pub mod diagnosis_log;
pub mod errors;
pub mod localization;
pub mod severity;
pub mod text_processing;
