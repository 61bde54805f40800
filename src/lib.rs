//! # Scenario Telegram Bot
//!
//! A Telegram bot that walks users through a scripted dialogue. Conversation
//! states are loaded from JSON documents; each state sends timed message
//! parts, media, inline buttons that may require a premium subscription, and
//! quick-reply keyboards. Per-user progress and attributes are kept in a
//! session store backed by memory or PostgreSQL.

pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod localization;
pub mod session;
pub mod state_store;
pub mod subscription;
pub mod template;
pub mod transport;
