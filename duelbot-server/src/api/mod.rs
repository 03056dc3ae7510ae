//! HTTP handlers.
//!
//! - `POST /chat` accepts one signed chat line or whisper from the relay
//! - `GET /duels` lists live duels without revealing chosen weapons

pub mod chat;
pub mod duels;
pub mod extractors;
