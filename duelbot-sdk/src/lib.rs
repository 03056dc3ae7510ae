//! Wire types shared between the duel bot and the chat relay that feeds it.
//!
//! The relay owns the actual chat connection. It POSTs every chat line and
//! whisper it sees to the bot as a signed [`objects::ChatEvent`], and receives
//! the bot's replies as signed [`objects::OutgoingChat`] payloads.

pub mod objects;
pub mod signature;
