//! Interactive meeting mode: the read-line loop and its slash commands.

pub mod interactive;
pub mod slash;
