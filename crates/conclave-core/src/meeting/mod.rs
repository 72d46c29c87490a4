//! Multi-agent meeting orchestration
//!
//! The subsystem that lets several agents share one conversation:
//! - `targeting`: resolve who a user line addresses
//! - `solicit`: ask the responder set who wants the floor
//! - `turn`: stream the live speaker, buffer the rest, follow @mention
//!   chains up to the configured depth
//! - `context`: the meeting rules injected into every agent prompt
//! - `session`: the durable room record

pub mod context;
pub mod session;
pub mod solicit;
pub mod targeting;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use session::{
    BufferedResponse, MeetingMessage, MeetingMetadata, MeetingSession, Role,
    DEFAULT_CHECK_IN_TOKEN_LIMIT, DEFAULT_MAX_CHAIN_LENGTH,
};
pub use context::build_meeting_context;
pub use solicit::{build_agent_request, select_responders, solicit, ResponseIntent};
pub use targeting::{detect_agent_mentions, is_addressing_user, resolve, TargetedMessage};
pub use turn::{TurnDriver, TurnOutcome};
