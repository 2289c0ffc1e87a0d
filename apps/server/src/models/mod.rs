//! Domain records shared by the services and both store backends.

pub mod conversation;
pub mod engagement;
pub mod keys;
pub mod message;
pub mod session;

pub use conversation::{Conversation, LastMessage, Participant, TypingPresence};
pub use engagement::{summarize_reactions, MessageReaction, StarredMessage, Toggle};
pub use keys::{ConversationKey, IdentityKey, NewPreKey, PreKey, SignedPreKey};
pub use message::{EditState, Message, MessageBody, MessageEditRecord, MessageKind, MessageView, Pin};
pub use session::{ConversationSession, SessionUpdate};
