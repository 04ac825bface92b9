//! Entity shapes held by the local caches
//!
//! Only the fields the dispatch handlers need are modelled; everything else
//! in a payload is ignored on deserialization.

mod channel;
mod guild;
mod message;
mod user;

pub use channel::{Channel, ChannelType};
pub use guild::Guild;
pub use message::Message;
pub use user::User;
