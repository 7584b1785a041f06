//! # hearth-shared
//!
//! Types shared by every Hearth crate: identifier newtypes, the canonical
//! pair key, application constants and user-facing notices.

pub mod constants;
pub mod notice;
pub mod types;

pub use notice::{Notice, NoticeLevel};
pub use types::{ChannelId, CurrentUser, PairKey, RequestId, UserId};
