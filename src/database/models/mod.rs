pub mod admin;
pub mod announcement;
pub mod chat;
pub mod referral;
pub mod reminder;

pub use admin::*;
pub use announcement::*;
pub use chat::*;
pub use referral::*;
pub use reminder::*;
