//! Data models for the BJDMS API.
//!
//! Field names follow the server's snake_case JSON so payloads decode without renaming.

mod activity;
mod committee;
mod finance;
mod join_request;
mod jurisdiction;
mod notification;
mod user;

pub use activity::*;
pub use committee::*;
pub use finance::*;
pub use join_request::*;
pub use jurisdiction::*;
pub use notification::*;
pub use user::*;
