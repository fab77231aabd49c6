//! Data models for Margin

mod feed;
mod post;
mod profile;
mod session;

pub use feed::Feed;
pub use post::{Author, Post};
pub use profile::Profile;
pub use session::Session;
