//! # Margin
//!
//! A Micro.blog client library and command-line client.
//!
//! ## Overview
//!
//! Margin signs you in with Micro.blog's emailed sign-in links, keeps the
//! session in an encrypted file, and pages through your timeline, mentions,
//! bookmarks, the discover feed and other people's posts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          App                                │
//! │   Start screen, sign-in flow, pagers for each feed          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │     Pager       │ │       API       │ │      Auth       │
//! │                 │ │                 │ │                 │
//! │ • refresh       │ │ • Sign-in       │ │ • Session file  │
//! │ • load_more     │ │ • Feeds         │ │ • Token source  │
//! │ • watch state   │ │ • Micropub      │ │ • Encryption    │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`api`] — Micro.blog HTTP client and its error type
//! - [`app`] — Application layer used by front ends
//! - [`auth`] — Encrypted session storage
//! - [`config`] — Configuration management
//! - [`deeplink`] — Sign-in link parsing
//! - [`models`] — Data models (Post, Author, Session, Profile, Feed)
//! - [`pager`] — Paginated feed state
//!
//! ## Example
//!
//! ```no_run
//! use margin::app::App;
//! use margin::models::Feed;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let app = App::open()?;
//! let pager = app.pager(Feed::Timeline);
//! pager.refresh().await?;
//! pager.load_more().await?;
//! println!("{} posts", pager.snapshot().posts.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::ref_option)]

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod deeplink;
pub mod models;
pub mod pager;
pub mod paths;

// Re-export main types for convenience
pub use api::{ApiError, MicroBlogApi, MicroBlogClient, TokenProvider};
pub use app::{App, StartScreen};
pub use auth::SessionStore;
pub use config::Config;
pub use models::{Author, Feed, Post, Profile, Session};
pub use pager::{LoadOutcome, PagerPhase, TimelinePager, TimelineState};

/// ASCII logo for the application
pub const LOGO: &str = r"
                            _
  _ __ ___   __ _ _ __ __ _(_)_ __
 | '_ ` _ \ / _` | '__/ _` | | '_ \
 | | | | | | (_| | | | (_| | | | | |
 |_| |_| |_|\__,_|_|  \__, |_|_| |_|
                      |___/
";

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
