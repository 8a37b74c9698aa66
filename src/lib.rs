//! OAuth2 command-line samples for Google APIs.
//!
//! The reusable pieces are the encrypted [`auth::TokenStore`], the
//! [`auth::AuthorizationFlow`] that refreshes cached credentials or falls back to
//! out-of-band consent, and [`paging::fetch_pages`] for walking cursor-paged lists.

pub mod auth;
pub mod cli;
pub mod console;
pub mod error;
pub mod paging;
pub mod services;

pub use error::ClientError;
