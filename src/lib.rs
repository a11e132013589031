//! Cache-first track resolution for the Open Music bot.
//!
//! [`resolver::AudioResolver`] turns Spotify references, YouTube searches and
//! playable queries into tracks, reading the per-provider [`cache`] before
//! every external call and staging writes until the request is flushed.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod notifier;
pub mod player;
pub mod query;
pub mod resolver;
pub mod sources;
pub mod storage;

pub use config::{Config, ResolverSettings, SettingsProvider, SharedSettings};
pub use context::{GuildId, RequestContext, RequestId, UserId};
pub use error::{ResolverError, Result};
pub use resolver::{AudioResolver, FetchOptions, Providers, ResolutionResult, ResolverEvent};
