//! External providers the resolver talks to, behind one trait each:
//! [`SpotifyApi`], [`YouTubeApi`] and [`TrackLoader`].

pub mod lavalink;
pub mod spotify;
pub mod youtube;

pub use lavalink::{LavalinkRestLoader, LoadResult, LoadStatus, LoadType, Track, TrackInfo, TrackLoader};
pub use spotify::{parse_spotify_reference, SpotifyApi, SpotifyHttpClient, SpotifyQueryType, SpotifyTrack};
pub use youtube::{YouTubeApi, YouTubeApiClient};
