use thiserror::Error;

/// Failures of a single search request.
#[derive(Debug, Error)]
pub enum SearchError {
  /// The request never produced a readable body (connect, TLS, body read).
  #[error("search request failed: {0}")]
  Transport(#[from] reqwest::Error),

  /// The body was not the expected `{ items: [...] }` envelope.
  #[error("could not decode search response: {0}")]
  Decode(#[from] serde_json::Error),
}

/// Failures while turning a watch reference into something playable.
#[derive(Debug, Error)]
pub enum PlaybackError {
  #[error("stream resolution failed: {0}")]
  ResolutionFailed(String),

  #[error("no stream URLs available")]
  NoStreams,

  /// Streams exist but none in the preferred quality list.
  #[error("no stream in a preferred quality ({available})")]
  NoPreferredQuality { available: String },

  /// The browser or native player could not be launched.
  #[error("playback surface failed: {0}")]
  Surface(String),
}
