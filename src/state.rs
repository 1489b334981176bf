//! Application state and the reducer that owns every mutation of it.
//!
//! The view never touches fields directly: key handlers turn input into a
//! [`Msg`], [`AppState::update`] applies it and may hand back an [`Effect`]
//! for the runtime to execute. Background completions come back in as
//! messages tagged with the generation that started them, so a superseded
//! request can never overwrite newer state.

use tracing::{debug, info, warn};

use crate::error::{PlaybackError, SearchError};
use crate::resolver::PlaybackTarget;
use crate::youtube::SearchResult;

/// A saved video. Same shape as a search result.
pub type PlaylistEntry = SearchResult;

/// Ordered list of saved videos, at most one per distinct title.
#[derive(Debug, Default, Clone)]
pub struct Playlist {
  entries: Vec<PlaylistEntry>,
}

impl Playlist {
  /// Append `entry` unless an entry with the exact same title exists.
  /// Returns whether it was inserted.
  pub fn save(&mut self, entry: PlaylistEntry) -> bool {
    if self.entries.iter().any(|e| e.title == entry.title) {
      return false;
    }
    self.entries.push(entry);
    true
  }

  pub fn entries(&self) -> &[PlaylistEntry] {
    &self.entries
  }

  pub fn get(&self, index: usize) -> Option<&PlaylistEntry> {
    self.entries.get(index)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// Input to the reducer.
#[derive(Debug)]
pub enum Msg {
  QueryChanged(String),
  SearchPressed,
  SearchFinished { generation: u64, outcome: Result<Vec<SearchResult>, SearchError> },
  /// Save the result at this index into the playlist.
  SavePressed(usize),
  /// Play the playlist entry at this index.
  PlayPressed(usize),
  PlaybackPrepared { generation: u64, outcome: Result<PlaybackTarget, PlaybackError> },
  /// The browser or player refused the target.
  SurfaceFailed(PlaybackError),
  /// Opening a page in the browser on request failed; playback is untouched.
  BrowserFailed(PlaybackError),
  /// The user stopped playback.
  PlaybackStopped,
  /// The native player exited by itself while playing `watch_ref`.
  PlayerExited { watch_ref: String },
  DismissError,
}

/// Work the runtime must carry out on behalf of the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
  Search { generation: u64, query: String },
  Prepare { generation: u64, watch_ref: String },
  Start(PlaybackTarget),
}

#[derive(Debug, Default)]
pub struct AppState {
  query: String,
  results: Vec<SearchResult>,
  playlist: Playlist,
  /// Watch reference of the video currently selected for playback.
  selected: Option<String>,
  search_generation: u64,
  playback_generation: u64,
  searching: bool,
  resolving: bool,
  pub last_error: Option<String>,
}

impl AppState {
  pub fn new() -> Self {
    Self::default()
  }

  // --- Accessors ---

  pub fn query(&self) -> &str {
    &self.query
  }

  pub fn results(&self) -> &[SearchResult] {
    &self.results
  }

  pub fn playlist(&self) -> &Playlist {
    &self.playlist
  }

  pub fn selected(&self) -> Option<&str> {
    self.selected.as_deref()
  }

  pub fn is_searching(&self) -> bool {
    self.searching
  }

  pub fn is_resolving(&self) -> bool {
    self.resolving
  }

  /// Title of the selected video, if it is still in the playlist.
  pub fn selected_title(&self) -> Option<&str> {
    let selected = self.selected.as_deref()?;
    self.playlist.entries().iter().find(|e| e.watch_ref == selected).map(|e| e.title.as_str())
  }

  // --- Mutations ---

  pub fn set_query(&mut self, text: String) {
    self.query = text;
  }

  /// Replace the whole result set.
  pub fn set_results(&mut self, results: Vec<SearchResult>) {
    self.results = results;
  }

  pub fn save(&mut self, entry: PlaylistEntry) -> bool {
    self.playlist.save(entry)
  }

  pub fn select(&mut self, watch_ref: String) {
    self.selected = Some(watch_ref);
  }

  // --- Reducer ---

  pub fn update(&mut self, msg: Msg) -> Option<Effect> {
    match msg {
      Msg::QueryChanged(text) => {
        self.set_query(text);
        None
      }
      Msg::SearchPressed => {
        self.search_generation += 1;
        self.searching = true;
        self.last_error = None;
        Some(Effect::Search { generation: self.search_generation, query: self.query.clone() })
      }
      Msg::SearchFinished { generation, outcome } => {
        if generation != self.search_generation {
          debug!(generation, current = self.search_generation, "search: dropping stale completion");
          return None;
        }
        self.searching = false;
        match outcome {
          Ok(results) => {
            info!(generation, count = results.len(), "search: results replaced");
            self.set_results(results);
          }
          Err(e) => {
            warn!(generation, err = %e, "search: failed, keeping previous results");
            self.last_error = Some(format!("Search failed: {}", e));
          }
        }
        None
      }
      Msg::SavePressed(index) => {
        let entry = self.results.get(index)?.clone();
        let title = entry.title.clone();
        if self.save(entry) {
          info!(title = %title, size = self.playlist.len(), "playlist: saved");
        } else {
          debug!(title = %title, "playlist: already saved");
        }
        None
      }
      Msg::PlayPressed(index) => {
        let watch_ref = self.playlist.get(index)?.watch_ref.clone();
        self.select(watch_ref.clone());
        self.playback_generation += 1;
        self.resolving = true;
        self.last_error = None;
        Some(Effect::Prepare { generation: self.playback_generation, watch_ref })
      }
      Msg::PlaybackPrepared { generation, outcome } => {
        if generation != self.playback_generation {
          debug!(generation, current = self.playback_generation, "playback: dropping stale resolution");
          return None;
        }
        self.resolving = false;
        match outcome {
          Ok(target) => Some(Effect::Start(target)),
          Err(e) => {
            warn!(generation, err = %e, "playback: not started");
            self.last_error = Some(format!("Playback failed: {}", e));
            None
          }
        }
      }
      Msg::SurfaceFailed(e) => {
        warn!(err = %e, "playback: surface failed");
        self.last_error = Some(format!("Playback failed: {}", e));
        self.selected = None;
        None
      }
      Msg::BrowserFailed(e) => {
        warn!(err = %e, "browser: open failed");
        self.last_error = Some(format!("Could not open browser: {}", e));
        None
      }
      Msg::DismissError => {
        self.last_error = None;
        None
      }
      Msg::PlaybackStopped => {
        self.selected = None;
        self.resolving = false;
        // Invalidate any resolution still in flight.
        self.playback_generation += 1;
        None
      }
      Msg::PlayerExited { watch_ref } => {
        // A newer play may already be resolving; leave it alone.
        if self.selected.as_deref() == Some(watch_ref.as_str()) {
          self.selected = None;
        }
        None
      }
    }
  }
}
