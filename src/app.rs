use ratatui::widgets::ListState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::constants::constants;
use crate::player::{NowPlaying, Player};
use crate::resolver::{PlaybackStrategy, PlayerKind};
use crate::state::{AppState, Effect, Msg};
use crate::youtube::SearchClient;

/// Which pane receives key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
  Input,
  Results,
  Playlist,
}

impl Focus {
  pub fn next(self) -> Self {
    match self {
      Focus::Input => Focus::Results,
      Focus::Results => Focus::Playlist,
      Focus::Playlist => Focus::Input,
    }
  }

  pub fn prev(self) -> Self {
    match self {
      Focus::Input => Focus::Playlist,
      Focus::Results => Focus::Input,
      Focus::Playlist => Focus::Results,
    }
  }
}

/// The UI loop's view of the world: reducer state, view-only state, and the
/// runtime that executes effects.
pub struct App {
  pub state: AppState,
  pub focus: Focus,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub results_list: ListState,
  pub playlist_list: ListState,
  pub player: Player,
  pub should_quit: bool,
  client: Arc<SearchClient>,
  strategy: Arc<dyn PlaybackStrategy>,
  msg_tx: mpsc::UnboundedSender<Msg>,
  msg_rx: mpsc::UnboundedReceiver<Msg>,
  search_cancel: Option<CancellationToken>,
  playback_cancel: Option<CancellationToken>,
  /// When the current error appeared, for auto-dismiss.
  error_since: Option<Instant>,
}

impl App {
  pub fn new(client: SearchClient, strategy: Arc<dyn PlaybackStrategy>) -> Self {
    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    Self {
      state: AppState::new(),
      focus: Focus::Input,
      cursor_position: 0,
      input_scroll: 0,
      results_list: ListState::default(),
      playlist_list: ListState::default(),
      player: Player::new(),
      should_quit: false,
      client: Arc::new(client),
      strategy,
      msg_tx,
      msg_rx,
      search_cancel: None,
      playback_cancel: None,
      error_since: None,
    }
  }

  pub fn player_kind(&self) -> PlayerKind {
    self.strategy.kind()
  }

  /// Feed `msg` through the reducer and run every effect it produces.
  pub async fn dispatch(&mut self, msg: Msg) {
    let search_done = matches!(msg, Msg::SearchFinished { .. });
    let mut next = Some(msg);
    while let Some(msg) = next.take() {
      let Some(effect) = self.state.update(msg) else { break };
      next = self.run_effect(effect).await;
    }

    if search_done && !self.state.is_searching() && self.state.last_error.is_none() {
      if self.state.results().is_empty() {
        self.results_list.select(None);
      } else {
        self.results_list.select(Some(0));
        self.focus = Focus::Results;
      }
    }
  }

  async fn run_effect(&mut self, effect: Effect) -> Option<Msg> {
    match effect {
      Effect::Search { generation, query } => {
        let token = replace_token(&mut self.search_cancel);
        let client = Arc::clone(&self.client);
        let tx = self.msg_tx.clone();
        info!(generation, query = %query, "search: dispatching");
        tokio::spawn(async move {
          tokio::select! {
            _ = token.cancelled() => debug!(generation, "search: cancelled"),
            outcome = client.search(&query) => {
              let _ = tx.send(Msg::SearchFinished { generation, outcome });
            }
          }
        });
        None
      }
      Effect::Prepare { generation, watch_ref } => {
        let token = replace_token(&mut self.playback_cancel);
        let prepare = self.strategy.prepare(&watch_ref);
        let tx = self.msg_tx.clone();
        info!(generation, watch_ref = %watch_ref, player = self.strategy.kind().label(), "playback: preparing");
        tokio::spawn(async move {
          tokio::select! {
            _ = token.cancelled() => debug!(generation, "playback: cancelled"),
            outcome = prepare => {
              let _ = tx.send(Msg::PlaybackPrepared { generation, outcome });
            }
          }
        });
        None
      }
      Effect::Start(target) => {
        let watch_ref = self.state.selected().unwrap_or_default().to_string();
        let title = self.state.selected_title().unwrap_or(watch_ref.as_str()).to_string();
        match self.player.start(target, NowPlaying { watch_ref, title, quality: None }).await {
          Ok(()) => None,
          Err(e) => Some(Msg::SurfaceFailed(e)),
        }
      }
    }
  }

  /// Apply every completion that arrived from background tasks.
  pub async fn drain_pending(&mut self) {
    while let Ok(msg) = self.msg_rx.try_recv() {
      self.dispatch(msg).await;
    }
  }

  /// Per-frame housekeeping: player status, exited mpv, stale errors.
  pub async fn tick(&mut self) {
    self.drain_pending().await;
    self.player.check_status();
    if let Some(exited) = self.player.reap_exited() {
      self.dispatch(Msg::PlayerExited { watch_ref: exited.watch_ref }).await;
    }
    self.expire_error().await;
    self.clamp_selections();
  }

  pub async fn stop_playback(&mut self) -> anyhow::Result<()> {
    if let Some(token) = self.playback_cancel.take() {
      token.cancel();
    }
    self.player.stop().await?;
    self.dispatch(Msg::PlaybackStopped).await;
    Ok(())
  }

  async fn expire_error(&mut self) {
    match (self.state.last_error.is_some(), self.error_since) {
      (true, None) => self.error_since = Some(Instant::now()),
      (true, Some(t)) if t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs) => {
        self.error_since = None;
        self.dispatch(Msg::DismissError).await;
      }
      (false, Some(_)) => self.error_since = None,
      _ => {}
    }
  }

  fn clamp_selections(&mut self) {
    clamp(&mut self.results_list, self.state.results().len());
    clamp(&mut self.playlist_list, self.state.playlist().len());
  }
}

/// Cancel the token in `slot` and install a fresh one.
fn replace_token(slot: &mut Option<CancellationToken>) -> CancellationToken {
  if let Some(old) = slot.take() {
    old.cancel();
  }
  let token = CancellationToken::new();
  *slot = Some(token.clone());
  token
}

fn clamp(list: &mut ListState, len: usize) {
  match list.selected() {
    _ if len == 0 => list.select(None),
    None => list.select(Some(0)),
    Some(i) if i >= len => list.select(Some(len - 1)),
    Some(_) => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::resolver::EmbeddedStrategy;
  use crate::youtube::SearchResult;

  fn test_app() -> App {
    let client = SearchClient::new(reqwest::Client::new(), "http://127.0.0.1:9/search", "k".into()).unwrap();
    App::new(client, Arc::new(EmbeddedStrategy))
  }

  fn result(title: &str) -> SearchResult {
    SearchResult { id: 0, title: title.into(), watch_ref: format!("https://www.youtube.com/watch?v={}", title) }
  }

  #[test]
  fn focus_cycles() {
    assert_eq!(Focus::Input.next().next().next(), Focus::Input);
    assert_eq!(Focus::Input.prev(), Focus::Playlist);
  }

  #[test]
  fn clamp_follows_length() {
    let mut list = ListState::default();
    clamp(&mut list, 3);
    assert_eq!(list.selected(), Some(0));
    list.select(Some(7));
    clamp(&mut list, 3);
    assert_eq!(list.selected(), Some(2));
    clamp(&mut list, 0);
    assert_eq!(list.selected(), None);
  }

  #[test]
  fn replace_token_cancels_previous() {
    let mut slot = None;
    let first = replace_token(&mut slot);
    let second = replace_token(&mut slot);
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
  }

  #[tokio::test]
  async fn completed_search_focuses_results() {
    let mut app = test_app();
    app.dispatch(Msg::QueryChanged("lofi".into())).await;
    // Take the generation without running the effect so no request goes out.
    let Some(Effect::Search { generation, .. }) = app.state.update(Msg::SearchPressed) else { panic!() };

    app.msg_tx.send(Msg::SearchFinished { generation, outcome: Ok(vec![result("a"), result("b")]) }).unwrap();
    app.drain_pending().await;

    assert_eq!(app.state.results().len(), 2);
    assert_eq!(app.focus, Focus::Results);
    assert_eq!(app.results_list.selected(), Some(0));
  }

  #[tokio::test]
  async fn new_search_cancels_in_flight_one() {
    let mut app = test_app();
    app.dispatch(Msg::SearchPressed).await;
    let first = app.search_cancel.clone().unwrap();
    app.dispatch(Msg::SearchPressed).await;
    assert!(first.is_cancelled());
    assert!(!app.search_cancel.as_ref().unwrap().is_cancelled());
  }

  #[tokio::test]
  async fn embedded_play_round_trip_marks_selection() {
    let mut app = test_app();
    app.state.set_results(vec![result("abc")]);
    app.dispatch(Msg::SavePressed(0)).await;
    app.dispatch(Msg::PlayPressed(0)).await;
    assert!(app.state.is_resolving());
    assert_eq!(app.state.selected(), Some("https://www.youtube.com/watch?v=abc"));

    app.stop_playback().await.unwrap();
    assert_eq!(app.state.selected(), None);
    assert!(!app.state.is_resolving());
  }
}
