use anyhow::{Context, Result};
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::warn;

use crate::app::{App, Focus};
use crate::player::open_in_browser;
use crate::state::Msg;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Move a list selection one row, wrapping at both ends.
fn step(selected: Option<usize>, count: usize, forward: bool) -> Option<usize> {
  if count == 0 {
    return None;
  }
  Some(match (selected, forward) {
    (None, _) => 0,
    (Some(i), true) => (i + 1) % count,
    (Some(0), false) => count - 1,
    (Some(i), false) => i - 1,
  })
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

  if ctrl && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  if ctrl && key.code == KeyCode::Char('s') {
    app.stop_playback().await.context("Failed to stop playback")?;
    return Ok(());
  }

  if ctrl && key.code == KeyCode::Char('o') {
    let watch_ref = match app.focus {
      Focus::Results => app.results_list.selected().and_then(|i| app.state.results().get(i)).map(|e| &e.watch_ref),
      Focus::Playlist => app.playlist_list.selected().and_then(|i| app.state.playlist().get(i)).map(|e| &e.watch_ref),
      Focus::Input => app.player.now_playing.as_ref().map(|n| &n.watch_ref),
    }
    .cloned();
    if let Some(url) = watch_ref
      && let Err(e) = open_in_browser(&url)
    {
      app.dispatch(Msg::BrowserFailed(e)).await;
    }
    return Ok(());
  }

  match key.code {
    KeyCode::Tab => {
      app.focus = app.focus.next();
      return Ok(());
    }
    KeyCode::BackTab => {
      app.focus = app.focus.prev();
      return Ok(());
    }
    _ => {}
  }

  match app.focus {
    Focus::Input => handle_input_key(app, key).await,
    Focus::Results => handle_results_key(app, key).await,
    Focus::Playlist => handle_playlist_key(app, key).await,
  }
  Ok(())
}

async fn handle_input_key(app: &mut App, key: event::KeyEvent) {
  let mut query = app.state.query().to_string();
  let len = query.chars().count();
  match key.code {
    KeyCode::Enter => {
      app.dispatch(Msg::SearchPressed).await;
      return;
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&query, app.cursor_position);
      query.insert(byte_idx, c);
      app.cursor_position += 1;
    }
    KeyCode::Backspace => {
      if app.cursor_position == 0 {
        return;
      }
      app.cursor_position -= 1;
      let byte_idx = char_to_byte_index(&query, app.cursor_position);
      query.remove(byte_idx);
    }
    KeyCode::Delete => {
      if app.cursor_position >= len {
        return;
      }
      let byte_idx = char_to_byte_index(&query, app.cursor_position);
      query.remove(byte_idx);
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
      return;
    }
    KeyCode::Right => {
      app.cursor_position = (app.cursor_position + 1).min(len);
      return;
    }
    KeyCode::Home => {
      app.cursor_position = 0;
      return;
    }
    KeyCode::End => {
      app.cursor_position = len;
      return;
    }
    KeyCode::Esc => {
      if !query.is_empty() {
        query.clear();
        app.cursor_position = 0;
        app.input_scroll = 0;
      } else if !app.state.results().is_empty() {
        app.focus = Focus::Results;
        return;
      } else {
        app.should_quit = true;
        return;
      }
    }
    KeyCode::Down => {
      if !app.state.results().is_empty() {
        app.focus = Focus::Results;
      }
      return;
    }
    _ => return,
  }
  app.dispatch(Msg::QueryChanged(query)).await;
}

async fn handle_results_key(app: &mut App, key: event::KeyEvent) {
  let count = app.state.results().len();
  match key.code {
    KeyCode::Enter | KeyCode::Char('s') => {
      if let Some(i) = app.results_list.selected() {
        app.dispatch(Msg::SavePressed(i)).await;
      }
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.results_list.select(step(app.results_list.selected(), count, true));
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.results_list.select(step(app.results_list.selected(), count, false));
    }
    KeyCode::Char(' ') => toggle_pause(app).await,
    KeyCode::Esc | KeyCode::Char('/') => {
      app.focus = Focus::Input;
    }
    _ => {}
  }
}

async fn handle_playlist_key(app: &mut App, key: event::KeyEvent) {
  let count = app.state.playlist().len();
  match key.code {
    KeyCode::Enter => {
      if let Some(i) = app.playlist_list.selected() {
        app.dispatch(Msg::PlayPressed(i)).await;
      }
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.playlist_list.select(step(app.playlist_list.selected(), count, true));
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.playlist_list.select(step(app.playlist_list.selected(), count, false));
    }
    KeyCode::Char(' ') => toggle_pause(app).await,
    KeyCode::Esc => {
      app.focus = Focus::Results;
    }
    _ => {}
  }
}

async fn toggle_pause(app: &mut App) {
  if app.player.is_playing()
    && let Err(e) = app.player.toggle_pause().await
  {
    warn!(err = %e, "player: pause toggle failed");
  }
}
