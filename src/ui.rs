use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph},
};

use crate::app::{App, Focus};

// --- Palette ---

struct Palette {
  fg: Color,
  muted: Color,
  accent: Color,
  border: Color,
  highlight_fg: Color,
  highlight_bg: Color,
  saved: Color,
  status: Color,
  error: Color,
  key_fg: Color,
  key_bg: Color,
}

const PALETTE: Palette = Palette {
  fg: Color::Rgb(220, 220, 220),
  muted: Color::Rgb(130, 130, 140),
  accent: Color::Rgb(255, 95, 95),
  border: Color::Rgb(80, 80, 90),
  highlight_fg: Color::Rgb(20, 20, 20),
  highlight_bg: Color::Rgb(255, 135, 135),
  saved: Color::Rgb(250, 200, 90),
  status: Color::Rgb(120, 200, 230),
  error: Color::Rgb(240, 90, 90),
  key_fg: Color::Rgb(20, 20, 20),
  key_bg: Color::Rgb(160, 160, 170),
};

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
  let color = if focused { PALETTE.accent } else { PALETTE.border };
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(color))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);

  let [results_area, playlist_area] =
    Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(main_area);
  render_results(frame, app, results_area);
  render_playlist(frame, app, playlist_area);

  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let left = Line::from(Span::styled(" ▶ ytlist ", Style::default().fg(PALETTE.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let right_text = format!("{} player · v{} ", app.player_kind().label(), env!("CARGO_PKG_VERSION"));
  let width = right_text.chars().count() as u16;
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width: width.min(area.width), ..area };
  frame.render_widget(Line::from(Span::styled(right_text, Style::default().fg(PALETTE.muted))), right_area);
}

fn render_results(frame: &mut Frame, app: &mut App, area: Rect) {
  let focused = app.focus == Focus::Results;
  let block = pane_block(format!(" Results ({}) ", app.state.results().len()), focused);

  if app.state.results().is_empty() {
    let hint = Paragraph::new(vec![
      Line::from(""),
      Line::from(Span::styled("Type a title below and press Enter.", Style::default().fg(PALETTE.muted))),
    ])
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(hint, area);
    return;
  }

  // Inner width: borders, highlight symbol, row number and saved mark.
  let inner_w = area.width.saturating_sub(9) as usize;
  let playlist = app.state.playlist();
  let items: Vec<ListItem> = app
    .state
    .results()
    .iter()
    .map(|entry| {
      let saved = playlist.entries().iter().any(|e| e.title == entry.title);
      let mark = if saved { Span::styled("★ ", Style::default().fg(PALETTE.saved)) } else { Span::raw("  ") };
      ListItem::new(Line::from(vec![
        Span::styled(format!("{}. ", entry.id + 1), Style::default().fg(PALETTE.muted)),
        mark,
        Span::styled(truncate_str(&entry.title, inner_w), Style::default().fg(PALETTE.fg)),
      ]))
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_symbol("▶ ")
    .highlight_style(highlight_style(focused));
  frame.render_stateful_widget(list, area, &mut app.results_list);
}

fn render_playlist(frame: &mut Frame, app: &mut App, area: Rect) {
  let focused = app.focus == Focus::Playlist;
  let block = pane_block(format!(" Playlist ({}) ", app.state.playlist().len()), focused);

  if app.state.playlist().is_empty() {
    let hint = Paragraph::new(vec![
      Line::from(""),
      Line::from(Span::styled("Press s on a result to save it.", Style::default().fg(PALETTE.muted))),
    ])
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(hint, area);
    return;
  }

  let inner_w = area.width.saturating_sub(6) as usize;
  let selected = app.state.selected();
  let items: Vec<ListItem> = app
    .state
    .playlist()
    .entries()
    .iter()
    .map(|entry| {
      let playing = selected == Some(entry.watch_ref.as_str());
      let mark = if playing { Span::styled("♪ ", Style::default().fg(PALETTE.status)) } else { Span::raw("  ") };
      ListItem::new(Line::from(vec![
        mark,
        Span::styled(truncate_str(&entry.title, inner_w), Style::default().fg(PALETTE.fg)),
      ]))
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_symbol("▶ ")
    .highlight_style(highlight_style(focused));
  frame.render_stateful_widget(list, area, &mut app.playlist_list);
}

fn highlight_style(focused: bool) -> Style {
  if focused {
    Style::default().fg(PALETTE.highlight_fg).bg(PALETTE.highlight_bg).add_modifier(Modifier::BOLD)
  } else {
    Style::default().add_modifier(Modifier::BOLD)
  }
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let (text, style) = if let Some(err) = &app.state.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(PALETTE.error))
  } else if app.state.is_searching() {
    (format!(" ⏳ Searching '{}'…", app.state.query()), Style::default().fg(PALETTE.status))
  } else if app.state.is_resolving() {
    (" ⏳ Loading…".to_string(), Style::default().fg(PALETTE.status))
  } else if let Some(status) = app.player.last_status() {
    (format!(" ♪ {}", status), Style::default().fg(PALETTE.status))
  } else if let Some(now) = &app.player.now_playing {
    let quality = now.quality.as_deref().map(|q| format!(" [{}]", q)).unwrap_or_default();
    (format!(" ♪ {}{}", now.title, quality), Style::default().fg(PALETTE.status))
  } else {
    (" Ready".to_string(), Style::default().fg(PALETTE.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let focused = app.focus == Focus::Input;
  let input_block = pane_block(" Search YouTube ".to_string(), focused).padding(Padding::horizontal(1));

  let query = app.state.query().to_string();
  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&query, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }
  let scroll = app.input_scroll;

  let visible: String = query
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= scroll)
    .take_while(|(start, _, _)| *start < scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(PALETTE.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if focused {
    let cursor_x = area.x + 2 + (cursor_col - scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let is_playing = app.player.is_playing();
  let mut keys: Vec<(&str, &str)> = match app.focus {
    Focus::Input => {
      let mut k = vec![("Enter", "Search"), ("Tab", "Focus")];
      k.push(if app.state.query().is_empty() { ("Esc", "Quit") } else { ("Esc", "Clear") });
      k
    }
    Focus::Results => vec![("s", "Save"), ("j/k", "Navigate"), ("^o", "Browser"), ("Tab", "Focus")],
    Focus::Playlist => vec![("Enter", "Play"), ("j/k", "Navigate"), ("^o", "Browser"), ("Tab", "Focus")],
  };
  if is_playing {
    keys.push(("Space", if app.player.paused { "Resume" } else { "Pause" }));
  }
  if is_playing || app.player.now_playing.is_some() {
    keys.push(("^s", "Stop"));
  }

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(PALETTE.key_fg).bg(PALETTE.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(PALETTE.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);
}
