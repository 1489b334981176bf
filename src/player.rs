use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::{
  io::AsyncBufReadExt,
  io::BufReader as TokioBufReader,
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{info, warn};

use crate::error::PlaybackError;
use crate::resolver::PlaybackTarget;

/// Browser launcher for the current platform.
#[cfg(target_os = "macos")]
const OPEN_COMMAND: &str = "open";
#[cfg(not(target_os = "macos"))]
const OPEN_COMMAND: &str = "xdg-open";

/// Open `url` in the default browser. The launcher is reaped in the background.
pub fn open_in_browser(url: &str) -> Result<(), PlaybackError> {
  let mut child = std::process::Command::new(OPEN_COMMAND)
    .arg(url)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()
    .map_err(|e| PlaybackError::Surface(format!("failed to open browser: {}", e)))?;
  // Reap the child in a background thread to avoid zombie processes.
  std::thread::spawn(move || {
    let _ = child.wait();
  });
  Ok(())
}

/// Build the mpv command line for a resolved stream.
pub fn mpv_args(url: &str, audio: Option<&str>, socket_path: &str) -> Vec<String> {
  let mut args = vec![
    "--force-window=yes".to_string(),
    "--term-status-msg=Time: ${time-pos/full} / ${duration/full} | ${pause} ${percent-pos}%".to_string(),
    format!("--input-ipc-server={}", socket_path),
  ];
  if let Some(audio) = audio {
    args.push(format!("--audio-file={}", audio));
  }
  args.push("--".to_string());
  args.push(url.to_string());
  args
}

/// What the player is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
  pub watch_ref: String,
  pub title: String,
  /// Stream quality for native playback, `None` for a browser page.
  pub quality: Option<String>,
}

/// Renders playback targets: browser pages are fire-and-forget, native streams
/// run in a supervised mpv process.
pub struct Player {
  pub(crate) current_process: Option<TokioChild>,
  pub now_playing: Option<NowPlaying>,
  monitor_handle: Option<JoinHandle<()>>,
  status_rx: Option<mpsc::Receiver<String>>,
  last_status: Option<String>,
  ipc_socket_path: Option<String>,
  pub paused: bool,
}

impl Player {
  pub fn new() -> Self {
    Self {
      current_process: None,
      now_playing: None,
      monitor_handle: None,
      status_rx: None,
      last_status: None,
      ipc_socket_path: None,
      paused: false,
    }
  }

  /// Whether a native player process is running.
  pub fn is_playing(&self) -> bool {
    self.current_process.is_some()
  }

  pub fn check_status(&mut self) {
    if let Some(rx) = &mut self.status_rx {
      while let Ok(status) = rx.try_recv() {
        self.last_status = Some(status);
      }
    }
  }

  pub fn last_status(&self) -> Option<&str> {
    self.last_status.as_deref()
  }

  /// Once a running mpv process has exited on its own, hand back what it was playing.
  pub fn reap_exited(&mut self) -> Option<NowPlaying> {
    let exited = match self.current_process.as_mut() {
      Some(child) => matches!(child.try_wait(), Ok(Some(_))),
      None => false,
    };
    if !exited {
      return None;
    }
    info!("player: mpv exited");
    self.current_process = None;
    let finished = self.now_playing.take();
    self.clear();
    finished
  }

  /// Render `target`, replacing whatever was playing.
  pub async fn start(&mut self, target: PlaybackTarget, now_playing: NowPlaying) -> Result<(), PlaybackError> {
    self.stop().await.map_err(|e| PlaybackError::Surface(format!("{:#}", e)))?;
    match target {
      PlaybackTarget::Page { url } => {
        info!(url = %url, "player: opening watch page");
        open_in_browser(&url)?;
        self.now_playing = Some(NowPlaying { quality: None, ..now_playing });
      }
      PlaybackTarget::Stream { quality, url, audio } => {
        info!(quality = %quality, separate_audio = audio.is_some(), "player: starting mpv");
        self.spawn_mpv(&url, audio.as_deref()).map_err(|e| PlaybackError::Surface(format!("{:#}", e)))?;
        self.now_playing = Some(NowPlaying { quality: Some(quality), ..now_playing });
      }
    }
    Ok(())
  }

  fn spawn_mpv(&mut self, url: &str, audio: Option<&str>) -> Result<()> {
    self.paused = false;

    let socket_path = std::env::temp_dir().join(format!("ytlist-mpv-{}.sock", std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new("mpv");
    cmd.args(mpv_args(url, audio, &socket_path_str));
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    // stderr is never drained; piping it would eventually block mpv.
    cmd.stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let stdout = child.stdout.take().context("Failed to get mpv stdout")?;
    let (tx, rx) = mpsc::channel::<String>(10);
    self.status_rx = Some(rx);

    let monitor_handle = tokio::spawn(async move {
      let reader = TokioBufReader::new(stdout);
      let mut lines = reader.lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
          break;
        }
      }
    });

    self.current_process = Some(child);
    self.monitor_handle = Some(monitor_handle);
    self.ipc_socket_path = Some(socket_path_str);
    Ok(())
  }

  #[cfg(unix)]
  pub async fn toggle_pause(&mut self) -> Result<()> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let stream = tokio::net::UnixStream::connect(socket_path).await.context("Failed to connect to mpv IPC socket")?;
    stream.writable().await.context("mpv IPC socket not writable")?;
    let cmd = b"{\"command\":[\"cycle\",\"pause\"]}\n";
    let written = stream.try_write(cmd).context("Failed to send pause command to mpv")?;
    if written < cmd.len() {
      return Err(anyhow!("Partial write to mpv IPC socket: wrote {} of {} bytes", written, cmd.len()));
    }
    self.paused = !self.paused;
    Ok(())
  }

  #[cfg(not(unix))]
  pub async fn toggle_pause(&mut self) -> Result<()> {
    Err(anyhow!("Pause is only supported on Unix platforms"))
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
      let _ = handle.await;
    }

    if let Some(mut child) = self.current_process.take() {
      if let Err(e) = child.kill().await {
        warn!(err = %e, "player: failed to kill mpv");
        return Err(anyhow!(e).context("Failed to kill mpv process"));
      }
      let _ = child.wait().await;
    }

    self.clear();
    Ok(())
  }

  fn clear(&mut self) {
    self.status_rx = None;
    self.last_status = None;
    self.now_playing = None;
    self.paused = false;
    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mpv_args_muxed_stream() {
    let args = mpv_args("https://stream", None, "/tmp/s.sock");
    assert_eq!(args.last().map(String::as_str), Some("https://stream"));
    assert!(args.contains(&"--input-ipc-server=/tmp/s.sock".to_string()));
    assert!(!args.iter().any(|a| a.starts_with("--audio-file")));
  }

  #[test]
  fn mpv_args_separate_audio() {
    let args = mpv_args("https://video", Some("https://audio"), "/tmp/s.sock");
    assert!(args.contains(&"--audio-file=https://audio".to_string()));
    let sep = args.iter().position(|a| a == "--").unwrap();
    assert_eq!(&args[sep + 1..], ["https://video".to_string()]);
  }

  #[tokio::test]
  async fn idle_player_stop_is_noop() {
    let mut player = Player::new();
    assert!(!player.is_playing());
    assert!(player.reap_exited().is_none());
    player.stop().await.unwrap();
    assert!(player.now_playing.is_none());
  }
}
