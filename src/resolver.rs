use clap::ValueEnum;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use crate::constants::constants;
use crate::error::PlaybackError;
use crate::youtube::{video_id_from_watch_ref, watch_url};

/// Which playback strategy the app runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
  /// Load the watch page in the system browser.
  #[default]
  Browser,
  /// Resolve a stream with yt-dlp and play it in mpv.
  Native,
}

impl PlayerKind {
  pub fn label(self) -> &'static str {
    match self {
      PlayerKind::Browser => "browser",
      PlayerKind::Native => "native",
    }
  }
}

/// What a strategy hands to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackTarget {
  /// A page the rendering surface loads by itself.
  Page { url: String },
  /// A directly playable stream, with a separate audio track for video-only renditions.
  Stream { quality: String, url: String, audio: Option<String> },
}

/// One rendition of a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
  pub url: String,
  pub has_audio: bool,
}

/// Renditions of one video keyed by quality label (`"1080p"`, `"720p"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamCatalog {
  pub streams: BTreeMap<String, Rendition>,
  /// Best audio-only stream, if any.
  pub audio: Option<String>,
}

/// Pick the first preferred quality present in `catalog`.
///
/// Lower qualities are never used as a fallback: a catalog holding only
/// non-preferred renditions is `NoPreferredQuality`.
pub fn select_stream<'a>(
  catalog: &'a StreamCatalog,
  preferred: &[String],
) -> Result<(&'a str, &'a Rendition), PlaybackError> {
  if catalog.streams.is_empty() {
    return Err(PlaybackError::NoStreams);
  }
  preferred
    .iter()
    .find_map(|q| catalog.streams.get_key_value(q.as_str()))
    .map(|(label, rendition)| (label.as_str(), rendition))
    .ok_or_else(|| PlaybackError::NoPreferredQuality {
      available: catalog.streams.keys().cloned().collect::<Vec<_>>().join(", "),
    })
}

// --- Stream sources ---

/// External service that lists the renditions of a video.
pub trait StreamSource: Send + Sync + 'static {
  fn fetch_streams(&self, video_id: &str) -> impl Future<Output = Result<StreamCatalog, PlaybackError>> + Send;
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
  #[serde(default)]
  formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
  url: Option<String>,
  height: Option<u32>,
  vcodec: Option<String>,
  acodec: Option<String>,
  tbr: Option<f64>,
}

fn has_codec(codec: &Option<String>) -> bool {
  codec.as_deref().is_some_and(|c| c != "none")
}

/// Build a catalog from `yt-dlp -J` output.
///
/// Video formats are labelled `<height>p`. For a repeated label, renditions
/// with audio win over video-only ones, then the higher bitrate wins.
pub fn parse_ytdlp_formats(json: &[u8]) -> Result<StreamCatalog, PlaybackError> {
  let info: YtDlpInfo =
    serde_json::from_slice(json).map_err(|e| PlaybackError::ResolutionFailed(format!("bad yt-dlp output: {}", e)))?;

  let mut best: HashMap<String, ((bool, f64), Rendition)> = HashMap::new();
  let mut audio: Option<(f64, String)> = None;

  for format in info.formats {
    let Some(url) = format.url else { continue };
    let tbr = format.tbr.unwrap_or(0.0);
    let has_video = has_codec(&format.vcodec);
    let has_audio = has_codec(&format.acodec);

    if has_video {
      let Some(height) = format.height else { continue };
      let label = format!("{}p", height);
      let rank = (has_audio, tbr);
      let better = best.get(&label).is_none_or(|(current, _)| rank > *current);
      if better {
        best.insert(label, (rank, Rendition { url, has_audio }));
      }
    } else if has_audio && audio.as_ref().is_none_or(|(current, _)| tbr > *current) {
      audio = Some((tbr, url));
    }
  }

  Ok(StreamCatalog {
    streams: best.into_iter().map(|(label, (_, rendition))| (label, rendition)).collect(),
    audio: audio.map(|(_, url)| url),
  })
}

/// Resolves renditions by asking `yt-dlp` for the video's format list.
#[derive(Debug, Default)]
pub struct YtDlpSource;

impl StreamSource for YtDlpSource {
  async fn fetch_streams(&self, video_id: &str) -> Result<StreamCatalog, PlaybackError> {
    let url = watch_url(video_id);
    let output = Command::new("yt-dlp")
      .args(["-J", "--no-playlist", "--no-warnings", "--", &url])
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .output()
      .await
      .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
          PlaybackError::ResolutionFailed(
            "yt-dlp not found. Install it with: brew install yt-dlp (macOS) or pip install yt-dlp".to_string(),
          )
        } else {
          PlaybackError::ResolutionFailed(format!("failed to execute yt-dlp: {}", e))
        }
      })?;

    if !output.status.success() {
      return Err(PlaybackError::ResolutionFailed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }
    parse_ytdlp_formats(&output.stdout)
  }
}

// --- Strategies ---

/// Turns a watch reference into something a playback surface can render.
pub trait PlaybackStrategy: Send + Sync {
  fn kind(&self) -> PlayerKind;
  fn prepare(&self, watch_ref: &str) -> BoxFuture<'static, Result<PlaybackTarget, PlaybackError>>;
}

/// Hands the watch URL straight to the browser.
pub struct EmbeddedStrategy;

impl PlaybackStrategy for EmbeddedStrategy {
  fn kind(&self) -> PlayerKind {
    PlayerKind::Browser
  }

  fn prepare(&self, watch_ref: &str) -> BoxFuture<'static, Result<PlaybackTarget, PlaybackError>> {
    let url = watch_ref.to_string();
    Box::pin(async move { Ok(PlaybackTarget::Page { url }) })
  }
}

/// Resolves a stream through a [`StreamSource`] and applies the quality policy.
pub struct ResolvedStrategy<S> {
  source: Arc<S>,
  preferred: Vec<String>,
}

impl<S: StreamSource> ResolvedStrategy<S> {
  pub fn new(source: S, preferred: Vec<String>) -> Self {
    Self { source: Arc::new(source), preferred }
  }
}

/// Resolve `watch_ref` into a native stream target.
pub async fn resolve<S: StreamSource>(
  source: &S,
  watch_ref: &str,
  preferred: &[String],
) -> Result<PlaybackTarget, PlaybackError> {
  let video_id = video_id_from_watch_ref(watch_ref);
  debug!(video_id, "resolve: fetching streams");
  let catalog = source.fetch_streams(video_id).await?;
  let (quality, rendition) = select_stream(&catalog, preferred)?;
  info!(video_id, quality, muxed = rendition.has_audio, "resolve: stream selected");
  Ok(PlaybackTarget::Stream {
    quality: quality.to_string(),
    url: rendition.url.clone(),
    audio: if rendition.has_audio { None } else { catalog.audio.clone() },
  })
}

impl<S: StreamSource> PlaybackStrategy for ResolvedStrategy<S> {
  fn kind(&self) -> PlayerKind {
    PlayerKind::Native
  }

  fn prepare(&self, watch_ref: &str) -> BoxFuture<'static, Result<PlaybackTarget, PlaybackError>> {
    let source = Arc::clone(&self.source);
    let preferred = self.preferred.clone();
    let watch_ref = watch_ref.to_string();
    Box::pin(async move { resolve(source.as_ref(), &watch_ref, &preferred).await })
  }
}

/// Build the strategy configured by `kind`.
pub fn strategy_for(kind: PlayerKind) -> Arc<dyn PlaybackStrategy> {
  match kind {
    PlayerKind::Browser => Arc::new(EmbeddedStrategy),
    PlayerKind::Native => Arc::new(ResolvedStrategy::new(YtDlpSource, constants().preferred_qualities.clone())),
  }
}
