//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so there is no runtime file
//! I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Search API
  pub search_endpoint: String,
  pub max_results: u32,
  pub watch_url_prefix: String,

  /// Quality labels tried in order when picking a native stream.
  pub preferred_qualities: Vec<String>,

  pub error_dismiss_secs: u64,

  /// Environment variable holding the search API credential.
  pub api_key_env: String,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; a malformed file fails on first access in any test.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.max_results, 5);
    assert_eq!(c.preferred_qualities, vec!["1080p".to_string(), "720p".to_string()]);
    assert!(c.watch_url_prefix.ends_with("watch?v="));
  }
}
