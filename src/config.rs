use anyhow::{Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::constants;
use crate::resolver::PlayerKind;

/// User preferences read from `prefs.toml` in the platform config dir.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub api_key: Option<String>,
  pub player: Option<PlayerKind>,
  pub endpoint: Option<String>,
}

/// Fully resolved settings the app runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub api_key: String,
  pub player: PlayerKind,
  pub endpoint: String,
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
  pub api_key: Option<String>,
  pub player: Option<PlayerKind>,
  pub endpoint: Option<String>,
}

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "ytlist")
}

pub fn config_file() -> Option<PathBuf> {
  project_dirs().map(|d| d.config_dir().join("prefs.toml"))
}

/// Directory the log file is written to.
pub fn log_dir() -> PathBuf {
  project_dirs().map(|d| d.data_local_dir().to_path_buf()).unwrap_or_else(std::env::temp_dir)
}

impl Config {
  pub fn load() -> Self {
    if let Some(path) = config_file()
      && let Ok(content) = std::fs::read_to_string(path)
    {
      return Self::parse(&content);
    }
    Self::default()
  }

  /// Parse prefs content, falling back to defaults on malformed input.
  pub fn parse(content: &str) -> Self {
    toml::from_str(content).unwrap_or_default()
  }

  /// Merge with command-line overrides and the environment credential.
  ///
  /// Precedence: overrides > environment > prefs file > compiled defaults.
  pub fn resolve(self, overrides: Overrides, env_api_key: Option<String>) -> Result<Settings> {
    let api_key = overrides
      .api_key
      .or(env_api_key)
      .or(self.api_key)
      .map(|k| k.trim().to_string())
      .filter(|k| !k.is_empty())
      .ok_or_else(|| {
        let path = config_file().map_or_else(|| "prefs.toml".to_string(), |p| p.display().to_string());
        anyhow!("No API key configured. Set {} or add api_key to {}", constants().api_key_env, path)
      })?;

    Ok(Settings {
      api_key,
      player: overrides.player.or(self.player).unwrap_or_default(),
      endpoint: overrides.endpoint.or(self.endpoint).unwrap_or_else(|| constants().search_endpoint.clone()),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_full_prefs() {
    let config = Config::parse("api_key = \"abc\"\nplayer = \"native\"\nendpoint = \"http://localhost/search\"\n");
    assert_eq!(config.api_key.as_deref(), Some("abc"));
    assert_eq!(config.player, Some(PlayerKind::Native));
    assert_eq!(config.endpoint.as_deref(), Some("http://localhost/search"));
  }

  #[test]
  fn parse_malformed_prefs_defaults() {
    assert_eq!(Config::parse("api_key = ["), Config::default());
  }

  #[test]
  fn resolve_precedence() {
    let config = Config { api_key: Some("file".into()), player: Some(PlayerKind::Native), endpoint: None };

    let settings = config.clone().resolve(Overrides::default(), Some("env".into())).unwrap();
    assert_eq!(settings.api_key, "env");
    assert_eq!(settings.player, PlayerKind::Native);
    assert_eq!(settings.endpoint, constants().search_endpoint);

    let overrides = Overrides { api_key: Some("cli".into()), player: Some(PlayerKind::Browser), endpoint: None };
    let settings = config.resolve(overrides, Some("env".into())).unwrap();
    assert_eq!(settings.api_key, "cli");
    assert_eq!(settings.player, PlayerKind::Browser);
  }

  #[test]
  fn resolve_without_key_fails() {
    let err = Config::default().resolve(Overrides::default(), Some("  ".into())).unwrap_err();
    assert!(err.to_string().contains("No API key configured"));
  }

  #[test]
  fn default_player_is_browser() {
    let settings = Config::default().resolve(Overrides::default(), Some("k".into())).unwrap();
    assert_eq!(settings.player, PlayerKind::Browser);
  }
}
