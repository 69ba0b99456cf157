use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classify::patterns::FALLBACK_SERVER_PREFIX;
use crate::classify::{PatternConfig, PatternError, PatternSet};
use crate::source::{FileTailConfig, WebhookConfig};

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// ローカルのログファイルを読む（false なら webhook で受信）
    #[serde(default)]
    pub is_local_file: bool,
    /// 分類処理のデバッグ出力
    #[serde(default)]
    pub debug: bool,
    /// ログレベル
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// ログファイル監視設定
    #[serde(default)]
    pub file: FileTailConfig,
    /// Webhook設定
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// 行分類の正規表現設定
    #[serde(default)]
    pub patterns: PatternConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            is_local_file: false,
            debug: false,
            log_level: default_log_level(),
            file: FileTailConfig::default(),
            webhook: WebhookConfig::default(),
            patterns: PatternConfig::default(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み（存在しない場合はデフォルト）
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 初回起動時はデフォルト設定をファイルに保存（作成したパスを返す）
    pub fn save_default_if_missing() -> Result<Option<PathBuf>> {
        let config_path = Self::config_path()?;
        let created = Self::write_default_to(&config_path)?;
        Ok(created.then_some(config_path))
    }

    /// 指定パスにデフォルト設定を保存（既存ファイルは上書きしない）
    pub fn write_default_to(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }

    /// 指定パスから読み込み（ファイルが必須）
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// TOML文字列から読み込み
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 設定ファイルパスを取得
    pub fn config_path() -> Result<PathBuf> {
        // ~/.config/shulker/config.toml を使用
        let base_dirs = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))?;
        Ok(base_dirs.home_dir().join(".config/shulker/config.toml"))
    }

    /// 指定パスに保存
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// 正規表現をコンパイル（debug 有効時は判定過程を出力）
    pub fn patterns(&self) -> Result<PatternSet, PatternError> {
        Ok(PatternSet::compile(&self.patterns)?.with_verbose(self.debug))
    }

    /// 設定されたサーバープレフィックス（未設定時はフォールバック）
    pub fn server_prefix(&self) -> &str {
        if self.patterns.server_prefix.is_empty() {
            FALLBACK_SERVER_PREFIX
        } else {
            &self.patterns.server_prefix
        }
    }

    /// 環境変数 PORT を考慮した待ち受けポート
    pub fn webhook_port(&self) -> u16 {
        self.webhook.effective_port()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.is_local_file);
        assert!(!config.debug);
        assert_eq!(config.webhook.path, "/minecraft/hook");
        assert_eq!(config.webhook.port, 8000);
        assert!(config.file.use_polling);
        assert_eq!(config.server_prefix(), FALLBACK_SERVER_PREFIX);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse(
            r#"
is_local_file = true
debug = true

[file]
path = "/srv/minecraft/logs/latest.log"
use_polling = false

[patterns]
server_prefix = '\[Server thread/INFO\]: (.*)'
show_player_me = true
server_name = "MC - Server"
"#,
        )
        .unwrap();

        assert!(config.is_local_file);
        assert_eq!(config.file.path, PathBuf::from("/srv/minecraft/logs/latest.log"));
        assert!(!config.file.use_polling);
        assert_eq!(config.file.poll_interval_ms, 1000);
        assert_eq!(config.webhook.port, 8000);
        assert_eq!(config.patterns.chat, "^<([^>]*)> (.*)");
        assert_eq!(config.server_prefix(), r"\[Server thread/INFO\]: (.*)");

        let patterns = config.patterns().unwrap();
        assert!(patterns.is_verbose());
        assert!(patterns.show_player_me());
        assert_eq!(patterns.server_name(), "MC - Server");
    }

    #[test]
    fn test_invalid_pattern_reported() {
        let config = Config::parse(
            r#"
[patterns]
whitelisted_console = "(unclosed"
"#,
        )
        .unwrap();
        assert!(config.patterns().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.is_local_file = true;
        config.webhook.public_url = Some("example.com".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.is_local_file);
        assert_eq!(loaded.webhook.public_url.as_deref(), Some("example.com"));
        assert_eq!(loaded.patterns.whitelisted_console, config.patterns.whitelisted_console);
    }

    #[test]
    fn test_write_default_only_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shulker/config.toml");

        assert!(Config::write_default_to(&path).unwrap());
        let written = Config::load_from(&path).unwrap();
        assert_eq!(written.webhook.port, 8000);

        std::fs::write(&path, "is_local_file = true\n").unwrap();
        assert!(!Config::write_default_to(&path).unwrap());
        assert!(Config::load_from(&path).unwrap().is_local_file);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
