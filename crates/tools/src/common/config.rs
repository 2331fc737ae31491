//! 置換表設定の読み込みとログ初期化

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use ttable_core::TtConfig;

/// 置換表に関する共通のコマンドライン引数
#[derive(Args, Debug, Clone, Default)]
pub struct TableArgs {
    /// 設定ファイル（TOML）。指定したCLI引数がファイルの値より優先される
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// テーブルサイズ（MB）
    #[arg(long)]
    pub hash_mb: Option<usize>,

    /// ゼロクリアに使うスレッド数
    #[arg(long)]
    pub init_threads: Option<usize>,

    /// Large Pages を使わない
    #[arg(long, default_value_t = false)]
    pub no_large_pages: bool,
}

impl TableArgs {
    /// ファイル → CLI の順に上書きして設定を確定する
    pub fn resolve(&self) -> Result<TtConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => TtConfig::default(),
        };

        if let Some(hash_mb) = self.hash_mb {
            config.hash_mb = hash_mb;
        }
        if let Some(threads) = self.init_threads {
            config.threads = threads;
        }
        if self.no_large_pages {
            config.large_pages = false;
        }

        config.validate()?;
        Ok(config)
    }
}

/// TOML ファイルから設定を読み込む
pub fn load_config(path: &Path) -> Result<TtConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let config: TtConfig =
        toml::from_str(&text).with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(config)
}

/// env_logger を初期化（RUST_LOG があればそちらを優先）
pub fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_defaults() {
        let config = TableArgs::default().resolve().unwrap();
        assert_eq!(config, TtConfig::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hash_mb = 64\nthreads = 2\nlarge_pages = true").unwrap();

        let args = TableArgs {
            config: Some(file.path().to_path_buf()),
            hash_mb: Some(8),
            init_threads: None,
            no_large_pages: true,
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.hash_mb, 8);
        assert_eq!(config.threads, 2);
        assert!(!config.large_pages);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let args = TableArgs {
            hash_mb: Some(0),
            ..TableArgs::default()
        };
        assert!(args.resolve().is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hash_mb = \"big\"").unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
