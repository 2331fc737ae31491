//! 置換表の設定

use serde::{Deserialize, Serialize};

use super::TtError;

/// 置換表の設定
///
/// TOML などから読み込めるよう、欠けたフィールドは既定値で埋める。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtConfig {
    /// テーブルサイズ（MB）
    pub hash_mb: usize,
    /// ゼロクリアに使うスレッド数
    pub threads: usize,
    /// Large Pages を試みるか
    pub large_pages: bool,
}

impl TtConfig {
    /// USI/UCI エンジンの一般的な既定値
    pub const DEFAULT_HASH_MB: usize = 16;

    /// 値の妥当性を確認する
    pub fn validate(&self) -> Result<(), TtError> {
        if self.hash_mb == 0 {
            return Err(TtError::ZeroSize);
        }
        if self.threads == 0 {
            return Err(TtError::InvalidConfig("threads must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for TtConfig {
    fn default() -> Self {
        Self {
            hash_mb: Self::DEFAULT_HASH_MB,
            threads: default_threads(),
            large_pages: true,
        }
    }
}

/// 利用可能な並列度（取得できない場合は1）
pub(crate) fn default_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TtConfig::default();
        assert_eq!(config.hash_mb, 16);
        assert!(config.threads >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = TtConfig {
            hash_mb: 0,
            ..TtConfig::default()
        };
        assert!(matches!(config.validate(), Err(TtError::ZeroSize)));

        let config = TtConfig {
            threads: 0,
            ..TtConfig::default()
        };
        assert!(matches!(config.validate(), Err(TtError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TtConfig = toml::from_str("hash_mb = 256").unwrap();
        assert_eq!(config.hash_mb, 256);
        assert!(config.large_pages);
        assert_eq!(config.threads, default_threads());
    }
}
