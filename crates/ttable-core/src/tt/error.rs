//! 置換表のエラー型

use thiserror::Error;

/// 置換表の確保・設定に関するエラー
///
/// probe/write にはエラー経路がない。衝突や競合による古い読み取りはエラーとして扱わない。
#[derive(Debug, Error)]
pub enum TtError {
    #[error("transposition table size must be at least 1 MB")]
    ZeroSize,

    #[error("transposition table size {mb} MB overflows the address space")]
    SizeOverflow { mb: usize },

    #[error("failed to allocate {bytes} bytes for the transposition table")]
    AllocationFailed { bytes: usize },

    #[error("invalid transposition table config: {0}")]
    InvalidConfig(String),
}
