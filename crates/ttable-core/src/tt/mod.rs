//! 置換表モジュール
//!
//! 探索結果をキャッシュする置換表（Transposition Table）。
//!
//! - `TTEntry`: エントリ（10バイト、16bitキー）
//! - `Cluster`: エントリのグループ（32バイト）
//! - `TranspositionTable`: テーブル本体
//! - 世代管理
//! - prefetch
//!
//! # クラスター構成（CLUSTER_SIZE=3）
//!
//! クラスターインデックスは64bitキーとクラスター数の128bit積の上位64bitで決定し、
//! クラスター内マッチングに下位16bitを使用する。
//! 10バイトエントリ × 3 + 2パディング = 32バイト/クラスター。
//!
//! # 世代
//!
//! 世代は5bitで、32回 `new_search()` が呼ばれると一周する。
//! 32世代以上触られていないエントリは新しく見えてしまうが、これは許容している近似である。

mod alloc;
mod config;
mod entry;
mod error;
mod table;

pub use config::TtConfig;
pub use entry::{TTData, TTEntry};
pub use error::TtError;
pub use table::{ProbeResult, TTWriter, TranspositionTable};

/// クラスターサイズ（エントリ数）
/// 10bytes × 3 + 2padding = 32bytes
pub const CLUSTER_SIZE: usize = 3;

/// Generation関連の定数
pub const GENERATION_BITS: u32 = 3;
pub const GENERATION_DELTA: u8 = 1 << GENERATION_BITS; // 8
pub const GENERATION_CYCLE: u16 = 255 + GENERATION_DELTA as u16;
pub const GENERATION_MASK: u16 = 0xF8; // (0xFF << GENERATION_BITS) as u8

/// 置換スコアにおける世代1つ分の重み（深さ1に相当）
pub const REPLACE_AGE_WEIGHT: i32 = 8;

/// hashfull で標本にするクラスター数
pub const HASHFULL_SAMPLE_CLUSTERS: usize = 1000;

const _: () = assert!(GENERATION_CYCLE == 263);
const _: () = assert!(GENERATION_MASK as u8 == !(GENERATION_DELTA - 1));
