//! ttable-core
//!
//! 探索エンジン向けの共有置換表（Transposition Table）。
//!
//! - [`tt`]: 置換表本体（エントリ、クラスター、probe/write、世代管理）
//! - [`types`]: 置換表が格納する探索側の型（指し手、評価値、境界、深さ）
//! - [`prefetch`]: 探索ループから使うプリフェッチのトレイト
//!
//! 置換表はロックを持たず、各フィールドを `Relaxed` のアトミック操作で読み書きする。
//! 複数スレッドからの同時アクセスによる読み取りの食い違いは許容する設計である。

pub mod prefetch;
pub mod tt;
pub mod types;

pub use prefetch::{NoPrefetch, TtPrefetch};
pub use tt::{ProbeResult, TTData, TTEntry, TTWriter, TranspositionTable, TtConfig, TtError};
pub use types::{Bound, Depth, Move, Value};
