//! TranspositionTable本体
//!
//! - Cluster: エントリのグループ
//! - TranspositionTable: テーブル本体
//! - probe/write操作

use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};

use super::alloc::{AllocKind, Allocation};
use super::config::TtConfig;
use super::entry::{TTData, TTEntry};
use super::{CLUSTER_SIZE, GENERATION_DELTA, HASHFULL_SAMPLE_CLUSTERS, TtError};
use crate::prefetch::TtPrefetch;
use crate::types::{Bound, DEPTH_ENTRY_OFFSET, Depth, Move, Value};

/// 並列ゼロクリアに切り替えるスレッドあたりの最小クラスター数
const PARALLEL_CLEAR_MIN_CLUSTERS: usize = 1024;

/// クラスター構造
/// 同じハッシュインデックスに対して複数のエントリを持つ
/// 10bytes × 3 + 2 = 32bytes（キャッシュライン64バイトの半分）
#[repr(C, align(32))]
pub(crate) struct Cluster {
    entries: [TTEntry; CLUSTER_SIZE],
    _padding: [u8; 2],
}

impl Cluster {
    /// 新しいクラスターを作成
    #[cfg(test)]
    const fn new() -> Self {
        Self {
            entries: [const { TTEntry::new() }; CLUSTER_SIZE],
            _padding: [0; 2],
        }
    }
}

// クラスターは32バイトであることを保証
const _: () = assert!(std::mem::size_of::<Cluster>() == 32);

/// `len` 個のクラスターをゼロクリアする（やねうら王の Tools::memclear 相当）
///
/// サイズが小さい場合やスレッド数が1の場合は呼び出しスレッドで逐次クリアする。
/// 全ビット0のクラスターは空のエントリ3つとして有効な値である。
///
/// # Safety
/// `ptr` から `len` 個分の `Cluster` 領域が書き込み可能で、
/// クリア中に他から参照されていないこと。
unsafe fn memclear(ptr: *mut Cluster, len: usize, threads: usize) {
    if threads <= 1 || len < threads * PARALLEL_CLEAR_MIN_CLUSTERS {
        // SAFETY: 呼び出し元の契約による
        unsafe { std::ptr::write_bytes(ptr, 0, len) };
        return;
    }

    let chunk = len.div_ceil(threads);
    let base = ptr as usize;

    // スレッドを分割してゼロクリアし、全スレッドの終了を待ってから戻る
    std::thread::scope(|scope| {
        for i in 0..threads {
            let start = i * chunk;
            if start >= len {
                break;
            }
            let count = chunk.min(len - start);

            scope.spawn(move || {
                let ptr = (base as *mut Cluster).wrapping_add(start);
                // SAFETY: 各スレッドは重ならない [start, start + count) だけを書く
                unsafe { std::ptr::write_bytes(ptr, 0, count) };
            });
        }
    });
}

struct ClusterTable {
    alloc: Allocation,
    len: usize,
}

impl ClusterTable {
    /// 確保してゼロクリアする。失敗時は何も確保されていない。
    fn new(len: usize, large_pages: bool, threads: usize) -> Result<Self, TtError> {
        let bytes = len
            .checked_mul(std::mem::size_of::<Cluster>())
            .ok_or(TtError::AllocationFailed { bytes: usize::MAX })?;
        let alloc = Allocation::allocate(bytes, std::mem::align_of::<Cluster>(), large_pages)?;
        let mut table = Self { alloc, len };
        table.zero(threads);
        Ok(table)
    }

    fn zero(&mut self, threads: usize) {
        let ptr = self.alloc.ptr().as_ptr() as *mut Cluster;
        // SAFETY: &mut self なので他に参照はなく、領域は len 個分確保済み
        unsafe { memclear(ptr, self.len, threads) };
    }

    fn uses_large_pages(&self) -> bool {
        self.alloc.kind() == AllocKind::LargePages
    }
}

impl Deref for ClusterTable {
    type Target = [Cluster];

    fn deref(&self) -> &Self::Target {
        // SAFETY: new() で len 個分をゼロクリア済み
        unsafe { std::slice::from_raw_parts(self.alloc.ptr().as_ptr() as *const Cluster, self.len) }
    }
}

/// 置換表
///
/// probe / write / new_search / generation / hashfull は `&self` で、
/// 探索スレッド間でロックなしに共有できる。
/// resize / clear は `&mut self` を取るため、探索中の呼び出しは型で防がれる。
pub struct TranspositionTable {
    /// クラスターの配列
    table: ClusterTable,
    /// クラスター数
    cluster_count: usize,
    /// 世代カウンター（下位3bitは常に0）
    generation8: AtomicU8,
    /// 要求されたサイズ（MB）
    size_mb: usize,
    /// ゼロクリアに使うスレッド数
    init_threads: usize,
    /// Large Pages を試みるか
    large_pages: bool,
}

/// MB 指定からクラスター数を求める
fn cluster_count_for(mb_size: usize) -> Result<usize, TtError> {
    if mb_size == 0 {
        return Err(TtError::ZeroSize);
    }
    let bytes = mb_size
        .checked_mul(1024 * 1024)
        .ok_or(TtError::SizeOverflow { mb: mb_size })?;
    Ok(bytes / std::mem::size_of::<Cluster>())
}

impl TranspositionTable {
    /// 新しい置換表を作成（サイズはMB単位）
    pub fn new(mb_size: usize) -> Result<Self, TtError> {
        Self::with_config(&TtConfig {
            hash_mb: mb_size,
            ..TtConfig::default()
        })
    }

    /// 設定から置換表を作成
    pub fn with_config(config: &TtConfig) -> Result<Self, TtError> {
        config.validate()?;
        let cluster_count = cluster_count_for(config.hash_mb)?;
        let table = ClusterTable::new(cluster_count, config.large_pages, config.threads)?;

        log::info!(
            "TT init: size_mb={} clusters={} large_pages={}",
            config.hash_mb,
            cluster_count,
            table.uses_large_pages()
        );

        Ok(Self {
            table,
            cluster_count,
            generation8: AtomicU8::new(0),
            size_mb: config.hash_mb,
            init_threads: config.threads,
            large_pages: config.large_pages,
        })
    }

    /// サイズを変更
    ///
    /// 新しい領域を確保してから古い領域を解放する。確保に失敗した場合は
    /// 古いテーブルの内容・世代をそのまま残してエラーを返す。
    /// 成功時は全エントリが空で、世代は0に戻る。
    pub fn resize(&mut self, mb_size: usize) -> Result<(), TtError> {
        let new_count = cluster_count_for(mb_size)?;

        if new_count == self.cluster_count {
            self.size_mb = mb_size;
            self.clear();
            return Ok(());
        }

        let table = ClusterTable::new(new_count, self.large_pages, self.init_threads)?;
        self.table = table;
        self.cluster_count = new_count;
        self.size_mb = mb_size;
        self.generation8.store(0, Ordering::Relaxed);

        log::info!(
            "TT resize: size_mb={} clusters={} large_pages={}",
            mb_size,
            new_count,
            self.table.uses_large_pages()
        );
        Ok(())
    }

    /// クリア（新しい対局の開始時に使う）
    pub fn clear(&mut self) {
        self.generation8.store(0, Ordering::Relaxed);
        self.table.zero(self.init_threads);
        log::debug!("TT clear: clusters={} threads={}", self.cluster_count, self.init_threads);
    }

    /// 新しい探索を開始（世代を進める）
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    /// 現在の世代を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    /// 置換表を検索
    ///
    /// 下位16bitが一致する使用中エントリがあればその内容を返し、世代を更新する。
    /// なければ置換スコアが最小のエントリを書き込み先として返す。
    pub fn probe(&self, key: u64) -> ProbeResult<'_> {
        let cluster = self.cluster(key);
        let key16 = key as u16;
        let gen8 = self.generation();

        for entry in &cluster.entries {
            if entry.key16() == key16 && entry.is_occupied() {
                let data = entry.read();
                // 直後に古いエントリとして追い出されないよう世代を更新
                entry.refresh(gen8);

                return ProbeResult {
                    found: true,
                    data,
                    writer: TTWriter { entry },
                };
            }
        }

        // 置換するエントリを選択（価値が最小のもの、同点なら先頭側）
        let mut replace = &cluster.entries[0];
        let mut min_value = replace.replace_score(gen8);

        for entry in &cluster.entries[1..] {
            let value = entry.replace_score(gen8);
            if value < min_value {
                min_value = value;
                replace = entry;
            }
        }

        ProbeResult {
            found: false,
            data: TTData::EMPTY,
            writer: TTWriter { entry: replace },
        }
    }

    /// 置換表の使用率を1000分率で返す（現在の世代のエントリのみ数える）
    pub fn hashfull(&self) -> i32 {
        let gen8 = self.generation();
        self.sample_per_mille(|entry| entry.is_current(gen8))
    }

    /// 置換表の使用率を1000分率で返す
    ///
    /// 先頭の最大1000クラスターだけを標本とし、
    /// `relative_age <= max_age` の使用中エントリを数える。
    pub fn hashfull_with_age(&self, max_age: u8) -> i32 {
        let gen8 = self.generation();
        self.sample_per_mille(|entry| entry.is_occupied() && entry.relative_age(gen8) <= max_age)
    }

    /// 標本クラスター中で `pred` を満たすエントリの割合（1000分率）
    fn sample_per_mille(&self, pred: impl Fn(&TTEntry) -> bool) -> i32 {
        let sample_count = HASHFULL_SAMPLE_CLUSTERS.min(self.cluster_count);
        let count = self
            .table
            .iter()
            .take(sample_count)
            .flat_map(|cluster| cluster.entries.iter())
            .filter(|entry| pred(entry))
            .count();

        (count * 1000 / (sample_count * CLUSTER_SIZE)) as i32
    }

    /// クラスター数
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// 要求されたサイズ（MB）
    pub fn size_mb(&self) -> usize {
        self.size_mb
    }

    /// ゼロクリアに使うスレッド数
    pub fn init_threads(&self) -> usize {
        self.init_threads
    }

    /// ゼロクリアに使うスレッド数を設定（0は1として扱う）
    pub fn set_init_threads(&mut self, threads: usize) {
        self.init_threads = threads.max(1);
    }

    /// Large Pagesを使って確保されたかを返す
    pub fn uses_large_pages(&self) -> bool {
        self.table.uses_large_pages()
    }

    /// クラスターインデックスを計算
    #[inline]
    fn cluster_index(&self, key: u64) -> usize {
        // key * cluster_count / 2^64 でインデックスを計算
        ((key as u128 * self.cluster_count as u128) >> 64) as usize
    }

    /// クラスターの参照を取得
    #[inline]
    fn cluster(&self, key: u64) -> &Cluster {
        &self.table[self.cluster_index(key)]
    }

    /// キーに対応するクラスターの先頭エントリ（プリフェッチ用、検索はしない）
    #[inline]
    pub fn first_entry(&self, key: u64) -> &TTEntry {
        &self.cluster(key).entries[0]
    }

    /// 指定キーのクラスターをプリフェッチ
    #[inline]
    pub fn prefetch(&self, key: u64) {
        let cluster = self.cluster(key);

        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_MM_HINT_T0, _mm_prefetch};
            _mm_prefetch::<_MM_HINT_T0>(cluster as *const Cluster as *const i8);
        }

        #[cfg(target_arch = "aarch64")]
        unsafe {
            // stable には prefetch の intrinsic がないため prfm を直接発行する
            std::arch::asm!(
                "prfm pldl1keep, [{0}]",
                in(reg) cluster as *const Cluster,
                options(nostack, readonly, preserves_flags)
            );
        }

        #[cfg(all(not(target_arch = "x86_64"), not(target_arch = "aarch64")))]
        let _ = cluster; // 何もしない
    }
}

impl TtPrefetch for TranspositionTable {
    #[inline]
    fn prefetch(&self, key: u64) {
        TranspositionTable::prefetch(self, key);
    }
}

/// probe結果
pub struct ProbeResult<'a> {
    /// ヒットしたか
    pub found: bool,
    /// 読み取ったデータ（ヒットしなければ `TTData::EMPTY`）
    pub data: TTData,
    /// 書き込み用ハンドル
    pub writer: TTWriter<'a>,
}

impl ProbeResult<'_> {
    /// `writer.write` の短縮形
    #[allow(clippy::too_many_arguments)]
    #[inline]
    pub fn write(
        &self,
        key: u64,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        self.writer.write(key, value, is_pv, bound, depth, mv, eval, generation8);
    }
}

/// probe で選ばれたエントリへの書き込みハンドル
///
/// テーブルを借用しているので、生きている間は resize / clear できない。
/// 他スレッドが同じエントリに同時に書き込むことは許容する。
#[derive(Clone, Copy)]
pub struct TTWriter<'a> {
    entry: &'a TTEntry,
}

impl TTWriter<'_> {
    /// エントリに書き込む
    ///
    /// probe がヒットしたかどうかに関係なく常に書き込む。
    /// 書き込むべきかの判断は呼び出し側の責任（`should_overwrite` を参照）。
    #[allow(clippy::too_many_arguments)]
    #[inline]
    pub fn write(
        &self,
        key: u64,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        self.entry
            .save(key as u16, value, is_pv, bound, depth, mv, eval, generation8);
    }

    /// 書き込む価値があるかの目安
    ///
    /// - BOUND_EXACT（確定値）
    /// - 異なるキー
    /// - より深い探索 or PVノード優先（既存より4以上浅くない）
    /// - 古いエントリ
    pub fn should_overwrite(
        &self,
        key: u64,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        generation8: u8,
    ) -> bool {
        let d8 = depth - DEPTH_ENTRY_OFFSET;
        bound == Bound::Exact
            || key as u16 != self.entry.key16()
            || d8 + 2 * (is_pv as i32) > self.entry.depth8() as i32 - 4
            || self.entry.relative_age(generation8) != 0
    }

    /// 書き込み先のエントリ
    #[inline]
    pub fn entry(&self) -> &TTEntry {
        self.entry
    }
}
