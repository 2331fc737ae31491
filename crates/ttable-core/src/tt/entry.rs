//! 置換表エントリー
//!
//! TTEntry: 10バイトのコンパクトなエントリ構造
//! TTData: 読み取り用のデータ構造
//!
//! 各フィールドは個別のアトミック変数で、すべて `Relaxed` で読み書きする。
//! 複数スレッドが同じエントリを同時に書くと、フィールド単位で異なる書き込みが混ざることがある。
//! どのビット列もデコード可能なので、混ざった結果も値域の外には出ない。

use std::sync::atomic::{AtomicU8, AtomicU16, Ordering};

use super::{GENERATION_CYCLE, GENERATION_DELTA, GENERATION_MASK, REPLACE_AGE_WEIGHT};
use crate::types::{Bound, DEPTH_ENTRY_OFFSET, DEPTH_MAX_STORED, DEPTH_NONE, Depth, Move, Value};

/// pv フラグのビット
const PV_BIT: u8 = 0x4;
/// bound のビット
const BOUND_BITS: u8 = 0x3;

/// 置換表エントリー
/// メモリ効率のため、フィールドを詰め込む（10バイト）
#[repr(C)]
pub struct TTEntry {
    /// ハッシュキーの下位16bit（衝突検出用）
    key16: AtomicU16,
    /// 探索深さ（DEPTH_ENTRY_OFFSETを引いた値、0は空き）
    depth8: AtomicU8,
    /// generation(5bit) | pv(1bit) | bound(2bit)
    gen_bound8: AtomicU8,
    /// 最善手（16bit形式）
    move16: AtomicU16,
    /// 探索値（i16のビット列）
    value16: AtomicU16,
    /// 評価値（i16のビット列）
    eval16: AtomicU16,
}

// エントリサイズが10バイトであることを保証
const _: () = assert!(std::mem::size_of::<TTEntry>() == 10);

impl TTEntry {
    /// 新しい空のエントリを作成
    #[inline]
    pub const fn new() -> Self {
        Self {
            key16: AtomicU16::new(0),
            depth8: AtomicU8::new(0),
            gen_bound8: AtomicU8::new(0),
            move16: AtomicU16::new(0),
            value16: AtomicU16::new(0),
            eval16: AtomicU16::new(0),
        }
    }

    /// エントリが使用されているか
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.depth8() != 0
    }

    /// キーを取得
    #[inline]
    pub fn key16(&self) -> u16 {
        self.key16.load(Ordering::Relaxed)
    }

    /// 保存されている生のdepth8を取得
    #[inline]
    pub fn depth8(&self) -> u8 {
        self.depth8.load(Ordering::Relaxed)
    }

    #[inline]
    fn gen_bound8(&self) -> u8 {
        self.gen_bound8.load(Ordering::Relaxed)
    }

    /// 最善手
    #[inline]
    pub fn mv(&self) -> Move {
        Move::from_u16(self.move16.load(Ordering::Relaxed))
    }

    /// 探索値
    #[inline]
    pub fn value(&self) -> Value {
        Value::new(self.value16.load(Ordering::Relaxed) as i16 as i32)
    }

    /// 評価値
    #[inline]
    pub fn eval(&self) -> Value {
        Value::new(self.eval16.load(Ordering::Relaxed) as i16 as i32)
    }

    /// 深さを取得（DEPTH_ENTRY_OFFSETを加算）
    #[inline]
    pub fn depth(&self) -> Depth {
        self.depth8() as Depth + DEPTH_ENTRY_OFFSET
    }

    /// PVノードで保存されたか
    #[inline]
    pub fn is_pv(&self) -> bool {
        self.gen_bound8() & PV_BIT != 0
    }

    /// 境界タイプ
    #[inline]
    pub fn bound(&self) -> Bound {
        Bound::from_bits(self.gen_bound8() & BOUND_BITS)
    }

    /// エントリを読み取る
    ///
    /// gen_bound8 は1回だけ読み、pv と bound の組が食い違わないようにする。
    pub fn read(&self) -> TTData {
        let gen_bound8 = self.gen_bound8();
        TTData {
            mv: self.mv(),
            value: self.value(),
            eval: self.eval(),
            depth: self.depth(),
            bound: Bound::from_bits(gen_bound8 & BOUND_BITS),
            is_pv: gen_bound8 & PV_BIT != 0,
        }
    }

    /// エントリに保存
    ///
    /// # 引数が多い理由
    /// この関数は探索のホットパスで頻繁に呼ばれるため、
    /// 構造体にまとめるオーバーヘッドを避けて個別の引数として渡している。
    ///
    /// 同じキーへの書き込みで手がない場合は古い手を、評価値が `Value::NONE` の場合は
    /// 古い評価値を残す。それ以外のフィールドと世代は常に上書きする。
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key16: u16,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        debug_assert!(
            (DEPTH_NONE..=DEPTH_MAX_STORED).contains(&depth),
            "depth out of storable range: {depth}"
        );
        debug_assert!(generation8 & (GENERATION_DELTA - 1) == 0);

        let same_key = key16 == self.key16();

        // 新しい手がない場合は古い手を保持
        if !mv.is_none() || !same_key {
            self.move16.store(mv.to_u16(), Ordering::Relaxed);
        }
        if eval != Value::NONE || !same_key {
            self.eval16.store(eval.raw() as i16 as u16, Ordering::Relaxed);
        }

        self.key16.store(key16, Ordering::Relaxed);
        self.depth8.store((depth - DEPTH_ENTRY_OFFSET) as u8, Ordering::Relaxed);
        self.gen_bound8
            .store(generation8 | ((is_pv as u8) << 2) | bound as u8, Ordering::Relaxed);
        self.value16.store(value.raw() as i16 as u16, Ordering::Relaxed);
    }

    /// 世代だけを現在のものに更新する（pv / bound は保持）
    #[inline]
    pub(super) fn refresh(&self, generation8: u8) {
        let pv_bound = self.gen_bound8() & (GENERATION_DELTA - 1);
        self.gen_bound8.store(generation8 | pv_bound, Ordering::Relaxed);
    }

    /// 相対的な世代（0 = 最新、最大31）
    ///
    /// 下位3bitを1にした定数を足してから引くので、世代が一周していても負にならない。
    #[inline]
    pub fn relative_age(&self, generation8: u8) -> u8 {
        (age_by8(generation8, self.gen_bound8()) >> super::GENERATION_BITS) as u8
    }

    /// 現在の世代で書かれたエントリか
    #[inline]
    pub(super) fn is_current(&self, generation8: u8) -> bool {
        self.is_occupied() && (self.gen_bound8() as u16 & GENERATION_MASK) == generation8 as u16
    }

    /// 置換スコア = depth8 - 8 × relative_age（小さいほど置換されやすい）
    ///
    /// 空きスロットは常に最小。
    #[inline]
    pub(super) fn replace_score(&self, generation8: u8) -> i32 {
        let depth8 = self.depth8();
        if depth8 == 0 {
            return i32::MIN;
        }
        depth8 as i32 - REPLACE_AGE_WEIGHT * self.relative_age(generation8) as i32
    }
}

impl Default for TTEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TTEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TTEntry")
            .field("key16", &format_args!("{:#06x}", self.key16()))
            .field("depth8", &self.depth8())
            .field("gen_bound8", &format_args!("{:#04x}", self.gen_bound8()))
            .field("data", &self.read())
            .finish()
    }
}

/// 世代差 × 8（下位3bitは0）
#[inline]
fn age_by8(generation8: u8, gen_bound8: u8) -> u16 {
    GENERATION_CYCLE
        .wrapping_add(generation8 as u16)
        .wrapping_sub(gen_bound8 as u16)
        & GENERATION_MASK
}

/// 置換表から読み取ったデータ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TTData {
    /// 最善手
    pub mv: Move,
    /// 探索値
    pub value: Value,
    /// 評価値
    pub eval: Value,
    /// 探索深さ
    pub depth: Depth,
    /// 境界タイプ
    pub bound: Bound,
    /// PVノードかどうか
    pub is_pv: bool,
}

impl TTData {
    /// 空のデータ
    pub const EMPTY: Self = Self {
        mv: Move::NONE,
        value: Value::NONE,
        eval: Value::NONE,
        depth: DEPTH_ENTRY_OFFSET,
        bound: Bound::None,
        is_pv: false,
    };
}

impl Default for TTData {
    fn default() -> Self {
        Self::EMPTY
    }
}
