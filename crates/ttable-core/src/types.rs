//! 置換表が格納する探索側の型
//!
//! 指し手・評価値のエンコードは探索側の責務であり、置換表はビット幅だけを知っていればよい。
//! ここではその境界となる最小限の型を定義する。

/// 探索深さ
pub type Depth = i32;

/// 置換表エントリに保存する深さのオフセット
///
/// `depth8 = depth - DEPTH_ENTRY_OFFSET` として保存する。`depth8 == 0` は空きスロット。
pub const DEPTH_ENTRY_OFFSET: Depth = -7;

/// 置換表に保存できる最小の深さ（静止探索の最浅部より浅い番兵値）
pub const DEPTH_NONE: Depth = DEPTH_ENTRY_OFFSET + 1;

/// 置換表に保存できる最大の深さ
pub const DEPTH_MAX_STORED: Depth = DEPTH_ENTRY_OFFSET + u8::MAX as Depth;

/// 16bit形式の指し手
///
/// 上位のビット割り当ては探索側が決める。置換表は値をそのまま保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    /// 指し手なし
    pub const NONE: Move = Move(0);

    #[inline]
    pub const fn from_u16(raw: u16) -> Move {
        Move(raw)
    }

    #[inline]
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// 評価値
///
/// 探索中は i32 で扱い、置換表には i16 に詰めて保存する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Value(i32);

impl Value {
    /// ゼロ
    pub const ZERO: Value = Value(0);
    /// 詰み（勝ち側の最大スコア）
    pub const MATE: Value = Value(32000);
    /// 無限大
    pub const INFINITE: Value = Value(32001);
    /// 無効値（評価値が未計算であることを表す）
    pub const NONE: Value = Value(32002);

    /// 値から生成
    #[inline]
    pub const fn new(v: i32) -> Value {
        Value(v)
    }

    /// 生の値を取得
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

/// 評価値の境界タイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Bound {
    /// なし
    #[default]
    None = 0,
    /// 上界（fail-low: 真の値はこれ以下）
    Upper = 1,
    /// 下界（fail-high: 真の値はこれ以上）
    Lower = 2,
    /// 正確な値
    Exact = 3,
}

impl Bound {
    /// 下位2bitから変換（常に成功する）
    #[inline]
    pub const fn from_bits(bits: u8) -> Bound {
        match bits & 0x3 {
            0 => Bound::None,
            1 => Bound::Upper,
            2 => Bound::Lower,
            _ => Bound::Exact,
        }
    }

    /// 下界を含むか（Lower または Exact）
    #[inline]
    pub const fn is_lower(self) -> bool {
        (self as u8) & (Bound::Lower as u8) != 0
    }

    /// 上界を含むか（Upper または Exact）
    #[inline]
    pub const fn is_upper(self) -> bool {
        (self as u8) & (Bound::Upper as u8) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_from_bits_is_total() {
        for bits in 0..=u8::MAX {
            let bound = Bound::from_bits(bits);
            assert_eq!(bound as u8, bits & 0x3);
        }
    }

    #[test]
    fn test_bound_flags() {
        assert!(Bound::Exact.is_lower() && Bound::Exact.is_upper());
        assert!(Bound::Lower.is_lower() && !Bound::Lower.is_upper());
        assert!(!Bound::Upper.is_lower() && Bound::Upper.is_upper());
        assert!(!Bound::None.is_lower() && !Bound::None.is_upper());
    }

    #[test]
    fn test_depth_range() {
        assert_eq!(DEPTH_NONE, -6);
        assert_eq!(DEPTH_MAX_STORED - DEPTH_NONE, 254);
    }

    #[test]
    fn test_value_ordering() {
        assert!(Value::ZERO.raw() < Value::MATE.raw());
        assert!(Value::MATE.raw() < Value::INFINITE.raw());
        assert!(Value::INFINITE.raw() < Value::NONE.raw());
    }

    #[test]
    fn test_value_none_fits_in_i16() {
        assert!(Value::NONE.raw() <= i16::MAX as i32);
        assert!(-Value::INFINITE.raw() >= i16::MIN as i32);
    }
}
