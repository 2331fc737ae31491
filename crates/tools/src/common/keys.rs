//! 合成局面キーの生成

/// splitmix64 の出力関数
///
/// 連番の局面番号を一様に散らばった64bitキーに変換する。
#[inline]
pub fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// 置換表の衝突確率の見積もり
///
/// 埋まっているエントリの割合 × クラスター内エントリ数 / 2^16。
pub fn estimated_false_hit_rate(occupied_fraction: f64, cluster_size: usize) -> f64 {
    occupied_fraction * cluster_size as f64 / 65536.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix64_spreads_sequential_ids() {
        let keys: Vec<u64> = (0..1024).map(mix64).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), keys.len());
        // 上位ビットも偏らない
        let high = keys.iter().filter(|k| *k >> 63 == 1).count();
        assert!((400..=624).contains(&high), "high={high}");
    }

    #[test]
    fn test_estimated_false_hit_rate() {
        assert_eq!(estimated_false_hit_rate(0.0, 3), 0.0);
        assert!((estimated_false_hit_rate(1.0, 3) - 3.0 / 65536.0).abs() < 1e-12);
    }
}
