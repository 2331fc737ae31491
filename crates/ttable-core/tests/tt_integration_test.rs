//! 置換表の単一スレッド統合テスト

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use ttable_core::{Bound, Move, TTData, TranspositionTable, TtConfig, TtError, Value};

fn small_table() -> TranspositionTable {
    TranspositionTable::with_config(&TtConfig {
        hash_mb: 16,
        threads: 2,
        large_pages: false,
    })
    .unwrap()
}

#[test]
fn test_unwritten_keys_are_not_found() {
    let tt = small_table();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    for _ in 0..10_000 {
        let result = tt.probe(rng.random());
        assert!(!result.found);
        assert_eq!(result.data, TTData::EMPTY);
    }
    assert_eq!(tt.hashfull(), 0);
}

#[test]
fn test_written_entries_roundtrip_exactly() {
    let tt = small_table();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
    let bounds = [Bound::Upper, Bound::Lower, Bound::Exact];

    let mut written = Vec::new();
    for _ in 0..2_000 {
        let key: u64 = rng.random();
        let data = TTData {
            mv: Move::from_u16(rng.random_range(1..=u16::MAX)),
            value: Value::new(rng.random_range(-32000..=32000)),
            eval: Value::new(rng.random_range(-3000..=3000)),
            depth: rng.random_range(1..=64),
            bound: bounds[rng.random_range(0..bounds.len())],
            is_pv: rng.random(),
        };

        let result = tt.probe(key);
        assert!(!result.found);
        result.writer.write(
            key,
            data.value,
            data.is_pv,
            data.bound,
            data.depth,
            data.mv,
            data.eval,
            tt.generation(),
        );
        written.push((key, data));
    }

    // 16MB（約52万クラスター）に2000件なので、同一クラスター・同一key16の衝突は実質起きない
    for (key, data) in written {
        let result = tt.probe(key);
        assert!(result.found, "key {key:#018x} lost");
        assert_eq!(result.data, data);
    }
}

#[test]
fn test_resize_then_probe_is_empty() {
    let mut tt = small_table();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    let keys: Vec<u64> = (0..1_000).map(|_| rng.random()).collect();

    for size in [5, 32, 1] {
        for &key in &keys {
            let result = tt.probe(key);
            result.write(key, Value::ZERO, false, Bound::Lower, 3, Move::NONE, Value::ZERO, 0);
        }
        tt.resize(size).unwrap();
        assert_eq!(tt.cluster_count(), size * 1024 * 1024 / 32);
        assert!(keys.iter().all(|&key| !tt.probe(key).found));
    }
}

#[test]
fn test_resize_errors_are_reported() {
    let mut tt = small_table();
    assert!(matches!(tt.resize(0), Err(TtError::ZeroSize)));
    assert!(matches!(tt.resize(usize::MAX), Err(TtError::SizeOverflow { .. })));
    assert_eq!(tt.size_mb(), 16);
}

#[test]
fn test_config_from_toml() {
    let config: TtConfig = toml::from_str(
        r#"
        hash_mb = 2
        threads = 3
        large_pages = false
        "#,
    )
    .unwrap();
    let tt = TranspositionTable::with_config(&config).unwrap();
    assert_eq!(tt.size_mb(), 2);
    assert_eq!(tt.init_threads(), 3);
    assert!(!tt.uses_large_pages());
}
