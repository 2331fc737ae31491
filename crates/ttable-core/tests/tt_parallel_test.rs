//! 置換表の並列アクセステスト
//!
//! 競合による食い違いは許容するが、デコードした値が書き込まれ得る範囲から外れないことを確認する。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use ttable_core::{Bound, Move, TranspositionTable, TtConfig, Value};

const THREADS: usize = 8;
const OPS_PER_THREAD: usize = 50_000;
const KEY_POOL: usize = 4_096;

const MAX_MOVE: u16 = 0x0FFF;
const VALUE_RANGE: i32 = 1_000;
const DEPTH_RANGE: std::ops::RangeInclusive<i32> = 1..=30;

#[test]
fn test_concurrent_probe_write_stays_in_range() {
    let tt = Arc::new(
        TranspositionTable::with_config(&TtConfig {
            hash_mb: 1,
            threads: 2,
            large_pages: false,
        })
        .unwrap(),
    );

    // 全スレッドが同じキー集合を使い、同じエントリへの競合を起こす
    let mut seed_rng = Xoshiro256PlusPlus::seed_from_u64(0xC0FFEE);
    let keys: Arc<Vec<u64>> = Arc::new((0..KEY_POOL).map(|_| seed_rng.random()).collect());
    let stop = Arc::new(AtomicBool::new(false));

    // 探索と並行して世代を進めるスレッド
    let ticker = {
        let tt = Arc::clone(&tt);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                tt.new_search();
                let hashfull = tt.hashfull_with_age(31);
                assert!((0..=1000).contains(&hashfull));
                thread::yield_now();
            }
        })
    };

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tt = Arc::clone(&tt);
            let keys = Arc::clone(&keys);
            thread::spawn(move || {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(t as u64);
                let mut hits = 0usize;
                for _ in 0..OPS_PER_THREAD {
                    let key = keys[rng.random_range(0..keys.len())];
                    tt.prefetch(key);
                    let result = tt.probe(key);

                    if result.found {
                        hits += 1;
                        let data = result.data;
                        assert!(DEPTH_RANGE.contains(&data.depth), "depth {}", data.depth);
                        assert!(data.value.raw().abs() <= VALUE_RANGE, "value {:?}", data.value);
                        assert!(data.eval.raw().abs() <= VALUE_RANGE, "eval {:?}", data.eval);
                        assert!(data.mv.to_u16() <= MAX_MOVE, "move {:?}", data.mv);
                    }

                    result.writer.write(
                        key,
                        Value::new(rng.random_range(-VALUE_RANGE..=VALUE_RANGE)),
                        rng.random(),
                        if rng.random() { Bound::Lower } else { Bound::Upper },
                        rng.random_range(DEPTH_RANGE),
                        Move::from_u16(rng.random_range(1..=MAX_MOVE)),
                        Value::new(rng.random_range(-VALUE_RANGE..=VALUE_RANGE)),
                        tt.generation(),
                    );
                }
                hits
            })
        })
        .collect();

    let total_hits: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    stop.store(true, Ordering::Relaxed);
    ticker.join().unwrap();

    // キー集合は小さいので大半はヒットする
    assert!(total_hits > THREADS * OPS_PER_THREAD / 2, "hits={total_hits}");
}

#[test]
fn test_scoped_threads_share_table_by_reference() {
    let tt = TranspositionTable::new(1).unwrap();

    thread::scope(|scope| {
        for t in 0..4u64 {
            let tt = &tt;
            scope.spawn(move || {
                // スレッドごとに異なるキー
                for i in 0..1_000u64 {
                    let key = (t << 60) ^ i.wrapping_mul(0x9E37_79B9_7F4A_7C15);
                    let result = tt.probe(key);
                    result.write(
                        key,
                        Value::new(i as i32 % 100),
                        false,
                        Bound::Exact,
                        5,
                        Move::NONE,
                        Value::NONE,
                        tt.generation(),
                    );
                }
            });
        }
    });

    assert!(tt.hashfull() > 0);
}
