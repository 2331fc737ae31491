//! 置換表の負荷試験ツール
//!
//! 複数スレッドから合成した局面キーで probe / write を繰り返し、
//! 探索ごとのヒット率・hashfull・スループットを出力する。
//! キー空間を絞ることで、実際の探索と同様に同一局面への再到達（transposition）を起こす。

use std::time::Instant;

use anyhow::{Result, bail};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tools::common::config::{TableArgs, init_logging};
use tools::common::keys::mix64;
use ttable_core::{Bound, Move, TranspositionTable, Value};

/// プリフェッチしてから probe するまでの距離（ノード数）
const PREFETCH_DISTANCE: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "tt_stress")]
#[command(about = "置換表に並列の probe/write 負荷をかけて統計を出力する")]
struct Cli {
    #[command(flatten)]
    table: TableArgs,

    /// 探索スレッド数
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// 探索（new_search）の回数
    #[arg(long, default_value_t = 8)]
    searches: usize,

    /// 1スレッド・1探索あたりのノード数
    #[arg(long, default_value_t = 500_000)]
    nodes: usize,

    /// 局面キーの種類数
    #[arg(long, default_value_t = 1 << 20)]
    key_space: u64,

    /// 乱数シード
    #[arg(long, default_value_t = 0x5EED)]
    seed: u64,

    /// デバッグログを有効化
    #[arg(short, long)]
    debug: bool,
}

#[derive(Default, Clone, Copy)]
struct ThreadStats {
    nodes: u64,
    hits: u64,
    writes: u64,
}

impl ThreadStats {
    fn merge(self, other: ThreadStats) -> ThreadStats {
        ThreadStats {
            nodes: self.nodes + other.nodes,
            hits: self.hits + other.hits,
            writes: self.writes + other.writes,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if cli.threads == 0 {
        bail!("--threads must be at least 1");
    }
    if cli.key_space == 0 {
        bail!("--key-space must be at least 1");
    }

    let config = cli.table.resolve()?;
    let tt = TranspositionTable::with_config(&config)?;
    log::info!(
        "stress: threads={} searches={} nodes/thread={} key_space={}",
        cli.threads,
        cli.searches,
        cli.nodes,
        cli.key_space
    );

    let mut total = ThreadStats::default();
    let started = Instant::now();

    for search in 0..cli.searches {
        tt.new_search();
        let search_started = Instant::now();

        let stats = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..cli.threads)
                .map(|t| {
                    let tt = &tt;
                    let seed = cli.seed ^ ((search as u64) << 32) ^ t as u64;
                    scope.spawn(move || run_worker(tt, seed, cli.nodes, cli.key_space))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("worker panicked"))
                .fold(ThreadStats::default(), ThreadStats::merge)
        });

        let elapsed = search_started.elapsed().as_secs_f64();
        log::info!(
            "search {:>3}: hit={:.1}% writes={} hashfull={} nps={:.0}",
            search + 1,
            percent(stats.hits, stats.nodes),
            stats.writes,
            tt.hashfull(),
            stats.nodes as f64 / elapsed.max(1e-9)
        );
        log::debug!("search {:>3}: hashfull(age<=7)={}", search + 1, tt.hashfull_with_age(7));
        total = total.merge(stats);
    }

    let elapsed = started.elapsed().as_secs_f64();
    println!("size_mb        {}", tt.size_mb());
    println!("clusters       {}", tt.cluster_count());
    println!("large_pages    {}", tt.uses_large_pages());
    println!("nodes          {}", total.nodes);
    println!("hit_rate       {:.2}%", percent(total.hits, total.nodes));
    println!("write_rate     {:.2}%", percent(total.writes, total.nodes));
    println!("hashfull       {}", tt.hashfull());
    println!("nps            {:.0}", total.nodes as f64 / elapsed.max(1e-9));
    Ok(())
}

/// 1スレッド分の合成探索
fn run_worker(tt: &TranspositionTable, seed: u64, nodes: usize, key_space: u64) -> ThreadStats {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut stats = ThreadStats::default();

    let mut pending: Vec<u64> = (0..PREFETCH_DISTANCE)
        .map(|_| mix64(rng.random_range(0..key_space)))
        .collect();

    for node in 0..nodes {
        let next = mix64(rng.random_range(0..key_space));
        tt.prefetch(next);
        let key = std::mem::replace(&mut pending[node % PREFETCH_DISTANCE], next);

        let result = tt.probe(key);
        stats.nodes += 1;

        // 前回より少し深い探索をしたことにする
        let depth = if result.found {
            stats.hits += 1;
            (result.data.depth + 1).min(40)
        } else {
            rng.random_range(1..=12)
        };
        let bound = match rng.random_range(0..8) {
            0 => Bound::Exact,
            1..=4 => Bound::Upper,
            _ => Bound::Lower,
        };
        let is_pv = bound == Bound::Exact;
        let generation8 = tt.generation();

        if result.writer.should_overwrite(key, is_pv, bound, depth, generation8) {
            let mv = if bound == Bound::Upper {
                Move::NONE
            } else {
                Move::from_u16(rng.random_range(1..=u16::MAX))
            };
            result.writer.write(
                key,
                Value::new(rng.random_range(-2000..=2000)),
                is_pv,
                bound,
                depth,
                mv,
                Value::new(rng.random_range(-1000..=1000)),
                generation8,
            );
            stats.writes += 1;
        }
    }

    stats
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
