//! 16bitキー切り詰めによる誤ヒット率の測定ツール
//!
//! テーブルを指定割合までランダムなキーで埋めたあと、書き込んでいないキーで probe し、
//! ヒットしてしまった割合を見積もり値と並べて出力する。

use anyhow::{Result, bail};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tools::common::config::{TableArgs, init_logging};
use tools::common::keys::estimated_false_hit_rate;
use ttable_core::tt::CLUSTER_SIZE;
use ttable_core::{Bound, Move, TranspositionTable, Value};

#[derive(Parser, Debug)]
#[command(name = "tt_collision")]
#[command(about = "置換表の誤ヒット（キー衝突）率を測定する")]
struct Cli {
    #[command(flatten)]
    table: TableArgs,

    /// エントリ総数に対する書き込み件数（%）
    #[arg(long, default_value_t = 66)]
    fill_percent: usize,

    /// 誤ヒット測定に使う probe 回数
    #[arg(long, default_value_t = 1_000_000)]
    probes: u64,

    /// 乱数シード
    #[arg(long, default_value_t = 0xC011)]
    seed: u64,

    /// デバッグログを有効化
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if cli.fill_percent > 1000 {
        bail!("--fill-percent must be at most 1000");
    }
    if cli.probes == 0 {
        bail!("--probes must be at least 1");
    }

    let config = cli.table.resolve()?;
    let tt = TranspositionTable::with_config(&config)?;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(cli.seed);

    let writes = tt.cluster_count() * CLUSTER_SIZE * cli.fill_percent / 100;
    log::info!("filling {} entries ({}%)", writes, cli.fill_percent);
    for _ in 0..writes {
        let key: u64 = rng.random();
        let result = tt.probe(key);
        result.write(
            key,
            Value::ZERO,
            false,
            Bound::Lower,
            rng.random_range(1..=20),
            Move::NONE,
            Value::NONE,
            tt.generation(),
        );
    }

    // 全エントリが現在世代なので hashfull がそのまま使用率になる
    let occupied = tt.hashfull() as f64 / 1000.0;
    log::debug!("sampled occupancy {:.3}", occupied);

    let mut false_hits = 0u64;
    for _ in 0..cli.probes {
        if tt.probe(rng.random()).found {
            false_hits += 1;
        }
    }

    let measured = false_hits as f64 / cli.probes as f64;
    let estimate = estimated_false_hit_rate(occupied, CLUSTER_SIZE);
    println!("clusters       {}", tt.cluster_count());
    println!("occupancy      {:.3}", occupied);
    println!("false_hits     {} / {}", false_hits, cli.probes);
    println!("measured_rate  {:.3e}", measured);
    println!("estimated_rate {:.3e}", estimate);
    Ok(())
}
