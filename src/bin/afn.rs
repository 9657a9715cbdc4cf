use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rqalsh_afn::consts::MAGIC_SEED;
use rqalsh_afn::driver::{self, Algorithm, Config};

/// c-k-approximate furthest neighbor search benchmark driver.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Algorithm selector: 0 ground-truth, 1 linear-scan, 2 qdafn,
    /// 3 drusilla-select, 4 rqalsh, 5 rqalsh*, 6 ml-rqalsh.
    #[clap(short, long, value_parser)]
    alg: i32,

    /// Dataset size.
    #[clap(short, long, value_parser)]
    n: usize,

    /// Query count.
    #[clap(long, value_parser)]
    qn: usize,

    /// Dimensionality.
    #[clap(short, long, value_parser)]
    d: usize,

    /// Approximation ratio c (> 1).
    #[clap(short, long, value_parser)]
    #[arg(default_value_t = 2.0)]
    c: f32,

    /// Page size in bytes (external mode only).
    #[clap(short = 'B', long, value_parser)]
    #[arg(default_value_t = 0)]
    page_size: usize,

    /// Drusilla/QDAFN parameter l. 0 selects the recommended default.
    #[clap(short = 'L', long, value_parser)]
    #[arg(default_value_t = 0)]
    l: usize,

    /// Drusilla/QDAFN parameter m. 0 selects the recommended default.
    #[clap(short = 'M', long, value_parser)]
    #[arg(default_value_t = 0)]
    m: usize,

    /// Data file (binary vectors).
    #[clap(long, value_parser)]
    ds: Option<PathBuf>,

    /// Data folder (paged dataset, external mode).
    #[clap(long, value_parser)]
    df: Option<PathBuf>,

    /// Query file (binary vectors).
    #[clap(long, value_parser)]
    qs: PathBuf,

    /// Ground-truth file.
    #[clap(long, value_parser)]
    ts: Option<PathBuf>,

    /// Output folder (created if absent).
    #[clap(long, value_parser)]
    of: Option<PathBuf>,

    /// Output path for the per-(algorithm, top-k) report table.
    #[clap(long, value_parser)]
    op: Option<PathBuf>,

    /// Run in external (page-based) mode, charging page reads instead of
    /// distance evaluations. Requires --df and a positive -B.
    #[clap(long, value_parser)]
    #[arg(default_value_t = false)]
    external: bool,

    /// Index-construction seed, for reproducible builds.
    #[clap(long, value_parser)]
    #[arg(default_value_t = MAGIC_SEED)]
    seed: u64,

    /// Explicit beta*n candidate-quota override for RQALSH's parameter
    /// derivation. Unset selects the built-in default.
    #[clap(long, value_parser)]
    beta: Option<usize>,

    /// Explicit delta (false-positive target) override for RQALSH's
    /// parameter derivation. Unset selects the built-in default.
    #[clap(long, value_parser)]
    delta: Option<f32>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let alg = match Algorithm::from_code(args.alg) {
        Ok(alg) => alg,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let cfg = Config {
        alg,
        n: args.n,
        qn: args.qn,
        d: args.d,
        ratio: args.c,
        page_size: args.page_size,
        l: args.l,
        m: args.m,
        data_file: args.ds,
        data_folder: args.df,
        query_file: args.qs,
        truth_file: args.ts,
        output_folder: args.of,
        output_path: args.op,
        seed: args.seed,
        external: args.external,
        beta_n: args.beta,
        delta: args.delta,
    };

    match driver::run(&cfg) {
        Ok(reports) => {
            println!("alg top_k mean_ratio mean_recall mean_time_secs mean_examined");
            for r in &reports {
                println!(
                    "{:?} {} {:.6} {:.4} {:.9} {:.3}",
                    cfg.alg, r.top_k, r.mean_ratio, r.mean_recall, r.mean_time_secs, r.mean_examined
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
