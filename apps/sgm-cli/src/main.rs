use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use sgm_stereo::{
    config, io, CensusSize, FileStereo, MatchStats, MockStereo, PathCount, SemiGlobalMatcher,
    SgmOptions, StereoPair, StereoSource, INVALID_DISPARITY,
};

#[derive(Parser, Debug)]
#[command(
    name = "sgm",
    version,
    about = "Semi-Global Matching disparity from rectified stereo pairs",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the defaults or a YAML options file.
#[derive(Args, Debug, Default)]
struct OptionArgs {
    /// YAML options file (see `sgm config-dump`)
    #[arg(long)]
    config: Option<String>,
    /// Aggregation paths: 4 or 8
    #[arg(long)]
    paths: Option<u8>,
    /// Minimum disparity (inclusive)
    #[arg(long, allow_hyphen_values = true)]
    min_disp: Option<i32>,
    /// Maximum disparity (exclusive)
    #[arg(long, allow_hyphen_values = true)]
    max_disp: Option<i32>,
    /// Uniqueness ratio in (0, 1]
    #[arg(long)]
    uniqueness: Option<f32>,
    /// Small-step penalty P1
    #[arg(long)]
    p1: Option<i32>,
    /// Base of the adaptive discontinuity penalty P2
    #[arg(long)]
    p2_init: Option<i32>,
    /// Census window: 5x5 or 9x7
    #[arg(long)]
    census: Option<CensusSize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Match a rectified image pair and write the disparity map
    Match {
        /// Left rectified image
        #[arg(long)]
        left: String,
        /// Right rectified image
        #[arg(long)]
        right: String,
        /// Output disparity PNG path
        #[arg(long)]
        out: String,
        /// Optional text point cloud (row col disparity gray gray gray)
        #[arg(long)]
        cloud: Option<String>,
        /// Gray levels per disparity unit in the PNG
        #[arg(long, default_value_t = 2.5)]
        scale: f32,
        /// Print stats as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        #[command(flatten)]
        opts: OptionArgs,
    },
    /// Match a synthetic pair with a known shift and report accuracy
    Mock {
        /// Mock spec as WxH@shift
        #[arg(long, default_value = "64x48@4")]
        source: String,
        /// Print report as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        #[command(flatten)]
        opts: OptionArgs,
    },
    /// Print or write the default options as YAML
    ConfigDump {
        /// Output YAML path; stdout if omitted
        #[arg(long)]
        out: Option<String>,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Match {
            left,
            right,
            out,
            cloud,
            scale,
            json,
            opts,
        } => match_files(&left, &right, &out, cloud.as_deref(), scale, json, &opts),
        Commands::Mock { source, json, opts } => match_mock(&source, json, &opts),
        Commands::ConfigDump { out } => config_dump(out.as_deref()),
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn resolve_options(args: &OptionArgs) -> Result<SgmOptions> {
    let mut opts = match args.config.as_deref() {
        Some(path) => config::load_options(path).with_context(|| format!("loading {path}"))?,
        None => SgmOptions::default(),
    };
    if let Some(p) = args.paths {
        opts.num_paths = PathCount::try_from(p)?;
    }
    if let Some(v) = args.min_disp {
        opts.min_disparity = v;
    }
    if let Some(v) = args.max_disp {
        opts.max_disparity = v;
    }
    if let Some(v) = args.uniqueness {
        opts.uniqueness_ratio = v;
    }
    if let Some(v) = args.p1 {
        opts.p1 = v;
    }
    if let Some(v) = args.p2_init {
        opts.p2_init = v;
    }
    if let Some(v) = args.census {
        opts.census = v;
    }
    opts.validate()?;
    Ok(opts)
}

fn run_matcher(pair: &StereoPair, opts: SgmOptions) -> Result<(Vec<f32>, MatchStats)> {
    let (w, h) = (pair.width as usize, pair.height as usize);
    let mut sgm = SemiGlobalMatcher::new();
    sgm.initialize(w, h, opts)
        .map_err(|e| anyhow::anyhow!("sgm initialize failed: {e}"))?;
    let mut disparity = vec![INVALID_DISPARITY; w * h];
    let stats = sgm
        .match_pair(&pair.left, &pair.right, &mut disparity)
        .map_err(|e| anyhow::anyhow!("sgm match failed: {e}"))?;
    Ok((disparity, stats))
}

fn print_stats(stats: &MatchStats) {
    println!(
        "census: {:.1} ms, cost: {:.1} ms, aggregation: {:.1} ms, disparity: {:.1} ms (total {:.1} ms)",
        stats.census_ms,
        stats.cost_ms,
        stats.aggregation_ms,
        stats.disparity_ms,
        stats.total_ms()
    );
    println!(
        "valid pixels: {} / {}",
        stats.valid_pixels, stats.total_pixels
    );
}

fn match_files(
    left: &str,
    right: &str,
    out: &str,
    cloud: Option<&str>,
    scale: f32,
    json: bool,
    args: &OptionArgs,
) -> Result<()> {
    let opts = resolve_options(args)?;
    let mut src = FileStereo::new(left, right);
    let pair = src
        .read_pair()
        .map_err(|e| anyhow::anyhow!("reading stereo pair failed: {e}"))?;
    info!(width = pair.width, height = pair.height, "loaded stereo pair");

    let (disparity, stats) = run_matcher(&pair, opts)?;
    let (w, h) = (pair.width as usize, pair.height as usize);
    io::write_disparity_png(out, &disparity, w, h, scale)
        .map_err(|e| anyhow::anyhow!("write disparity failed: {e}"))?;
    let points = match cloud {
        Some(path) => Some(
            io::write_point_cloud(path, &disparity, &pair.left, w)
                .map_err(|e| anyhow::anyhow!("write point cloud failed: {e}"))?,
        ),
        None => None,
    };

    if json {
        #[derive(Serialize)]
        struct Report<'a> {
            out: &'a str,
            cloud: Option<&'a str>,
            points: Option<usize>,
            options: SgmOptions,
            stats: MatchStats,
        }
        let report = Report {
            out,
            cloud,
            points,
            options: opts,
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("wrote disparity PNG: {out}");
        if let (Some(p), Some(n)) = (cloud, points) {
            println!("wrote point cloud: {p} ({n} points)");
        }
        print_stats(&stats);
    }
    Ok(())
}

/// Fraction of valid pixels within half a pixel of `truth`, over pixels
/// whose window and match column both lie inside the image.
fn accuracy(disparity: &[f32], width: usize, height: usize, truth: f32, census: CensusSize) -> f64 {
    let (hx, _) = census.half_extents();
    let shift = truth.max(0.0) as usize;
    let mut total = 0usize;
    let mut good = 0usize;
    for y in 0..height {
        for x in 0..width {
            if !census.fits(x, y, width, height) || x < hx + shift {
                continue;
            }
            total += 1;
            let d = disparity[y * width + x];
            if d != INVALID_DISPARITY && (d - truth).abs() <= 0.5 {
                good += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        good as f64 / total as f64
    }
}

fn match_mock(spec: &str, json: bool, args: &OptionArgs) -> Result<()> {
    let opts = resolve_options(args)?;
    let mut src =
        MockStereo::open(spec).map_err(|e| anyhow::anyhow!("mock open failed: {e}"))?;
    let pair = src
        .read_pair()
        .map_err(|e| anyhow::anyhow!("mock read failed: {e}"))?;
    let (disparity, stats) = run_matcher(&pair, opts)?;
    let truth = src.shift() as f32;
    let acc = accuracy(
        &disparity,
        pair.width as usize,
        pair.height as usize,
        truth,
        opts.census,
    );

    if json {
        let report = serde_json::json!({
            "source": spec,
            "truth": truth,
            "accuracy": acc,
            "ts": pair.ts.map(|t| t.unix_timestamp()),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "mock: {}x{} shift={} ts={:?}",
            pair.width, pair.height, truth, pair.ts
        );
        println!("accuracy (|d - truth| <= 0.5): {:.1}%", acc * 100.0);
        print_stats(&stats);
    }
    Ok(())
}

fn config_dump(out: Option<&str>) -> Result<()> {
    let opts = SgmOptions::default();
    match out {
        Some(path) => {
            config::write_options(path, &opts)
                .map_err(|e| anyhow::anyhow!("write options failed: {e}"))?;
            println!("wrote options to {path}");
        }
        None => print!("{}", config::options_to_yaml(&opts)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_match() {
        let cli = Cli::try_parse_from([
            "sgm", "match", "--left", "l.png", "--right", "r.png", "--out", "d.png", "--paths",
            "4", "--min-disp", "-8", "--census", "5x5",
        ])
        .unwrap();
        match cli.command {
            Commands::Match { opts, scale, .. } => {
                assert_eq!(scale, 2.5);
                let resolved = resolve_options(&opts).unwrap();
                assert_eq!(resolved.num_paths, PathCount::Four);
                assert_eq!(resolved.min_disparity, -8);
                assert_eq!(resolved.census, CensusSize::Window5x5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_bad_overrides_rejected() {
        let args = OptionArgs {
            paths: Some(5),
            ..OptionArgs::default()
        };
        assert!(resolve_options(&args).is_err());
        let args = OptionArgs {
            min_disp: Some(70),
            ..OptionArgs::default()
        };
        assert!(resolve_options(&args).is_err());
    }

    #[test]
    fn test_mock_run_is_accurate() {
        let args = OptionArgs {
            max_disp: Some(8),
            uniqueness: Some(0.5),
            ..OptionArgs::default()
        };
        let opts = resolve_options(&args).unwrap();
        let mut src = MockStereo::open("48x32@3").unwrap();
        let pair = src.read_pair().unwrap();
        let (disparity, stats) = run_matcher(&pair, opts).unwrap();
        assert_eq!(stats.total_pixels, 48 * 32);
        let acc = accuracy(&disparity, 48, 32, 3.0, opts.census);
        assert!(acc > 0.8, "accuracy {acc}");
    }
}
