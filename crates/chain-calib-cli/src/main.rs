use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use chain_calib_capture::CollectorConfig;
use chain_calib_core::{deflate, deflate_rpy, inflate, inflate_rpy, Mat4, Vec6, PARAM_LEN};
use clap::{Parser, Subcommand};

mod replay;

use replay::{run_collect, ReplayLog};

/// Calibration sample collection and transform conversion.
#[derive(Debug, Parser)]
#[command(author, version, about = "Robot chain calibration tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the 4x4 matrix for a 6-vector [tx,ty,tz,rx,ry,rz].
    Inflate {
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        params: Vec<f64>,
        /// Read the rotation part as roll, pitch, yaw.
        #[arg(long)]
        rpy: bool,
    },
    /// Print the 6-vector for a row-major 4x4 matrix.
    Deflate {
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        matrix: Vec<f64>,
        #[arg(long)]
        rpy: bool,
    },
    /// Replay a recorded sensor log and collect calibration samples.
    Collect {
        /// JSON CollectorConfig; chain groups have no default.
        #[arg(long)]
        config: String,
        /// JSON replay log.
        #[arg(long)]
        replay: String,
        /// Number of captures; one per recorded frame if omitted.
        #[arg(long)]
        count: Option<usize>,
        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<String>,
    },
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn matrix_rows(m: &Mat4) -> Vec<[f64; 4]> {
    (0..4)
        .map(|r| [m[(r, 0)], m[(r, 1)], m[(r, 2)], m[(r, 3)]])
        .collect()
}

fn inflate_json(params: &[f64], rpy: bool) -> Result<String> {
    ensure!(
        params.len() == PARAM_LEN,
        "expected {PARAM_LEN} parameters, got {}",
        params.len()
    );
    let p = Vec6::from_column_slice(params);
    let m = if rpy { inflate_rpy(&p) } else { inflate(&p) };
    Ok(serde_json::to_string_pretty(&matrix_rows(&m))?)
}

fn deflate_json(values: &[f64], rpy: bool) -> Result<String> {
    ensure!(
        values.len() == 16,
        "expected 16 matrix entries, got {}",
        values.len()
    );
    let m = Mat4::from_row_slice(values);
    let p = if rpy { deflate_rpy(&m) } else { deflate(&m) };
    let p: Vec<f64> = p.iter().copied().collect();
    Ok(serde_json::to_string_pretty(&p)?)
}

fn collect_from_files(
    config_path: &str,
    replay_path: &str,
    count: Option<usize>,
) -> Result<String> {
    let config: CollectorConfig = load_json_file(Path::new(config_path))?;
    config.validate().context("invalid collector configuration")?;
    let log: ReplayLog = load_json_file(Path::new(replay_path))?;

    let report = run_collect(config, log, count)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Inflate { params, rpy } => println!("{}", inflate_json(&params, rpy)?),
        Command::Deflate { matrix, rpy } => println!("{}", deflate_json(&matrix, rpy)?),
        Command::Collect {
            config,
            replay,
            count,
            output,
        } => {
            let json = collect_from_files(&config, &replay, count)?;
            match output {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("writing {path}"))?;
                }
                None => println!("{json}"),
            }
        }
    }
    Ok(())
}
