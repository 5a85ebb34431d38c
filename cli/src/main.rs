use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use candle_core::{Device, Tensor};
use clap::Parser;
use serde::{Deserialize, Serialize};
use summarizer::{
    coverage_summary, greedy_tokens, PointerGenerator, StepStatistics, SummarizerConfig,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("summarizer failed: {err:#}");
        std::process::exit(1);
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Teacher-forced summarizer run", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "PATH", help = "Path to a TOML or JSON model config")]
    config: PathBuf,

    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "JSON file with `source` and `target` ids laid out [len][batch]"
    )]
    input: Option<PathBuf>,

    #[arg(
        long,
        value_name = "N",
        default_value_t = 16,
        help = "Source length of the generated batch when no input file is given"
    )]
    synthetic_source_len: usize,

    #[arg(long, help = "Print the run report as JSON")]
    json: bool,
}

/// Token ids as they appear in an input file.
#[derive(Debug, Deserialize)]
struct InputBatch {
    source: Vec<Vec<u32>>,
    target: Vec<Vec<u32>>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    parameters: usize,
    copy_mechanism: bool,
    tokens: Vec<Vec<u32>>,
    steps: Vec<StepStatistics>,
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = SummarizerConfig::from_path(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let device = config.device.clone();

    let batch = match &args.input {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<InputBatch>(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => synthetic_batch(&config, args.synthetic_source_len),
    };
    let source = to_tensor("source", &batch.source, &device)?;
    let target = to_tensor("target", &batch.target, &device)?;

    let model = PointerGenerator::new(config)?;
    let output = model.run(&source, &target)?;
    let report = RunReport {
        parameters: model.parameter_count(),
        copy_mechanism: model.config().copy_mechanism,
        tokens: greedy_tokens(&output.distributions)?,
        steps: coverage_summary(&output)?,
    };
    log::info!("completed {} decode steps", report.steps.len());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Deterministic ids in `[1, vocab_size)`, so no position is padding.
fn synthetic_batch(config: &SummarizerConfig, source_len: usize) -> InputBatch {
    let vocab = config.vocab_size.max(2);
    let ids = |len: usize, stride: usize| -> Vec<Vec<u32>> {
        (0..len)
            .map(|pos| {
                (0..config.batch_size)
                    .map(|b| (1 + (pos * stride + b * 13) % (vocab - 1)) as u32)
                    .collect()
            })
            .collect()
    };
    InputBatch {
        source: ids(source_len, 31),
        target: ids(config.max_summary_length, 7),
    }
}

/// `[len][batch]` rows to a `[len, batch]` tensor.
fn to_tensor(name: &str, rows: &[Vec<u32>], device: &Device) -> Result<Tensor> {
    let width = rows.first().map_or(0, Vec::len);
    if rows.is_empty() || width == 0 {
        bail!("{name} must contain at least one position and one batch column");
    }
    if let Some(pos) = rows.iter().position(|row| row.len() != width) {
        bail!("{name} position {pos} has {} columns, expected {width}", rows[pos].len());
    }
    let flat: Vec<u32> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_vec(flat, (rows.len(), width), device)?)
}

fn print_report(report: &RunReport) {
    println!(
        "parameters: {} | copy mechanism: {}",
        report.parameters,
        if report.copy_mechanism { "on" } else { "off" }
    );
    println!(
        "{:>4}  {:<24} {:>9} {:>9} {:>9}",
        "step", "tokens", "max_attn", "max_cov", "max_prob"
    );
    for (tokens, stats) in report.tokens.iter().zip(&report.steps) {
        let ids = tokens
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:>4}  {:<24} {:>9.4} {:>9.4} {:>9.4}",
            stats.step, ids, stats.max_attention, stats.max_coverage, stats.max_probability
        );
    }
}
