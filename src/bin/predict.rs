//! Predict a trading signal
//!
//! Loads a saved model (or initialises a fresh one from the configuration),
//! generates a synthetic feature sequence and prints the prediction as JSON.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;

use lstm_attention_trading::data::synthetic::{generate_sequence, Regime};
use lstm_attention_trading::{setup_logging, AppConfig, SequenceModel};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Market {
    Bearish,
    Sideways,
    Bullish,
}

impl From<Market> for Regime {
    fn from(market: Market) -> Self {
        match market {
            Market::Bearish => Regime::Bearish,
            Market::Sideways => Regime::Sideways,
            Market::Bullish => Regime::Bullish,
        }
    }
}

#[derive(Parser)]
#[command(name = "predict")]
#[command(about = "Predict a buy/sell/hold signal for a synthetic sequence")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Path to a model saved by `train`
    #[arg(short, long)]
    model: Option<String>,

    /// Number of time steps to generate
    #[arg(short, long, default_value = "60")]
    steps: usize,

    /// Regime of the generated sequence
    #[arg(short, long, value_enum, default_value = "bullish")]
    regime: Market,

    /// Starting price of the generated sequence
    #[arg(long, default_value = "100.0")]
    price: f64,

    /// Seed override
    #[arg(long)]
    seed: Option<u64>,

    /// Confidence a buy or sell needs before it is flagged actionable
    #[arg(long, default_value = "0.6")]
    min_confidence: f64,

    /// Data quality a signal needs before it is flagged actionable
    #[arg(long, default_value = "0.8")]
    min_quality: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config);
    setup_logging(&config.logging.level)?;

    let seed = args.seed.unwrap_or(config.runtime.seed);
    let model = match &args.model {
        Some(path) => SequenceModel::load(path, seed)
            .with_context(|| format!("failed to load model from {}", path))?,
        None => SequenceModel::with_seed(config.model.clone(), seed)?,
    };

    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let sequence = generate_sequence(args.steps, args.price, args.regime.into(), &mut rng);

    let prediction = model.predict_with(&sequence, &config.runtime.run_control())?;

    let actionable = prediction.is_actionable(args.min_confidence, args.min_quality);
    eprintln!(
        "{} with {:.1}% confidence (quality {:.2}){}",
        prediction.signal,
        prediction.confidence * 100.0,
        prediction.metadata.data_quality,
        if actionable { ", actionable" } else { ", not actionable" }
    );
    println!("{}", serde_json::to_string_pretty(&prediction)?);

    Ok(())
}
