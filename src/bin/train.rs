//! Train the sequence model
//!
//! Trains on a synthetic labelled dataset, reports the epoch history and a
//! held-out evaluation, and optionally saves the model.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;

use lstm_attention_trading::data::synthetic::generate_dataset;
use lstm_attention_trading::model::{Optimizer, ProcedureKind};
use lstm_attention_trading::training::procedure_for;
use lstm_attention_trading::{setup_logging, AppConfig, SequenceModel};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Procedure {
    /// Forward passes and metrics only
    Evaluate,
    /// Gradient descent on the output head
    HeadDescent,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Update {
    Sgd,
    Adam,
}

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train the LSTM-attention model on synthetic data")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Number of labelled sequences to generate
    #[arg(short, long, default_value = "200")]
    samples: usize,

    /// Number of epochs (overrides config)
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Training procedure (overrides config)
    #[arg(short, long, value_enum)]
    procedure: Option<Procedure>,

    /// Optimizer (overrides config)
    #[arg(long, value_enum)]
    optimizer: Option<Update>,

    /// Learning rate (overrides config)
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Path to save the trained model
    #[arg(short, long)]
    output: Option<String>,

    /// Write the effective configuration to this path
    #[arg(long)]
    save_config: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::load_or_default(&args.config);
    setup_logging(&config.logging.level)?;

    if let Some(epochs) = args.epochs {
        config.model.epochs = epochs;
    }
    if let Some(procedure) = args.procedure {
        config.model.procedure = match procedure {
            Procedure::Evaluate => ProcedureKind::ForwardEvaluation,
            Procedure::HeadDescent => ProcedureKind::OutputHeadDescent,
        };
    }
    if let Some(optimizer) = args.optimizer {
        config.model.optimizer = match optimizer {
            Update::Sgd => Optimizer::Sgd,
            Update::Adam => Optimizer::Adam,
        };
    }
    if let Some(lr) = args.learning_rate {
        config.model.learning_rate = lr;
    }
    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("failed to write configuration to {}", path))?;
    }

    let seed = config.runtime.seed;
    let window = config.model.sequence_length;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut model = SequenceModel::new(config.model.clone(), &mut rng)?;

    println!("\nLSTM-Attention Training");
    println!("═══════════════════════════════════════════════════════════════\n");
    println!("[MODEL] Layers: {}", config.model.num_layers);
    println!("[MODEL] Hidden size: {}", config.model.hidden_size);
    println!("[MODEL] Attention: {}", config.model.use_attention);
    println!("[MODEL] Parameters: {}", model.num_params());
    println!("[TRAINING] Procedure: {:?}", config.model.procedure);
    println!("[TRAINING] Optimizer: {:?}", config.model.optimizer);
    println!("[TRAINING] Epochs: {}", config.model.epochs);
    println!("[DATA] Samples: {} x {} steps", args.samples, window);
    println!();

    let (dataset, labels) = generate_dataset(args.samples, window, &mut rng);
    let mut procedure = procedure_for(model.config());
    let control = config.runtime.run_control().with_progress(true);

    if let Err(e) = model.train_with(&dataset, &labels, procedure.as_mut(), &control) {
        if !e.is_recoverable() {
            return Err(e.into());
        }
        println!("[TRAINING] Stopped early: {}", e);
    }

    if let Some(best) = model.history().best() {
        println!("[RESULT] Best epoch: {}", best);
    }

    let test_samples = (args.samples / 5).max(1);
    let (test_data, test_labels) = generate_dataset(test_samples, window, &mut rng);
    let report = model.evaluate(&test_data, &test_labels)?;
    println!(
        "[RESULT] Test accuracy: {:.2}% | Cross-entropy: {:.4} | Samples: {}",
        report.accuracy * 100.0,
        report.cross_entropy,
        report.evaluated
    );

    if let Some(path) = &args.output {
        model
            .save(path)
            .with_context(|| format!("failed to save model to {}", path))?;
        println!("[OUTPUT] Model saved to: {}", path);
    }

    Ok(())
}
