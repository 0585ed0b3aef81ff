//! lungscan CLI
//!
//! Entry point for training, evaluating and serving the lung condition
//! classifier.

use std::path::{Path, PathBuf};

use anyhow::Result;
use burn::module::AutodiffModule;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use lungscan::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use lungscan::dataset::{LungXrayDataset, Preprocessor, XrayTensorDataset};
use lungscan::eval::charts;
use lungscan::eval::evaluator::Evaluator;
use lungscan::inference::predictor::Predictor;
use lungscan::model::ModelConfig;
use lungscan::training::checkpoint::load_checkpoint;
use lungscan::training::{Trainer, TrainingConfig};
use lungscan::utils::logging::{init_logging, LogConfig};
use lungscan::AugmentationConfig;

/// Lung condition classification from chest X-rays
///
/// Trains a transfer-learning CNN on a class-per-directory dataset and
/// serves predictions from persisted checkpoints.
#[derive(Parser, Debug)]
#[command(name = "lungscan")]
#[command(version)]
#[command(about = "Lung condition classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier
    Train {
        /// Path to the training dataset directory
        #[arg(long, default_value = "data/train")]
        train_dir: String,

        /// Path to the validation dataset directory
        #[arg(long, default_value = "data/valid")]
        val_dir: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "100")]
        epochs: usize,

        /// Batch size for training
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.01")]
        learning_rate: f64,

        /// SGD momentum
        #[arg(long, default_value = "0.9")]
        momentum: f64,

        /// Early stopping patience in epochs
        #[arg(long, default_value = "15")]
        patience: usize,

        /// Number of frozen backbone stages
        #[arg(long, default_value = "3")]
        frozen_stages: usize,

        /// Optional pretrained backbone record to fine-tune from
        #[arg(long)]
        pretrained_backbone: Option<PathBuf>,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Disable training-time augmentation
        #[arg(long, default_value = "false")]
        no_augment: bool,

        /// Cap training samples per epoch for smoke runs
        #[arg(long)]
        limit: Option<usize>,

        /// Output directory for checkpoints, history and charts
        #[arg(short, long, default_value = "output")]
        output_dir: String,
    },

    /// Evaluate a checkpoint on a validation directory
    Evaluate {
        /// Path to the validation dataset directory
        #[arg(long, default_value = "data/valid")]
        val_dir: String,

        /// Checkpoint stem (weights at <stem>.mpk, manifest at <stem>.json)
        #[arg(short, long)]
        checkpoint: String,

        /// Batch size for evaluation
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Output directory for charts and CSV exports
        #[arg(short, long, default_value = "output/eval")]
        output_dir: String,
    },

    /// Run inference on a single image or directory
    Infer {
        /// Path to input image or directory
        #[arg(short, long)]
        input: String,

        /// Checkpoint stem of the trained model
        #[arg(short, long)]
        checkpoint: String,
    },

    /// Show dataset statistics
    Stats {
        /// Path to the dataset directory
        #[arg(short, long, default_value = "data/train")]
        data_dir: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Train {
            train_dir,
            val_dir,
            epochs,
            batch_size,
            learning_rate,
            momentum,
            patience,
            frozen_stages,
            pretrained_backbone,
            seed,
            no_augment,
            limit,
            output_dir,
        } => cmd_train(
            &train_dir,
            &val_dir,
            epochs,
            batch_size,
            learning_rate,
            momentum,
            patience,
            frozen_stages,
            pretrained_backbone,
            seed,
            no_augment,
            limit,
            &output_dir,
        ),

        Commands::Evaluate {
            val_dir,
            checkpoint,
            batch_size,
            output_dir,
        } => cmd_evaluate(&val_dir, &checkpoint, batch_size, &output_dir),

        Commands::Infer { input, checkpoint } => cmd_infer(&input, &checkpoint),

        Commands::Stats { data_dir } => cmd_stats(&data_dir),
    }
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════╗
 ║   lungscan — Chest X-ray Classification              ║
 ║   Transfer-learning CNN with Burn + Rust             ║
 ╚══════════════════════════════════════════════════════╝
"#
        .green()
    );
}

#[allow(clippy::too_many_arguments)]
fn cmd_train(
    train_dir: &str,
    val_dir: &str,
    epochs: usize,
    batch_size: usize,
    learning_rate: f64,
    momentum: f64,
    patience: usize,
    frozen_stages: usize,
    pretrained_backbone: Option<PathBuf>,
    seed: u64,
    no_augment: bool,
    limit: Option<usize>,
    output_dir: &str,
) -> Result<()> {
    println!("{}", "Loading datasets...".cyan());
    let train_loader = LungXrayDataset::new(train_dir)?;
    let val_loader = LungXrayDataset::new(val_dir)?;

    train_loader.stats().print();

    if train_loader.class_names != val_loader.class_names {
        anyhow::bail!(
            "training classes {:?} and validation classes {:?} do not match",
            train_loader.class_names,
            val_loader.class_names
        );
    }

    let canonical: Vec<String> = lungscan::CLASS_NAMES.iter().map(|s| s.to_string()).collect();
    if train_loader.class_names != canonical {
        tracing::warn!(
            "dataset classes {:?} differ from the expected lung condition set {:?}",
            train_loader.class_names,
            canonical
        );
    }

    let model_config = ModelConfig {
        num_classes: train_loader.num_classes(),
        frozen_stages,
        pretrained_backbone,
        ..Default::default()
    };

    let augmentation = if no_augment {
        AugmentationConfig::none()
    } else {
        AugmentationConfig::default()
    };

    let training_config = TrainingConfig {
        epochs,
        batch_size,
        learning_rate,
        momentum,
        early_stopping_patience: patience,
        seed,
        augmentation,
        checkpoint_dir: Path::new(output_dir).join("checkpoints"),
        limit,
        ..Default::default()
    };

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Training samples:   {}", train_loader.len());
    println!("  Validation samples: {}", val_loader.len());
    println!("  Epochs:             {}", epochs);
    println!("  Batch size:         {}", batch_size);
    println!("  Learning rate:      {}", learning_rate);
    println!("  Momentum:           {}", momentum);
    println!("  Frozen stages:      {}", frozen_stages);
    println!("  Backend:            {}", backend_name());
    println!();

    let preprocessor = Preprocessor::new(model_config.input_size as u32);
    let train_dataset = XrayTensorDataset::from_loader(&train_loader, preprocessor.clone());
    let val_dataset = XrayTensorDataset::from_loader(&val_loader, preprocessor);

    let device = default_device();
    let mut trainer = Trainer::<TrainingBackend>::new(
        model_config,
        training_config,
        train_loader.class_names.clone(),
        device.clone(),
    )?;

    println!("{}", "Starting training...".green().bold());
    let history = trainer.fit(&train_dataset, &val_dataset)?;

    let output = Path::new(output_dir);
    std::fs::create_dir_all(output)?;
    history.save(&output.join("history.json"))?;
    charts::generate_history_charts(&history, &output.join("charts"))?;

    println!();
    println!("{}", "Evaluating best weights...".cyan());
    let best_model = trainer.model().valid();
    let evaluator = Evaluator::new(&best_model, train_loader.class_names.clone(), batch_size);
    let inner_device = Default::default();
    let report = evaluator.evaluate(&val_dataset, &inner_device)?;
    println!("{}", report.render());

    charts::generate_confusion_heatmap(
        "Validation Confusion Matrix",
        &report.metrics.confusion_matrix,
        &report.class_names,
        &output.join("charts").join("confusion.svg"),
    )?;

    println!("{}", "Training complete!".green().bold());
    println!(
        "  Best validation accuracy: {:.2}%",
        trainer.state().best_val_accuracy * 100.0
    );
    println!(
        "  Best checkpoint: {}",
        trainer.best_checkpoint_stem().display()
    );

    Ok(())
}

fn cmd_evaluate(val_dir: &str, checkpoint: &str, batch_size: usize, output_dir: &str) -> Result<()> {
    let device = default_device();
    let (model, manifest) = load_checkpoint::<DefaultBackend>(Path::new(checkpoint), &device)?;

    let val_loader = LungXrayDataset::new(val_dir)?;
    if val_loader.class_names != manifest.class_names {
        anyhow::bail!(
            "validation classes {:?} do not match the checkpoint classes {:?}",
            val_loader.class_names,
            manifest.class_names
        );
    }

    let preprocessor = Preprocessor::new(manifest.model.input_size as u32);
    let val_dataset = XrayTensorDataset::from_loader(&val_loader, preprocessor);

    let evaluator = Evaluator::new(&model, manifest.class_names.clone(), batch_size);
    let report = evaluator.evaluate(&val_dataset, &device)?;

    println!("{}", report.render());

    let output = Path::new(output_dir);
    std::fs::create_dir_all(output)?;
    report
        .metrics
        .confusion_matrix
        .save_csv(&output.join("confusion.csv"))?;
    charts::generate_confusion_heatmap(
        "Validation Confusion Matrix",
        &report.metrics.confusion_matrix,
        &report.class_names,
        &output.join("confusion.svg"),
    )?;

    info!("Evaluation artifacts written to {}", output.display());

    Ok(())
}

fn cmd_infer(input: &str, checkpoint: &str) -> Result<()> {
    println!("{}", "Inference Configuration:".cyan().bold());
    println!("  Input:      {}", input);
    println!("  Checkpoint: {}", checkpoint);
    println!("  Backend:    {}", backend_name());
    println!();

    let device = default_device();
    let predictor = Predictor::<DefaultBackend>::load(Path::new(checkpoint), device)?;

    let input_path = Path::new(input);
    let files: Vec<PathBuf> = if input_path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(input_path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| ["jpg", "jpeg", "png", "bmp"].contains(&e.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files.truncate(10);
        files
    } else {
        vec![input_path.to_path_buf()]
    };

    if files.is_empty() {
        anyhow::bail!("no image files found under '{}'", input);
    }

    for file in &files {
        let prediction = predictor.predict(file)?;
        println!("{}", prediction.display());
    }

    Ok(())
}

fn cmd_stats(data_dir: &str) -> Result<()> {
    info!("Computing dataset statistics for: {}", data_dir);

    let dataset = LungXrayDataset::new(data_dir)?;
    dataset.stats().print();

    Ok(())
}
