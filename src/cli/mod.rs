// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// `clap` and delegates everything else to Layer 2.
//
// Three commands are supported:
//   1. `ask`      : answer a question from a context passage
//   2. `classify` : label a piece of text
//   3. `init`     : scaffold a checkpoint directory
//
// Inference runs on the Wgpu backend.

pub mod commands;

use std::sync::Arc;

use anyhow::{Context, Result};
use burn::backend::{wgpu::WgpuDevice, Wgpu};
use clap::Parser;
use commands::{AskArgs, ClassifyArgs, Commands, InitArgs, PipelineOverrides};

use crate::application::engine::{LazyEngine, QaEngine};

#[derive(Parser, Debug)]
#[command(
    name = "extractive-qa",
    version = "0.1.0",
    about = "Extractive question answering and text classification with a transformer encoder."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching handler; the CLI layer never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Ask(args)      => run_ask(args),
            Commands::Classify(args) => run_classify(args),
            Commands::Init(args)     => run_init(args),
        }
    }
}

fn lazy_engine(checkpoint_dir: String, overrides: PipelineOverrides) -> Arc<LazyEngine> {
    Arc::new(LazyEngine::new(move || {
        let engine = QaEngine::from_checkpoint::<Wgpu>(&checkpoint_dir, WgpuDevice::default())?;
        let config = overrides.apply(*engine.config());
        Ok(engine.with_config(config))
    }))
}

fn run_ask(args: AskArgs) -> Result<()> {
    use crate::application::ask_use_case::AskUseCase;

    let context = match (&args.context, &args.context_file) {
        (Some(text), _)    => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read context file '{path}'"))?,
        (None, None)       => anyhow::bail!("either --context or --context-file is required"),
    };

    let overrides = PipelineOverrides::from(&args);
    let use_case = AskUseCase::new(lazy_engine(args.checkpoint_dir, overrides), context);

    let answers = use_case.answer_candidates(&args.question)?;
    if answers.is_empty() {
        println!("No answer found.");
    }
    for (rank, a) in answers.iter().enumerate() {
        if answers.len() == 1 {
            println!("\nAnswer: {}", a.text);
        } else {
            println!("{}. {} (score {:.4})", rank + 1, a.text, a.span.score);
        }
    }
    Ok(())
}

fn run_classify(args: ClassifyArgs) -> Result<()> {
    use crate::application::classify_use_case::ClassifyUseCase;

    let use_case = ClassifyUseCase::new(lazy_engine(args.checkpoint_dir, PipelineOverrides::default()));
    match use_case.classify_detailed(&args.text)? {
        Some(c) => println!("\nLabel: {} (p = {:.4})", c.label, c.probability),
        None    => println!("No label found."),
    }
    Ok(())
}

fn run_init(args: InitArgs) -> Result<()> {
    use crate::application::init_use_case::InitUseCase;

    tracing::info!("Scaffolding checkpoint in: {}", args.checkpoint_dir);
    let use_case = InitUseCase::new(args.into());
    use_case.execute::<Wgpu>(&WgpuDevice::default())?;

    println!("Checkpoint initialised.");
    Ok(())
}
