// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `ask`, `classify` and `init`,
// and all their configurable flags.
//
// The application layer never sees clap types: each Args struct
// converts into its application-layer config via `From`.

use clap::{Args, Subcommand, ValueEnum};

use crate::application::engine::{PipelineConfig, Task};
use crate::application::init_use_case::InitConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a question from a context passage
    Ask(AskArgs),

    /// Classify a piece of text into one of the checkpoint's labels
    Classify(ClassifyArgs),

    /// Scaffold a checkpoint directory (tokenizer, config, fresh weights)
    Init(InitArgs),
}

/// All arguments for the `ask` command
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The natural language question to answer
    #[arg(long)]
    pub question: String,

    /// Context passage to extract the answer from
    #[arg(long, conflicts_with = "context_file", required_unless_present = "context_file")]
    pub context: Option<String>,

    /// Read the context passage from a file instead
    #[arg(long)]
    pub context_file: Option<String>,

    /// Directory written by `init` (or holding a real checkpoint)
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Print this many answers, best first
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Longest answer span in tokens
    #[arg(long)]
    pub max_answer_len: Option<usize>,

    /// Restrict answers to the context (`--context-only false` lets
    /// question tokens be answer boundaries too)
    #[arg(long)]
    pub context_only: Option<bool>,
}

/// Flags that override the checkpoint's stored pipeline settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOverrides {
    pub top_k:          Option<usize>,
    pub max_answer_len: Option<usize>,
    pub context_only:   Option<bool>,
}

impl From<&AskArgs> for PipelineOverrides {
    fn from(a: &AskArgs) -> Self {
        Self {
            top_k:          a.top_k,
            max_answer_len: a.max_answer_len,
            context_only:   a.context_only,
        }
    }
}

impl PipelineOverrides {
    pub fn apply(self, base: PipelineConfig) -> PipelineConfig {
        PipelineConfig {
            top_k:          self.top_k.unwrap_or(base.top_k),
            max_answer_len: self.max_answer_len.unwrap_or(base.max_answer_len),
            context_only:   self.context_only.unwrap_or(base.context_only),
            ..base
        }
    }
}

/// All arguments for the `classify` command
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Text to classify
    #[arg(long)]
    pub text: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskArg {
    Qa,
    Classification,
}

impl From<TaskArg> for Task {
    fn from(t: TaskArg) -> Self {
        match t {
            TaskArg::Qa             => Task::QuestionAnswering,
            TaskArg::Classification => Task::Classification,
        }
    }
}

/// All arguments for the `init` command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Plain-text corpus, one passage per line, used to build the vocabulary
    #[arg(long)]
    pub corpus_file: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, value_enum, default_value_t = TaskArg::Qa)]
    pub task: TaskArg,

    /// Comma-separated class names in index order (classification only)
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Embedding rows; ids below 104 are reserved for special tokens
    #[arg(long, default_value_t = 8192)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 384)]
    pub max_seq_len: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 128)]
    pub d_model: usize,

    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 512)]
    pub d_ff: usize,
}

impl From<InitArgs> for InitConfig {
    fn from(a: InitArgs) -> Self {
        InitConfig {
            checkpoint_dir: a.checkpoint_dir,
            corpus_file:    a.corpus_file,
            task:           a.task.into(),
            labels:         a.labels,
            vocab_size:     a.vocab_size,
            max_seq_len:    a.max_seq_len,
            d_model:        a.d_model,
            num_heads:      a.num_heads,
            num_layers:     a.num_layers,
            d_ff:           a.d_ff,
        }
    }
}
