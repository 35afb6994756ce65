use clap::{Parser, Subcommand, Args};

#[derive(Parser)]
#[command(name = "outrider", version, about = "Stage-scoped agent execution for answer pipelines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one query through the answer pipeline
    Ask(AskArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct AskArgs {
    /// The question to answer
    pub query: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// YAML corpus of passages to retrieve from (bundled demo corpus if omitted)
    #[arg(long)]
    pub corpus: Option<String>,

    /// Write an execution metrics snapshot to this path after the run
    #[arg(long)]
    pub metrics_out: Option<String>,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// YAML configuration file
    pub config: String,
}
