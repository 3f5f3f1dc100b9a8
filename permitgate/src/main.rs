//! PermitGate CLI entry point.
//!
//! Implements: REQ-CLI-001
//!
//! Dispatches to `submit` (full authorization pipeline), `execute`
//! (permit-verified tool dispatch), or `verify-ledger` (audit chain
//! recomputation). Configuration comes from `PERMITGATE_*` environment
//! variables.

use clap::{Parser, Subcommand};

use permitgate::cli::{ExecuteArgs, SubmitArgs, VerifyLedgerArgs};
use permitgate::run;
use permitgate_core::GateConfig;

/// PermitGate: policy-gated, audited authorization for agent actions.
#[derive(Parser)]
#[command(name = "permitgate", version)]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a request for authorization.
    Submit(SubmitArgs),
    /// Execute a tool under an approved permit.
    Execute(ExecuteArgs),
    /// Recompute and check the audit chain.
    VerifyLedger(VerifyLedgerArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = GateConfig::from_env();
    let code = match cli.command {
        Commands::Submit(args) => run::run_submit(config, args).await,
        Commands::Execute(args) => run::run_execute(config, args).await,
        Commands::VerifyLedger(args) => run::run_verify_ledger(config, args).await,
    };

    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
