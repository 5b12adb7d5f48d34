//! # cli
//!
//! Command-line interface for private kernel proof chains.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use kernel_prover::sample::TxBuilder;
use kernel_prover::{
    BackendKind, EngineHandle, FieldBytes, HasherKind, KernelProverConfig, KernelStepInput, NativeKernelProver,
    PrivateCallData, ProofChain, ProofCreator, ProofOutput, ProofVerifier, ProvingBackend, StepRequest, TxBundle,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

/// Kernel prover CLI application
#[derive(Parser)]
#[command(name = "kernel-prover")]
#[command(about = "Private kernel proof orchestration")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Hasher: poseidon | blake3 (overrides KERNEL_PROVER_HASHER)
    #[arg(long)]
    pub hasher: Option<HasherKind>,

    /// Proving backend: binding | empty (overrides KERNEL_PROVER_BACKEND)
    #[arg(long)]
    pub backend: Option<BackendKind>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Generate a well-formed sample transaction bundle
    Sample {
        /// RNG seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Number of private calls made by the root call
        #[arg(long, default_value_t = 1)]
        children: usize,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print siloed commitments of a call frame
    Silo {
        /// Private call data (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Fold every frame of a transaction bundle into one kernel proof
    Prove {
        /// Transaction bundle (JSON)
        #[arg(short, long)]
        tx: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Run a single init or inner kernel step
    Step {
        /// Step request (JSON)
        #[arg(short, long)]
        request: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Check a proof output against the configured backend
    Verify {
        /// Proof output (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },
}

impl Cli {
    pub fn config(&self) -> KernelProverConfig {
        let mut cfg = KernelProverConfig::from_env();
        if let Some(h) = self.hasher {
            cfg.hasher = h;
        }
        if let Some(b) = self.backend {
            cfg.backend = b;
        }
        cfg
    }
}

/// Run the CLI application
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    execute(&cli).await
}

/// Execute a parsed command
pub async fn execute(cli: &Cli) -> Result<()> {
    let cfg = cli.config();
    let engine = EngineHandle::new(cfg.hasher);
    let prover = NativeKernelProver::from_config(engine.clone(), &cfg);

    match &cli.command {
        Commands::Sample { seed, children, out } => {
            let hasher = engine.get().await?;
            let tx = TxBuilder::new(hasher.as_ref(), *seed).with_children(*children).build()?;
            emit(&tx, out.as_deref()).await
        }
        Commands::Silo { input } => {
            let call: PrivateCallData = read_json(input).await?;
            let siloed = prover.silo_commitments(call.public_inputs()).await?;
            for c in siloed {
                println!("{}", hex::encode(FieldBytes::from(c).as_bytes()));
            }
            Ok(())
        }
        Commands::Prove { tx, out } => {
            let bundle: TxBundle = read_json(tx).await?;
            let chain = ProofChain::run(&prover, &bundle.signed_tx_request, &bundle.frames).await?;
            if !chain.is_complete() {
                bail!(
                    "bundle left {} private call(s) unprocessed",
                    chain.output().public_inputs.end.private_call_stack.len()
                );
            }
            info!(steps = chain.steps(), "transaction folded");
            emit(&chain.finish(), out.as_deref()).await
        }
        Commands::Step { request, out } => {
            let req: StepRequest = read_json(request).await?;
            let step = KernelStepInput::try_from(req)?;
            let output = prover.create_proof(&step).await?;
            emit(&output, out.as_deref()).await
        }
        Commands::Verify { output } => {
            let out: ProofOutput = read_json(output).await?;
            let backend = prover.backend();
            if backend.verify(&out.public_inputs, &out.proof)? {
                if backend.is_placeholder() {
                    println!("valid ({} placeholder proof, not a soundness check)", backend.name());
                } else {
                    println!("valid");
                }
                Ok(())
            } else {
                Err(anyhow!("proof does not verify against its public inputs"))
            }
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
