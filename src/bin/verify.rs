//! Independent verifier CLI (spec.md §6 "Verifier CLI surface"): loads a
//! proof directory written by a mix session and re-checks every proof it
//! contains, exiting non-zero the moment any enabled check fails.
//!
//! A thin `clap`/`anyhow` shell over `mixnet_engine::verifier`, in the same
//! division of labor kept between thin demo binaries and the library
//! crate they link against.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use ark_bn254::G1Projective as Curve;
use ark_ec::PrimeGroup;
use clap::{Parser, Subcommand};
use mixnet_engine::config::GlobalParams;
use mixnet_engine::verifier::{self, VerifyFlags, VerifyRequest, VerifyTarget};
use tracing_subscriber::{fmt::time::Uptime, EnvFilter};

const LOG_TARGET: &str = "bin::verify";

#[derive(Debug, Parser)]
#[command(name = "verify")]
#[command(about = "Independently verify a mix-net proof directory", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the proof directory written by a mix session
    #[arg(long)]
    root: PathBuf,

    /// Path to a JSON-encoded GlobalParams file matching the session
    #[arg(long)]
    params: PathBuf,

    /// Require the proof directory's auxsid to match exactly
    #[arg(long)]
    auxsid: Option<String>,

    /// Require the proof directory's declared width to match exactly
    #[arg(long)]
    width: Option<usize>,

    /// Skip PoSC (proof of a shuffle of commitments) checks
    #[arg(long)]
    noposc: bool,

    /// Skip CCPoS (commitment-consistent proof of a shuffle) checks
    #[arg(long)]
    noccpos: bool,

    /// Skip monolithic PoS checks
    #[arg(long)]
    nopos: bool,

    /// Skip decryption-factor and recombination checks
    #[arg(long)]
    nodec: bool,

    /// Toggle structured (JSON) tracing output
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify a full mix (shuffle + decrypt) session's proof directory
    Mix,
    /// Verify a shuffle-only session's proof directory
    Shuffle,
    /// Verify a decryption-only session's proof directory
    Decrypt,
    /// Accept whatever `type` tag the proof directory declares
    Sloppy,
}

impl From<&Command> for VerifyTarget {
    fn from(command: &Command) -> Self {
        match command {
            Command::Mix => VerifyTarget::Mix,
            Command::Shuffle => VerifyTarget::Shuffle,
            Command::Decrypt => VerifyTarget::Decrypt,
            Command::Sloppy => VerifyTarget::Sloppy,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json)?;

    let params_bytes = std::fs::read(&args.params)
        .map_err(|err| anyhow!("failed to read params file '{}': {err}", args.params.display()))?;
    let params: GlobalParams = serde_json::from_slice(&params_bytes)
        .map_err(|err| anyhow!("failed to parse params file '{}': {err}", args.params.display()))?;
    params.validate().map_err(|err| anyhow!("invalid params: {err}"))?;

    let req = VerifyRequest {
        root: args.root.clone(),
        target: VerifyTarget::from(&args.command),
        auxsid: args.auxsid.clone(),
        width: args.width,
        flags: VerifyFlags {
            no_posc: args.noposc,
            no_ccpos: args.noccpos,
            no_pos: args.nopos,
            no_dec: args.nodec,
        },
    };

    let g = Curve::generator();
    match verifier::verify::<Curve>(&params, g, &req) {
        Ok(message) => {
            tracing::info!(target: LOG_TARGET, root = %args.root.display(), "{message}");
            println!("{message}");
            Ok(())
        }
        Err(err) => {
            tracing::warn!(target: LOG_TARGET, root = %args.root.display(), error = %err, "proof directory rejected");
            println!("REJECT: {err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(json: bool) -> Result<()> {
    if json {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("verify=info,mixnet_engine=info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_timer(Uptime::default())
            .with_ansi(false)
            .json()
            .try_init()
            .map_err(|err| anyhow!("failed to initialize tracing subscriber: {err}"))?;
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("verify=info,mixnet_engine=info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_timer(Uptime::default())
            .try_init()
            .map_err(|err| anyhow!("failed to initialize tracing subscriber: {err}"))?;
    }
    Ok(())
}
