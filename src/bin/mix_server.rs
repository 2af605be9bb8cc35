//! Single-process mix-session demo (spec.md §4.L end-to-end lifecycle):
//! drives `k`-party distributed key generation, a committed shuffle chain
//! over `activeThreshold` parties, and threshold decryption, publishing
//! every party's artifacts to an in-memory bulletin board along the way,
//! then writes the resulting proof directory to `--out` for `bin/verify.rs`
//! to independently check.
//!
//! A thin runnable harness over the library, not a production coordinator
//! (spec.md §1 leaves the bulletin board's actual transport and a live
//! multi-process coordinator out of scope).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use ark_bn254::{Fr, G1Projective as Curve};
use ark_ec::PrimeGroup;
use ark_ff::UniformRand;
use clap::Parser;
use mixnet_engine::bulletin::{BulletinBoard, InMemoryBulletinBoard};
use mixnet_engine::bytetree::encode_to_bytes;
use mixnet_engine::challenger::Challenger;
use mixnet_engine::config::GlobalParams;
use mixnet_engine::elgamal::{self, Ciphertext, PublicKey};
use mixnet_engine::error::ProtocolError;
use mixnet_engine::group::ExpHomomorphism;
use mixnet_engine::igs;
use mixnet_engine::mixnet::proofdir::{DecryptionArtifacts, PartyArtifacts, ProofDirectory, SessionType};
use mixnet_engine::shuffle::{self, PartyPrecomputation};
use mixnet_engine::vss::sequential::SequentialVss;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing_subscriber::{fmt::time::Uptime, EnvFilter};

const LOG_TARGET: &str = "bin::mix_server";

#[derive(Debug, Parser)]
#[command(name = "mix-server")]
#[command(about = "Run a demo k-party mix session end to end and write its proof directory", long_about = None)]
struct Args {
    /// Number of parties in the threshold scheme
    #[arg(long, default_value_t = 3)]
    k: usize,

    /// Decryption/DKG threshold
    #[arg(long, default_value_t = 2)]
    t: usize,

    /// Number of ciphertexts to mix
    #[arg(long, default_value_t = 5)]
    width: usize,

    /// Number of parties that actually run the shuffle chain; defaults to `k`
    #[arg(long)]
    active_threshold: Option<usize>,

    /// Minimum number of accepted shuffle steps the chain must reach
    #[arg(long)]
    required_valid: Option<usize>,

    /// Session identifier
    #[arg(long, default_value = "demosession")]
    sid: String,

    /// Session instance identifier
    #[arg(long, default_value = "demo")]
    auxsid: String,

    /// Deterministic PRNG seed, for reproducible demo runs
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Directory to write the proof directory into
    #[arg(long, default_value = "mix-out")]
    out: PathBuf,

    /// Toggle structured (JSON) tracing output
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json)?;

    let mut params = GlobalParams::test_default(args.k, args.t);
    params.sid = args.sid.clone();
    params.auxsid = args.auxsid.clone();
    params.validate().map_err(|err| anyhow!("invalid params: {err}"))?;

    let active_threshold = args.active_threshold.unwrap_or(args.k);
    let required_valid = args.required_valid.unwrap_or(active_threshold);
    if active_threshold > args.k {
        return Err(anyhow!("active_threshold {} exceeds k {}", active_threshold, args.k));
    }

    let g = Curve::generator();
    let challenger = Challenger::new(&params);
    let board: Arc<InMemoryBulletinBoard> = Arc::new(InMemoryBulletinBoard::new());
    let mut rng = ChaCha20Rng::seed_from_u64(args.seed);

    board
        .publish("params", serde_json::to_vec(&params).map_err(|err| anyhow!("{err}"))?)
        .await
        .map_err(|err| anyhow!(err))?;

    // Distributed key generation: t dealers, each sharing a fresh secret to
    // all k parties, complaint-free (spec.md §4.F).
    let phi = ExpHomomorphism::new(g);
    let secrets: Vec<Fr> = (0..args.t).map(|_| Fr::rand(&mut rng)).collect();
    let verdicts: Vec<Vec<bool>> = (0..args.t).map(|_| vec![true; args.k + 1]).collect();
    let vss: SequentialVss<Curve> = SequentialVss::run(&phi, args.k, args.t, &secrets, &verdicts, &mut rng);

    let public_key = PublicKey {
        generator: g,
        y: vss.constant_element_product(),
    };
    let poly_in_exp = vss
        .instances
        .iter()
        .map(|inst| inst.outcome.poly.clone())
        .reduce(|a, b| a.mul(&b))
        .expect("at least one dealer");
    board
        .publish("dkg/public_key", encode_to_bytes(&public_key))
        .await
        .map_err(|err| anyhow!(err))?;
    tracing::info!(target: LOG_TARGET, active_dealers = ?vss.active_dealers(), "distributed key generation complete");

    // Pre-computation: every party in the active chain commits to a fresh
    // permutation over the full-width independent generator vector
    // (spec.md §4.K step 1). The first party's precomputation is run via
    // the optimistic spawn helper to exercise that code path; the rest run
    // inline since this demo has no concurrent online phase to overlap with.
    let label = format!("{}.{}", params.sid, params.auxsid);
    let h: Vec<Curve> = igs::derive_generators(label.as_bytes(), args.width);

    let first_handle = shuffle::spawn_next_precomputation(challenger.clone(), params.clone(), g, h.clone(), 1);
    let mut precomputations: Vec<PartyPrecomputation<Curve>> = vec![first_handle
        .await
        .map_err(|err| anyhow!("precomputation task for party 1 panicked: {err}"))?];
    for party in 2..=active_threshold {
        precomputations.push(shuffle::precompute_party(&challenger, &params, g, &h, party, &mut rng));
    }
    for precomp in &precomputations {
        board
            .publish(&format!("precompute/party{}", precomp.party), encode_to_bytes(&precomp.posc_commitment))
            .await
            .map_err(|err| anyhow!(err))?;
    }

    // Online phase: fresh ciphertexts encrypting a known message set, then
    // the committed-shuffle chain over the active parties.
    let messages: Vec<Curve> = (1..=args.width as u64).map(|i| g * Fr::from(i)).collect();
    let ciphertexts: Vec<Ciphertext<Curve>> = messages
        .iter()
        .map(|m| Ciphertext::encrypt(g, public_key.y, *m, Fr::rand(&mut rng)))
        .collect();
    board
        .publish("ciphertexts", encode_to_bytes(&ciphertexts))
        .await
        .map_err(|err| anyhow!(err))?;

    let mut current = ciphertexts.clone();
    let mut parties = Vec::with_capacity(precomputations.len());
    let mut valid_count = 0usize;

    for precomp in &precomputations {
        let input = current.clone();
        let u_eff = shuffle::effective_commitment(&challenger, &params, g, &h, precomp);
        let usable = u_eff == precomp.commitment.u;

        let step = if usable {
            shuffle::shuffle_step(&challenger, &params, g, public_key.y, &h, &u_eff, &precomp.commitment, None, &input, &mut rng).ok()
        } else {
            None
        };

        match step {
            Some(step) => {
                board
                    .publish(&format!("shuffle/party{}/output", precomp.party), encode_to_bytes(&step.output))
                    .await
                    .map_err(|err| anyhow!(err))?;
                current = step.output.clone();
                valid_count += 1;
                parties.push(PartyArtifacts {
                    party: precomp.party,
                    input_ciphertexts: input,
                    permutation_commitment_u: step.u_used.clone(),
                    keep_list: None,
                    posc: Some((precomp.posc_commitment.clone(), precomp.posc_reply.clone())),
                    ccpos: Some((step.commitment.clone(), step.reply.clone())),
                    pos: None,
                });
                tracing::info!(target: LOG_TARGET, party = precomp.party, "shuffle step accepted");
            }
            None => {
                tracing::warn!(target: LOG_TARGET, party = precomp.party, "shuffle step replaced with verbatim copy");
                parties.push(PartyArtifacts {
                    party: precomp.party,
                    input_ciphertexts: input,
                    permutation_commitment_u: h.clone(),
                    keep_list: None,
                    posc: Some((precomp.posc_commitment.clone(), precomp.posc_reply.clone())),
                    ccpos: None,
                    pos: None,
                });
            }
        }
    }

    if valid_count < required_valid {
        return Err(ProtocolError::InsufficientValidProofs {
            valid: valid_count,
            threshold: required_valid,
        }
        .into());
    }
    let shuffled_ciphertexts = current;

    // Threshold decryption: every party submits its decryption factors;
    // only `t` correct submissions are needed to recombine.
    let mut decryptions = Vec::with_capacity(args.k);
    let mut y_ls = Vec::with_capacity(args.k);
    for party in 1..=args.k {
        let share = vss.collapse(party);
        let y_l = g * share.share;
        let df = elgamal::compute_and_prove_decryption_factors(&challenger, g, party, share.share, y_l, &shuffled_ciphertexts, &mut rng);
        board
            .publish(&format!("decrypt/party{party}/proof"), encode_to_bytes(&df.proof))
            .await
            .map_err(|err| anyhow!(err))?;
        y_ls.push((party, y_l));
        decryptions.push(DecryptionArtifacts { df });
    }
    let submissions: Vec<_> = decryptions.iter().map(|d| d.df.clone()).collect();
    let (plaintexts, correct) = elgamal::threshold_decrypt(&challenger, g, &y_ls, &shuffled_ciphertexts, &submissions, args.t)?;

    let mut recovered = plaintexts.clone();
    let mut expected = messages.clone();
    recovered.sort_by_key(|p| mixnet_engine::bytetree::encode_group::<Curve>(p).to_bytes());
    expected.sort_by_key(|p| mixnet_engine::bytetree::encode_group::<Curve>(p).to_bytes());
    if recovered != expected {
        return Err(anyhow!("recombined plaintexts did not match the original messages"));
    }

    let dir = ProofDirectory::<Curve> {
        version: params.version.clone(),
        auxsid: params.auxsid.clone(),
        session_type: SessionType::Mixing,
        width: args.width,
        ciphertexts,
        shuffled_ciphertexts: Some(shuffled_ciphertexts),
        plaintexts: Some(plaintexts),
        public_key,
        poly_in_exp,
        maxciph: Some(args.width),
        active_threshold,
        parties,
        decryptions,
        correct_indices: correct,
    };
    dir.write(&args.out)?;

    tracing::info!(target: LOG_TARGET, out = %args.out.display(), published_keys = board.snapshot().len(), "mix session complete");
    println!("wrote proof directory to {}", args.out.display());
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    if json {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mix_server=info,mixnet_engine=info"));
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
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mix_server=info,mixnet_engine=info"));
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
