//! Shuffle session orchestration (spec.md §4.K): chains `activeThreshold`
//! mix parties' committed shuffles, each proven with PoSC (over the
//! party's permutation commitment, independent of any ciphertexts) and
//! CCPoS (tying that commitment to the re-encrypted, permuted output),
//! with replace-on-failure semantics and an optimistic next-party
//! precomputation task.
//!
//! Grounded on a per-party shuffler pipeline structure (generate
//! permutation, re-encrypt, prove, hand off to the next stage) generalized
//! from a single fixed-size shuffle to an arbitrary-width, multi-party
//! chain with verifiable proofs at every hop.

use crate::challenger::Challenger;
use crate::config::GlobalParams;
use crate::elgamal::Ciphertext;
use crate::error::{ProofRejected, ProtocolError};
use crate::group::GroupElement;
use crate::permutation::ccpos::{self, CcposCommitment, CcposReply};
use crate::permutation::posc::{self, PoscCommitment, PoscReply};
use crate::permutation::{KeepList, PermutationCommitment};
use crate::tokio_tools::spawn_named_task;
use rand_core::RngCore;
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "mixnet_engine::shuffle";

/// A single mix party's pre-computation (spec.md §4.K step 1): a fresh
/// permutation commitment over the full `maxciph`-width independent
/// generator vector, proven with PoSC. Independent of any ciphertext
/// input, so it can run ahead of the online phase.
#[derive(Clone, Debug)]
pub struct PartyPrecomputation<C: GroupElement> {
    pub party: usize,
    pub commitment: PermutationCommitment<C>,
    pub posc_commitment: PoscCommitment<C>,
    pub posc_reply: PoscReply<C>,
}

/// Run party `party`'s precomputation against the full independent
/// generator vector `h` (length `maxciph`).
pub fn precompute_party<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    h: &[C],
    party: usize,
    rng: &mut impl RngCore,
) -> PartyPrecomputation<C> {
    let commitment = PermutationCommitment::generate(g, h, h.len(), params.rho, rng);
    let (posc_commitment, posc_reply) = posc::prove(challenger, params, g, h, &commitment, rng);
    tracing::debug!(target: LOG_TARGET, party, maxciph = h.len(), "party precomputation complete");
    PartyPrecomputation {
        party,
        commitment,
        posc_commitment,
        posc_reply,
    }
}

/// The permutation commitment a party is actually bound to for the
/// online phase: its own `u` if PoSC verifies, or the trivial commitment
/// (spec.md §4.H "on reject the verifier replaces the prover's
/// permutation commitment with a trivial one equal to the generator
/// vector") otherwise. A replaced party necessarily fails its online
/// CCPoS step too, since it no longer knows an opening of `u`; this
/// crate treats that as an ordinary failed shuffle step rather than
/// modeling the edge case of an honest-identity fallback shuffle.
pub fn effective_commitment<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    h: &[C],
    precomp: &PartyPrecomputation<C>,
) -> Vec<C> {
    match posc::verify(
        challenger,
        params,
        g,
        h,
        &precomp.commitment.u,
        &precomp.posc_commitment,
        &precomp.posc_reply,
    ) {
        Ok(()) => precomp.commitment.u.clone(),
        Err(_) => {
            tracing::warn!(target: LOG_TARGET, party = precomp.party, "PoSC rejected, substituting trivial commitment");
            PermutationCommitment::<C>::trivial(h)
        }
    }
}

/// One party's contribution to the online shuffle chain: the permuted,
/// re-encrypted output and the CCPoS proof tying it to the (possibly
/// shrunk) permutation commitment used for this width.
#[derive(Clone, Debug)]
pub struct ShuffleStepOutput<C: GroupElement> {
    pub u_used: Vec<C>,
    pub output: Vec<Ciphertext<C>>,
    pub commitment: CcposCommitment<C>,
    pub reply: CcposReply<C>,
}

/// Shrink a party's full-width precomputation to the current ciphertext
/// count `n`, per spec.md §4.K step 1 "shrinking". Only the no-op
/// (`keep_list` is `None`, i.e. `n == maxciph`) and simple-prefix cases
/// are handled faithfully; a non-trivial keepList is rejected rather than
/// silently producing an unsound shrunk permutation, since `Permutation::
/// shrink` requires the kept prefix to already be permutation-invariant.
fn shrink_for_width<C: GroupElement>(
    commitment: &PermutationCommitment<C>,
    u_full: &[C],
    h: &[C],
    keep_list: Option<&KeepList>,
    n: usize,
) -> Result<(Vec<C>, Vec<C>, PermutationCommitment<C>), ProtocolError> {
    match keep_list {
        None => {
            if u_full.len() != n {
                return Err(ProtocolError::Invariant(format!(
                    "no keepList supplied but u has width {} != {}",
                    u_full.len(),
                    n
                )));
            }
            Ok((u_full.to_vec(), h.to_vec(), commitment.clone()))
        }
        Some(kl) => {
            kl.validate(u_full.len(), n)?;
            let u_shrunk = kl.extract(u_full);
            let h_shrunk = kl.extract(h);
            let shrunk = PermutationCommitment {
                u: u_shrunk.clone(),
                keep_list: Some(kl.clone()),
                permutation: commitment.permutation.shrink(n),
                r: commitment.r[..n].to_vec(),
            };
            Ok((u_shrunk, h_shrunk, shrunk))
        }
    }
}

/// Run one party's committed shuffle step: re-encrypt and permute `w`
/// under the party's (possibly shrunk) precomputed permutation, and prove
/// CCPoS against the effective (PoSC-verified-or-trivial) commitment.
#[allow(clippy::too_many_arguments)]
pub fn shuffle_step<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    pk: C,
    h: &[C],
    u_full: &[C],
    commitment: &PermutationCommitment<C>,
    keep_list: Option<&KeepList>,
    w: &[Ciphertext<C>],
    rng: &mut impl RngCore,
) -> Result<ShuffleStepOutput<C>, ProtocolError> {
    let n = w.len();
    let (u_used, h_used, commitment_used) = shrink_for_width(commitment, u_full, h, keep_list, n)?;

    let s: Vec<C::ScalarField> = (0..n).map(|_| Ciphertext::<C>::sample_reencryption_exponent(rng)).collect();
    let reencrypted: Vec<Ciphertext<C>> = w.iter().zip(&s).map(|(ct, s_i)| ct.reencrypt(g, pk, *s_i)).collect();
    let output = commitment_used.permutation.permute(&reencrypted);

    let (commitment_proof, reply) = ccpos::prove(
        challenger,
        params,
        g,
        pk,
        &h_used,
        &commitment_used,
        w,
        &output,
        &s,
        rng,
    );

    Ok(ShuffleStepOutput {
        u_used,
        output,
        commitment: commitment_proof,
        reply,
    })
}

/// Verify one party's committed shuffle step against the public inputs.
pub fn verify_step<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    pk: C,
    h: &[C],
    keep_list: Option<&KeepList>,
    w: &[Ciphertext<C>],
    step: &ShuffleStepOutput<C>,
) -> Result<(), ProofRejected> {
    let n = w.len();
    let h_used = match keep_list {
        None => h.to_vec(),
        Some(kl) => kl.extract(h),
    };
    if h_used.len() != n || step.u_used.len() != n {
        return Err(ProofRejected::Ccpos { party: 0 });
    }
    ccpos::verify(
        challenger,
        params,
        g,
        pk,
        &h_used,
        &step.u_used,
        w,
        &step.output,
        &step.commitment,
        &step.reply,
    )
}

/// Result of running the full `1..=activeThreshold` chain: the final
/// output and, per party, whether its step was accepted or replaced by a
/// verbatim copy of its input (spec.md §4.K "replace-on-failure").
pub struct ChainOutcome<C: GroupElement> {
    pub output: Vec<Ciphertext<C>>,
    pub accepted: Vec<bool>,
}

/// Run the online committed-shuffle chain over `active_threshold`
/// parties' precomputations. On a rejected CCPoS step, that party's
/// contribution is discarded and its output is the verbatim input it
/// received (spec.md §4.K "replace-on-failure"); the chain still requires
/// at least `required_valid` accepted steps overall.
#[allow(clippy::too_many_arguments)]
pub fn run_chain<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    pk: C,
    h: &[C],
    keep_list: Option<&KeepList>,
    precomputations: &[PartyPrecomputation<C>],
    required_valid: usize,
    initial: Vec<Ciphertext<C>>,
    rng: &mut impl RngCore,
) -> Result<ChainOutcome<C>, ProtocolError> {
    let mut current = initial;
    let mut accepted = Vec::with_capacity(precomputations.len());
    let mut valid_count = 0usize;

    for precomp in precomputations {
        let u_eff = effective_commitment(challenger, params, g, h, precomp);
        let u_usable = u_eff.len() == precomp.commitment.u.len();

        let step_result = if u_usable && u_eff == precomp.commitment.u {
            shuffle_step(challenger, params, g, pk, h, &u_eff, &precomp.commitment, keep_list, &current, rng)
                .ok()
                .and_then(|step| verify_step(challenger, params, g, pk, h, keep_list, &current, &step).ok().map(|_| step))
        } else {
            None
        };

        match step_result {
            Some(step) => {
                tracing::info!(target: LOG_TARGET, party = precomp.party, "shuffle step accepted");
                current = step.output;
                accepted.push(true);
                valid_count += 1;
            }
            None => {
                tracing::warn!(target: LOG_TARGET, party = precomp.party, "shuffle step replaced with verbatim copy");
                accepted.push(false);
            }
        }
    }

    if valid_count < required_valid {
        return Err(ProtocolError::InsufficientValidProofs {
            valid: valid_count,
            threshold: required_valid,
        });
    }

    Ok(ChainOutcome { output: current, accepted })
}

/// Spawn the next party's precomputation optimistically while the current
/// party's online step is being verified (spec.md §5 "bounded optimistic
/// computation of the next party's precomputation").
pub fn spawn_next_precomputation<C>(
    challenger: Challenger,
    params: GlobalParams,
    g: C,
    h: Vec<C>,
    party: usize,
) -> JoinHandle<PartyPrecomputation<C>>
where
    C: GroupElement + Send + 'static,
    C::ScalarField: Send,
{
    spawn_named_task(format!("precompute-party-{party}"), async move {
        let mut rng = rand::rngs::OsRng;
        precompute_party(&challenger, &params, g, &h, party, &mut rng)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fr, G1Projective as G};
    use ark_ec::PrimeGroup;

    fn fresh_ciphertexts(g: G, pk: G, n: usize) -> Vec<Ciphertext<G>> {
        (1..=n as u64)
            .map(|i| Ciphertext::encrypt(g, pk, g * Fr::from(i), Fr::from(i + 100)))
            .collect()
    }

    #[test]
    fn full_width_chain_accepts_honest_parties() {
        let mut rng = ark_std::test_rng();
        let params = GlobalParams::test_default(3, 2);
        let challenger = Challenger::new(&params);
        let g = G::generator();
        let pk = g * Fr::from(99u64);
        let n = 5;
        let h: Vec<G> = (0..n).map(|i| g * Fr::from((i + 41) as u64)).collect();
        let w = fresh_ciphertexts(g, pk, n);

        let precomps: Vec<_> = (1..=3).map(|p| precompute_party(&challenger, &params, g, &h, p, &mut rng)).collect();
        let outcome = run_chain(&challenger, &params, g, pk, &h, None, &precomps, 3, w, &mut rng).unwrap();
        assert_eq!(outcome.accepted, vec![true, true, true]);
        assert_eq!(outcome.output.len(), n);
    }

    #[test]
    fn tampered_precomputation_is_replaced_and_chain_still_meets_threshold() {
        let mut rng = ark_std::test_rng();
        let params = GlobalParams::test_default(3, 2);
        let challenger = Challenger::new(&params);
        let g = G::generator();
        let pk = g * Fr::from(99u64);
        let n = 4;
        let h: Vec<G> = (0..n).map(|i| g * Fr::from((i + 41) as u64)).collect();
        let w = fresh_ciphertexts(g, pk, n);

        let mut precomps: Vec<_> = (1..=3).map(|p| precompute_party(&challenger, &params, g, &h, p, &mut rng)).collect();
        precomps[1].posc_reply.k_f += Fr::from(1u64);

        let outcome = run_chain(&challenger, &params, g, pk, &h, None, &precomps, 2, w, &mut rng).unwrap();
        assert_eq!(outcome.accepted, vec![true, false, true]);
    }

    #[test]
    fn below_threshold_valid_steps_errors() {
        let mut rng = ark_std::test_rng();
        let params = GlobalParams::test_default(3, 2);
        let challenger = Challenger::new(&params);
        let g = G::generator();
        let pk = g * Fr::from(99u64);
        let n = 3;
        let h: Vec<G> = (0..n).map(|i| g * Fr::from((i + 41) as u64)).collect();
        let w = fresh_ciphertexts(g, pk, n);

        let mut precomps: Vec<_> = (1..=2).map(|p| precompute_party(&challenger, &params, g, &h, p, &mut rng)).collect();
        for precomp in precomps.iter_mut() {
            precomp.posc_reply.k_f += Fr::from(1u64);
        }

        let err = run_chain(&challenger, &params, g, pk, &h, None, &precomps, 2, w, &mut rng).unwrap_err();
        assert!(matches!(err, ProtocolError::InsufficientValidProofs { .. }));
    }
}
