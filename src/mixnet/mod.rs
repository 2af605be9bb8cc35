//! Mix session state machine (spec.md §4.L): the top-level object a
//! coordinator drives through `INIT -> PRECOMPUTED -> SHUFFLED -> MIXED ->
//! DECRYPTED`, composing distributed key generation ([`crate::vss::sequential`]),
//! the shuffle chain ([`crate::shuffle`]), and threshold decryption
//! ([`crate::elgamal`]) into one object whose public API enforces the
//! ordering invariants spec.md §4.L and §7 call for (no shuffle before
//! precomputation, no decryption before a verified shuffle, an active
//! threshold recorded at most once per value).
//!
//! Grounded on session-phase bookkeeping in a shuffling pipeline
//! (precompute independently of ciphertexts, then commit), scaled
//! up to the full multi-stage mix-net lifecycle.

pub mod proofdir;

use crate::challenger::Challenger;
use crate::config::GlobalParams;
use crate::elgamal::{self, Ciphertext, DecryptionFactors, PublicKey};
use crate::error::ProtocolError;
use crate::group::GroupElement;
use crate::igs;
use crate::permutation::KeepList;
use crate::shuffle::{self, ChainOutcome, PartyPrecomputation};
use crate::vss::sequential::SequentialVss;
use rand_core::RngCore;

const LOG_TARGET: &str = "mixnet_engine::mixnet";

/// Lifecycle states of a mix session (spec.md §4.L).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Precomputed,
    Shuffled,
    Mixed,
    Decrypted,
}

/// The top-level mix session object. One instance per `(sid, auxsid)`.
pub struct MixSession<C: GroupElement> {
    pub params: GlobalParams,
    pub challenger: Challenger,
    pub g: C,
    pub h: Vec<C>,
    pub public_key: Option<PublicKey<C>>,
    pub state: SessionState,
    active_threshold: Option<usize>,
    precomputations: Vec<PartyPrecomputation<C>>,
    input: Vec<Ciphertext<C>>,
    output: Vec<Ciphertext<C>>,
    accepted: Vec<bool>,
    plaintexts: Vec<C>,
    correct_decryptors: Vec<bool>,
}

impl<C: GroupElement> MixSession<C> {
    /// Start a new session: derive the `maxciph` independent generators
    /// from `(sid, auxsid)` via the IGS (spec.md §6), leaving the public
    /// key unset until DKG completes.
    pub fn new(params: GlobalParams, g: C, maxciph: usize) -> Self {
        let label = format!("{}.{}", params.sid, params.auxsid);
        let h = igs::derive_generators(label.as_bytes(), maxciph);
        let challenger = Challenger::new(&params);
        Self {
            params,
            challenger,
            g,
            h,
            public_key: None,
            state: SessionState::Init,
            active_threshold: None,
            precomputations: Vec::new(),
            input: Vec::new(),
            output: Vec::new(),
            accepted: Vec::new(),
            plaintexts: Vec::new(),
            correct_decryptors: Vec::new(),
        }
    }

    /// Record the result of distributed key generation (spec.md §4.F),
    /// publishing the distributed public key for this session.
    pub fn complete_key_generation(&mut self, vss: &SequentialVss<C>) {
        self.public_key = Some(elgamal::derive_public_key(self.g, vss));
        tracing::info!(target: LOG_TARGET, "distributed key generation complete, public key published");
    }

    /// Record the active threshold (the number of parties the shuffle
    /// chain will actually run). Spec.md's Open Question on active-
    /// threshold double-write: recording the same value twice is a no-op;
    /// recording a conflicting value is a hard `ActiveThresholdConflict`
    /// error, since silently accepting the later write would let a
    /// misbehaving coordinator shrink the chain after parties have
    /// already computed against the original value.
    pub fn record_active_threshold(&mut self, value: usize) -> Result<(), ProtocolError> {
        match self.active_threshold {
            None => {
                self.active_threshold = Some(value);
                Ok(())
            }
            Some(existing) if existing == value => Ok(()),
            Some(existing) => Err(ProtocolError::ActiveThresholdConflict {
                first: existing,
                second: value,
            }),
        }
    }

    pub fn active_threshold(&self) -> Option<usize> {
        self.active_threshold
    }

    /// Run the pre-computation phase for `active_threshold` parties
    /// (spec.md §4.K step 1): each party commits to a fresh permutation
    /// over the full `maxciph`-width generator vector and proves PoSC.
    /// Transitions `Init -> Precomputed`.
    pub fn precompute(&mut self, rng: &mut impl RngCore) -> Result<(), ProtocolError> {
        if self.state != SessionState::Init {
            return Err(ProtocolError::Invariant(format!(
                "precompute requires state Init, found {:?}",
                self.state
            )));
        }
        let active_threshold = self
            .active_threshold
            .ok_or_else(|| ProtocolError::Invariant("active threshold not recorded before precompute".into()))?;

        self.precomputations = (1..=active_threshold)
            .map(|party| shuffle::precompute_party(&self.challenger, &self.params, self.g, &self.h, party, rng))
            .collect();
        self.state = SessionState::Precomputed;
        tracing::info!(target: LOG_TARGET, active_threshold, "pre-computation phase complete");
        Ok(())
    }

    /// Run the online committed-shuffle chain over `ciphertexts`, shrunk
    /// to width `ciphertexts.len()` via `keep_list` when the ciphertext
    /// count is below `maxciph`. Transitions `Precomputed -> Shuffled`.
    pub fn shuffle(
        &mut self,
        ciphertexts: Vec<Ciphertext<C>>,
        keep_list: Option<&KeepList>,
        required_valid: usize,
        rng: &mut impl RngCore,
    ) -> Result<(), ProtocolError> {
        if self.state != SessionState::Precomputed {
            return Err(ProtocolError::Invariant(format!(
                "shuffle requires state Precomputed, found {:?}",
                self.state
            )));
        }
        let public_key = self
            .public_key
            .ok_or_else(|| ProtocolError::Invariant("public key not set before shuffle".into()))?;

        self.input = ciphertexts.clone();
        let ChainOutcome { output, accepted } = shuffle::run_chain(
            &self.challenger,
            &self.params,
            self.g,
            public_key.y,
            &self.h,
            keep_list,
            &self.precomputations,
            required_valid,
            ciphertexts,
            rng,
        )?;
        self.output = output;
        self.accepted = accepted;
        self.state = SessionState::Shuffled;
        tracing::info!(target: LOG_TARGET, n_accepted = self.accepted.iter().filter(|a| **a).count(), "shuffle chain complete");
        Ok(())
    }

    /// Finalize the shuffle result as the session's mixed output, after
    /// the coordinator (or an external verifier) has independently
    /// re-checked every accepted step's proof. Transitions `Shuffled ->
    /// Mixed`. Splitting this from `shuffle` mirrors spec.md §4.L's
    /// distinct SHUFFLED/MIXED states: SHUFFLED is "a chain ran"; MIXED is
    /// "the chain's output is accepted as final".
    pub fn finalize_mix(&mut self) -> Result<(), ProtocolError> {
        if self.state != SessionState::Shuffled {
            return Err(ProtocolError::Invariant(format!(
                "finalize_mix requires state Shuffled, found {:?}",
                self.state
            )));
        }
        self.state = SessionState::Mixed;
        Ok(())
    }

    /// Threshold-decrypt the mixed output from committee submissions.
    /// Transitions `Mixed -> Decrypted`.
    pub fn decrypt(
        &mut self,
        y_ls: &[(usize, C)],
        submissions: &[DecryptionFactors<C>],
        t: usize,
    ) -> Result<(), ProtocolError> {
        if self.state != SessionState::Mixed {
            return Err(ProtocolError::Invariant(format!(
                "decrypt requires state Mixed, found {:?}",
                self.state
            )));
        }
        let (plaintexts, correct) = elgamal::threshold_decrypt(&self.challenger, self.g, y_ls, &self.output, submissions, t)?;
        self.plaintexts = plaintexts;
        self.correct_decryptors = correct;
        self.state = SessionState::Decrypted;
        tracing::info!(target: LOG_TARGET, "threshold decryption complete");
        Ok(())
    }

    pub fn input(&self) -> &[Ciphertext<C>] {
        &self.input
    }

    pub fn output(&self) -> &[Ciphertext<C>] {
        &self.output
    }

    pub fn precomputations(&self) -> &[PartyPrecomputation<C>] {
        &self.precomputations
    }

    pub fn accepted_steps(&self) -> &[bool] {
        &self.accepted
    }

    pub fn plaintexts(&self) -> &[C] {
        &self.plaintexts
    }

    /// A precompute call with no subsequent shuffle leaves the session
    /// dangling (spec.md §7 `DanglingPrecomputation`): useful for a
    /// coordinator auditing whether a session can be safely torn down.
    pub fn has_dangling_precomputation(&self) -> bool {
        self.state == SessionState::Precomputed
    }

    /// Tear down a session that will not be driven any further. Spec.md
    /// §4.L/§7 treats a pre-computation with no subsequent shuffle as
    /// invalid, so closing a session still stuck in `Precomputed` is a hard
    /// error rather than a silent drop; closing from any other state
    /// succeeds.
    pub fn close(self) -> Result<(), ProtocolError> {
        if self.has_dangling_precomputation() {
            return Err(ProtocolError::DanglingPrecomputation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::compute_and_prove_decryption_factors;
    use crate::group::ExpHomomorphism;
    use crate::vss::sequential::SequentialVss;
    use ark_bn254::{Fr, G1Projective as G};
    use ark_ec::PrimeGroup;

    #[test]
    fn full_session_lifecycle_reaches_decrypted() {
        let mut rng = ark_std::test_rng();
        let g = G::generator();
        let mut params = GlobalParams::test_default(3, 2);
        params.auxsid = "lifecycle".to_string();
        let n = 3;
        let mut session: MixSession<G> = MixSession::new(params.clone(), g, n);

        let phi = ExpHomomorphism::new(g);
        let secrets = vec![Fr::from(11u64), Fr::from(13u64)];
        let verdicts = vec![vec![true; 4], vec![true; 4]];
        let vss = SequentialVss::<G>::run(&phi, 3, 2, &secrets, &verdicts, &mut rng);
        session.complete_key_generation(&vss);

        session.record_active_threshold(2).unwrap();
        // re-recording the same value is a no-op
        session.record_active_threshold(2).unwrap();
        assert!(session.record_active_threshold(3).is_err());

        session.precompute(&mut rng).unwrap();
        assert!(session.has_dangling_precomputation());

        let messages: Vec<G> = (1..=n as u64).map(|i| g * Fr::from(i)).collect();
        let ciphertexts: Vec<Ciphertext<G>> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| Ciphertext::encrypt(g, session.public_key.unwrap().y, *m, Fr::from((i + 50) as u64)))
            .collect();

        session.shuffle(ciphertexts, None, 2, &mut rng).unwrap();
        assert!(!session.has_dangling_precomputation());
        session.finalize_mix().unwrap();

        let x1 = session.collapse_for_test(&vss, 1);
        let x2 = session.collapse_for_test(&vss, 2);
        let y1 = g * x1;
        let y2 = g * x2;
        let df1 = compute_and_prove_decryption_factors(&session.challenger, g, 1, x1, y1, session.output(), &mut rng);
        let df2 = compute_and_prove_decryption_factors(&session.challenger, g, 2, x2, y2, session.output(), &mut rng);

        session.decrypt(&[(1, y1), (2, y2)], &[df1, df2], 2).unwrap();
        assert_eq!(session.state, SessionState::Decrypted);

        let mut recovered = session.plaintexts().to_vec();
        let mut expected = messages;
        recovered.sort_by_key(|p| crate::bytetree::encode_group::<G>(p).to_bytes());
        expected.sort_by_key(|p| crate::bytetree::encode_group::<G>(p).to_bytes());
        assert_eq!(recovered, expected);
    }

    impl<C: GroupElement> MixSession<C> {
        fn collapse_for_test(&self, vss: &SequentialVss<C>, j: usize) -> C::ScalarField {
            vss.collapse(j).share
        }
    }

    #[test]
    fn closing_a_dangling_precomputation_is_rejected() {
        let mut rng = ark_std::test_rng();
        let g = G::generator();
        let mut params = GlobalParams::test_default(3, 2);
        params.auxsid = "dangling".to_string();
        let mut session: MixSession<G> = MixSession::new(params, g, 2);
        session.public_key = Some(PublicKey { generator: g, y: g });
        session.record_active_threshold(2).unwrap();
        session.precompute(&mut rng).unwrap();

        let err = session.close().unwrap_err();
        assert!(matches!(err, ProtocolError::DanglingPrecomputation));
    }

    #[test]
    fn closing_an_untouched_session_succeeds() {
        let g = G::generator();
        let mut params = GlobalParams::test_default(3, 2);
        params.auxsid = "clean-close".to_string();
        let session: MixSession<G> = MixSession::new(params, g, 2);
        assert!(session.close().is_ok());
    }

    #[test]
    fn shuffle_before_precompute_is_rejected() {
        let g = G::generator();
        let mut params = GlobalParams::test_default(3, 2);
        params.auxsid = "order".to_string();
        let mut session: MixSession<G> = MixSession::new(params, g, 2);
        session.public_key = Some(PublicKey { generator: g, y: g });
        let mut rng = ark_std::test_rng();
        let err = session.shuffle(vec![], None, 1, &mut rng).unwrap_err();
        assert!(matches!(err, ProtocolError::Invariant(_)));
    }
}
