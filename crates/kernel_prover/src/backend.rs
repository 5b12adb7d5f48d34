//! Proving backends.
//!
//! Both backends here are placeholders until a succinct backend implements
//! the same traits, and both report [`ProofVerifier::is_placeholder`].
//! [`EmptyProofBackend`] emits no proof at all. [`BindingProofBackend`] emits
//! an unkeyed digest of the public inputs: it catches accidental corruption
//! but anyone holding the inputs can recompute it, so it is not a soundness
//! check.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProvingFailure;
use crate::types::{KernelCircuitPublicInputs, Proof};

/// Checks a proof against the public inputs it claims to attest.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, public_inputs: &KernelCircuitPublicInputs, proof: &Proof) -> Result<bool, ProvingFailure>;

    /// True when an accepted proof says nothing about how the inputs were derived.
    fn is_placeholder(&self) -> bool;
}

#[async_trait]
pub trait ProvingBackend: ProofVerifier {
    fn name(&self) -> &'static str;

    async fn prove(&self, public_inputs: &KernelCircuitPublicInputs) -> Result<Proof, ProvingFailure>;
}

/// Selects a [`ProvingBackend`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Empty,
    #[default]
    Binding,
}

impl core::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "empty" => Ok(BackendKind::Empty),
            "binding" => Ok(BackendKind::Binding),
            other => Err(format!("unknown proving backend '{other}'")),
        }
    }
}

/// Either backend, chosen at runtime from config.
#[derive(Debug, Clone, Copy)]
pub enum AnyBackend {
    Empty(EmptyProofBackend),
    Binding(BindingProofBackend),
}

impl From<BackendKind> for AnyBackend {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Empty => AnyBackend::Empty(EmptyProofBackend),
            BackendKind::Binding => AnyBackend::Binding(BindingProofBackend),
        }
    }
}

impl ProofVerifier for AnyBackend {
    fn verify(&self, public_inputs: &KernelCircuitPublicInputs, proof: &Proof) -> Result<bool, ProvingFailure> {
        match self {
            AnyBackend::Empty(b) => b.verify(public_inputs, proof),
            AnyBackend::Binding(b) => b.verify(public_inputs, proof),
        }
    }

    fn is_placeholder(&self) -> bool {
        match self {
            AnyBackend::Empty(b) => b.is_placeholder(),
            AnyBackend::Binding(b) => b.is_placeholder(),
        }
    }
}

#[async_trait]
impl ProvingBackend for AnyBackend {
    fn name(&self) -> &'static str {
        match self {
            AnyBackend::Empty(b) => b.name(),
            AnyBackend::Binding(b) => b.name(),
        }
    }

    async fn prove(&self, public_inputs: &KernelCircuitPublicInputs) -> Result<Proof, ProvingFailure> {
        match self {
            AnyBackend::Empty(b) => b.prove(public_inputs).await,
            AnyBackend::Binding(b) => b.prove(public_inputs).await,
        }
    }
}

/// Returns [`Proof::empty`] for every input. Verifies only empty proofs.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyProofBackend;

impl ProofVerifier for EmptyProofBackend {
    fn verify(&self, _public_inputs: &KernelCircuitPublicInputs, proof: &Proof) -> Result<bool, ProvingFailure> {
        Ok(proof.is_empty())
    }

    fn is_placeholder(&self) -> bool {
        true
    }
}

#[async_trait]
impl ProvingBackend for EmptyProofBackend {
    fn name(&self) -> &'static str {
        "empty"
    }

    async fn prove(&self, _public_inputs: &KernelCircuitPublicInputs) -> Result<Proof, ProvingFailure> {
        warn!("skipping private kernel proving: empty proof backend");
        Ok(Proof::empty())
    }
}

/// Binding proof format version.
pub const BINDING_PROOF_VERSION: u8 = 1;

const BINDING_PROOF_LEN: usize = 33;

/// `version || blake3("kernel_binding_proof" || bincode(public_inputs))`.
///
/// Unkeyed and forgeable: verification only shows the proof was computed over
/// these exact inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindingProofBackend;

impl BindingProofBackend {
    fn digest(public_inputs: &KernelCircuitPublicInputs) -> Result<[u8; 32], ProvingFailure> {
        let encoded = bincode::serialize(public_inputs)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"kernel_binding_proof");
        hasher.update(&[BINDING_PROOF_VERSION]);
        hasher.update(&(encoded.len() as u64).to_le_bytes());
        hasher.update(&encoded);
        Ok(*hasher.finalize().as_bytes())
    }

    fn compute(public_inputs: &KernelCircuitPublicInputs) -> Result<Proof, ProvingFailure> {
        let digest = Self::digest(public_inputs)?;
        let mut bytes = Vec::with_capacity(BINDING_PROOF_LEN);
        bytes.push(BINDING_PROOF_VERSION);
        bytes.extend_from_slice(&digest);
        Ok(Proof::from_bytes(bytes))
    }
}

impl ProofVerifier for BindingProofBackend {
    fn verify(&self, public_inputs: &KernelCircuitPublicInputs, proof: &Proof) -> Result<bool, ProvingFailure> {
        let bytes = proof.as_bytes();
        if bytes.len() != BINDING_PROOF_LEN || bytes[0] != BINDING_PROOF_VERSION {
            return Ok(false);
        }
        Ok(bytes[1..] == Self::digest(public_inputs)?)
    }

    fn is_placeholder(&self) -> bool {
        true
    }
}

#[async_trait]
impl ProvingBackend for BindingProofBackend {
    fn name(&self) -> &'static str {
        "binding"
    }

    async fn prove(&self, public_inputs: &KernelCircuitPublicInputs) -> Result<Proof, ProvingFailure> {
        let inputs = public_inputs.clone();
        let proof = tokio::task::spawn_blocking(move || Self::compute(&inputs))
            .await
            .map_err(|e| ProvingFailure::Aborted(e.to_string()))??;
        warn!("binding proof is a forgeable placeholder, not a succinct kernel proof");
        debug!(bytes = proof.as_bytes().len(), "binding proof computed");
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CombinedAccumulatedData, CombinedConstantData, TxContext};
    use crate::Fr;

    fn kpi(n: u64) -> KernelCircuitPublicInputs {
        KernelCircuitPublicInputs {
            end: CombinedAccumulatedData {
                new_commitments: vec![Fr::from(n)],
                new_nullifiers: vec![],
                private_call_stack: vec![],
                private_call_count: 1,
            },
            constants: CombinedConstantData { tx_request_hash: Fr::from(1u64), tx_context: TxContext::default() },
            is_private: true,
        }
    }

    #[tokio::test]
    async fn empty_backend_returns_placeholder() {
        let b = EmptyProofBackend;
        let p = b.prove(&kpi(1)).await.unwrap();
        assert!(p.is_empty());
        assert!(b.verify(&kpi(1), &p).unwrap());
        assert!(!b.verify(&kpi(1), &Proof::from_bytes(vec![1])).unwrap());
    }

    #[tokio::test]
    async fn binding_proof_binds_inputs() {
        let b = BindingProofBackend;
        let p = b.prove(&kpi(1)).await.unwrap();
        assert_eq!(p.as_bytes().len(), BINDING_PROOF_LEN);
        assert_eq!(p.as_bytes()[0], BINDING_PROOF_VERSION);
        assert!(b.verify(&kpi(1), &p).unwrap());
        assert!(!b.verify(&kpi(2), &p).unwrap());
        assert!(!b.verify(&kpi(1), &Proof::empty()).unwrap());
    }

    #[test]
    fn binding_proof_is_recomputable_from_inputs() {
        let b = AnyBackend::from(BackendKind::default());
        assert!(b.is_placeholder());
        assert!(EmptyProofBackend.is_placeholder());

        let mut forged = kpi(5);
        forged.end.new_commitments.clear();
        let proof = BindingProofBackend::compute(&forged).unwrap();
        assert!(b.verify(&forged, &proof).unwrap());
    }

    #[tokio::test]
    async fn binding_proof_is_deterministic() {
        let b = BindingProofBackend;
        assert_eq!(b.prove(&kpi(4)).await.unwrap(), b.prove(&kpi(4)).await.unwrap());
    }

    #[test]
    fn parse_kind() {
        assert_eq!("EMPTY".parse::<BackendKind>().unwrap(), BackendKind::Empty);
        assert_eq!("binding".parse::<BackendKind>().unwrap(), BackendKind::Binding);
        assert!("groth16".parse::<BackendKind>().is_err());
    }
}
