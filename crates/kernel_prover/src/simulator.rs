//! Kernel circuit simulation.
//!
//! [`KernelSimulator`] is the seam to the circuit simulation engine.
//! [`NativeKernelSimulator`] computes the same transitions natively: it
//! checks the frame against the request (init) or the pending call stack
//! (inner), verifies the previous kernel proof, silos the frame's effects and
//! appends them to the accumulated state.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::backend::ProofVerifier;
use crate::config::KernelLimits;
use crate::encoding::short_hex;
use crate::engine::EngineHandle;
use crate::error::SimulationFailure;
use crate::hash::FieldHasher;
use crate::silo::{silo_commitments, silo_nullifiers};
use crate::types::{
    decode_all, CombinedAccumulatedData, CombinedConstantData, KernelCircuitPublicInputs, PreviousKernelData,
    PrivateCallData, SignedTxRequest,
};
use crate::Fr;

#[async_trait]
pub trait KernelSimulator: Send + Sync {
    /// Hashing engine every transition silos and hashes with.
    fn engine(&self) -> &EngineHandle;

    /// State after exactly one call frame, anchored to the signed request.
    async fn simulate_init(
        &self,
        signed_tx_request: &SignedTxRequest,
        private_call_data: &PrivateCallData,
    ) -> Result<KernelCircuitPublicInputs, SimulationFailure>;

    /// `previous_kernel_data` extended with one more call frame.
    async fn simulate_inner(
        &self,
        previous_kernel_data: &PreviousKernelData,
        private_call_data: &PrivateCallData,
    ) -> Result<KernelCircuitPublicInputs, SimulationFailure>;
}

pub struct NativeKernelSimulator<V> {
    engine: EngineHandle,
    verifier: Arc<V>,
    limits: KernelLimits,
}

impl<V: ProofVerifier> NativeKernelSimulator<V> {
    pub fn new(engine: EngineHandle, verifier: Arc<V>, limits: KernelLimits) -> Self {
        Self { engine, verifier, limits }
    }

    fn check_call_limits(&self, data: &PrivateCallData) -> Result<(), SimulationFailure> {
        let pi = data.public_inputs();
        check_limit("commitments per call", self.limits.max_commitments_per_call, pi.new_commitments.len())?;
        check_limit("nullifiers per call", self.limits.max_nullifiers_per_call, pi.new_nullifiers.len())?;
        check_limit("private calls per call", self.limits.max_private_calls_per_call, pi.private_call_stack.len())?;
        Ok(())
    }

    /// Children declared by the frame, checked against their preimages.
    fn child_calls(hasher: &dyn FieldHasher, data: &PrivateCallData) -> Result<Vec<Fr>, SimulationFailure> {
        let declared = decode_all(&data.public_inputs().private_call_stack, "private call stack item")?;
        if declared.len() != data.private_call_stack_preimages.len() {
            return Err(SimulationFailure::CallStackPreimageMismatch {
                index: declared.len().min(data.private_call_stack_preimages.len()),
            });
        }
        for (index, (hash, preimage)) in declared.iter().zip(&data.private_call_stack_preimages).enumerate() {
            if preimage.hash(hasher)? != *hash {
                return Err(SimulationFailure::CallStackPreimageMismatch { index });
            }
        }
        Ok(declared)
    }

    /// Appends the frame's siloed effects and pending children to `end`.
    fn accumulate(
        &self,
        hasher: &dyn FieldHasher,
        mut end: CombinedAccumulatedData,
        data: &PrivateCallData,
    ) -> Result<CombinedAccumulatedData, SimulationFailure> {
        let pi = data.public_inputs();
        if pi.call_context.storage_contract_address != data.call_stack_item.contract_address
            && !pi.call_context.is_delegate_call
        {
            return Err(SimulationFailure::Malformed(crate::error::ValidationError::Unexpected(
                "storage contract address differs from called contract",
            )));
        }
        let children = Self::child_calls(hasher, data)?;
        let commitments = silo_commitments(hasher, pi)?;
        let nullifiers = silo_nullifiers(hasher, pi)?;

        let mut seen: HashSet<[u8; 32]> = end.new_nullifiers.iter().map(repr).collect();
        for n in &nullifiers {
            if !seen.insert(repr(n)) {
                return Err(SimulationFailure::DuplicateNullifier(short_hex(n)));
            }
        }

        end.new_commitments.extend(commitments);
        end.new_nullifiers.extend(nullifiers);
        check_limit("commitments per tx", self.limits.max_commitments_per_tx, end.new_commitments.len())?;
        check_limit("nullifiers per tx", self.limits.max_nullifiers_per_tx, end.new_nullifiers.len())?;

        // Last pushed is processed first: push in reverse so the first declared child runs next.
        end.private_call_stack.extend(children.into_iter().rev());
        end.private_call_count += 1;
        Ok(end)
    }
}

fn repr(f: &Fr) -> [u8; 32] {
    use ff::PrimeField;
    f.to_repr()
}

fn check_limit(what: &'static str, limit: usize, actual: usize) -> Result<(), SimulationFailure> {
    if actual > limit {
        return Err(SimulationFailure::LimitExceeded { what, limit, actual });
    }
    Ok(())
}

#[async_trait]
impl<V: ProofVerifier> KernelSimulator for NativeKernelSimulator<V> {
    fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    async fn simulate_init(
        &self,
        signed_tx_request: &SignedTxRequest,
        private_call_data: &PrivateCallData,
    ) -> Result<KernelCircuitPublicInputs, SimulationFailure> {
        let hasher = self.engine.get().await?;
        self.check_call_limits(private_call_data)?;

        let req = &signed_tx_request.tx_request;
        let item = &private_call_data.call_stack_item;
        let ctx = &item.public_inputs.call_context;
        if !item.function_data.is_private {
            return Err(SimulationFailure::NotPrivateFunction);
        }
        if req.to != item.contract_address || req.to != ctx.storage_contract_address {
            return Err(SimulationFailure::TxRequestMismatch("target contract"));
        }
        if req.from != ctx.msg_sender {
            return Err(SimulationFailure::TxRequestMismatch("msg sender"));
        }
        if req.function_data != item.function_data || req.function_data.selector != ctx.function_selector {
            return Err(SimulationFailure::TxRequestMismatch("function data"));
        }
        if req.args_hash != item.public_inputs.args_hash {
            return Err(SimulationFailure::TxRequestMismatch("args hash"));
        }

        let constants = CombinedConstantData {
            tx_request_hash: req.hash(hasher.as_ref())?,
            tx_context: req.tx_context,
        };
        let end = self.accumulate(hasher.as_ref(), CombinedAccumulatedData::default(), private_call_data)?;
        debug!(
            commitments = end.new_commitments.len(),
            nullifiers = end.new_nullifiers.len(),
            pending_calls = end.private_call_stack.len(),
            "kernel init simulated"
        );
        Ok(KernelCircuitPublicInputs { end, constants, is_private: true })
    }

    async fn simulate_inner(
        &self,
        previous_kernel_data: &PreviousKernelData,
        private_call_data: &PrivateCallData,
    ) -> Result<KernelCircuitPublicInputs, SimulationFailure> {
        let hasher = self.engine.get().await?;
        self.check_call_limits(private_call_data)?;

        let prev = &previous_kernel_data.public_inputs;
        if !prev.is_private {
            return Err(SimulationFailure::NotPrivateKernel);
        }
        let verified = self
            .verifier
            .verify(prev, &previous_kernel_data.proof)
            .map_err(|e| SimulationFailure::Engine(e.to_string()))?;
        if !verified {
            return Err(SimulationFailure::InvalidPreviousProof);
        }
        if self.verifier.is_placeholder() {
            debug!("previous kernel proof accepted by a placeholder verifier");
        }
        if !private_call_data.call_stack_item.function_data.is_private {
            return Err(SimulationFailure::NotPrivateFunction);
        }

        let mut end = prev.end.clone();
        let expected = end.private_call_stack.pop().ok_or(SimulationFailure::EmptyCallStack)?;
        let actual = private_call_data.call_stack_item.hash(hasher.as_ref())?;
        if expected != actual {
            return Err(SimulationFailure::UnexpectedCall {
                expected: short_hex(&expected),
                actual: short_hex(&actual),
            });
        }

        let end = self.accumulate(hasher.as_ref(), end, private_call_data)?;
        debug!(
            step = end.private_call_count,
            commitments = end.new_commitments.len(),
            nullifiers = end.new_nullifiers.len(),
            pending_calls = end.private_call_stack.len(),
            "kernel inner simulated"
        );
        Ok(KernelCircuitPublicInputs {
            end,
            constants: prev.constants.clone(),
            is_private: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BindingProofBackend, EmptyProofBackend, ProvingBackend};
    use crate::hash::PoseidonHasher;
    use crate::sample::TxBuilder;
    use crate::types::{FieldBytes, Proof};

    fn simulator<V: ProofVerifier>(verifier: V) -> NativeKernelSimulator<V> {
        NativeKernelSimulator::new(
            EngineHandle::ready(Arc::new(PoseidonHasher)),
            Arc::new(verifier),
            KernelLimits::default(),
        )
    }

    #[tokio::test]
    async fn init_accounts_for_exactly_one_frame() {
        let tx = TxBuilder::new(&PoseidonHasher, 1).with_children(1).build().unwrap();
        let sim = simulator(EmptyProofBackend);
        let out = sim.simulate_init(&tx.signed_tx_request, &tx.frames[0]).await.unwrap();
        let root = tx.frames[0].public_inputs();
        assert_eq!(out.end.private_call_count, 1);
        assert_eq!(out.end.new_commitments, silo_commitments(&PoseidonHasher, root).unwrap());
        assert_eq!(out.end.new_nullifiers.len(), root.new_nullifiers.len());
        assert_eq!(out.end.private_call_stack.len(), 1);
        assert!(out.is_private);
    }

    #[tokio::test]
    async fn init_rejects_mismatched_request() {
        let mut tx = TxBuilder::new(&PoseidonHasher, 2).build().unwrap();
        tx.signed_tx_request.tx_request.function_data.selector ^= 1;
        let err = simulator(EmptyProofBackend)
            .simulate_init(&tx.signed_tx_request, &tx.frames[0])
            .await
            .unwrap_err();
        assert_eq!(err, SimulationFailure::TxRequestMismatch("function data"));
    }

    #[tokio::test]
    async fn inner_rejects_tampered_previous_proof() {
        let tx = TxBuilder::new(&PoseidonHasher, 3).with_children(1).build().unwrap();
        let backend = BindingProofBackend;
        let sim = simulator(backend);
        let kpi = sim.simulate_init(&tx.signed_tx_request, &tx.frames[0]).await.unwrap();
        let proof = backend.prove(&kpi).await.unwrap();

        let mut tampered = kpi.clone();
        tampered.end.new_commitments.clear();
        let prev = PreviousKernelData { public_inputs: tampered, proof };
        let err = sim.simulate_inner(&prev, &tx.frames[1]).await.unwrap_err();
        assert_eq!(err, SimulationFailure::InvalidPreviousProof);
    }

    #[tokio::test]
    async fn inner_rejects_frame_out_of_order() {
        let tx = TxBuilder::new(&PoseidonHasher, 4).with_children(2).build().unwrap();
        let sim = simulator(EmptyProofBackend);
        let kpi = sim.simulate_init(&tx.signed_tx_request, &tx.frames[0]).await.unwrap();
        let prev = PreviousKernelData { public_inputs: kpi, proof: Proof::empty() };
        // frames[2] is the second child; frames[1] must be folded first.
        let err = sim.simulate_inner(&prev, &tx.frames[2]).await.unwrap_err();
        assert!(matches!(err, SimulationFailure::UnexpectedCall { .. }));
    }

    #[tokio::test]
    async fn inner_on_exhausted_stack_fails() {
        let tx = TxBuilder::new(&PoseidonHasher, 5).build().unwrap();
        let sim = simulator(EmptyProofBackend);
        let kpi = sim.simulate_init(&tx.signed_tx_request, &tx.frames[0]).await.unwrap();
        let prev = PreviousKernelData { public_inputs: kpi, proof: Proof::empty() };
        let err = sim.simulate_inner(&prev, &tx.frames[0]).await.unwrap_err();
        assert_eq!(err, SimulationFailure::EmptyCallStack);
    }

    #[tokio::test]
    async fn duplicate_nullifier_in_frame_is_rejected() {
        let mut tx = TxBuilder::new(&PoseidonHasher, 6).build().unwrap();
        let n = FieldBytes::from(42u64);
        tx.frames[0].call_stack_item.public_inputs.new_nullifiers = vec![n.clone(), n];
        let err = simulator(EmptyProofBackend)
            .simulate_init(&tx.signed_tx_request, &tx.frames[0])
            .await
            .unwrap_err();
        assert!(matches!(err, SimulationFailure::DuplicateNullifier(_)));
    }

    #[tokio::test]
    async fn per_call_limit_is_enforced() {
        let mut tx = TxBuilder::new(&PoseidonHasher, 7).build().unwrap();
        tx.frames[0].call_stack_item.public_inputs.new_commitments = (0..5u64).map(FieldBytes::from).collect();
        let err = simulator(EmptyProofBackend)
            .simulate_init(&tx.signed_tx_request, &tx.frames[0])
            .await
            .unwrap_err();
        assert_eq!(err, SimulationFailure::LimitExceeded { what: "commitments per call", limit: 4, actual: 5 });
    }

    #[tokio::test]
    async fn bad_preimage_is_rejected() {
        let mut tx = TxBuilder::new(&PoseidonHasher, 8).with_children(1).build().unwrap();
        tx.frames[0].private_call_stack_preimages[0].function_data.selector ^= 1;
        let err = simulator(EmptyProofBackend)
            .simulate_init(&tx.signed_tx_request, &tx.frames[0])
            .await
            .unwrap_err();
        assert_eq!(err, SimulationFailure::CallStackPreimageMismatch { index: 0 });
    }
}
