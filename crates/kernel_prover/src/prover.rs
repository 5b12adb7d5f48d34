//! Kernel proof orchestrator.
//!
//! One step of the recursive kernel proof chain: simulate the transition,
//! prove the resulting public inputs, return both. `init` opens a chain from
//! a signed request; `inner` folds one more call frame on top of the
//! previous step's output. The prover is stateless and safe to share across
//! concurrent transactions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{AnyBackend, ProvingBackend};
use crate::config::KernelProverConfig;
use crate::engine::EngineHandle;
use crate::error::{Result, ValidationError};
use crate::simulator::{KernelSimulator, NativeKernelSimulator};
use crate::silo;
use crate::types::{
    KernelCircuitPublicInputs, PreviousKernelData, PrivateCallData, PrivateCircuitPublicInputs, ProofOutput,
    SignedTxRequest,
};
use crate::Fr;

#[async_trait]
pub trait ProofCreator: Send + Sync {
    /// Contract-bound commitments for a call frame, same length and order as its raw commitments.
    async fn silo_commitments(&self, public_inputs: &PrivateCircuitPublicInputs) -> Result<Vec<Fr>>;

    async fn create_proof_init(
        &self,
        signed_tx_request: &SignedTxRequest,
        private_call_data: &PrivateCallData,
    ) -> Result<ProofOutput>;

    async fn create_proof_inner(
        &self,
        previous_kernel_data: &PreviousKernelData,
        private_call_data: &PrivateCallData,
    ) -> Result<ProofOutput>;
}

/// Orchestrates one kernel step. Hashing goes through the simulator's engine.
pub struct KernelProver<S, P> {
    simulator: Arc<S>,
    backend: Arc<P>,
}

impl<S, P> Clone for KernelProver<S, P> {
    fn clone(&self) -> Self {
        Self {
            simulator: Arc::clone(&self.simulator),
            backend: Arc::clone(&self.backend),
        }
    }
}

/// Prover wired to the native simulator and a config-selected backend.
pub type NativeKernelProver = KernelProver<NativeKernelSimulator<AnyBackend>, AnyBackend>;

impl NativeKernelProver {
    pub fn from_config(engine: EngineHandle, config: &KernelProverConfig) -> Self {
        let backend = Arc::new(AnyBackend::from(config.backend));
        let simulator = Arc::new(NativeKernelSimulator::new(engine, Arc::clone(&backend), config.limits));
        KernelProver::new(simulator, backend)
    }
}

impl<S: KernelSimulator, P: ProvingBackend> KernelProver<S, P> {
    pub fn new(simulator: Arc<S>, backend: Arc<P>) -> Self {
        Self { simulator, backend }
    }

    pub fn engine(&self) -> &EngineHandle {
        self.simulator.engine()
    }

    pub fn backend(&self) -> &P {
        &self.backend
    }

    async fn prove(&self, public_inputs: KernelCircuitPublicInputs) -> Result<ProofOutput> {
        debug!(backend = self.backend.name(), "executing private kernel proving");
        let proof = self.backend.prove(&public_inputs).await?;
        info!(
            step = public_inputs.end.private_call_count,
            pending_calls = public_inputs.end.private_call_stack.len(),
            proof_bytes = proof.as_bytes().len(),
            "kernel prover completed"
        );
        Ok(ProofOutput { public_inputs, proof })
    }

    /// Dispatch on an explicit step kind.
    pub async fn create_proof(&self, step: &KernelStepInput) -> Result<ProofOutput> {
        match step {
            KernelStepInput::Init { signed_tx_request, private_call_data } => {
                self.create_proof_init(signed_tx_request, private_call_data).await
            }
            KernelStepInput::Inner { previous_kernel_data, private_call_data } => {
                self.create_proof_inner(previous_kernel_data, private_call_data).await
            }
        }
    }
}

#[async_trait]
impl<S: KernelSimulator, P: ProvingBackend> ProofCreator for KernelProver<S, P> {
    async fn silo_commitments(&self, public_inputs: &PrivateCircuitPublicInputs) -> Result<Vec<Fr>> {
        let hasher = self.engine().get().await?;
        Ok(silo::silo_commitments(hasher.as_ref(), public_inputs)?)
    }

    async fn create_proof_init(
        &self,
        signed_tx_request: &SignedTxRequest,
        private_call_data: &PrivateCallData,
    ) -> Result<ProofOutput> {
        debug!("executing private kernel simulation init");
        let public_inputs = self.simulator.simulate_init(signed_tx_request, private_call_data).await?;
        self.prove(public_inputs).await
    }

    async fn create_proof_inner(
        &self,
        previous_kernel_data: &PreviousKernelData,
        private_call_data: &PrivateCallData,
    ) -> Result<ProofOutput> {
        debug!(
            previous_step = previous_kernel_data.public_inputs.end.private_call_count,
            "executing private kernel simulation inner"
        );
        let public_inputs = self.simulator.simulate_inner(previous_kernel_data, private_call_data).await?;
        self.prove(public_inputs).await
    }
}

/// A single kernel step with its anchor made explicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelStepInput {
    Init {
        signed_tx_request: SignedTxRequest,
        private_call_data: PrivateCallData,
    },
    Inner {
        previous_kernel_data: PreviousKernelData,
        private_call_data: PrivateCallData,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Init,
    Inner,
}

/// Wire form of a kernel step, as read from a request file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRequest {
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_tx_request: Option<SignedTxRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_kernel_data: Option<PreviousKernelData>,
    pub private_call_data: PrivateCallData,
}

impl TryFrom<StepRequest> for KernelStepInput {
    type Error = ValidationError;

    fn try_from(req: StepRequest) -> core::result::Result<Self, Self::Error> {
        match req.kind {
            StepKind::Init => {
                if req.previous_kernel_data.is_some() {
                    return Err(ValidationError::Unexpected("previous kernel data for init step"));
                }
                let signed_tx_request = req.signed_tx_request.ok_or(ValidationError::Missing("signed tx request"))?;
                Ok(KernelStepInput::Init { signed_tx_request, private_call_data: req.private_call_data })
            }
            StepKind::Inner => {
                if req.signed_tx_request.is_some() {
                    return Err(ValidationError::Unexpected("signed tx request for inner step"));
                }
                let previous_kernel_data =
                    req.previous_kernel_data.ok_or(ValidationError::Missing("previous kernel data"))?;
                Ok(KernelStepInput::Inner { previous_kernel_data, private_call_data: req.private_call_data })
            }
        }
    }
}
