//! Per-transaction driver over a [`ProofCreator`].
//!
//! `start` opens the chain with the root frame; each `extend` folds the
//! next frame on top of the previous output. A failed step consumes the
//! chain: the transaction must be restarted, never resumed.

use tracing::debug;

use crate::error::Result;
use crate::prover::ProofCreator;
use crate::types::{PreviousKernelData, PrivateCallData, ProofOutput, SignedTxRequest};

pub struct ProofChain<'p, C: ?Sized> {
    prover: &'p C,
    output: ProofOutput,
    steps: usize,
}

impl<'p, C: ProofCreator + ?Sized> ProofChain<'p, C> {
    pub async fn start(
        prover: &'p C,
        signed_tx_request: &SignedTxRequest,
        root: &PrivateCallData,
    ) -> Result<ProofChain<'p, C>> {
        let output = prover.create_proof_init(signed_tx_request, root).await?;
        Ok(Self { prover, output, steps: 1 })
    }

    pub async fn extend(self, frame: &PrivateCallData) -> Result<ProofChain<'p, C>> {
        let previous = PreviousKernelData::from(self.output);
        let output = self.prover.create_proof_inner(&previous, frame).await?;
        let steps = self.steps + 1;
        debug!(steps, "proof chain extended");
        Ok(Self { prover: self.prover, output, steps })
    }

    /// Folds every frame in order; `frames[0]` is the root.
    pub async fn run(
        prover: &'p C,
        signed_tx_request: &SignedTxRequest,
        frames: &[PrivateCallData],
    ) -> Result<ProofChain<'p, C>> {
        let (root, rest) = frames
            .split_first()
            .ok_or(crate::error::ValidationError::Missing("root call frame"))?;
        let mut chain = Self::start(prover, signed_tx_request, root).await?;
        for frame in rest {
            chain = chain.extend(frame).await?;
        }
        Ok(chain)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn output(&self) -> &ProofOutput {
        &self.output
    }

    /// Whether every declared private call has been folded.
    pub fn is_complete(&self) -> bool {
        self.output.public_inputs.is_call_stack_empty()
    }

    pub fn finish(self) -> ProofOutput {
        self.output
    }
}
