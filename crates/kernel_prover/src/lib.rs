#![forbid(unsafe_code)]
//! # kernel_prover
//! Private kernel proof orchestration.
//!
//! Derives contract-siloed commitments for a call frame and drives the
//! recursive composition of private kernel proofs: an `init` step anchored
//! to a signed transaction request, then one `inner` step per remaining call
//! frame, each folding the previous step's public inputs and proof.
//!
//! The circuit simulation engine and the proving backend sit behind
//! [`simulator::KernelSimulator`] and [`backend::ProvingBackend`]; the shared
//! hashing engine is reached through an explicit [`engine::EngineHandle`].

pub mod backend;
pub mod chain;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod hash;
pub mod prover;
pub mod sample;
pub mod silo;
pub mod simulator;
pub mod types;

/// Native field of the proof system.
pub type Fr = pasta_curves::Fp;

pub use backend::{AnyBackend, BackendKind, BindingProofBackend, EmptyProofBackend, ProofVerifier, ProvingBackend};
pub use chain::ProofChain;
pub use config::{KernelLimits, KernelProverConfig};
pub use engine::EngineHandle;
pub use error::{EngineError, KernelProverError, ProvingFailure, Result, SimulationFailure, ValidationError};
pub use hash::{FieldHasher, GeneratorIndex, HasherKind, OUTER_COMMITMENT_DOMAIN};
pub use prover::{KernelProver, KernelStepInput, NativeKernelProver, ProofCreator, StepKind, StepRequest};
pub use simulator::{KernelSimulator, NativeKernelSimulator};
pub use types::*;
