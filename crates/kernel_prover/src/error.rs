use thiserror::Error as ThisError;

pub type Result<T> = core::result::Result<T, KernelProverError>;

/// Malformed input encoding, detected locally before anything is delegated.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ValidationError {
    #[error("invalid {what} encoding: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("non-canonical field element for {what}")]
    NonCanonical { what: &'static str },
    #[error("invalid hex for {what}: {reason}")]
    InvalidHex { what: &'static str, reason: String },
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("unexpected {0}")]
    Unexpected(&'static str),
}

/// The simulation engine rejected a kernel transition.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SimulationFailure {
    #[error("malformed call data: {0}")]
    Malformed(#[from] ValidationError),
    #[error("tx request does not match call frame: {0}")]
    TxRequestMismatch(&'static str),
    #[error("private call stack preimage {index} does not hash to the declared item")]
    CallStackPreimageMismatch { index: usize },
    #[error("call frame {actual} is not the next pending call {expected}")]
    UnexpectedCall { expected: String, actual: String },
    #[error("no pending private call left to process")]
    EmptyCallStack,
    #[error("previous kernel proof failed verification")]
    InvalidPreviousProof,
    #[error("previous kernel is not a private kernel")]
    NotPrivateKernel,
    #[error("call frame is not a private function")]
    NotPrivateFunction,
    #[error("{what} limit exceeded: {actual} > {limit}")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        actual: usize,
    },
    #[error("nullifier {0} emitted twice in one transaction")]
    DuplicateNullifier(String),
    #[error("engine: {0}")]
    Engine(String),
}

/// The proving backend could not produce or check a proof.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ProvingFailure {
    #[error("backend: {0}")]
    Backend(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("proving task aborted: {0}")]
    Aborted(String),
}

/// Shared crypto engine could not be brought up.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum EngineError {
    #[error("initialization task failed: {0}")]
    Init(String),
    #[error("self-test failed for {0} hasher")]
    SelfTest(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelProverError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("simulation failure: {0}")]
    Simulation(#[from] SimulationFailure),
    #[error("proving failure: {0}")]
    Proving(#[from] ProvingFailure),
    #[error("crypto engine unavailable: {0}")]
    Engine(#[from] EngineError),
}

impl KernelProverError {
    /// Proving failures may be retried by the caller; everything else reproduces deterministically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KernelProverError::Proving(_))
    }
}

impl From<EngineError> for SimulationFailure {
    fn from(e: EngineError) -> Self {
        SimulationFailure::Engine(e.to_string())
    }
}

impl From<bincode::Error> for ProvingFailure {
    fn from(e: bincode::Error) -> Self {
        ProvingFailure::Serialize(e.to_string())
    }
}
