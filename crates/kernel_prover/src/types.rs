//! Kernel data model: call frames, transaction requests, accumulated kernel
//! state and the per-step proof output.

use ff::{Field, PrimeField};
use serde::{Deserialize, Serialize};

use crate::encoding::{fr_from_slice, hex_bytes, serde_fr, serde_vec_fr};
use crate::error::ValidationError;
use crate::hash::{hash_list, FieldHasher, GeneratorIndex};
use crate::Fr;

/// Width of every field element encoding.
pub const FIELD_BYTES: usize = 32;

/// Width of a transaction signature.
pub const SIGNATURE_BYTES: usize = 64;

/// Fixed-width wire encoding of a field element, as produced by the execution
/// trace. Not validated on construction; decode with [`FieldBytes::to_field`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldBytes(#[serde(with = "hex_bytes")] Vec<u8>);

impl FieldBytes {
    pub fn from_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn zero() -> Self {
        Self::from(Fr::ZERO)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_field(&self, what: &'static str) -> Result<Fr, ValidationError> {
        if self.0.len() != FIELD_BYTES {
            return Err(ValidationError::InvalidLength {
                what,
                expected: FIELD_BYTES,
                actual: self.0.len(),
            });
        }
        fr_from_slice(&self.0).ok_or(ValidationError::NonCanonical { what })
    }
}

impl From<Fr> for FieldBytes {
    fn from(f: Fr) -> Self {
        Self(f.to_repr().as_ref().to_vec())
    }
}

impl From<u64> for FieldBytes {
    fn from(v: u64) -> Self {
        Self::from(Fr::from(v))
    }
}

impl core::fmt::Debug for FieldBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FieldBytes({})", hex::encode(&self.0))
    }
}

pub(crate) fn decode_all(items: &[FieldBytes], what: &'static str) -> Result<Vec<Fr>, ValidationError> {
    items.iter().map(|b| b.to_field(what)).collect()
}

/// Contract or account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub FieldBytes);

impl Address {
    pub fn zero() -> Self {
        Self(FieldBytes::zero())
    }

    pub fn to_field(&self) -> Result<Fr, ValidationError> {
        self.0.to_field("address")
    }
}

impl From<Fr> for Address {
    fn from(f: Fr) -> Self {
        Self(FieldBytes::from(f))
    }
}

pub type FunctionSelector = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub msg_sender: Address,
    pub storage_contract_address: Address,
    pub function_selector: FunctionSelector,
    #[serde(default)]
    pub is_delegate_call: bool,
    #[serde(default)]
    pub is_static_call: bool,
}

impl CallContext {
    pub fn hash(&self, hasher: &dyn FieldHasher) -> Result<Fr, ValidationError> {
        Ok(hasher.hash_with(
            GeneratorIndex::CallContext,
            &[
                self.msg_sender.to_field()?,
                self.storage_contract_address.to_field()?,
                Fr::from(u64::from(self.function_selector)),
                Fr::from(self.is_delegate_call as u64),
                Fr::from(self.is_static_call as u64),
            ],
        ))
    }
}

/// Function-level public outputs of one call frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateCircuitPublicInputs {
    pub call_context: CallContext,
    pub args_hash: FieldBytes,
    #[serde(default)]
    pub new_commitments: Vec<FieldBytes>,
    #[serde(default)]
    pub new_nullifiers: Vec<FieldBytes>,
    /// Hashes of the private calls this frame makes.
    #[serde(default)]
    pub private_call_stack: Vec<FieldBytes>,
    #[serde(default)]
    pub read_requests: Vec<FieldBytes>,
}

impl PrivateCircuitPublicInputs {
    pub fn hash(&self, hasher: &dyn FieldHasher) -> Result<Fr, ValidationError> {
        let commitments = decode_all(&self.new_commitments, "commitment")?;
        let nullifiers = decode_all(&self.new_nullifiers, "nullifier")?;
        let calls = decode_all(&self.private_call_stack, "private call stack item")?;
        let reads = decode_all(&self.read_requests, "read request")?;
        Ok(hasher.hash_with(
            GeneratorIndex::PrivateCircuitPublicInputs,
            &[
                self.call_context.hash(hasher)?,
                self.args_hash.to_field("args hash")?,
                hash_list(hasher, &commitments),
                hash_list(hasher, &nullifiers),
                hash_list(hasher, &calls),
                hash_list(hasher, &reads),
            ],
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionData {
    pub selector: FunctionSelector,
    pub is_private: bool,
    #[serde(default)]
    pub is_constructor: bool,
}

impl FunctionData {
    fn to_fields(self) -> [Fr; 3] {
        [
            Fr::from(u64::from(self.selector)),
            Fr::from(self.is_private as u64),
            Fr::from(self.is_constructor as u64),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateCallStackItem {
    pub contract_address: Address,
    pub function_data: FunctionData,
    pub public_inputs: PrivateCircuitPublicInputs,
}

impl PrivateCallStackItem {
    /// Identity of this call as it appears in its parent's private call stack.
    pub fn hash(&self, hasher: &dyn FieldHasher) -> Result<Fr, ValidationError> {
        let [selector, is_private, is_constructor] = self.function_data.to_fields();
        Ok(hasher.hash_with(
            GeneratorIndex::CallStackItem,
            &[
                self.contract_address.to_field()?,
                selector,
                is_private,
                is_constructor,
                self.public_inputs.hash(hasher)?,
            ],
        ))
    }
}

/// Function membership proof in the contract's function tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MembershipWitness {
    pub leaf_index: u64,
    #[serde(default)]
    pub sibling_path: Vec<FieldBytes>,
}

/// Full witness data for one call frame's private execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateCallData {
    pub call_stack_item: PrivateCallStackItem,
    /// Preimages of `call_stack_item.public_inputs.private_call_stack`, same order.
    #[serde(default)]
    pub private_call_stack_preimages: Vec<PrivateCallStackItem>,
    #[serde(default)]
    pub function_leaf_membership_witness: MembershipWitness,
    pub portal_contract_address: Address,
    /// Proof of the function circuit itself.
    #[serde(default)]
    pub proof: Proof,
}

impl PrivateCallData {
    pub fn public_inputs(&self) -> &PrivateCircuitPublicInputs {
        &self.call_stack_item.public_inputs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxContext {
    pub chain_id: u64,
    pub version: u64,
    #[serde(default)]
    pub is_fee_payment_tx: bool,
    #[serde(default)]
    pub is_contract_deployment_tx: bool,
}

impl TxContext {
    pub fn hash(&self, hasher: &dyn FieldHasher) -> Fr {
        hasher.hash_with(
            GeneratorIndex::TxContext,
            &[
                Fr::from(self.chain_id),
                Fr::from(self.version),
                Fr::from(self.is_fee_payment_tx as u64),
                Fr::from(self.is_contract_deployment_tx as u64),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub function_data: FunctionData,
    pub args_hash: FieldBytes,
    pub nonce: FieldBytes,
    pub tx_context: TxContext,
}

impl TxRequest {
    pub fn hash(&self, hasher: &dyn FieldHasher) -> Result<Fr, ValidationError> {
        let [selector, is_private, is_constructor] = self.function_data.to_fields();
        Ok(hasher.hash_with(
            GeneratorIndex::TxRequest,
            &[
                self.from.to_field()?,
                self.to.to_field()?,
                selector,
                is_private,
                is_constructor,
                self.args_hash.to_field("args hash")?,
                self.nonce.to_field("nonce")?,
                self.tx_context.hash(hasher),
            ],
        ))
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(#[serde(with = "hex_bytes")] Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
}

impl core::fmt::Debug for Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/// The user's authenticated intent to execute the root call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTxRequest {
    pub tx_request: TxRequest,
    pub signature: Signature,
}

/// Opaque succinct attestation over kernel public inputs.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof(#[serde(with = "hex_bytes")] Vec<u8>);

impl Proof {
    /// Placeholder emitted while no proving backend is integrated.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for Proof {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.0.is_empty() {
            write!(f, "Proof(empty)")
        } else {
            write!(f, "Proof({} bytes)", self.0.len())
        }
    }
}

/// Effects accumulated across every call frame processed so far.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CombinedAccumulatedData {
    /// Siloed commitments, in processing order.
    #[serde(with = "serde_vec_fr")]
    pub new_commitments: Vec<Fr>,
    /// Siloed nullifiers, in processing order.
    #[serde(with = "serde_vec_fr")]
    pub new_nullifiers: Vec<Fr>,
    /// Pending private calls; the last entry is processed next.
    #[serde(with = "serde_vec_fr")]
    pub private_call_stack: Vec<Fr>,
    pub private_call_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedConstantData {
    #[serde(with = "serde_fr")]
    pub tx_request_hash: Fr,
    pub tx_context: TxContext,
}

/// Accumulated public state after a kernel step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelCircuitPublicInputs {
    pub end: CombinedAccumulatedData,
    pub constants: CombinedConstantData,
    pub is_private: bool,
}

impl KernelCircuitPublicInputs {
    /// Whether `self` keeps every effect of `prev` (same transaction, nothing
    /// dropped, strictly more call frames).
    pub fn extends(&self, prev: &KernelCircuitPublicInputs) -> bool {
        self.constants == prev.constants
            && self.end.private_call_count > prev.end.private_call_count
            && self.end.new_commitments.starts_with(&prev.end.new_commitments)
            && self.end.new_nullifiers.starts_with(&prev.end.new_nullifiers)
    }

    /// No private call left to fold.
    pub fn is_call_stack_empty(&self) -> bool {
        self.end.private_call_stack.is_empty()
    }
}

/// Result of one orchestrator step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOutput {
    pub public_inputs: KernelCircuitPublicInputs,
    pub proof: Proof,
}

/// Output of the immediately preceding kernel step, passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousKernelData {
    pub public_inputs: KernelCircuitPublicInputs,
    pub proof: Proof,
}

impl From<ProofOutput> for PreviousKernelData {
    fn from(out: ProofOutput) -> Self {
        Self {
            public_inputs: out.public_inputs,
            proof: out.proof,
        }
    }
}

/// A signed request and its call frames in kernel processing order
/// (`frames[0]` is the root call).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBundle {
    pub signed_tx_request: SignedTxRequest,
    pub frames: Vec<PrivateCallData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::PoseidonHasher;

    #[test]
    fn field_bytes_validation() {
        assert_eq!(FieldBytes::from(7u64).to_field("x").unwrap(), Fr::from(7u64));

        let short = FieldBytes::from_raw(vec![1u8; 31]);
        assert_eq!(
            short.to_field("address"),
            Err(ValidationError::InvalidLength { what: "address", expected: 32, actual: 31 })
        );

        // All-ones exceeds the Pallas base field modulus.
        let big = FieldBytes::from_raw(vec![0xffu8; 32]);
        assert_eq!(big.to_field("commitment"), Err(ValidationError::NonCanonical { what: "commitment" }));
    }

    #[test]
    fn json_uses_hex() {
        let fb = FieldBytes::from(1u64);
        let s = serde_json::to_string(&fb).unwrap();
        assert_eq!(s, format!("\"01{}\"", "00".repeat(31)));
        let back: FieldBytes = serde_json::from_str(&s).unwrap();
        assert_eq!(back, fb);
        let prefixed: FieldBytes = serde_json::from_str(&format!("\"0x01{}\"", "00".repeat(31))).unwrap();
        assert_eq!(prefixed, fb);
    }

    #[test]
    fn kernel_inputs_bincode_and_json() {
        let kpi = KernelCircuitPublicInputs {
            end: CombinedAccumulatedData {
                new_commitments: vec![Fr::from(1u64), Fr::from(2u64)],
                new_nullifiers: vec![Fr::from(3u64)],
                private_call_stack: vec![],
                private_call_count: 1,
            },
            constants: CombinedConstantData { tx_request_hash: Fr::from(9u64), tx_context: TxContext::default() },
            is_private: true,
        };
        let bin = bincode::serialize(&kpi).unwrap();
        assert_eq!(bincode::deserialize::<KernelCircuitPublicInputs>(&bin).unwrap(), kpi);
        let json = serde_json::to_string(&kpi).unwrap();
        assert_eq!(serde_json::from_str::<KernelCircuitPublicInputs>(&json).unwrap(), kpi);
    }

    #[test]
    fn call_item_hash_depends_on_contents() {
        let h = PoseidonHasher;
        let mut item = PrivateCallStackItem {
            contract_address: Address::from(Fr::from(10u64)),
            function_data: FunctionData { selector: 1, is_private: true, is_constructor: false },
            public_inputs: PrivateCircuitPublicInputs {
                call_context: CallContext {
                    msg_sender: Address::from(Fr::from(9u64)),
                    storage_contract_address: Address::from(Fr::from(10u64)),
                    function_selector: 1,
                    is_delegate_call: false,
                    is_static_call: false,
                },
                args_hash: FieldBytes::zero(),
                new_commitments: vec![FieldBytes::from(5u64)],
                new_nullifiers: vec![],
                private_call_stack: vec![],
                read_requests: vec![],
            },
        };
        let before = item.hash(&h).unwrap();
        item.public_inputs.new_commitments.push(FieldBytes::from(6u64));
        assert_ne!(before, item.hash(&h).unwrap());
    }

    #[test]
    fn extends_requires_prefix() {
        let base = KernelCircuitPublicInputs {
            end: CombinedAccumulatedData {
                new_commitments: vec![Fr::from(1u64)],
                new_nullifiers: vec![],
                private_call_stack: vec![],
                private_call_count: 1,
            },
            constants: CombinedConstantData { tx_request_hash: Fr::ONE, tx_context: TxContext::default() },
            is_private: true,
        };
        let mut next = base.clone();
        next.end.new_commitments.push(Fr::from(2u64));
        next.end.private_call_count = 2;
        assert!(next.extends(&base));

        let mut dropped = next.clone();
        dropped.end.new_commitments.remove(0);
        assert!(!dropped.extends(&base));
        assert!(!base.extends(&base));
    }
}
