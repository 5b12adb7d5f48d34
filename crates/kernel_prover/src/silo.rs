//! Commitment and nullifier siloing.
//!
//! A raw commitment is only unique inside the contract that emitted it. The
//! siloed form `H(OUTER_COMMITMENT, [contract_address, commitment])` is unique
//! across the global commitment set.

use crate::error::ValidationError;
use crate::hash::{FieldHasher, GeneratorIndex, OUTER_COMMITMENT_DOMAIN};
use crate::types::{decode_all, PrivateCircuitPublicInputs};
use crate::Fr;

/// Bind one raw commitment to `contract_address`.
pub fn silo_commitment(hasher: &dyn FieldHasher, contract_address: Fr, commitment: Fr) -> Fr {
    hasher.hash(OUTER_COMMITMENT_DOMAIN, &[contract_address, commitment])
}

/// Bind one raw nullifier to `contract_address`.
pub fn silo_nullifier(hasher: &dyn FieldHasher, contract_address: Fr, nullifier: Fr) -> Fr {
    hasher.hash_with(GeneratorIndex::OuterNullifier, &[contract_address, nullifier])
}

/// Siloed commitments for a call frame, same length and order as
/// `public_inputs.new_commitments`.
///
/// Everything is decoded before any hashing, so a malformed address or
/// commitment yields a [`ValidationError`] and never a partial result.
pub fn silo_commitments(
    hasher: &dyn FieldHasher,
    public_inputs: &PrivateCircuitPublicInputs,
) -> Result<Vec<Fr>, ValidationError> {
    let contract_address = public_inputs
        .call_context
        .storage_contract_address
        .0
        .to_field("storage contract address")?;
    let commitments = decode_all(&public_inputs.new_commitments, "commitment")?;
    Ok(commitments
        .into_iter()
        .map(|c| silo_commitment(hasher, contract_address, c))
        .collect())
}

/// Siloed nullifiers for a call frame, same length and order as
/// `public_inputs.new_nullifiers`.
pub fn silo_nullifiers(
    hasher: &dyn FieldHasher,
    public_inputs: &PrivateCircuitPublicInputs,
) -> Result<Vec<Fr>, ValidationError> {
    let contract_address = public_inputs
        .call_context
        .storage_contract_address
        .0
        .to_field("storage contract address")?;
    let nullifiers = decode_all(&public_inputs.new_nullifiers, "nullifier")?;
    Ok(nullifiers
        .into_iter()
        .map(|n| silo_nullifier(hasher, contract_address, n))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{Blake3Hasher, PoseidonHasher};
    use crate::types::{Address, CallContext, FieldBytes};

    fn inputs(contract: Address, commitments: Vec<FieldBytes>) -> PrivateCircuitPublicInputs {
        PrivateCircuitPublicInputs {
            call_context: CallContext {
                msg_sender: Address::zero(),
                storage_contract_address: contract,
                function_selector: 0,
                is_delegate_call: false,
                is_static_call: false,
            },
            args_hash: FieldBytes::zero(),
            new_commitments: commitments,
            new_nullifiers: vec![],
            private_call_stack: vec![],
            read_requests: vec![],
        }
    }

    #[test]
    fn single_commitment_uses_outer_commitment_domain() {
        let h = PoseidonHasher;
        let a = Fr::from(0x1234u64);
        let c1 = Fr::from(0x9999u64);
        let out = silo_commitments(&h, &inputs(Address::from(a), vec![FieldBytes::from(c1)])).unwrap();
        assert_eq!(out, vec![h.hash(3, &[a, c1])]);
    }

    #[test]
    fn same_commitment_different_contracts_do_not_collide() {
        let h = Blake3Hasher;
        let c = FieldBytes::from(77u64);
        let x = silo_commitments(&h, &inputs(Address::from(Fr::from(1u64)), vec![c.clone()])).unwrap();
        let y = silo_commitments(&h, &inputs(Address::from(Fr::from(2u64)), vec![c])).unwrap();
        assert_ne!(x, y);
    }

    #[test]
    fn commitment_and_nullifier_silos_differ() {
        let h = PoseidonHasher;
        let a = Fr::from(5u64);
        let v = Fr::from(6u64);
        assert_ne!(silo_commitment(&h, a, v), silo_nullifier(&h, a, v));
    }

    #[test]
    fn empty_commitments_give_empty_output() {
        let h = PoseidonHasher;
        assert!(silo_commitments(&h, &inputs(Address::from(Fr::from(1u64)), vec![])).unwrap().is_empty());
    }

    #[test]
    fn truncated_address_is_rejected() {
        let h = PoseidonHasher;
        let bad = Address(FieldBytes::from_raw(vec![0u8; 20]));
        let err = silo_commitments(&h, &inputs(bad, vec![FieldBytes::from(1u64)])).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidLength { expected: 32, actual: 20, .. }));
    }

    #[test]
    fn invalid_commitment_is_rejected() {
        let h = PoseidonHasher;
        let commitments = vec![FieldBytes::from(1u64), FieldBytes::from_raw(vec![0xff; 32])];
        let err = silo_commitments(&h, &inputs(Address::from(Fr::from(1u64)), commitments)).unwrap_err();
        assert_eq!(err, ValidationError::NonCanonical { what: "commitment" });
    }
}
