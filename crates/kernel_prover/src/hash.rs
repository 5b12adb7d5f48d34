//! Domain-separated hashing over the native field.
//!
//! Every hash usage in the kernel carries its own [`GeneratorIndex`]. The
//! domain tag is mixed into every compression so two uses that happen to
//! share inputs never produce related outputs.

use ff::{Field, FromUniformBytes, PrimeField};
use halo2_gadgets::poseidon::primitives::{self as poseidon_primitives, ConstantLength, P128Pow5T3};
use serde::{Deserialize, Serialize};

use crate::Fr;

/// Domain separators for every hash usage in the kernel.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorIndex {
    OuterCommitment = 3,
    OuterNullifier = 7,
    CallContext = 17,
    CallStackItem = 18,
    TxContext = 22,
    TxRequest = 33,
    PrivateCircuitPublicInputs = 42,
    FunctionArgs = 44,
    /// Length-bound hash of a sub-sequence inside a larger preimage.
    List = 50,
}

impl GeneratorIndex {
    pub const fn index(self) -> u32 {
        self as u32
    }
}

/// Domain index used to bind a commitment to the contract that created it.
pub const OUTER_COMMITMENT_DOMAIN: u32 = GeneratorIndex::OuterCommitment.index();

/// Black-box `hash(domainIndex, inputs[]) -> Fr`.
pub trait FieldHasher: Send + Sync {
    fn name(&self) -> &'static str;

    fn hash(&self, domain: u32, inputs: &[Fr]) -> Fr;

    fn hash_with(&self, domain: GeneratorIndex, inputs: &[Fr]) -> Fr {
        self.hash(domain.index(), inputs)
    }
}

/// Selects a [`FieldHasher`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HasherKind {
    #[default]
    Poseidon,
    Blake3,
}

impl HasherKind {
    pub fn name(self) -> &'static str {
        match self {
            HasherKind::Poseidon => "poseidon",
            HasherKind::Blake3 => "blake3",
        }
    }

    pub fn build(self) -> Box<dyn FieldHasher> {
        match self {
            HasherKind::Poseidon => Box::new(PoseidonHasher),
            HasherKind::Blake3 => Box::new(Blake3Hasher),
        }
    }
}

impl core::str::FromStr for HasherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poseidon" => Ok(HasherKind::Poseidon),
            "blake3" => Ok(HasherKind::Blake3),
            other => Err(format!("unknown hasher '{other}'")),
        }
    }
}

#[inline]
fn poseidon3(inputs: [Fr; 3]) -> Fr {
    poseidon_primitives::Hash::<Fr, P128Pow5T3, ConstantLength<3>, 3, 2>::init().hash(inputs)
}

/// Poseidon (P128Pow5T3, width 3, rate 2) chained over the inputs:
///
///   acc0 = H(tag, len, 0)
///   acc_{i+1} = H(tag, acc_i, x_i)
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseidonHasher;

impl FieldHasher for PoseidonHasher {
    fn name(&self) -> &'static str {
        "poseidon"
    }

    fn hash(&self, domain: u32, inputs: &[Fr]) -> Fr {
        let tag = Fr::from(u64::from(domain));
        let mut acc = poseidon3([tag, Fr::from(inputs.len() as u64), Fr::ZERO]);
        for x in inputs {
            acc = poseidon3([tag, acc, *x]);
        }
        acc
    }
}

/// Domain-keyed BLAKE3 XOF, wide-reduced into the field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl FieldHasher for Blake3Hasher {
    fn name(&self) -> &'static str {
        "blake3"
    }

    fn hash(&self, domain: u32, inputs: &[Fr]) -> Fr {
        let mut hasher = blake3::Hasher::new_derive_key("kernel_prover field hash v1");
        hasher.update(&domain.to_le_bytes());
        hasher.update(&(inputs.len() as u64).to_le_bytes());
        for x in inputs {
            hasher.update(x.to_repr().as_ref());
        }
        let mut wide = [0u8; 64];
        hasher.finalize_xof().fill(&mut wide);
        Fr::from_uniform_bytes(&wide)
    }
}

/// Hash a variable-length list into a single element, binding its length.
pub fn hash_list(hasher: &dyn FieldHasher, items: &[Fr]) -> Fr {
    hasher.hash_with(GeneratorIndex::List, items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashers() -> Vec<Box<dyn FieldHasher>> {
        vec![HasherKind::Poseidon.build(), HasherKind::Blake3.build()]
    }

    #[test]
    fn deterministic() {
        for h in hashers() {
            let a = h.hash(3, &[Fr::from(11u64), Fr::from(22u64)]);
            let b = h.hash(3, &[Fr::from(11u64), Fr::from(22u64)]);
            assert_eq!(a, b, "{}", h.name());
        }
    }

    #[test]
    fn domain_changes_output() {
        let inputs = [Fr::from(0xabcdu64), Fr::from(42u64)];
        for h in hashers() {
            let outer = h.hash(OUTER_COMMITMENT_DOMAIN, &inputs);
            for other in [0u32, 1, 2, 4, 7, 1000] {
                assert_ne!(outer, h.hash(other, &inputs), "{} domain {other}", h.name());
            }
        }
    }

    #[test]
    fn length_is_bound() {
        for h in hashers() {
            let one = h.hash(50, &[Fr::ZERO]);
            let two = h.hash(50, &[Fr::ZERO, Fr::ZERO]);
            let none = h.hash(50, &[]);
            assert_ne!(one, two);
            assert_ne!(one, none);
        }
    }

    #[test]
    fn order_matters() {
        for h in hashers() {
            let ab = h.hash(3, &[Fr::from(1u64), Fr::from(2u64)]);
            let ba = h.hash(3, &[Fr::from(2u64), Fr::from(1u64)]);
            assert_ne!(ab, ba);
        }
    }

    #[test]
    fn parse_kind() {
        assert_eq!("Poseidon".parse::<HasherKind>().unwrap(), HasherKind::Poseidon);
        assert_eq!("blake3".parse::<HasherKind>().unwrap(), HasherKind::Blake3);
        assert!("sha256".parse::<HasherKind>().is_err());
        for kind in [HasherKind::Poseidon, HasherKind::Blake3] {
            assert_eq!(kind.build().name(), kind.name());
            assert_eq!(kind.name().parse::<HasherKind>().unwrap(), kind);
        }
    }
}
