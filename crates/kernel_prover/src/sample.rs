//! Well-formed sample transactions: a root private call plus its direct
//! private children, with random commitments and nullifiers.

use ff::Field;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::ValidationError;
use crate::hash::{FieldHasher, GeneratorIndex};
use crate::types::{
    Address, CallContext, FieldBytes, FunctionData, MembershipWitness, PrivateCallData, PrivateCallStackItem,
    PrivateCircuitPublicInputs, Proof, Signature, SignedTxRequest, TxBundle, TxContext, TxRequest, SIGNATURE_BYTES,
};
use crate::Fr;

pub struct TxBuilder<'a> {
    hasher: &'a dyn FieldHasher,
    rng: StdRng,
    children: usize,
    commitments_per_call: usize,
    nullifiers_per_call: usize,
    tx_context: TxContext,
}

impl<'a> TxBuilder<'a> {
    pub fn new(hasher: &'a dyn FieldHasher, seed: u64) -> Self {
        Self {
            hasher,
            rng: StdRng::seed_from_u64(seed),
            children: 0,
            commitments_per_call: 2,
            nullifiers_per_call: 1,
            tx_context: TxContext { chain_id: 1, version: 1, ..Default::default() },
        }
    }

    pub fn with_children(mut self, children: usize) -> Self {
        self.children = children;
        self
    }

    pub fn with_commitments_per_call(mut self, n: usize) -> Self {
        self.commitments_per_call = n;
        self
    }

    fn field(&mut self) -> FieldBytes {
        FieldBytes::from(Fr::random(&mut self.rng))
    }

    fn fields(&mut self, n: usize) -> Vec<FieldBytes> {
        (0..n).map(|_| self.field()).collect()
    }

    fn item(
        &mut self,
        msg_sender: Address,
        contract: Address,
        selector: u32,
        private_call_stack: Vec<FieldBytes>,
    ) -> Result<PrivateCallStackItem, ValidationError> {
        let args: Vec<Fr> = (0..3).map(|_| Fr::random(&mut self.rng)).collect();
        let function_data = FunctionData { selector, is_private: true, is_constructor: false };
        let public_inputs = PrivateCircuitPublicInputs {
            call_context: CallContext {
                msg_sender,
                storage_contract_address: contract.clone(),
                function_selector: selector,
                is_delegate_call: false,
                is_static_call: false,
            },
            args_hash: FieldBytes::from(self.hasher.hash_with(GeneratorIndex::FunctionArgs, &args)),
            new_commitments: self.fields(self.commitments_per_call),
            new_nullifiers: self.fields(self.nullifiers_per_call),
            private_call_stack,
            read_requests: Vec::new(),
        };
        Ok(PrivateCallStackItem { contract_address: contract, function_data, public_inputs })
    }

    fn call_data(&mut self, item: PrivateCallStackItem, preimages: Vec<PrivateCallStackItem>) -> PrivateCallData {
        let leaf_index = u64::from(item.function_data.selector % 8);
        let sibling_path = self.fields(3);
        PrivateCallData {
            call_stack_item: item,
            private_call_stack_preimages: preimages,
            function_leaf_membership_witness: MembershipWitness { leaf_index, sibling_path },
            portal_contract_address: Address::zero(),
            proof: Proof::empty(),
        }
    }

    pub fn build(mut self) -> Result<TxBundle, ValidationError> {
        let sender = Address(self.field());
        let root_contract = Address(self.field());
        let root_selector = self.rng.next_u32();

        let mut children = Vec::with_capacity(self.children);
        for _ in 0..self.children {
            let contract = Address(self.field());
            let selector = self.rng.next_u32();
            children.push(self.item(root_contract.clone(), contract, selector, Vec::new())?);
        }
        let child_hashes = children
            .iter()
            .map(|c| c.hash(self.hasher).map(FieldBytes::from))
            .collect::<Result<Vec<_>, _>>()?;

        let root = self.item(sender.clone(), root_contract.clone(), root_selector, child_hashes)?;
        let tx_request = TxRequest {
            from: sender,
            to: root_contract,
            function_data: root.function_data,
            args_hash: root.public_inputs.args_hash.clone(),
            nonce: self.field(),
            tx_context: self.tx_context,
        };
        let mut sig = vec![0u8; SIGNATURE_BYTES];
        self.rng.fill_bytes(&mut sig);

        let mut frames = Vec::with_capacity(1 + children.len());
        let root_frame = self.call_data(root, children.clone());
        frames.push(root_frame);
        for child in children {
            let frame = self.call_data(child, Vec::new());
            frames.push(frame);
        }

        Ok(TxBundle {
            signed_tx_request: SignedTxRequest { tx_request, signature: Signature::from_bytes(sig) },
            frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::PoseidonHasher;

    #[test]
    fn same_seed_same_tx() {
        let a = TxBuilder::new(&PoseidonHasher, 11).with_children(2).build().unwrap();
        let b = TxBuilder::new(&PoseidonHasher, 11).with_children(2).build().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.frames.len(), 3);
    }

    #[test]
    fn root_declares_children_in_order() {
        let h = PoseidonHasher;
        let tx = TxBuilder::new(&h, 12).with_children(3).build().unwrap();
        let declared = &tx.frames[0].public_inputs().private_call_stack;
        for (i, frame) in tx.frames[1..].iter().enumerate() {
            assert_eq!(declared[i], FieldBytes::from(frame.call_stack_item.hash(&h).unwrap()));
        }
    }
}
