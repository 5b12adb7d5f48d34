//! Serde helpers for field elements and opaque byte blobs.
//!
//! Human-readable formats (JSON) carry hex strings; binary formats (bincode)
//! carry raw bytes. Field elements are always their 32-byte little-endian repr.

use core::marker::PhantomData;
use ff::PrimeField;
use serde::de::{Error as DeError, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serializer};

use crate::Fr;

fn encode_bytes<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    if s.is_human_readable() {
        s.serialize_str(&hex::encode(bytes))
    } else {
        s.serialize_bytes(bytes)
    }
}

fn decode_bytes<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    if d.is_human_readable() {
        let s = String::deserialize(d)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(DeError::custom)
    } else {
        serde_bytes_compat::deserialize(d)
    }
}

mod serde_bytes_compat {
    use super::*;

    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;
        fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
            write!(f, "byte buffer")
        }
        fn visit_bytes<E: DeError>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }
        fn visit_byte_buf<E: DeError>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_seq<A: SeqAccess<'de>>(self, mut a: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::new();
            while let Some(b) = a.next_element::<u8>()? {
                out.push(b);
            }
            Ok(out)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        d.deserialize_byte_buf(BytesVisitor)
    }
}

pub(crate) fn fr_from_slice(bytes: &[u8]) -> Option<Fr> {
    let mut repr = <Fr as PrimeField>::Repr::default();
    if bytes.len() != repr.as_ref().len() {
        return None;
    }
    repr.as_mut().copy_from_slice(bytes);
    Option::<Fr>::from(Fr::from_repr(repr))
}

/// Opaque byte blobs (proofs, signatures, raw field encodings).
pub(crate) mod hex_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        encode_bytes(v, s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        decode_bytes(d)
    }
}

pub(crate) mod serde_fr {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Fr, s: S) -> Result<S::Ok, S::Error> {
        encode_bytes(v.to_repr().as_ref(), s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Fr, D::Error> {
        let bytes = decode_bytes(d)?;
        fr_from_slice(&bytes).ok_or_else(|| DeError::custom("invalid field repr"))
    }
}

pub(crate) mod serde_vec_fr {
    use super::*;

    struct Elem(Fr);

    impl<'de> Deserialize<'de> for Elem {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            serde_fr::deserialize(d).map(Elem)
        }
    }

    struct Wrap<'a>(&'a Fr);

    impl serde::Serialize for Wrap<'_> {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            serde_fr::serialize(self.0, s)
        }
    }

    pub fn serialize<S: Serializer>(v: &[Fr], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(v.len()))?;
        for f in v {
            seq.serialize_element(&Wrap(f))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Fr>, D::Error> {
        struct VecVisitor(PhantomData<Fr>);
        impl<'de> Visitor<'de> for VecVisitor {
            type Value = Vec<Fr>;
            fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "sequence of field bytes")
            }
            fn visit_seq<A: SeqAccess<'de>>(self, mut a: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some(Elem(f)) = a.next_element::<Elem>()? {
                    out.push(f);
                }
                Ok(out)
            }
        }
        d.deserialize_seq(VecVisitor(PhantomData))
    }
}

/// Short hex rendering used in log fields and error messages.
pub fn short_hex(f: &Fr) -> String {
    let repr = f.to_repr();
    let bytes = repr.as_ref();
    // Little-endian repr: print the most significant bytes first.
    let mut be: Vec<u8> = bytes.to_vec();
    be.reverse();
    format!("0x{}..", hex::encode(&be[..4]))
}
