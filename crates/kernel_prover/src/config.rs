//! Prover configuration, with environment overrides.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::BackendKind;
use crate::hash::HasherKind;

/// Per-call and per-transaction bounds enforced by the native simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelLimits {
    pub max_commitments_per_call: usize,
    pub max_nullifiers_per_call: usize,
    pub max_private_calls_per_call: usize,
    pub max_commitments_per_tx: usize,
    pub max_nullifiers_per_tx: usize,
}

impl Default for KernelLimits {
    fn default() -> Self {
        Self {
            max_commitments_per_call: 4,
            max_nullifiers_per_call: 4,
            max_private_calls_per_call: 4,
            max_commitments_per_tx: 64,
            max_nullifiers_per_tx: 64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelProverConfig {
    pub hasher: HasherKind,
    pub backend: BackendKind,
    pub limits: KernelLimits,
}

impl KernelProverConfig {
    /// Defaults overridden by `KERNEL_PROVER_*` / `KERNEL_MAX_*` variables.
    /// Unparseable values are logged and fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = KernelLimits::default();
        let num = |key: &str, default: usize| parsed(&get, key).unwrap_or(default);

        let hasher = parsed(&get, "KERNEL_PROVER_HASHER").unwrap_or_default();
        let backend = parsed(&get, "KERNEL_PROVER_BACKEND").unwrap_or_default();

        Self {
            hasher,
            backend,
            limits: KernelLimits {
                max_commitments_per_call: num("KERNEL_MAX_COMMITMENTS_PER_CALL", defaults.max_commitments_per_call),
                max_nullifiers_per_call: num("KERNEL_MAX_NULLIFIERS_PER_CALL", defaults.max_nullifiers_per_call),
                max_private_calls_per_call: num(
                    "KERNEL_MAX_PRIVATE_CALLS_PER_CALL",
                    defaults.max_private_calls_per_call,
                ),
                max_commitments_per_tx: num("KERNEL_MAX_COMMITMENTS_PER_TX", defaults.max_commitments_per_tx),
                max_nullifiers_per_tx: num("KERNEL_MAX_NULLIFIERS_PER_TX", defaults.max_nullifiers_per_tx),
            },
        }
    }
}

fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable config value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_env_gives_defaults() {
        assert_eq!(KernelProverConfig::from_lookup(|_| None), KernelProverConfig::default());
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("KERNEL_PROVER_HASHER", "blake3"),
            ("KERNEL_PROVER_BACKEND", "empty"),
            ("KERNEL_MAX_COMMITMENTS_PER_CALL", "8"),
            ("KERNEL_MAX_NULLIFIERS_PER_TX", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let cfg = KernelProverConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.hasher, HasherKind::Blake3);
        assert_eq!(cfg.backend, BackendKind::Empty);
        assert_eq!(cfg.limits.max_commitments_per_call, 8);
        assert_eq!(cfg.limits.max_nullifiers_per_tx, KernelLimits::default().max_nullifiers_per_tx);
    }
}
