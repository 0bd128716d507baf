//! Incremental digest computation over the verified byte stream.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ErrorCode, Result, VerifyError};

/// Supported digest algorithms, declared in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// Lowercase name used in log files.
    pub(crate) fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA1",
            DigestAlgorithm::Sha256 => "SHA256",
        }
    }

    /// Parse an additional digest token. MD5 is implicit and not a valid token.
    pub(crate) fn from_additional_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "sha1" => Some(DigestAlgorithm::Sha1),
            "sha256" => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered selection of algorithms; iteration follows declaration order.
pub(crate) type AlgorithmSet = BTreeSet<DigestAlgorithm>;

/// Parse a comma-separated list of additional digest types.
///
/// The returned set always contains MD5. Empty segments are skipped.
pub(crate) fn parse_digest_types(value: &str) -> Result<AlgorithmSet> {
    let mut algorithms = AlgorithmSet::from([DigestAlgorithm::Md5]);
    for token in value.split(',') {
        if token.trim().is_empty() {
            continue;
        }
        let algorithm = DigestAlgorithm::from_additional_token(token).ok_or_else(|| {
            VerifyError::unsupported(format!(
                "unsupported digest type: {} (expected sha1 or sha256)",
                token.trim()
            ))
        })?;
        algorithms.insert(algorithm);
    }
    Ok(algorithms)
}

/// Incremental state for one algorithm.
pub(crate) trait DigestContext {
    fn algorithm(&self) -> DigestAlgorithm;

    fn update(&mut self, data: &[u8]) -> Result<()>;

    /// Consume the context and return the raw digest bytes.
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

struct HashContext<D> {
    algorithm: DigestAlgorithm,
    inner: D,
}

impl<D: Digest> DigestContext for HashContext<D> {
    fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    fn update(&mut self, data: &[u8]) -> Result<()> {
        Digest::update(&mut self.inner, data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.inner.finalize().to_vec()
    }
}

fn new_context(algorithm: DigestAlgorithm) -> Result<Box<dyn DigestContext>> {
    let context: Box<dyn DigestContext> = match algorithm {
        DigestAlgorithm::Md5 => Box::new(HashContext {
            algorithm,
            inner: Md5::new(),
        }),
        DigestAlgorithm::Sha1 => Box::new(HashContext {
            algorithm,
            inner: Sha1::new(),
        }),
        DigestAlgorithm::Sha256 => Box::new(HashContext {
            algorithm,
            inner: Sha256::new(),
        }),
    };
    Ok(context)
}

/// Final digests in algorithm order, hex encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DigestSet {
    entries: Vec<(DigestAlgorithm, String)>,
}

impl DigestSet {
    #[cfg(test)]
    pub(crate) fn get(&self, algorithm: DigestAlgorithm) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == algorithm)
            .map(|(_, hex)| hex.as_str())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (DigestAlgorithm, &str)> {
        self.entries.iter().map(|(alg, hex)| (*alg, hex.as_str()))
    }
}

/// Feeds every slice to each enabled digest context.
pub(crate) struct DigestEngine {
    contexts: Vec<Box<dyn DigestContext>>,
    poisoned: bool,
}

impl DigestEngine {
    /// Create one context per algorithm. Any failure fails the whole engine.
    pub(crate) fn initialize(algorithms: &AlgorithmSet) -> Result<Self> {
        let mut contexts = Vec::with_capacity(algorithms.len());
        for algorithm in algorithms {
            let context = new_context(*algorithm).map_err(|err| {
                VerifyError::runtime(
                    ErrorCode::InitializeFailed,
                    format!("unable to initialize {algorithm} context: {err}"),
                )
            })?;
            contexts.push(context);
        }
        Ok(Self::from_contexts(contexts))
    }

    fn from_contexts(mut contexts: Vec<Box<dyn DigestContext>>) -> Self {
        contexts.sort_by_key(|context| context.algorithm());
        Self {
            contexts,
            poisoned: false,
        }
    }

    pub(crate) fn algorithms(&self) -> impl Iterator<Item = DigestAlgorithm> + '_ {
        self.contexts.iter().map(|context| context.algorithm())
    }

    /// Feed `data` to every context in algorithm order.
    ///
    /// A rejected update poisons the engine: the contexts no longer agree on
    /// what they have consumed, so every later call fails as well.
    pub(crate) fn update(&mut self, data: &[u8]) -> Result<()> {
        if self.poisoned {
            return Err(VerifyError::runtime(
                ErrorCode::SetFailed,
                "digest engine is poisoned by an earlier failed update",
            ));
        }
        for context in self.contexts.iter_mut() {
            if let Err(err) = context.update(data) {
                self.poisoned = true;
                return Err(VerifyError::runtime(
                    ErrorCode::SetFailed,
                    format!("unable to update {} digest: {err}", context.algorithm()),
                ));
            }
        }
        Ok(())
    }

    /// Finalize every context exactly once.
    pub(crate) fn finalize(self) -> Result<DigestSet> {
        if self.poisoned {
            return Err(VerifyError::runtime(
                ErrorCode::SetFailed,
                "unable to finalize a poisoned digest engine",
            ));
        }
        let entries = self
            .contexts
            .into_iter()
            .map(|context| {
                let algorithm = context.algorithm();
                (algorithm, hex::encode(context.finalize()))
            })
            .collect();
        Ok(DigestSet { entries })
    }
}
