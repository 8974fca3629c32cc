use anyhow::{Context, Result};
use lru::LruCache;
use protocol::ClassInfo;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::{debug, warn};

pub const ORACLE_CACHE_SIZE: usize = 1024;

/// Authoritative source of public methods, data members and bases for a
/// class, consulted before any header text.
pub trait ReflectionOracle: Send + Sync {
    /// `Ok(None)` when the class is unknown to the oracle.
    fn resolve(&self, class: &str) -> Result<Option<ClassInfo>>;
}

/// Knows nothing; every class goes through the text decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOracle;

impl ReflectionOracle for NullOracle {
    fn resolve(&self, _class: &str) -> Result<Option<ClassInfo>> {
        Ok(None)
    }
}

/// Reflection data dumped as `{ "ClassName": { methods, data_members, bases } }`.
#[derive(Debug, Default, Clone)]
pub struct JsonOracle {
    classes: FxHashMap<String, ClassInfo>,
}

impl JsonOracle {
    pub fn from_json(text: &str) -> Result<Self> {
        let classes: FxHashMap<String, ClassInfo> =
            serde_json::from_str(text).context("parsing reflection dump")?;
        Ok(Self { classes })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading reflection dump {}", path.display()))?;
        let oracle = Self::from_json(&text)
            .with_context(|| format!("loading reflection dump {}", path.display()))?;
        debug!("Reflection dump {} knows {} classes", path.display(), oracle.len());
        Ok(oracle)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ReflectionOracle for JsonOracle {
    fn resolve(&self, class: &str) -> Result<Option<ClassInfo>> {
        Ok(self.classes.get(class).cloned())
    }
}

/// Memoized view of an oracle: each class is asked about once, and an
/// oracle failure counts as "unknown".
pub struct OracleCache {
    oracle: Box<dyn ReflectionOracle>,
    answers: LruCache<String, Option<ClassInfo>>,
    lookups: usize,
}

impl OracleCache {
    pub fn new(oracle: Box<dyn ReflectionOracle>) -> Self {
        Self::with_capacity(oracle, ORACLE_CACHE_SIZE)
    }

    pub fn with_capacity(oracle: Box<dyn ReflectionOracle>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            oracle,
            answers: LruCache::new(capacity),
            lookups: 0,
        }
    }

    pub fn resolve(&mut self, class: &str) -> Option<ClassInfo> {
        if let Some(answer) = self.answers.get(class) {
            return answer.clone();
        }

        self.lookups += 1;
        let answer = match self.oracle.resolve(class) {
            Ok(answer) => answer,
            Err(err) => {
                warn!("Reflection oracle failed on {}: {:#}", class, err);
                None
            }
        };
        self.answers.put(class.to_string(), answer.clone());
        answer
    }

    /// Calls that reached the underlying oracle.
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}
