//! Verification key cache
//!
//! Keys are cached by key id for the life of the process and never evicted.
//! A key id always names the same key material, so concurrent inserts are
//! harmless. Misses are gated per key id: concurrent misses for one id
//! fetch once, misses for different ids proceed independently.
//!
//! When the issuer answers a request for one id with a key published under
//! another, the requested id is remembered as an alias of the published one
//! for [`DEFAULT_ALIAS_TTL`], so tokens carrying an unpublished id do not
//! trigger a fetch each.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::TrustResult;
use crate::key_material::VerificationKey;

/// How long a requested id keeps resolving to the key the issuer returned
pub const DEFAULT_ALIAS_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct Alias {
    kid: String,
    recorded: Instant,
}

/// Key id to verification key
#[derive(Debug)]
pub struct KeyCache {
    keys: RwLock<HashMap<String, Arc<VerificationKey>>>,
    aliases: DashMap<String, Alias>,
    fetch_gates: DashMap<String, Arc<Mutex<()>>>,
    alias_ttl: Duration,
}

static GLOBAL: OnceLock<Arc<KeyCache>> = OnceLock::new();

impl Default for KeyCache {
    fn default() -> Self {
        Self::with_alias_ttl(DEFAULT_ALIAS_TTL)
    }
}

impl KeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache remembering aliases for `alias_ttl`
    ///
    /// A zero TTL disables aliases.
    pub fn with_alias_ttl(alias_ttl: Duration) -> Self {
        Self {
            keys: RwLock::default(),
            aliases: DashMap::new(),
            fetch_gates: DashMap::new(),
            alias_ttl,
        }
    }

    /// The process-wide cache validators use unless given their own
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Look up a key by the id it is published under
    pub async fn get(&self, kid: &str) -> Option<Arc<VerificationKey>> {
        self.keys.read().await.get(kid).cloned()
    }

    /// Store a key under its own id
    ///
    /// An existing entry wins; the returned key is the one in the cache.
    pub async fn insert(&self, key: VerificationKey) -> Arc<VerificationKey> {
        let mut keys = self.keys.write().await;
        Arc::clone(
            keys.entry(key.kid().to_string())
                .or_insert_with(|| Arc::new(key)),
        )
    }

    /// Look up a key, fetching it on a miss
    ///
    /// The fetched key is cached under the id it reports, which may differ
    /// from the id asked for. In that case the requested id becomes an alias
    /// of the reported one.
    ///
    /// # Errors
    ///
    /// Whatever `fetch` returns. Failures are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, kid: &str, fetch: F) -> TrustResult<Arc<VerificationKey>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TrustResult<VerificationKey>>,
    {
        if let Some(key) = self.resolve(kid).await {
            return Ok(key);
        }

        let gate = Arc::clone(self.fetch_gates.entry(kid.to_string()).or_default().value());
        let _guard = gate.lock().await;
        if let Some(key) = self.resolve(kid).await {
            debug!(kid, "Key cached by a concurrent fetch");
            return Ok(key);
        }

        let result = match fetch().await {
            Ok(key) => {
                if key.kid() != kid {
                    debug!(requested = kid, returned = key.kid(), "Issuer returned a different key id");
                    self.aliases.insert(
                        kid.to_string(),
                        Alias {
                            kid: key.kid().to_string(),
                            recorded: Instant::now(),
                        },
                    );
                }
                Ok(self.insert(key).await)
            }
            Err(e) => Err(e),
        };
        self.fetch_gates.remove(kid);
        result
    }

    /// Number of cached keys
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }

    async fn resolve(&self, kid: &str) -> Option<Arc<VerificationKey>> {
        if let Some(key) = self.get(kid).await {
            return Some(key);
        }
        let target = self
            .aliases
            .get(kid)
            .filter(|alias| alias.recorded.elapsed() < self.alias_ttl)
            .map(|alias| alias.kid.clone())?;
        self.get(&target).await
    }
}
