//! Credential resolution for provider API keys.
//!
//! Credentials are named secrets (e.g. `TAVILY_API_KEY`). Each name is
//! resolved from the `[credentials]` config table first, then from the
//! process environment variable of the same name. Values are read-only
//! configuration and are never logged.
//!
//! ```no_run
//! use quarry::credentials::CredentialStore;
//!
//! let store = CredentialStore::from_env_only();
//! match store.resolve(&["TAVILY_API_KEY", "EXA_API_KEY"]) {
//!     Ok(resolved) => println!("{} credentials ready", resolved.len()),
//!     Err(missing) => eprintln!("missing: {}", missing.join(", ")),
//! }
//! ```

mod types;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use types::{CredentialRef, Secret};

/// Source of environment variable values.
pub type EnvSource = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Read-only view over configured credentials.
#[derive(Clone)]
pub struct CredentialStore {
    entries: BTreeMap<String, CredentialRef>,
    env: EnvSource,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// A store over `entries`, falling back to the process environment.
    pub fn new(entries: BTreeMap<String, CredentialRef>) -> Self {
        Self {
            entries,
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// A store that only consults the process environment.
    pub fn from_env_only() -> Self {
        Self::new(BTreeMap::new())
    }

    /// Replace the environment source.
    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    /// Look up one credential. Empty or whitespace values count as absent.
    pub fn lookup(&self, name: &str) -> Option<Secret> {
        let value = match self.entries.get(name) {
            Some(CredentialRef::Plaintext(value)) => Some(value.clone()),
            Some(CredentialRef::Env { var }) => (self.env)(var),
            Some(CredentialRef::None) | None => (self.env)(name),
        };
        value.filter(|v| !v.trim().is_empty()).map(Secret::new)
    }

    /// Resolve every name, or return exactly the missing ones (sorted, deduplicated).
    ///
    /// # Errors
    ///
    /// Returns the list of absent credential names if any is missing.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<ResolvedCredentials, Vec<String>> {
        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();

        for name in names {
            let name = name.as_ref();
            match self.lookup(name) {
                Some(secret) => {
                    resolved.insert(name.to_owned(), secret);
                }
                None => missing.push(name.to_owned()),
            }
        }

        if missing.is_empty() {
            Ok(ResolvedCredentials(resolved))
        } else {
            missing.sort_unstable();
            missing.dedup();
            Err(missing)
        }
    }
}

/// Credentials resolved for one dispatch.
#[derive(Debug, Clone, Default)]
pub struct ResolvedCredentials(BTreeMap<String, Secret>);

impl ResolvedCredentials {
    /// The secret for `name`, if it was resolved.
    pub fn get(&self, name: &str) -> Option<&Secret> {
        self.0.get(name)
    }

    /// Number of resolved credentials.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
