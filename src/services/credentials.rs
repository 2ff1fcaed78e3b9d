use std::fmt;
use std::sync::Arc;

/// Environment variables read for credentials, in priority order.
pub const CREDENTIAL_ENV_KEYS: [&str; 5] = [
    "GOOGLE_API_KEY_1",
    "GOOGLE_API_KEY",
    "GOOGLE_API_KEY_2",
    "GOOGLE_API_KEY_3",
    "GOOGLE_API_KEY_4",
];

/// Ordered, deduplicated, immutable set of API keys. The first entry is the
/// primary key.
#[derive(Clone, Default)]
pub struct CredentialPool {
    keys: Arc<[Arc<str>]>,
}

impl CredentialPool {
    pub fn from_env() -> Self {
        Self::new(
            CREDENTIAL_ENV_KEYS
                .iter()
                .filter_map(|key| std::env::var(key).ok()),
        )
    }

    /// Blank entries are skipped; a repeated key keeps its first position.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<Arc<str>> = Vec::new();
        for key in keys {
            let key = key.as_ref().trim();
            if key.is_empty() || unique.iter().any(|k| k.as_ref() == key) {
                continue;
            }
            unique.push(Arc::from(key));
        }
        Self {
            keys: unique.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Credential> {
        self.keys.get(index).map(|secret| Credential {
            index,
            secret: Arc::clone(secret),
        })
    }

    pub fn primary(&self) -> Option<Credential> {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Credential> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// One key from the pool, handed to a single attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    secret: Arc<str>,
}

impl Credential {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Last four characters only.
    pub fn redacted(&self) -> String {
        let tail: String = self
            .secret
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("secret", &self.redacted())
            .finish()
    }
}
