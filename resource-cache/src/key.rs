use std::collections::BTreeMap;
use std::fmt;

/// Who an entry belongs to. `User` entries are dropped whenever the
/// signed-in user changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Public,
    User,
}

/// Deterministic key: resource name plus parameters sorted by name and
/// percent-encoded, so `{a, b}` and `{b, a}` hit the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scope: Scope,
    canonical: String,
}

impl CacheKey {
    pub fn new<I, K, V>(resource: &str, scope: Scope, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        let mut canonical = urlencoding::encode(resource).into_owned();
        for (i, (name, value)) in params.iter().enumerate() {
            canonical.push(if i == 0 { '?' } else { '&' });
            canonical.push_str(&urlencoding::encode(name));
            canonical.push('=');
            canonical.push_str(&urlencoding::encode(value));
        }
        Self { scope, canonical }
    }

    pub fn public<I, K, V>(resource: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::new(resource, Scope::Public, params)
    }

    pub fn user<I, K, V>(resource: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::new(resource, Scope::User, params)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
