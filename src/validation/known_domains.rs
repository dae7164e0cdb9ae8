use std::collections::HashSet;

/// Large providers that block or throttle SMTP probing. Addresses on these
/// domains are accepted on syntax alone.
pub const DEFAULT_KNOWN_DOMAINS: &[&str] = &[
    // International
    "gmail.com",
    "outlook.com",
    "hotmail.com",
    "yahoo.com",
    "icloud.com",
    "protonmail.com",
    "live.com",
    "msn.com",
    // China
    "qq.com",
    "163.com",
    "126.com",
    "sina.com",
    "sohu.com",
    "yeah.net",
    "foxmail.com",
    "139.com",
    "aliyun.com",
    "21cn.com",
    "wo.cn",
    "tom.com",
];

/// Immutable set of domains presumed deliverable.
///
/// A match skips DNS and SMTP entirely.
#[derive(Debug, Clone)]
pub struct KnownDomains {
    domains: HashSet<String>,
}

impl Default for KnownDomains {
    fn default() -> Self {
        Self::new(DEFAULT_KNOWN_DOMAINS.iter().copied())
    }
}

impl KnownDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self { domains }
    }

    /// Expects an already-lowercased domain, as produced by
    /// [`normalize_address`](super::syntax::normalize_address).
    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_contains_major_providers() {
        let known = KnownDomains::default();
        assert!(known.contains("gmail.com"));
        assert!(known.contains("qq.com"));
        assert!(known.contains("tom.com"));
        assert_eq!(known.len(), DEFAULT_KNOWN_DOMAINS.len());
    }

    #[test]
    fn test_lookup_is_exact() {
        let known = KnownDomains::default();
        assert!(!known.contains("mail.gmail.com"));
        assert!(!known.contains("gmail.co"));
        assert!(!known.contains("example.com"));
    }

    #[test]
    fn test_custom_entries_are_normalized() {
        let known = KnownDomains::new([" Example.ORG ", "", "corp.example"]);
        assert_eq!(known.len(), 2);
        assert!(known.contains("example.org"));
        assert!(known.contains("corp.example"));
    }
}
