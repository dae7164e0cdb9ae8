use regex::Regex;

/// Address shape accepted by the checker: local part, `@`, a dotted domain and
/// a top-level label of at least two letters.
pub const ADDRESS_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Outcome of a syntax check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxVerdict {
    /// Nothing left after trimming
    Empty,
    /// Does not match [`ADDRESS_PATTERN`]
    Malformed,
    WellFormed { local: String, domain: String },
}

/// Trims surrounding whitespace and lowercases the address.
pub fn normalize_address(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Pattern-based address checker.
///
/// Pure and deterministic: it owns a compiled pattern and nothing else, so a
/// single instance is shared by every worker.
///
/// # Examples
/// ```
/// use email_checker::validation::syntax::{SyntaxChecker, SyntaxVerdict};
///
/// let checker = SyntaxChecker::new();
/// assert!(checker.is_valid("user.name+tag@example.com"));
/// assert_eq!(checker.check("   "), SyntaxVerdict::Empty);
/// assert_eq!(checker.check("invalid@ex_mple"), SyntaxVerdict::Malformed);
/// ```
#[derive(Debug, Clone)]
pub struct SyntaxChecker {
    pattern: Regex,
}

impl Default for SyntaxChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxChecker {
    pub fn new() -> Self {
        let pattern = Regex::new(ADDRESS_PATTERN)
            .expect("Address pattern failed to compile. This is a bug.");
        Self { pattern }
    }

    /// Classifies `address`. Surrounding whitespace is ignored; case is not
    /// changed, callers normalize first when they need lowercase parts.
    pub fn check(&self, address: &str) -> SyntaxVerdict {
        let address = address.trim();
        if address.is_empty() {
            return SyntaxVerdict::Empty;
        }
        if !self.pattern.is_match(address) {
            return SyntaxVerdict::Malformed;
        }
        // The pattern admits exactly one '@'.
        match address.split_once('@') {
            Some((local, domain)) => SyntaxVerdict::WellFormed {
                local: local.to_string(),
                domain: domain.to_string(),
            },
            None => SyntaxVerdict::Malformed,
        }
    }

    pub fn is_valid(&self, address: &str) -> bool {
        matches!(self.check(address), SyntaxVerdict::WellFormed { .. })
    }
}
