/// Resolves a domain's mail exchangers through DNS.
///
/// Hostnames come back ordered by MX preference (ties broken by name) with
/// the trailing root dot removed. Lookup failures of any kind are folded into
/// [`dnsmx::MxResolution::NotFound`] so callers never see an error.
///
/// # Examples
/// ```
/// use email_checker::validation::dnsmx::{MxRecord, order_mx_records};
///
/// let hosts = order_mx_records(vec![
///     MxRecord::new(20, "b.mx.example.com."),
///     MxRecord::new(10, "a.mx.example.com."),
/// ]);
/// assert_eq!(hosts, vec!["a.mx.example.com", "b.mx.example.com"]);
/// ```
pub mod dnsmx;

/// Static set of large providers whose addresses are accepted without any
/// network check.
pub mod known_domains;

/// SMTP reachability probe: connect, greeting, EHLO, optional STARTTLS, QUIT.
///
/// Ports are tried in a fixed order and the first completed handshake wins.
pub mod smtp;

/// Checks address shape against a fixed pattern.
///
/// # Examples
/// ```
/// use email_checker::validation::syntax::SyntaxChecker;
///
/// let checker = SyntaxChecker::new();
/// assert!(checker.is_valid("user.name+tag@example.com"));
/// assert!(!checker.is_valid("user@localhost"));
/// ```
pub mod syntax;
