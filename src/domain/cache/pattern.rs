//! Invalidation patterns - glob prefixes that are always tenant-scoped

use std::fmt;

use super::namespace::Namespace;
use crate::domain::tenant::TenantId;
use crate::domain::DomainError;

/// A validated `{namespace}:{tenant}:{key_type}*` glob.
///
/// The only way to bulk-delete keys through the cache store. Construction
/// guarantees the pattern names a known namespace and a single tenant, and
/// that its only wildcard is the trailing `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvalidationPattern {
    namespace: Namespace,
    tenant: TenantId,
    raw: String,
}

impl InvalidationPattern {
    /// Builds the pattern for a namespace and tenant, optionally narrowed to a key type
    pub fn new(
        namespace: Namespace,
        tenant: &TenantId,
        key_type: Option<&str>,
    ) -> Result<Self, DomainError> {
        let key_type = key_type.unwrap_or("");

        if key_type.chars().any(is_glob_char) || key_type.chars().any(char::is_whitespace) {
            return Err(DomainError::invalidation_pattern(
                format!("{}:{}:{}*", namespace, tenant, key_type),
                "key type must not contain glob characters or whitespace",
            ));
        }

        Ok(Self {
            namespace,
            tenant: tenant.clone(),
            raw: format!("{}:{}:{}*", namespace.as_str(), tenant.as_str(), key_type),
        })
    }

    /// Parses and validates a raw pattern string
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let refuse = |reason: &str| DomainError::invalidation_pattern(raw, reason);

        if raw.trim().is_empty() {
            return Err(refuse("pattern is empty"));
        }

        let Some(body) = raw.strip_suffix('*') else {
            return Err(refuse("pattern must end with '*'"));
        };

        if body.chars().any(is_glob_char) {
            return Err(refuse("only a single trailing '*' is allowed"));
        }

        let mut parts = body.splitn(3, ':');
        let namespace = parts.next().unwrap_or_default();
        let tenant = parts.next().unwrap_or_default();
        let Some(key_type) = parts.next() else {
            return Err(refuse("pattern is not tenant-scoped"));
        };

        let namespace: Namespace = namespace
            .parse()
            .map_err(|_| refuse("pattern does not start with a known namespace"))?;
        let tenant = TenantId::new(tenant).map_err(|_| refuse("pattern is not tenant-scoped"))?;

        Self::new(namespace, &tenant, Some(key_type))
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `key` would be removed by this pattern
    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.raw[..self.raw.len() - 1])
    }
}

fn is_glob_char(c: char) -> bool {
    matches!(c, '*' | '?' | '[' | ']' | '\\')
}

/// Redis `MATCH`-style glob supporting `*` and `?`; other characters are literal.
///
/// Compiled once and reused for every key of a scan.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    regex: Option<regex::Regex>,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Self {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');

        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }

        expr.push('$');

        Self {
            regex: regex::Regex::new(&expr).ok(),
        }
    }

    pub fn is_match(&self, key: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(key))
    }
}

impl fmt::Display for InvalidationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Builds the invalidation counterpart of [`super::build_key`]
pub fn build_pattern(
    namespace: Namespace,
    tenant: &TenantId,
    key_type: Option<&str>,
) -> Result<InvalidationPattern, DomainError> {
    InvalidationPattern::new(namespace, tenant, key_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::key::{build_key, CacheKeyParams};

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    #[test]
    fn test_build_pattern_shapes() {
        let acme = tenant("acme");

        let all = build_pattern(Namespace::Properties, &acme, None).unwrap();
        assert_eq!(all.as_str(), "properties:acme:*");

        let narrow = build_pattern(Namespace::Properties, &acme, Some("list")).unwrap();
        assert_eq!(narrow.as_str(), "properties:acme:list*");
    }

    #[test]
    fn test_pattern_matches_keys_of_same_tenant() {
        let acme = tenant("acme");
        let key = build_key(
            Namespace::Properties,
            &acme,
            "list:page:1:limit:50",
            &CacheKeyParams::new(),
        );

        assert!(build_pattern(Namespace::Properties, &acme, None).unwrap().matches(&key));
        assert!(build_pattern(Namespace::Properties, &acme, Some("list")).unwrap().matches(&key));
        assert!(!build_pattern(Namespace::Dashboard, &acme, None).unwrap().matches(&key));
    }

    #[test]
    fn test_tenant_isolation() {
        let tenants = ["acme", "acme2", "acm", "globex", "a"];
        let params = CacheKeyParams::new().with_component("page", "1");

        for a in tenants {
            for b in tenants {
                if a == b {
                    continue;
                }
                for ns in Namespace::ALL {
                    let key_a = build_key(ns, &tenant(a), "list", &params);
                    let pattern_b = build_pattern(ns, &tenant(b), None).unwrap();
                    assert!(
                        !pattern_b.matches(&key_a),
                        "pattern {} must not match key {}",
                        pattern_b,
                        key_a
                    );
                }
            }
        }
    }

    #[test]
    fn test_glob_matcher() {
        let matches = |pattern: &str, key: &str| GlobMatcher::new(pattern).is_match(key);

        assert!(matches("properties:acme:*", "properties:acme:list:page:1"));
        assert!(matches("user:*:profile", "user:42:profile"));
        assert!(matches("api:acme:prop?rties*", "api:acme:properties/1"));
        assert!(!matches("properties:acme:*", "xproperties:acme:list"));
        assert!(!matches("api:acme.*", "api:acmeX"));
    }

    #[test]
    fn test_glob_matcher_is_reusable_across_keys() {
        let matcher = GlobMatcher::new("api:acme:properties*");
        let keys = [
            "api:acme:properties:_user=anon",
            "api:acme:properties/h0123:_user=anon",
            "api:acme:tenants:_user=anon",
            "api:globex:properties:_user=anon",
        ];

        let matched: Vec<&str> = keys.into_iter().filter(|k| matcher.is_match(k)).collect();
        assert_eq!(matched, keys[..2].to_vec());
    }

    #[test]
    fn test_key_type_with_glob_is_refused() {
        let result = build_pattern(Namespace::Api, &tenant("acme"), Some("prop*"));
        assert!(matches!(result, Err(DomainError::InvalidationPattern { .. })));
    }

    #[test]
    fn test_parse_valid_patterns() {
        let pattern = InvalidationPattern::parse("payments:acme:recent*").unwrap();
        assert_eq!(pattern.namespace(), Namespace::Payments);
        assert_eq!(pattern.tenant().as_str(), "acme");

        let pattern = InvalidationPattern::parse("api:acme:*").unwrap();
        assert_eq!(pattern.as_str(), "api:acme:*");
    }

    #[test]
    fn test_parse_refuses_unscoped_patterns() {
        for raw in [
            "",
            "*",
            "api:*",
            "api*",
            "*:acme:*",
            "api:*:list*",
            "api:acme",
            "api:acme:list",
            "unknown:acme:*",
            "api:acme:li?t*",
            "api:acme:[a-z]*",
            "api:ac me:*",
        ] {
            let result = InvalidationPattern::parse(raw);
            assert!(
                matches!(result, Err(DomainError::InvalidationPattern { .. })),
                "pattern {:?} should be refused",
                raw
            );
        }
    }
}
