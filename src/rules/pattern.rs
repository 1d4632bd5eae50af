//! Rule pattern compilation
//!
//! Patterns come in a small closed set of kinds, classified and compiled
//! once when the rule is created so evaluation never rebuilds a regex:
//!
//! - **Literal**: no `*` anywhere. Matches the candidate exactly, and also
//!   acts as an implicit prefix (`"git status"` matches `"git status -s"`).
//! - **Trailing wildcard**: a single `*` at the end (`"npm *"`,
//!   `"git commit *"`). Matches any candidate starting with the prefix.
//! - **Glob**: `*` anywhere else, compiled to an anchored regex.

use regex::Regex;

/// How specifically a pattern matched a candidate. Lower is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    /// Exact literal equality
    Exact = 0,
    /// Explicit trailing-wildcard prefix match
    PrefixWildcard = 1,
    /// Literal pattern matched as a prefix of the candidate
    ImplicitPrefix = 2,
    /// Full glob match
    Glob = 3,
}

/// A pattern compiled for repeated evaluation
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    /// No wildcard; the raw pattern string
    Literal(String),
    /// Single trailing `*`; the prefix with the `*` stripped
    TrailingWildcard(String),
    /// `*` elsewhere; anchored regex
    Glob(Regex),
}

impl CompiledPattern {
    /// Classify and compile a raw pattern string
    pub fn compile(pattern: &str) -> Self {
        let stars = pattern.matches('*').count();
        if stars == 0 {
            return CompiledPattern::Literal(pattern.to_string());
        }
        // A bare "*" has no prefix to match on; it is the full-wildcard glob
        if stars == 1 && pattern.ends_with('*') && pattern.len() > 1 {
            return CompiledPattern::TrailingWildcard(pattern[..pattern.len() - 1].to_string());
        }
        CompiledPattern::Glob(glob_to_regex(pattern))
    }

    /// Match a candidate, reporting the specificity tier of the match
    pub fn match_tier(&self, candidate: &str) -> Option<MatchTier> {
        match self {
            CompiledPattern::Literal(literal) => {
                if candidate == literal {
                    Some(MatchTier::Exact)
                } else if candidate.starts_with(literal)
                    && candidate[literal.len()..].starts_with(' ')
                {
                    Some(MatchTier::ImplicitPrefix)
                } else {
                    None
                }
            }
            CompiledPattern::TrailingWildcard(prefix) => {
                if candidate.starts_with(prefix.as_str()) {
                    Some(MatchTier::PrefixWildcard)
                } else {
                    None
                }
            }
            CompiledPattern::Glob(regex) => {
                if regex.is_match(candidate) {
                    Some(MatchTier::Glob)
                } else {
                    None
                }
            }
        }
    }
}

/// Compile a glob pattern (`*` = any run of characters) to an anchored regex
fn glob_to_regex(pattern: &str) -> Regex {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut first = true;
    for segment in pattern.split('*') {
        if !first {
            source.push_str(".*");
        }
        source.push_str(&regex::escape(segment));
        first = false;
    }
    source.push('$');
    // The source is built from escaped segments and `.*` joins only
    Regex::new(&source).unwrap_or_else(|_| Regex::new("^$").expect("empty-match regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_exact_and_prefix() {
        let pattern = CompiledPattern::compile("git status");
        assert_eq!(pattern.match_tier("git status"), Some(MatchTier::Exact));
        assert_eq!(
            pattern.match_tier("git status --short"),
            Some(MatchTier::ImplicitPrefix)
        );
        // Token boundary required: "git statusx" is not a prefix match
        assert_eq!(pattern.match_tier("git statusx"), None);
        assert_eq!(pattern.match_tier("git log"), None);
    }

    #[test]
    fn test_trailing_wildcard() {
        let pattern = CompiledPattern::compile("npm *");
        assert_eq!(
            pattern.match_tier("npm install lodash"),
            Some(MatchTier::PrefixWildcard)
        );
        assert_eq!(pattern.match_tier("npx create-react-app"), None);
        // Bare "npm" does not match "npm *": the prefix includes the space
        assert_eq!(pattern.match_tier("npm"), None);
    }

    #[test]
    fn test_glob() {
        let pattern = CompiledPattern::compile("git * --force");
        assert_eq!(
            pattern.match_tier("git push origin --force"),
            Some(MatchTier::Glob)
        );
        assert_eq!(pattern.match_tier("git push origin"), None);

        let all = CompiledPattern::compile("*");
        assert!(matches!(all, CompiledPattern::Glob(_)));
        assert_eq!(all.match_tier("anything at all"), Some(MatchTier::Glob));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let pattern = CompiledPattern::compile("echo (x) *");
        // "(x)" must match literally, not as a regex group
        match pattern {
            CompiledPattern::TrailingWildcard(ref prefix) => {
                assert_eq!(prefix, "echo (x) ");
            }
            _ => panic!("single trailing star should compile as prefix"),
        }

        let glob = CompiledPattern::compile("*.(sh)*");
        assert_eq!(glob.match_tier("run.(sh) now"), Some(MatchTier::Glob));
        assert_eq!(glob.match_tier("runXshY now"), None);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(MatchTier::Exact < MatchTier::PrefixWildcard);
        assert!(MatchTier::PrefixWildcard < MatchTier::ImplicitPrefix);
        assert!(MatchTier::ImplicitPrefix < MatchTier::Glob);
    }
}
