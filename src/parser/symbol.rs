//! SymbolResolver (C2).
//!
//! Grounded on `original_source/app/Analayzer/detectors/symbol_detector.py`:
//! canonicalize the candidate, try a direct substring match against the
//! broker's symbol set (preferring spellings without `!`/`#`), fall back to
//! a fixed alias table, then re-resolve the alias's canonical form against
//! the broker set, and finally default to gold as a last resort.

use std::collections::HashMap;

/// One alias-table entry: a set of surface forms mapping to one canonical
/// symbol (spec.md §4.2 step 3).
struct AliasGroup {
    forms: &'static [&'static str],
    canonical: &'static str,
}

const ALIAS_TABLE: &[AliasGroup] = &[
    AliasGroup {
        forms: &["طلا", "انس", "اونس", "گلد", "GOLD", "GLD", "XAU/USD", "XAUUSD", "#XAUUSD"],
        canonical: "XAUUSD",
    },
    AliasGroup {
        forms: &["US30", "داوجونز"],
        canonical: "DJIUSD",
    },
    AliasGroup {
        forms: &["یورو", "EURUSD"],
        canonical: "EURUSD",
    },
    AliasGroup {
        forms: &["NASDAQ"],
        canonical: "NDAQ",
    },
    AliasGroup {
        forms: &["OIL"],
        canonical: "OIL",
    },
];

const DEFAULT_FALLBACK: &str = "XAUUSD";

pub struct SymbolResolver<'a> {
    broker_symbols: &'a [String],
    symbol_mappings: &'a HashMap<String, String>,
    default_to_gold: bool,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(
        broker_symbols: &'a [String],
        symbol_mappings: &'a HashMap<String, String>,
        default_to_gold: bool,
    ) -> Self {
        Self {
            broker_symbols,
            symbol_mappings,
            default_to_gold,
        }
    }

    fn canonicalize(candidate: &str) -> String {
        candidate.to_uppercase().replace(['/', '-'], "")
    }

    /// Step 2: substring match against the broker set, preferring
    /// spellings without `!`/`#`.
    fn match_broker_symbol(&self, candidate: &str) -> Option<String> {
        let needle = candidate.to_uppercase();
        let matches: Vec<&String> = self
            .broker_symbols
            .iter()
            .filter(|s| s.to_uppercase().contains(&needle))
            .collect();
        if matches.is_empty() {
            return None;
        }
        matches
            .iter()
            .find(|s| !s.contains('!') && !s.contains('#'))
            .or_else(|| matches.first())
            .map(|s| s.to_string())
    }

    fn alias_canonical(candidate: &str) -> Option<&'static str> {
        let upper = candidate.to_uppercase();
        ALIAS_TABLE
            .iter()
            .find(|group| group.forms.iter().any(|f| upper.contains(&f.to_uppercase())))
            .map(|group| group.canonical)
    }

    /// Steps 1-3 only: user mapping, direct broker-set substring match, then
    /// the alias table. Returns `None` without applying the gold default,
    /// so callers can try this against several candidate words before
    /// falling back (mirrors `detect_symbol`'s two-pass loop over every
    /// word, which only defaults after every word in the message misses).
    pub fn resolve_candidate(&self, candidate: &str) -> Option<String> {
        // User-supplied mapping overrides step 2's choice whenever the
        // mapped symbol is present in the broker's set.
        let canonical = Self::canonicalize(candidate);
        if let Some(mapped) = self.symbol_mappings.get(&canonical) {
            if self.broker_symbols.iter().any(|s| s == mapped) {
                return Some(mapped.clone());
            }
        }

        if let Some(direct) = self.match_broker_symbol(candidate) {
            return Some(direct);
        }

        if let Some(alias) = Self::alias_canonical(candidate) {
            if let Some(resolved) = self.match_broker_symbol(alias) {
                return Some(resolved);
            }
            return Some(alias.to_string());
        }

        None
    }

    /// Resolve a single free-text candidate into the broker's exact symbol
    /// spelling, or the configured default if nothing matches at all.
    pub fn resolve(&self, candidate: &str) -> Option<String> {
        self.resolve_candidate(candidate).or_else(|| {
            if self.default_to_gold {
                Some(DEFAULT_FALLBACK.to_string())
            } else {
                None
            }
        })
    }

    /// Resolve against every candidate in order, first match wins; applies
    /// the gold default only once every candidate has missed (spec.md §4.2,
    /// `detect_symbol`'s "Default fallback" after both passes over all
    /// words).
    pub fn resolve_any<'c, I: IntoIterator<Item = &'c str>>(&self, candidates: I) -> Option<String> {
        for candidate in candidates {
            if let Some(resolved) = self.resolve_candidate(candidate) {
                return Some(resolved);
            }
        }
        if self.default_to_gold {
            Some(DEFAULT_FALLBACK.to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn direct_match_prefers_plain_spelling_over_suffixed() {
        let broker = symbols(&["EURUSD", "EURUSD#", "EURUSD!"]);
        let mappings = HashMap::new();
        let resolver = SymbolResolver::new(&broker, &mappings, true);
        assert_eq!(resolver.resolve("eurusd").as_deref(), Some("EURUSD"));
    }

    #[test]
    fn gold_alias_resolves_through_broker_set() {
        let broker = symbols(&["XAUUSD.m"]);
        let mappings = HashMap::new();
        let resolver = SymbolResolver::new(&broker, &mappings, true);
        assert_eq!(resolver.resolve("طلا").as_deref(), Some("XAUUSD.m"));
    }

    #[test]
    fn unresolved_defaults_to_gold_when_enabled() {
        let broker = symbols(&["XAUUSD"]);
        let mappings = HashMap::new();
        let resolver = SymbolResolver::new(&broker, &mappings, true);
        assert_eq!(resolver.resolve("ZZZNOPE").as_deref(), Some("XAUUSD"));
    }

    #[test]
    fn unresolved_returns_none_when_default_disabled() {
        let broker = symbols(&["XAUUSD"]);
        let mappings = HashMap::new();
        let resolver = SymbolResolver::new(&broker, &mappings, false);
        assert_eq!(resolver.resolve("ZZZNOPE"), None);
    }

    #[test]
    fn user_mapping_overrides_direct_match() {
        let broker = symbols(&["EURUSD", "EURUSD.raw"]);
        let mut mappings = HashMap::new();
        mappings.insert("EURUSD".to_string(), "EURUSD.raw".to_string());
        let resolver = SymbolResolver::new(&broker, &mappings, true);
        assert_eq!(resolver.resolve("eurusd").as_deref(), Some("EURUSD.raw"));
    }

    #[test]
    fn resolve_any_skips_misses_and_finds_a_later_word() {
        let broker = symbols(&["US30", "EURUSD"]);
        let mappings = HashMap::new();
        let resolver = SymbolResolver::new(&broker, &mappings, true);
        assert_eq!(resolver.resolve_any(["buy", "US30", "now"]).as_deref(), Some("US30"));
    }

    #[test]
    fn resolve_any_defaults_to_gold_only_after_every_word_misses() {
        let broker = symbols(&["XAUUSD"]);
        let mappings = HashMap::new();
        let resolver = SymbolResolver::new(&broker, &mappings, true);
        assert_eq!(resolver.resolve_any(["buy", "now"]).as_deref(), Some("XAUUSD"));
    }
}
