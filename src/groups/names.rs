//! Cosmetic group names built from two fixed word lists.
//!
//! Names are not unique and must never be used as a lookup key.

use rand::seq::IndexedRandom;
use rand::Rng;

pub const ADJECTIVES: &[&str] = &[
    "agile", "async", "binary", "cloud", "compact", "composable", "cyber",
    "data-driven", "digital", "distributed", "dynamic", "encrypted", "fault-tolerant",
    "headless", "intelligent", "lightweight", "modular", "neural", "predictive",
    "quantum", "real-time", "responsive", "scalable", "secure", "semantic",
    "serverless", "smart", "snappy", "stateless", "synthetic", "virtual", "zero-trust",
];

pub const NOUNS: &[&str] = &[
    "agent", "api", "array", "bot", "byte", "circuit", "cluster", "component",
    "compiler", "daemon", "data", "dashboard", "engine", "endpoint", "event",
    "firewall", "function", "grid", "hub", "index", "interface", "kernel", "lambda",
    "loop", "matrix", "model", "module", "node", "pipeline", "port", "protocol",
    "query", "repo", "script", "service", "socket", "stack", "stream", "switch",
    "thread", "token", "vector", "vm", "widget",
];

/// Compose one random adjective and one random noun, each capitalized, joined by `separator`.
///
/// Empty word lists fall back to "Peer" / "Group" so a name is always produced.
pub fn generate_name<R: Rng + ?Sized>(
    rng: &mut R,
    adjectives: &[&str],
    nouns: &[&str],
    separator: &str,
) -> String {
    let adjective = adjectives.choose(rng).copied().unwrap_or("peer");
    let noun = nouns.choose(rng).copied().unwrap_or("group");
    format!("{}{}{}", capitalize(adjective), separator, capitalize(noun))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn name_joins_capitalized_words() {
        let mut rng = StdRng::seed_from_u64(7);
        let name = generate_name(&mut rng, &["quantum"], &["kernel"], "-");
        assert_eq!(name, "Quantum-Kernel");
    }

    #[test]
    fn hyphenated_words_only_capitalize_the_first_letter() {
        let mut rng = StdRng::seed_from_u64(1);
        let name = generate_name(&mut rng, &["zero-trust"], &["vm"], "-");
        assert_eq!(name, "Zero-trust-Vm");
    }

    #[test]
    fn names_come_from_the_word_lists() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let name = generate_name(&mut rng, ADJECTIVES, NOUNS, " ");
            let (adjective, noun) = name.split_once(' ').expect("separator present");
            assert!(ADJECTIVES.contains(&adjective.to_lowercase().as_str()));
            assert!(NOUNS.contains(&noun.to_lowercase().as_str()));
        }
    }

    #[test]
    fn empty_lists_still_produce_a_name() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(generate_name(&mut rng, &[], &[], "-"), "Peer-Group");
    }
}
