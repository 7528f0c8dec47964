//! Default namespace generation

use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "deft", "early", "fleet", "gentle", "hardy", "ivory", "jolly",
    "lucid", "mighty", "noble", "prime", "quiet", "rapid", "steady", "tidy", "upbeat", "vivid",
];

const NOUNS: &[&str] = &[
    "atlas", "barge", "cargo", "dock", "ferry", "grove", "haven", "index", "ledger", "loader",
    "manifest", "orchard", "pier", "quarry", "roster", "silo", "tally", "vault", "wharf", "yard",
];

/// Generate a namespace like "steady-ledger-2847".
///
/// Only lowercase letters, digits and hyphens, so it is valid in every
/// resource name it ends up in.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let number: u16 = rng.gen_range(1000..10000);
    format!("{}-{}-{}", adjective, noun, number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_name_format() {
        let name = generate();
        let parts: Vec<&str> = name.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(ADJECTIVES.contains(&parts[0]));
        assert!(NOUNS.contains(&parts[1]));
        let number: u16 = parts[2].parse().unwrap();
        assert!((1000..10000).contains(&number));
    }

    #[test]
    fn test_generated_name_is_a_valid_namespace() {
        for _ in 0..20 {
            let name = generate();
            assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert!(name.len() <= 24);
        }
    }
}
