//! Record identifiers.
//!
//! Every stored row is keyed `table:key`, where `key` is a 12 character `NanoID` drawn from an
//! alphabet without look-alike glyphs so ids survive being read aloud or retyped.

/// `NanoID` alphabet without `0 O 1 I l`.
pub const SAFE_ALPHABET: &[char; 55] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L',
    'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f',
    'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Default key length of [`record_id`].
pub const KEY_LEN: usize = 12;

/// Draws a key from [`SAFE_ALPHABET`]; `safe_nanoid!(21)` for a longer one.
#[macro_export]
macro_rules! safe_nanoid {
    () => {
        $crate::nanoid!({ $crate::ids::KEY_LEN }, $crate::ids::SAFE_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::ids::SAFE_ALPHABET)
    };
}

/// A fresh `table:key` record id.
#[must_use]
pub fn record_id(table: &str) -> String {
    format!("{table}:{}", safe_nanoid!())
}

/// Splits `table:key`; ids without a separator yield `None`.
#[must_use]
pub fn split_record_id(id: &str) -> Option<(&str, &str)> {
    id.split_once(':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxhash::FxHashSet;

    #[test]
    fn keys_use_only_the_safe_alphabet() {
        let short = safe_nanoid!();
        let long = safe_nanoid!(21);
        assert_eq!(short.len(), KEY_LEN);
        assert_eq!(long.len(), 21);
        assert!(long.chars().chain(short.chars()).all(|ch| SAFE_ALPHABET.contains(&ch)));
    }

    #[test]
    fn record_ids_are_prefixed_and_distinct() {
        let ids: FxHashSet<String> = (0..256).map(|_| record_id("event")).collect();
        assert_eq!(ids.len(), 256);
        for id in &ids {
            let (table, key) = split_record_id(id).unwrap();
            assert_eq!(table, "event");
            assert_eq!(key.len(), KEY_LEN);
        }
    }

    #[test]
    fn bare_keys_do_not_split() {
        assert_eq!(split_record_id("abc"), None);
        assert_eq!(split_record_id("example:"), Some(("example", "")));
    }
}
