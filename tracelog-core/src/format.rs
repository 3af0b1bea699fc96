//! printf conversion specifiers for C parameter types

/// Type keys and their specifiers, checked in order.
///
/// `long long` must stay ahead of `long`.
const FORMAT_TABLE: &[(&str, &str)] = &[
    ("char", "%s"),
    ("int", "%d"),
    ("float", "%f"),
    ("double", "%lf"),
    ("bool", "%d"),
    ("long long", "%lld"),
    ("long", "%ld"),
];

/// Specifier used for pointer parameters with no type mapping
pub const POINTER_FORMAT: &str = "%p";

/// Map a C type string to a printf conversion specifier.
///
/// A single-word key matches when any whitespace-separated word of the type
/// contains it, so `uint32_t` maps through `int`. A multi-word key matches a
/// run of consecutive type words. Returns `None` when nothing matches.
pub fn format_for_type(ty: &str) -> Option<&'static str> {
    let words: Vec<&str> = ty
        .split(|c: char| c.is_whitespace() || c == '*')
        .filter(|w| !w.is_empty())
        .collect();

    FORMAT_TABLE
        .iter()
        .find(|(key, _)| key_matches(key, &words))
        .map(|(_, format)| *format)
}

fn key_matches(key: &str, words: &[&str]) -> bool {
    let key_words: Vec<&str> = key.split_whitespace().collect();
    match key_words.as_slice() {
        [single] => words.iter().any(|w| w.contains(single)),
        multi => words
            .windows(multi.len())
            .any(|window| window == multi),
    }
}
