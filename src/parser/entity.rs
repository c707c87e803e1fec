//! HTML character entity decoding for the chosen HTML body.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static NAMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&([a-zA-Z][a-zA-Z0-9]{1,31});").expect("named entity pattern is valid")
});

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#([0-9]{1,10});").expect("decimal entity pattern is valid"));

static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#[xX]([0-9a-fA-F]{1,8});").expect("hex entity pattern is valid"));

/// Named entities decoded by [`decode_entities`].
const NAMED: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("sbquo", '\u{201a}'),
    ("ldquo", '\u{201c}'),
    ("rdquo", '\u{201d}'),
    ("bdquo", '\u{201e}'),
    ("ndash", '\u{2013}'),
    ("mdash", '\u{2014}'),
    ("hellip", '\u{2026}'),
    ("copy", '\u{a9}'),
    ("reg", '\u{ae}'),
    ("trade", '\u{2122}'),
];

/// Decode named, decimal (`&#169;`) and hex (`&#x2019;`) entities.
///
/// Named entities go first, then decimal, then hex, each as its own pass. A
/// numeric reference spelled out by a named one is therefore resolved
/// (`&amp;#169;` becomes `©`), while a named one stays literal (`&amp;lt;`
/// becomes `&lt;`). Unknown names and numbers that are not valid characters
/// stay as written.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let named = replace(&NAMED_RE, input, |name| {
        NAMED.iter().find(|(n, _)| *n == name).map(|(_, c)| *c)
    });
    let decimal = replace(&DECIMAL_RE, &named, |num| code_point(num.parse().ok()?));
    replace(&HEX_RE, &decimal, |hex| code_point(u32::from_str_radix(hex, 16).ok()?))
}

fn replace(re: &Regex, input: &str, lookup: impl Fn(&str) -> Option<char>) -> String {
    re.replace_all(input, |caps: &Captures<'_>| match lookup(&caps[1]) {
        Some(c) => c.to_string(),
        None => caps[0].to_string(),
    })
    .into_owned()
}

fn code_point(code: u32) -> Option<char> {
    if code == 0 {
        return None;
    }
    char::from_u32(code)
}
