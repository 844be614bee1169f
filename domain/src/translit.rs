//! Cyrillic to Latin transliteration used by slug normalization.
//!
//! Letters go through `deunicode`, except for the handful whose Russian
//! spelling differs from its generic romanization.

use deunicode::deunicode_char;

/// Lowercase letters spelled differently from `deunicode`. Hard and soft
/// signs have no Latin counterpart and are dropped.
const OVERRIDES: &[(char, &str)] = &[
    ('є', "ye"),
    ('х', "h"),
    ('ц', "c"),
    ('щ', "sh'"),
    ('ъ', ""),
    ('ы', "i"),
    ('ь', ""),
    ('ю', "yu"),
    ('я', "ya"),
];

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

fn override_for(c: char) -> Option<&'static str> {
    OVERRIDES.iter().find(|(k, _)| *k == c).map(|(_, v)| *v)
}

fn push_capitalized(out: &mut String, latin: &str) {
    let mut chars = latin.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
}

/// Replace every Cyrillic letter with its Latin spelling. Uppercase letters
/// map to a capitalized spelling ("Ж" -> "Zh"); everything else is copied.
pub fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if !is_cyrillic(c) {
            out.push(c);
            continue;
        }
        if let Some(latin) = override_for(c) {
            out.push_str(latin);
            continue;
        }
        let mut lower = c.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) if l != c => {
                if let Some(latin) = override_for(l) {
                    push_capitalized(&mut out, latin);
                    continue;
                }
            }
            _ => {}
        }
        match deunicode_char(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}
