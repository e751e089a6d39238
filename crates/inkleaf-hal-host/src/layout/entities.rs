/// Named references common in book markup. Lookup ignores ASCII case, so
/// entries that differ only in case (`Eacute`/`eacute`) collapse to one.
const NAMED_ENTITIES: &[(&[u8], char)] = &[
    (b"amp", '&'),
    (b"lt", '<'),
    (b"gt", '>'),
    (b"quot", '"'),
    (b"apos", '\''),
    (b"nbsp", '\u{a0}'),
    (b"lsquo", '\u{2018}'),
    (b"rsquo", '\u{2019}'),
    (b"ldquo", '\u{201c}'),
    (b"rdquo", '\u{201d}'),
    (b"laquo", '\u{ab}'),
    (b"raquo", '\u{bb}'),
    (b"ndash", '\u{2013}'),
    (b"mdash", '\u{2014}'),
    (b"hellip", '\u{2026}'),
    (b"shy", '\u{ad}'),
    (b"copy", '\u{a9}'),
    (b"iexcl", '\u{a1}'),
    (b"iquest", '\u{bf}'),
    (b"aacute", '\u{e1}'),
    (b"agrave", '\u{e0}'),
    (b"eacute", '\u{e9}'),
    (b"egrave", '\u{e8}'),
    (b"iacute", '\u{ed}'),
    (b"igrave", '\u{ec}'),
    (b"oacute", '\u{f3}'),
    (b"ograve", '\u{f2}'),
    (b"uacute", '\u{fa}'),
    (b"ugrave", '\u{f9}'),
    (b"uuml", '\u{fc}'),
    (b"ntilde", '\u{f1}'),
    (b"ccedil", '\u{e7}'),
];

/// Decodes the body of a character reference (the part between `&` and `;`).
pub(super) fn decode_entity(entity: &[u8]) -> Option<char> {
    if entity.first() == Some(&b'#') {
        return decode_numeric(&entity[1..]);
    }
    NAMED_ENTITIES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(entity))
        .map(|(_, ch)| *ch)
}

fn decode_numeric(digits: &[u8]) -> Option<char> {
    let (digits, radix) = match digits.split_first() {
        Some((b'x' | b'X', rest)) => (rest, 16),
        _ => (digits, 10),
    };
    if digits.is_empty() {
        return None;
    }

    let mut value = 0u32;
    for &digit in digits {
        let step = char::from(digit).to_digit(radix)?;
        value = value.checked_mul(radix)?.checked_add(step)?;
    }
    char::from_u32(value)
}
