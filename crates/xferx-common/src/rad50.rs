//! RAD-50: a 40-symbol alphabet packed three characters to a 16-bit word.
//!
//! The alphabet is `' ', 'A'..='Z', '$', '.', '?', '0'..='9'` in DEC's
//! original ordering (space first, then letters, then the three
//! punctuation symbols, then digits). A word is `((c1*40)+c2)*40+c3`,
//! where `c1..c3` are the alphabet indices of three successive characters.
//! Used by RT-11, DOS-11, Files-11, RSTS/E, and OS/8 filenames.

const ALPHABET: &[u8; 40] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ$.?0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rad50Error {
    /// A character outside the RAD-50 alphabet was supplied and no
    /// substitution was requested.
    #[error("character {0:?} is not in the RAD-50 alphabet")]
    InvalidChar(char),
    /// A decoded word was not a valid combination of three alphabet
    /// indices (i.e. `word >= 40*40*40`).
    #[error("word {0:#06x} is not a valid RAD-50 encoding")]
    InvalidWord(u16),
}

fn char_to_index(c: u8) -> Option<u8> {
    let c = c.to_ascii_uppercase();
    ALPHABET.iter().position(|&a| a == c).map(|i| i as u8)
}

/// Encodes up to three ASCII characters into one RAD-50 word.
///
/// Per spec.md's filename-canonicalization rule, any character that is not
/// in the RAD-50 alphabet is mapped to a space rather than rejected; use
/// [`try_ascii_to_rad50`] if a hard error is wanted instead. Input shorter
/// than three characters is padded with spaces.
pub fn ascii_to_rad50(chars: &[u8]) -> u16 {
    let mut idx = [0u16; 3];
    for i in 0..3 {
        idx[i] = chars
            .get(i)
            .copied()
            .and_then(char_to_index)
            .unwrap_or(0) as u16;
    }
    (idx[0] * 40 + idx[1]) * 40 + idx[2]
}

/// Like [`ascii_to_rad50`], but fails if any of the (up to three) input
/// characters is outside the RAD-50 alphabet instead of silently mapping
/// it to a space.
pub fn try_ascii_to_rad50(chars: &[u8]) -> Result<u16, Rad50Error> {
    let mut idx = [0u16; 3];
    for i in 0..3 {
        if let Some(&c) = chars.get(i) {
            idx[i] = char_to_index(c).ok_or(Rad50Error::InvalidChar(c as char))? as u16;
        }
    }
    Ok((idx[0] * 40 + idx[1]) * 40 + idx[2])
}

/// Decodes one RAD-50 word into three ASCII characters (trailing spaces
/// included; callers typically `trim_end`).
pub fn rad50_to_ascii(word: u16) -> Result<[u8; 3], Rad50Error> {
    if word as u32 >= 40 * 40 * 40 {
        return Err(Rad50Error::InvalidWord(word));
    }
    let c3 = (word % 40) as usize;
    let rest = word / 40;
    let c2 = (rest % 40) as usize;
    let c1 = (rest / 40) as usize;
    Ok([ALPHABET[c1], ALPHABET[c2], ALPHABET[c3]])
}

/// Encodes a filename of up to six characters into two RAD-50 words, the
/// layout RT-11/DOS-11/OS/8 directory entries use for the base filename.
pub fn ascii_to_rad50_pair(name: &[u8]) -> (u16, u16) {
    let hi = name.get(0..3).unwrap_or(name);
    let lo = if name.len() > 3 { &name[3..] } else { &[] };
    (ascii_to_rad50(hi), ascii_to_rad50(lo))
}

/// Decodes two RAD-50 words into a trimmed six-character filename.
pub fn rad50_pair_to_ascii(words: (u16, u16)) -> Result<String, Rad50Error> {
    let a = rad50_to_ascii(words.0)?;
    let b = rad50_to_ascii(words.1)?;
    let mut buf = [b' '; 6];
    buf[0..3].copy_from_slice(&a);
    buf[3..6].copy_from_slice(&b);
    Ok(std::str::from_utf8(&buf).unwrap_or("").trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_three_char_combination_over_the_alphabet() {
        for &a in ALPHABET {
            for &b in ALPHABET {
                for &c in ALPHABET {
                    let word = ascii_to_rad50(&[a, b, c]);
                    let decoded = rad50_to_ascii(word).unwrap();
                    assert_eq!(decoded, [a, b, c]);
                }
            }
        }
    }

    #[test]
    fn maps_unknown_characters_to_space() {
        let word = ascii_to_rad50(b"a_9");
        let decoded = rad50_to_ascii(word).unwrap();
        assert_eq!(decoded, [b'A', b' ', b'9']);
    }

    #[test]
    fn pads_short_input_with_spaces() {
        let word = ascii_to_rad50(b"A");
        assert_eq!(rad50_to_ascii(word).unwrap(), [b'A', b' ', b' ']);
    }

    #[test]
    fn six_char_name_round_trips() {
        let (hi, lo) = ascii_to_rad50_pair(b"FOOBAR");
        let name = rad50_pair_to_ascii((hi, lo)).unwrap();
        assert_eq!(name, "FOOBAR");
    }

    #[test]
    fn invalid_word_is_rejected() {
        assert!(rad50_to_ascii(0xFFFF).is_err());
    }
}
