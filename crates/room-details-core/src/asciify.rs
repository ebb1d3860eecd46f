//! ASCII folding used for search keys and fallback identifiers.

use unicode_normalization::UnicodeNormalization;

/// `true` when every character is 7-bit ASCII. The empty string is ASCII.
pub fn is_ascii(text: &str) -> bool {
    text.is_ascii()
}

/// Fold `text` to its closest plain-ASCII form.
///
/// ASCII input is returned unchanged. Anything else is compatibility
/// decomposed (NFKD) so accents split off their base letter and keycap or
/// circled digits become plain digits. Stroked letters and ligatures are
/// mapped through a small table. Remaining non-ASCII scalars are dropped,
/// and whitespace left dangling at either end by dropped glyphs is trimmed.
pub fn asciified(text: &str) -> String {
    if text.is_ascii() {
        return text.to_owned();
    }

    let mut folded = String::with_capacity(text.len());
    for ch in text.nfkd() {
        if ch.is_ascii() {
            folded.push(ch);
        } else if let Some(replacement) = fold_latin_letter(ch) {
            folded.push_str(replacement);
        }
    }
    folded.trim().to_owned()
}

/// Latin letters that NFKD leaves whole because they carry a stroke or are
/// ligatures rather than base-plus-mark sequences.
fn fold_latin_letter(ch: char) -> Option<&'static str> {
    let replacement = match ch {
        'ø' => "o",
        'Ø' => "O",
        'ł' => "l",
        'Ł' => "L",
        'đ' => "d",
        'Đ' => "D",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'þ' => "th",
        'Þ' => "TH",
        'ð' => "d",
        'Ð' => "D",
        'ı' => "i",
        'ħ' => "h",
        'Ħ' => "H",
        _ => return None,
    };
    Some(replacement)
}

/// Method-style access to the folding helpers.
pub trait AsciiFold {
    fn is_ascii_text(&self) -> bool;
    fn asciified(&self) -> String;
}

impl AsciiFold for str {
    fn is_ascii_text(&self) -> bool {
        is_ascii(self)
    }

    fn asciified(&self) -> String {
        asciified(self)
    }
}
