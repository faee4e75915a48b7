//! Confusable-character suggestions for the recovery path.
//!
//! When the scanner rejects a code point, it checks whether the character
//! merely *looks like* an ASCII character the author meant — smart quotes
//! pasted from a word processor, typographic dashes, fullwidth punctuation
//! — and if so, the diagnostic carries the ASCII suggestion instead of a
//! bare "invalid character".
//!
//! The table is keyed by code point (the scanner has already decoded the
//! UTF-8 sequence by the time it consults it) and sorted for binary search.

/// `(code point, ASCII suggestion)`, sorted by code point.
const CONFUSABLES: &[(u32, char)] = &[
    (0x00A6, '|'),  // broken bar
    (0x00B4, '\''), // acute accent
    (0x00B7, '.'),  // middle dot
    (0x00D7, '*'),  // multiplication sign
    (0x00F7, '/'),  // division sign
    (0x02C6, '^'),  // modifier letter circumflex accent
    (0x02DC, '~'),  // small tilde
    (0x2010, '-'),  // hyphen
    (0x2011, '-'),  // non-breaking hyphen
    (0x2012, '-'),  // figure dash
    (0x2013, '-'),  // en dash
    (0x2014, '-'),  // em dash
    (0x2015, '-'),  // horizontal bar
    (0x2018, '\''), // left single quotation mark
    (0x2019, '\''), // right single quotation mark
    (0x201B, '\''), // single high-reversed-9 quotation mark
    (0x201C, '"'),  // left double quotation mark
    (0x201D, '"'),  // right double quotation mark
    (0x201F, '"'),  // double high-reversed-9 quotation mark
    (0x2024, '.'),  // one dot leader
    (0x2032, '\''), // prime
    (0x2033, '"'),  // double prime
    (0x2044, '/'),  // fraction slash
    (0x2052, '%'),  // commercial minus sign
    (0x2212, '-'),  // minus sign
    (0x2215, '/'),  // division slash
    (0x2216, '\\'), // set minus
    (0x2217, '*'),  // asterisk operator
    (0x2223, '|'),  // divides
    (0x223C, '~'),  // tilde operator
    (0x2236, ':'),  // ratio
    (0x2264, '<'),  // less-than or equal to (often pasted for <=)
    (0x2265, '>'),  // greater-than or equal to
    (0x2296, '-'),  // circled minus
    (0x2297, '*'),  // circled times
    (0x2329, '<'),  // left-pointing angle bracket
    (0x232A, '>'),  // right-pointing angle bracket
    (0x3008, '<'),  // CJK left angle bracket
    (0x3009, '>'),  // CJK right angle bracket
    (0x301C, '~'),  // wave dash
    (0xFE68, '\\'), // small reverse solidus
    (0xFF01, '!'),  // fullwidth exclamation mark
    (0xFF04, '$'),  // fullwidth dollar sign
    (0xFF05, '%'),  // fullwidth percent sign
    (0xFF06, '&'),  // fullwidth ampersand
    (0xFF08, '('),  // fullwidth left parenthesis
    (0xFF09, ')'),  // fullwidth right parenthesis
    (0xFF0A, '*'),  // fullwidth asterisk
    (0xFF0B, '+'),  // fullwidth plus sign
    (0xFF0C, ','),  // fullwidth comma
    (0xFF0D, '-'),  // fullwidth hyphen-minus
    (0xFF0E, '.'),  // fullwidth full stop
    (0xFF0F, '/'),  // fullwidth solidus
    (0xFF1A, ':'),  // fullwidth colon
    (0xFF1B, ';'),  // fullwidth semicolon
    (0xFF1C, '<'),  // fullwidth less-than sign
    (0xFF1D, '='),  // fullwidth equals sign
    (0xFF1E, '>'),  // fullwidth greater-than sign
    (0xFF1F, '?'),  // fullwidth question mark
    (0xFF20, '@'),  // fullwidth commercial at
    (0xFF3B, '['),  // fullwidth left square bracket
    (0xFF3C, '\\'), // fullwidth reverse solidus
    (0xFF3D, ']'),  // fullwidth right square bracket
    (0xFF3E, '^'),  // fullwidth circumflex accent
    (0xFF5B, '{'),  // fullwidth left curly bracket
    (0xFF5C, '|'),  // fullwidth vertical line
    (0xFF5D, '}'),  // fullwidth right curly bracket
    (0xFF5E, '~'),  // fullwidth tilde
];

/// The ASCII character `cp` is commonly mistaken for, if any.
pub fn try_confusable_to_ascii(cp: u32) -> Option<char> {
    CONFUSABLES
        .binary_search_by_key(&cp, |&(found, _)| found)
        .ok()
        .map(|idx| CONFUSABLES[idx].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_unique() {
        for window in CONFUSABLES.windows(2) {
            assert!(window[0].0 < window[1].0, "table out of order at {:#X}", window[1].0);
        }
    }

    #[test]
    fn all_suggestions_are_ascii() {
        for &(cp, suggestion) in CONFUSABLES {
            assert!(suggestion.is_ascii(), "non-ASCII suggestion for {cp:#X}");
        }
    }

    #[test]
    fn smart_quotes_resolve() {
        assert_eq!(try_confusable_to_ascii(0x201C), Some('"'));
        assert_eq!(try_confusable_to_ascii(0x201D), Some('"'));
        assert_eq!(try_confusable_to_ascii(0x2019), Some('\''));
    }

    #[test]
    fn dashes_resolve_to_minus() {
        for cp in 0x2010..=0x2015 {
            assert_eq!(try_confusable_to_ascii(cp), Some('-'));
        }
        assert_eq!(try_confusable_to_ascii(0x2212), Some('-'));
    }

    #[test]
    fn unknown_code_points_return_none() {
        assert_eq!(try_confusable_to_ascii(u32::from(b'a')), None);
        assert_eq!(try_confusable_to_ascii(0x4E2D), None);
        assert_eq!(try_confusable_to_ascii(u32::MAX), None);
    }
}
