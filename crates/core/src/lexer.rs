//! Filters source text down to the eight bytes the language cares about.

/// Is this one of the eight significant characters?
pub fn is_significant(byte: u8) -> bool {
    matches!(byte, b'>' | b'<' | b'+' | b'-' | b'.' | b',' | b'[' | b']')
}

/// Drops everything that is not a significant character. Every other
/// byte is commentary and has no effect on position or meaning. Never
/// fails, preserves order, and filtered text passes through unchanged.
pub fn lex(source: &[u8]) -> Vec<u8> {
    source.iter().copied().filter(|&b| is_significant(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_eight_characters() {
        let tokens = lex(b"add two: ++\nmove right > then output .");
        assert_eq!(tokens, b"++>.");
    }

    #[test]
    fn is_the_identity_on_filtered_input() {
        let once = lex(b"a+[b-]c,.<>");
        let twice = lex(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn output_is_a_subsequence_of_the_input() {
        let input: &[u8] = b"+x[-y]z.";
        let tokens = lex(input);
        let mut rest = input.iter();
        for token in &tokens {
            assert!(rest.any(|b| b == token));
        }
    }

    #[test]
    fn comment_only_input_lexes_to_nothing() {
        assert!(lex(b"nothing to see here 123").is_empty());
        assert!(lex(b"").is_empty());
    }
}
