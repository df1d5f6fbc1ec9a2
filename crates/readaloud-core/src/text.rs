//! Text segmentation for sequential playback.
//!
//! Splits a document into sentence-sized segments, one utterance each.
//! Handles Latin and CJK punctuation; newlines are always boundaries.

/// Latin sentence terminators; a boundary only when followed by whitespace or
/// end of line, so `3.14` and `e.g.x` stay intact.
const LATIN_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Full-width terminators; a boundary immediately.
const CJK_TERMINATORS: [char; 6] = ['。', '！', '？', '；', '…', '．'];

/// Closing quotes and brackets that belong to the sentence before them.
const CLOSERS: [char; 14] = [
    '"', '\'', ')', ']', '”', '’', '）', '」', '』', '】', '》', '〉', '〕', '］',
];

/// Split `text` into trimmed, non-empty sentence segments.
///
/// Runs of terminators (`?!`, `……`) stay together, and closing quotes or
/// brackets directly after a terminator are kept with that sentence.
#[must_use]
pub fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();

    for line in text.lines() {
        split_line(line, &mut segments);
    }

    segments
}

fn split_line(line: &str, out: &mut Vec<String>) {
    let chars: Vec<char> = line.chars().collect();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        current.push(c);
        i += 1;

        let latin = LATIN_TERMINATORS.contains(&c);
        let cjk = CJK_TERMINATORS.contains(&c);
        if !latin && !cjk {
            continue;
        }

        // Absorb trailing terminators and closers
        let mut saw_cjk = cjk;
        while i < chars.len() {
            let next = chars[i];
            if LATIN_TERMINATORS.contains(&next) || CJK_TERMINATORS.contains(&next) {
                saw_cjk |= CJK_TERMINATORS.contains(&next);
            } else if !CLOSERS.contains(&next) {
                break;
            }
            current.push(next);
            i += 1;
        }

        let at_boundary = chars.get(i).is_none_or(|next| next.is_whitespace());
        if saw_cjk || at_boundary {
            push_segment(&mut current, out);
        }
    }

    push_segment(&mut current, out);
}

fn push_segment(current: &mut String, out: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_sentences() {
        let segments = split_segments("Hello world. How are you? Fine!");
        assert_eq!(segments, vec!["Hello world.", "How are you?", "Fine!"]);
    }

    #[test]
    fn test_decimal_point_is_not_a_boundary() {
        let segments = split_segments("Pi is 3.14 roughly. Yes.");
        assert_eq!(segments, vec!["Pi is 3.14 roughly.", "Yes."]);
    }

    #[test]
    fn test_cjk_sentences_split_without_spaces() {
        let segments = split_segments("你好。世界！今天天气怎么样？");
        assert_eq!(segments, vec!["你好。", "世界！", "今天天气怎么样？"]);
    }

    #[test]
    fn test_closing_quote_stays_with_sentence() {
        let segments = split_segments("他说：“走吧。”我们就走了。");
        assert_eq!(segments, vec!["他说：“走吧。”", "我们就走了。"]);

        let segments = split_segments("She said \"stop!\" Then left.");
        assert_eq!(segments, vec!["She said \"stop!\"", "Then left."]);
    }

    #[test]
    fn test_terminator_runs_stay_together() {
        let segments = split_segments("Really?! Yes…… 好的");
        assert_eq!(segments, vec!["Really?!", "Yes……", "好的"]);
    }

    #[test]
    fn test_newlines_are_boundaries() {
        let segments = split_segments("Title\n\nFirst line\r\nsecond line.");
        assert_eq!(segments, vec!["Title", "First line", "second line."]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_segments("").is_empty());
        assert!(split_segments("  \n\t\n").is_empty());
    }
}
