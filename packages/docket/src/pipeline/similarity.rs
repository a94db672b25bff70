//! Fuzzy quote matching.
//!
//! Both sides are normalized (case, typographic quotes and dashes,
//! whitespace runs), then the quote is aligned against every substring of
//! the source with a semi-global edit distance. The score is
//! `1 - distance / quote_len`, so it lies in `[0, 1]`, equals 1 for an exact
//! (normalized) substring, and never increases as edits are added to the
//! quote.

/// Text after normalization, remembering where each char came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    chars: Vec<char>,

    /// Byte offset in the original text of each normalized char
    origins: Vec<usize>,
}

impl NormalizedText {
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    /// Byte offset in the original text for a normalized char index.
    ///
    /// Indices past the end map to the end of the last char's origin.
    pub fn original_offset(&self, index: usize) -> usize {
        match self.origins.get(index) {
            Some(offset) => *offset,
            None => self.origins.last().map(|o| o + 1).unwrap_or(0),
        }
    }
}

fn fold(c: char) -> Option<char> {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => Some('\''),
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => Some('"'),
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => Some('-'),
        '\u{00AD}' | '\u{200B}' | '\u{FEFF}' => None,
        _ => Some(c),
    }
}

/// Normalize text for comparison.
pub fn normalize(text: &str) -> NormalizedText {
    let mut chars = Vec::with_capacity(text.len());
    let mut origins = Vec::with_capacity(text.len());
    let mut pending_space: Option<usize> = None;

    for (offset, c) in text.char_indices() {
        if c.is_whitespace() {
            if !chars.is_empty() && pending_space.is_none() {
                pending_space = Some(offset);
            }
            continue;
        }
        let Some(folded) = fold(c) else {
            continue;
        };
        if let Some(space_at) = pending_space.take() {
            chars.push(' ');
            origins.push(space_at);
        }
        for lower in folded.to_lowercase() {
            chars.push(lower);
            origins.push(offset);
        }
    }

    NormalizedText { chars, origins }
}

/// Best alignment of a quote inside a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanMatch {
    pub score: f64,

    /// Start of the matched span (normalized char index into the source)
    pub start: usize,

    /// End of the matched span, exclusive
    pub end: usize,

    pub distance: usize,
}

/// Score a quote against a source, both already normalized.
///
/// Returns `None` for an empty quote, which matches nothing.
pub fn best_match(quote: &NormalizedText, source: &NormalizedText) -> Option<SpanMatch> {
    let q = &quote.chars;
    let s = &source.chars;
    let m = q.len();
    if m == 0 {
        return None;
    }

    if let Some(start) = find_exact(q, s) {
        return Some(SpanMatch {
            score: 1.0,
            start,
            end: start + m,
            distance: 0,
        });
    }

    // Columns over the source; row i is the cost of aligning q[..i].
    // Each cell carries the source index where its alignment starts.
    let mut prev: Vec<(usize, usize)> = (0..=m).map(|i| (i, 0)).collect();
    let mut cur: Vec<(usize, usize)> = vec![(0, 0); m + 1];
    let mut best = (m, 0usize, 0usize);

    for j in 1..=s.len() {
        cur[0] = (0, j);
        for i in 1..=m {
            let cost = usize::from(q[i - 1] != s[j - 1]);
            let substitute = (prev[i - 1].0 + cost, prev[i - 1].1);
            let skip_source = (prev[i].0 + 1, prev[i].1);
            let skip_quote = (cur[i - 1].0 + 1, cur[i - 1].1);

            let mut cell = substitute;
            if skip_source.0 < cell.0 {
                cell = skip_source;
            }
            if skip_quote.0 < cell.0 {
                cell = skip_quote;
            }
            cur[i] = cell;
        }

        let (distance, start) = cur[m];
        if distance < best.0 {
            best = (distance, start, j);
            if distance == 0 {
                break;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    let (distance, start, end) = best;
    Some(SpanMatch {
        score: score_for(distance, m),
        start,
        end,
        distance,
    })
}

fn score_for(distance: usize, quote_len: usize) -> f64 {
    (1.0 - distance as f64 / quote_len as f64).clamp(0.0, 1.0)
}

fn find_exact(needle: &[char], haystack: &[char]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Normalize both sides and return the best score, 0 for an empty quote.
pub fn similarity(quote: &str, source: &str) -> f64 {
    best_match(&normalize(quote), &normalize(source))
        .map(|m| m.score)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_folds_case_quotes_dashes_and_space() {
        let n = normalize("  The \u{201C}Council\u{201D}\n\t voted \u{2014} 5\u{2013}2  ");
        assert_eq!(n.as_string(), "the \"council\" voted - 5-2");
    }

    #[test]
    fn test_offsets_point_into_original() {
        let original = "Intro.\n\nThe  Council";
        let n = normalize(original);
        let s = n.as_string();
        let idx = s.find("the council").unwrap();
        let char_idx = s[..idx].chars().count();
        assert_eq!(&original[n.original_offset(char_idx)..], "The  Council");
    }

    #[test]
    fn test_exact_substring_scores_one() {
        assert_eq!(
            similarity("the motion carried", "After debate, THE MOTION   CARRIED unanimously."),
            1.0
        );
    }

    #[test]
    fn test_one_substitution() {
        let m = best_match(&normalize("abcdefgh"), &normalize("xx abcdefXh yy")).unwrap();
        assert_eq!(m.distance, 1);
        assert!((m.score - 0.875).abs() < 1e-9);
        assert_eq!(m.start, 3);
        assert_eq!(m.end, 11);
    }

    #[test]
    fn test_absent_quote_scores_low() {
        let score = similarity(
            "the budget was approved",
            "The council discussed zoning variances for the east side.",
        );
        assert!(score < 0.9, "score {score}");
    }

    #[test]
    fn test_empty_quote_matches_nothing() {
        assert!(best_match(&normalize("   "), &normalize("text")).is_none());
        assert_eq!(similarity("", "text"), 0.0);
    }

    #[test]
    fn test_empty_source_scores_zero() {
        assert_eq!(similarity("quote", ""), 0.0);
    }

    #[test]
    fn test_ties_pick_earliest_span() {
        let m = best_match(&normalize("abc"), &normalize("abd abe")).unwrap();
        assert_eq!(m.distance, 1);
        assert_eq!(m.start, 0);
        assert!(m.end <= 3);
    }

    proptest! {
        #[test]
        fn prop_score_in_unit_interval(quote in "[a-z ]{0,20}", source in "[a-z ]{0,60}") {
            let score = similarity(&quote, &source);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_substring_scores_one(source in "[a-z]{1,60}", a in 0usize..60, len in 1usize..20) {
            let start = a.min(source.len() - 1);
            let end = (start + len).min(source.len());
            let quote = &source[start..end];
            prop_assert_eq!(similarity(quote, &source), 1.0);
        }

        #[test]
        fn prop_extra_edits_never_raise_score(
            source in "[a-z]{20,60}",
            start in 0usize..10,
            flips in proptest::collection::vec(0usize..10, 1..4),
        ) {
            let quote: Vec<char> = source[start..start + 10].chars().collect();
            let mut previous = 1.0;
            let mut edited = quote.clone();
            for idx in flips {
                edited[idx] = '#';
                let s: String = edited.iter().collect();
                let score = similarity(&s, &source);
                prop_assert!(score <= previous + 1e-12);
                previous = score;
            }
        }
    }
}
