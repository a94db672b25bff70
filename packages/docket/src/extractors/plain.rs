//! Plain-text extraction with form-feed page breaks.

use crate::traits::text::TextExtractor;
use crate::types::text::{ExtractedText, PageSpan};

/// Decodes bytes as UTF-8 (lossy) and treats `\f` as a page break.
///
/// This matches the output of `pdftotext`, which separates pages with form
/// feeds. Text without form feeds is a single page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> ExtractedText {
        let text = String::from_utf8_lossy(bytes).into_owned();

        let mut pages = vec![PageSpan { page: 1, start: 0 }];
        for (idx, _) in text.match_indices('\u{000C}') {
            let start = idx + 1;
            if start < text.len() {
                pages.push(PageSpan {
                    page: pages.len() as u32 + 1,
                    start,
                });
            }
        }

        ExtractedText::new(text).with_pages(pages)
    }
}
