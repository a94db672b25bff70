//! Extracted plain text with provenance locators.

use serde::{Deserialize, Serialize};

/// Start of a page within extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    /// 1-based page number
    pub page: u32,

    /// Byte offset where the page starts
    pub start: usize,
}

/// Plain text produced by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,

    /// Page starts in ascending order; empty when the source has no pages
    #[serde(default)]
    pub pages: Vec<PageSpan>,
}

impl ExtractedText {
    /// Text without page information.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pages: Vec::new(),
        }
    }

    pub fn with_pages(mut self, pages: Vec<PageSpan>) -> Self {
        self.pages = pages;
        self
    }

    /// Page containing the given byte offset.
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        let idx = self.pages.partition_point(|p| p.start <= offset);
        if idx == 0 {
            None
        } else {
            Some(self.pages[idx - 1].page)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_at() {
        let text = ExtractedText::new("aaaa\u{c}bbbb\u{c}cc").with_pages(vec![
            PageSpan { page: 1, start: 0 },
            PageSpan { page: 2, start: 5 },
            PageSpan { page: 3, start: 10 },
        ]);

        assert_eq!(text.page_at(0), Some(1));
        assert_eq!(text.page_at(4), Some(1));
        assert_eq!(text.page_at(5), Some(2));
        assert_eq!(text.page_at(11), Some(3));
    }

    #[test]
    fn test_page_at_without_pages() {
        assert_eq!(ExtractedText::new("abc").page_at(1), None);
    }
}
