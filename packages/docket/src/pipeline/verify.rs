//! Citation verification.
//!
//! Every citation leaves `pending` through here. A citation is verified only
//! when its quoted span is found in the cached source text with a similarity
//! at or above the threshold; if the source text is unavailable it is marked
//! unverifiable instead of being trusted.

use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::CitationError;
use crate::pipeline::similarity::{best_match, normalize};
use crate::traits::text::SourceTextProvider;
use crate::types::citation::{Citation, CitationStatus, Locator};
use crate::types::document::SourceIdentifier;
use crate::types::text::ExtractedText;

/// Minimum similarity for a quote to count as found.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.90;

/// Result of scoring a quote against one source text.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteScore {
    pub score: f64,
    pub locator: Option<Locator>,
}

/// Counts and resolved citations from [`CitationVerifier::verify_all`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub verified: usize,
    pub rejected: usize,
    pub unverifiable: usize,
    pub citations: Vec<Citation>,
}

impl VerificationReport {
    fn push(&mut self, citation: Citation) {
        match citation.status() {
            CitationStatus::Verified => self.verified += 1,
            CitationStatus::Rejected => self.rejected += 1,
            CitationStatus::Unverifiable => self.unverifiable += 1,
            CitationStatus::Pending => {}
        }
        self.citations.push(citation);
    }

    /// Citations safe to show to users.
    pub fn display_safe(&self) -> impl Iterator<Item = &Citation> {
        self.citations.iter().filter(|c| c.is_display_safe())
    }
}

/// Resolves pending citations against cached source text.
pub struct CitationVerifier<P> {
    provider: P,
    threshold: f64,
}

impl<P: SourceTextProvider> CitationVerifier<P> {
    /// Create a verifier. The threshold is clamped to `[0, 1]`.
    pub fn new(provider: P, threshold: f64) -> Self {
        Self {
            provider,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Best similarity of `quote` anywhere in `text`.
    pub fn score(&self, quote: &str, text: &ExtractedText) -> QuoteScore {
        let source = normalize(&text.text);
        match best_match(&normalize(quote), &source) {
            Some(found) => {
                let offset = source.original_offset(found.start);
                QuoteScore {
                    score: found.score,
                    locator: Some(Locator {
                        page: text.page_at(offset),
                        offset,
                    }),
                }
            }
            None => QuoteScore {
                score: 0.0,
                locator: None,
            },
        }
    }

    /// Status for a score when the source text was available.
    pub fn classify(&self, score: f64) -> CitationStatus {
        if score >= self.threshold {
            CitationStatus::Verified
        } else {
            CitationStatus::Rejected
        }
    }

    /// Resolve one pending citation.
    pub async fn verify(&self, citation: Citation) -> Result<Citation, CitationError> {
        ensure_pending(&citation)?;
        let text = self.provider.source_text(citation.source_identifier()).await;
        self.resolve(citation, text.as_ref())
    }

    /// Resolve a batch, fetching each source's text once.
    ///
    /// Citations that are already resolved are kept as they are.
    pub async fn verify_all(&self, citations: Vec<Citation>) -> VerificationReport {
        let mut texts: HashMap<SourceIdentifier, Option<Arc<ExtractedText>>> = HashMap::new();
        let mut report = VerificationReport::default();

        for citation in citations {
            if citation.status().is_terminal() {
                debug!(
                    source_identifier = %citation.source_identifier(),
                    status = %citation.status(),
                    "citation already resolved"
                );
                report.push(citation);
                continue;
            }

            let source = citation.source_identifier().clone();
            let text = match texts.get(&source) {
                Some(text) => text.clone(),
                None => {
                    let text = self.provider.source_text(&source).await.map(Arc::new);
                    texts.insert(source, text.clone());
                    text
                }
            };

            match self.resolve(citation, text.as_deref()) {
                Ok(resolved) => report.push(resolved),
                Err(e) => warn!(error = %e, "citation could not be resolved"),
            }
        }

        info!(
            verified = report.verified,
            rejected = report.rejected,
            unverifiable = report.unverifiable,
            "citation verification complete"
        );
        report
    }

    /// Resolve citations as they arrive, in order.
    pub fn verify_stream<'a, S>(
        &'a self,
        citations: S,
    ) -> impl Stream<Item = Result<Citation, CitationError>> + 'a
    where
        S: Stream<Item = Citation> + 'a,
    {
        citations.then(move |citation| self.verify(citation))
    }

    fn resolve(
        &self,
        mut citation: Citation,
        text: Option<&ExtractedText>,
    ) -> Result<Citation, CitationError> {
        match text {
            Some(text) => {
                let QuoteScore { score, locator } = self.score(citation.quoted_span(), text);
                let status = self.classify(score);
                debug!(
                    source_identifier = %citation.source_identifier(),
                    score,
                    status = %status,
                    "citation scored"
                );
                let locator = if status == CitationStatus::Verified {
                    locator
                } else {
                    None
                };
                citation.resolve(status, score, locator)?;
            }
            None => {
                warn!(
                    source_identifier = %citation.source_identifier(),
                    "source text unavailable, citation needs review"
                );
                citation.resolve(CitationStatus::Unverifiable, 0.0, None)?;
            }
        }
        Ok(citation)
    }
}

fn ensure_pending(citation: &Citation) -> Result<(), CitationError> {
    if citation.status().is_terminal() {
        return Err(CitationError::AlreadyResolved {
            status: citation.status().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticTextProvider;
    use crate::types::text::PageSpan;

    fn citation(source: &str, quote: &str) -> Citation {
        Citation::pending("claim", quote, SourceIdentifier::new(source).unwrap())
    }

    fn verifier() -> CitationVerifier<StaticTextProvider> {
        let provider = StaticTextProvider::new().with_text(
            "minutes",
            ExtractedText::new("Call to order.\u{000C}The motion to adopt the budget carried 5-2.")
                .with_pages(vec![
                    PageSpan { page: 1, start: 0 },
                    PageSpan { page: 2, start: 15 },
                ]),
        );
        CitationVerifier::new(provider, DEFAULT_SIMILARITY_THRESHOLD)
    }

    #[test]
    fn test_classify_boundary() {
        let v = verifier();
        assert_eq!(v.classify(0.90), CitationStatus::Verified);
        assert_eq!(v.classify(0.8999), CitationStatus::Rejected);
    }

    #[tokio::test]
    async fn test_verified_citation_has_locator() {
        let v = verifier();
        let resolved = v
            .verify(citation("minutes", "the motion to adopt the budget carried"))
            .await
            .unwrap();

        assert_eq!(resolved.status(), CitationStatus::Verified);
        assert_eq!(resolved.similarity_score(), 1.0);
        let locator = resolved.locator().unwrap();
        assert_eq!(locator.page, Some(2));
        assert_eq!(locator.offset, 15);
    }

    #[tokio::test]
    async fn test_missing_source_is_unverifiable() {
        let resolved = verifier()
            .verify(citation("agenda", "anything"))
            .await
            .unwrap();
        assert_eq!(resolved.status(), CitationStatus::Unverifiable);
        assert!(!resolved.is_display_safe());
    }

    #[tokio::test]
    async fn test_resolved_citation_is_not_reverified() {
        let v = verifier();
        let resolved = v.verify(citation("agenda", "x")).await.unwrap();
        assert_eq!(
            v.verify(resolved).await.unwrap_err(),
            CitationError::AlreadyResolved {
                status: "unverifiable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_verify_all_fetches_each_source_once() {
        let v = verifier();
        let report = v
            .verify_all(vec![
                citation("minutes", "call to order"),
                citation("minutes", "the budget was rejected unanimously"),
                citation("agenda", "anything"),
            ])
            .await;

        assert_eq!(report.verified, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.unverifiable, 1);
        assert_eq!(report.display_safe().count(), 1);
        assert_eq!(v.provider().lookups("minutes"), 1);
    }
}
