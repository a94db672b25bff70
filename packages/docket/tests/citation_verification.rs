//! Integration tests for citation verification.
//!
//! Covers the verifier against static text and against text extracted from
//! documents ingested by the pipeline.

use futures::stream::{self, StreamExt};

use docket::fetchers::MockFetcher;
use docket::testing::{doc, MockAnalyzer, StaticTextProvider, TestPipeline};
use docket::{
    Analyzer, Citation, CitationStatus, CitationVerifier, ExtractedText, SourceIdentifier,
    SourceTextProvider, DEFAULT_SIMILARITY_THRESHOLD,
};

const MINUTES: &str = "CITY COUNCIL MINUTES\n\
    Council Member Ortiz moved to approve the consent agenda.\n\
    The motion carried 5-2 with Members Lee and Park opposed.";

fn id(s: &str) -> SourceIdentifier {
    SourceIdentifier::new(s).unwrap()
}

fn verifier() -> CitationVerifier<StaticTextProvider> {
    CitationVerifier::new(
        StaticTextProvider::new().with_text("minutes", ExtractedText::new(MINUTES)),
        DEFAULT_SIMILARITY_THRESHOLD,
    )
}

fn pending(quote: &str) -> Citation {
    Citation::pending("claim", quote, id("minutes"))
}

#[tokio::test]
async fn test_exact_substring_is_verified() {
    let resolved = verifier()
        .verify(pending("The motion carried 5-2"))
        .await
        .unwrap();

    assert_eq!(resolved.similarity_score(), 1.0);
    assert_eq!(resolved.status(), CitationStatus::Verified);
    assert!(resolved.is_display_safe());
}

#[tokio::test]
async fn test_paraphrase_is_rejected() {
    let resolved = verifier()
        .verify(pending("the council voted against the budget increase"))
        .await
        .unwrap();

    assert!(resolved.similarity_score() < 0.9);
    assert_eq!(resolved.status(), CitationStatus::Rejected);
    assert!(!resolved.is_display_safe());
}

#[tokio::test]
async fn test_formatting_differences_are_tolerated() {
    let resolved = verifier()
        .verify(pending("  the MOTION carried\n5\u{2013}2 with members lee "))
        .await
        .unwrap();
    assert_eq!(resolved.status(), CitationStatus::Verified);
}

#[tokio::test]
async fn test_single_character_change_depends_on_quote_length() {
    let v = verifier();

    // 1 edit in 8 chars: 0.875
    let short = v.verify(pending("motiom c")).await.unwrap();
    assert!((short.similarity_score() - 0.875).abs() < 1e-9);
    assert_eq!(short.status(), CitationStatus::Rejected);

    // 1 edit in 35 chars stays above the threshold
    let long = v
        .verify(pending("moved to approve the consemt agenda"))
        .await
        .unwrap();
    assert!(long.similarity_score() >= 0.9);
    assert_eq!(long.status(), CitationStatus::Verified);
}

#[tokio::test]
async fn test_more_edits_never_score_higher() {
    let v = verifier();
    let quotes = [
        "approve the consent agenda",
        "approve the consent agendx",
        "approve the cxnsent agendx",
        "apxrove the cxnsent agendx",
    ];

    let mut previous = 1.0;
    for quote in quotes {
        let score = v.verify(pending(quote)).await.unwrap().similarity_score();
        assert!(score <= previous, "{quote}: {score} > {previous}");
        previous = score;
    }
}

#[tokio::test]
async fn test_missing_source_is_unverifiable() {
    let v = verifier();
    let resolved = v
        .verify(Citation::pending("claim", "anything", id("agenda")))
        .await
        .unwrap();

    assert_eq!(resolved.status(), CitationStatus::Unverifiable);
    assert!(!resolved.is_display_safe());
}

#[tokio::test]
async fn test_stream_preserves_order() {
    let v = verifier();
    let citations = vec![
        pending("The motion carried"),
        pending("nothing like the source text at all"),
        Citation::pending("claim", "x", id("agenda")),
    ];

    let statuses: Vec<CitationStatus> = v
        .verify_stream(stream::iter(citations))
        .map(|r| r.unwrap().status())
        .collect()
        .await;

    assert_eq!(
        statuses,
        vec![
            CitationStatus::Verified,
            CitationStatus::Rejected,
            CitationStatus::Unverifiable
        ]
    );
}

#[tokio::test]
async fn test_ingested_documents_back_analyzer_claims() {
    let fetcher = MockFetcher::new().with_document("minutes", MINUTES.as_bytes().to_vec());
    let pipeline = TestPipeline::new(fetcher);
    assert!(pipeline.run(vec![doc("minutes")]).await.is_success());

    let provider = pipeline.text_provider();
    let text = provider.source_text(&id("minutes")).await.unwrap();
    let analyzer = MockAnalyzer::new()
        .with_claim("minutes", "The consent agenda passed", "The motion carried 5-2")
        .with_claim("minutes", "The vote was unanimous", "approved unanimously by all members");
    let citations = analyzer.analyze(&id("minutes"), &text).await.unwrap();

    let report = CitationVerifier::new(provider, DEFAULT_SIMILARITY_THRESHOLD)
        .verify_all(citations)
        .await;

    assert_eq!(report.verified, 1);
    assert_eq!(report.rejected, 1);
    let safe: Vec<_> = report.display_safe().map(|c| c.claim_text()).collect();
    assert_eq!(safe, vec!["The consent agenda passed"]);
}

#[tokio::test]
async fn test_threshold_is_configurable() {
    let strict = CitationVerifier::new(
        StaticTextProvider::new().with_text("minutes", ExtractedText::new(MINUTES)),
        1.0,
    );
    let resolved = strict
        .verify(pending("moved to approve the consemt agenda"))
        .await
        .unwrap();
    assert_eq!(resolved.status(), CitationStatus::Rejected);
}
