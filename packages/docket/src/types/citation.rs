//! Citations produced by analysis and resolved by the verifier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CitationError;
use crate::types::document::SourceIdentifier;

/// Verification state of a citation.
///
/// Moves only from `Pending` to one of the three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStatus {
    Pending,

    /// Quote found in the source at or above the threshold. Display-safe.
    Verified,

    /// Source available but the quote is not in it
    Rejected,

    /// Source text unavailable; flagged for human review
    Unverifiable,
}

impl CitationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Unverifiable => "unverifiable",
        }
    }
}

impl fmt::Display for CitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the source the best match was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// 1-based page number, when the extraction reported page breaks
    pub page: Option<u32>,

    /// Byte offset of the match start in the extracted text
    pub offset: usize,
}

/// A claim as proposed by the analysis collaborator, before verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateClaim {
    pub claim_text: String,
    pub quoted_span: String,
    pub source_identifier: SourceIdentifier,
}

/// A machine-produced claim with a quoted span attributed to one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    claim_text: String,
    quoted_span: String,
    source_identifier: SourceIdentifier,
    similarity_score: f64,
    status: CitationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    locator: Option<Locator>,
}

impl Citation {
    /// A new citation awaiting verification.
    pub fn pending(
        claim_text: impl Into<String>,
        quoted_span: impl Into<String>,
        source_identifier: SourceIdentifier,
    ) -> Self {
        Self {
            claim_text: claim_text.into(),
            quoted_span: quoted_span.into(),
            source_identifier,
            similarity_score: 0.0,
            status: CitationStatus::Pending,
            locator: None,
        }
    }

    pub fn claim_text(&self) -> &str {
        &self.claim_text
    }

    pub fn quoted_span(&self) -> &str {
        &self.quoted_span
    }

    pub fn source_identifier(&self) -> &SourceIdentifier {
        &self.source_identifier
    }

    pub fn similarity_score(&self) -> f64 {
        self.similarity_score
    }

    pub fn status(&self) -> CitationStatus {
        self.status
    }

    pub fn locator(&self) -> Option<&Locator> {
        self.locator.as_ref()
    }

    /// Only verified citations may be displayed.
    pub fn is_display_safe(&self) -> bool {
        self.status == CitationStatus::Verified
    }

    /// Move out of `Pending`. Only the verifier calls this.
    pub(crate) fn resolve(
        &mut self,
        status: CitationStatus,
        similarity_score: f64,
        locator: Option<Locator>,
    ) -> Result<(), CitationError> {
        if self.status.is_terminal() {
            return Err(CitationError::AlreadyResolved {
                status: self.status.to_string(),
            });
        }
        self.status = status;
        self.similarity_score = similarity_score;
        self.locator = locator;
        Ok(())
    }
}

impl From<CandidateClaim> for Citation {
    fn from(claim: CandidateClaim) -> Self {
        Citation::pending(claim.claim_text, claim.quoted_span, claim.source_identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation() -> Citation {
        Citation::pending(
            "The budget passed",
            "the budget was approved",
            SourceIdentifier::new("doc-1").unwrap(),
        )
    }

    #[test]
    fn test_new_citation_is_pending() {
        let c = citation();
        assert_eq!(c.status(), CitationStatus::Pending);
        assert!(!c.is_display_safe());
        assert_eq!(c.similarity_score(), 0.0);
    }

    #[test]
    fn test_resolve_is_one_way() {
        let mut c = citation();
        c.resolve(CitationStatus::Verified, 1.0, None).unwrap();
        assert!(c.is_display_safe());

        let err = c.resolve(CitationStatus::Rejected, 0.1, None).unwrap_err();
        assert_eq!(
            err,
            CitationError::AlreadyResolved {
                status: "verified".to_string()
            }
        );
        assert_eq!(c.status(), CitationStatus::Verified);
        assert_eq!(c.similarity_score(), 1.0);
    }

    #[test]
    fn test_candidate_claim_becomes_pending() {
        let json = r#"{"claim_text":"x","quoted_span":"y","source_identifier":"doc-9"}"#;
        let claim: CandidateClaim = serde_json::from_str(json).unwrap();
        let c = Citation::from(claim);
        assert_eq!(c.status(), CitationStatus::Pending);
        assert_eq!(c.source_identifier().as_str(), "doc-9");
    }
}
