//! # Authority Response Code Tables
//!
//! The Authority speaks a different vocabulary on each endpoint. Every
//! response family has its own table mapping raw codes into the shared
//! outcome space of [`SubmissionState`]:
//!
//! | Family       | Codes                              | Source                         |
//! |--------------|------------------------------------|--------------------------------|
//! | `upload`     | numeric (`0`, `1`, `2`, ...)       | synchronous upload acknowledgement |
//! | `batch`      | three letters (`EPR`, `RCT`, ...)  | asynchronous batch status      |
//! | `document`   | three letters (`DOK`, `FAU`, ...)  | per-document status            |
//! | `acceptance` | numeric (`0`, `1`, `2`)            | counterparty notices           |
//!
//! A code missing from its table is never guessed: lookups return `None`
//! and the parser surfaces [`AuthorityError::UnknownCode`](crate::AuthorityError::UnknownCode).

use dte_state::{CounterpartyResponse, Outcome, SubmissionState};

use SubmissionState::{Accepted, AcceptedWithDiscrepancies, NotFound, Rejected, Sent};

/// Response family a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeFamily {
    Upload,
    Batch,
    Document,
    Acceptance,
}

impl CodeFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Batch => "batch",
            Self::Document => "document",
            Self::Acceptance => "acceptance",
        }
    }
}

// ─── Upload acknowledgement ─────────────────────────────────────────────

const UPLOAD_CODES: &[(&str, SubmissionState, &str)] = &[
    ("0", Sent, "upload received"),
    ("1", Rejected, "sender lacks permission to submit"),
    ("2", Rejected, "signature error"),
    ("3", Rejected, "sender tax id does not match certificate"),
    ("5", Rejected, "authentication failed"),
    ("6", Rejected, "company not authorized for electronic documents"),
    ("7", Rejected, "schema validation error"),
    ("8", Rejected, "batch size exceeded"),
    ("9", Rejected, "duplicate submission fingerprint with different content"),
    ("99", Rejected, "upload rejected"),
];

// ─── Batch status ───────────────────────────────────────────────────────

const BATCH_CODES: &[(&str, SubmissionState, &str)] = &[
    ("REC", Sent, "batch received"),
    ("SOK", Sent, "schema validated"),
    ("CRT", Sent, "cover sheet validated"),
    ("FOK", Sent, "batch signature validated"),
    ("PRD", Sent, "batch in process"),
    ("EPR", Sent, "batch processed"),
    ("RPR", AcceptedWithDiscrepancies, "accepted with discrepancies"),
    ("RLV", AcceptedWithDiscrepancies, "accepted with warnings"),
    ("RCH", Rejected, "rejected: invalid character set"),
    ("RCO", Rejected, "rejected: inconsistent content"),
    ("RFR", Rejected, "rejected: signature error"),
    ("RSC", Rejected, "rejected: schema error"),
    ("RCT", Rejected, "rejected: cover sheet error"),
    ("RPT", Rejected, "rejected: repeated batch"),
    ("VOF", NotFound, "tracking id not found"),
];

// ─── Document status ────────────────────────────────────────────────────

const DOCUMENT_CODES: &[(&str, SubmissionState, &str)] = &[
    ("PRO", Sent, "document in process"),
    ("DOK", Accepted, "document received and valid"),
    ("MMC", AcceptedWithDiscrepancies, "amount modified by a credit note"),
    ("TMD", AcceptedWithDiscrepancies, "text modified by a debit note"),
    ("DNK", Rejected, "document data does not match authority records"),
    ("FAN", Rejected, "document voided"),
    ("EMP", Rejected, "issuer not authorized for electronic documents"),
    ("TMC", Rejected, "document cancelled by a credit note"),
    ("FAU", NotFound, "document not received"),
    ("FNA", NotFound, "document not authorized"),
];

// ─── Counterparty acceptance ────────────────────────────────────────────

const ACCEPTANCE_CODES: &[(&str, CounterpartyResponse, &str)] = &[
    ("0", CounterpartyResponse::Accepted, "accepted"),
    (
        "1",
        CounterpartyResponse::AcceptedWithDiscrepancies,
        "accepted with discrepancies",
    ),
    ("2", CounterpartyResponse::Rejected, "rejected"),
];

fn lookup(table: &[(&str, SubmissionState, &'static str)], code: &str) -> Option<(SubmissionState, &'static str)> {
    table
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, state, detail)| (*state, *detail))
}

/// Normalize a code of the given family.
///
/// `detail` is the Authority's own message when it sent one; otherwise the
/// table's description is used. Acceptance codes are not submission states;
/// use [`acceptance`] for those.
pub fn normalize(family: CodeFamily, code: &str, detail: Option<&str>) -> Option<Outcome> {
    let code = code.trim();
    let (state, default_detail) = match family {
        CodeFamily::Upload => lookup(UPLOAD_CODES, code)?,
        CodeFamily::Batch => lookup(BATCH_CODES, code)?,
        CodeFamily::Document => lookup(DOCUMENT_CODES, code)?,
        CodeFamily::Acceptance => return None,
    };
    let detail = match detail.map(str::trim) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => default_detail.to_string(),
    };
    Some(Outcome::new(state, code, detail))
}

/// Map a counterparty acceptance code.
pub fn acceptance(code: &str) -> Option<(CounterpartyResponse, &'static str)> {
    ACCEPTANCE_CODES
        .iter()
        .find(|(c, _, _)| *c == code.trim())
        .map(|(_, response, detail)| (*response, *detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_zero_is_sent() {
        let o = normalize(CodeFamily::Upload, "0", None).unwrap();
        assert_eq!(o.state, Sent);
        assert_eq!(o.code, "0");
    }

    #[test]
    fn upload_two_is_signature_error() {
        let o = normalize(CodeFamily::Upload, "2", None).unwrap();
        assert_eq!(o.state, Rejected);
        assert_eq!(o.detail, "signature error");
    }

    #[test]
    fn authority_detail_wins_over_table_text() {
        let o = normalize(CodeFamily::Upload, "7", Some("  line 3: bad element ")).unwrap();
        assert_eq!(o.detail, "line 3: bad element");
        let o = normalize(CodeFamily::Upload, "7", Some("   ")).unwrap();
        assert_eq!(o.detail, "schema validation error");
    }

    #[test]
    fn dok_is_accepted() {
        assert_eq!(normalize(CodeFamily::Document, "DOK", None).unwrap().state, Accepted);
    }

    #[test]
    fn same_code_means_different_things_per_family() {
        assert!(normalize(CodeFamily::Batch, "DOK", None).is_none());
        assert!(normalize(CodeFamily::Document, "EPR", None).is_none());
        assert_eq!(normalize(CodeFamily::Batch, "RPR", None).unwrap().state, AcceptedWithDiscrepancies);
    }

    #[test]
    fn unknown_codes_are_not_guessed() {
        assert!(normalize(CodeFamily::Upload, "4", None).is_none());
        assert!(normalize(CodeFamily::Batch, "XYZ", None).is_none());
        assert!(normalize(CodeFamily::Acceptance, "0", None).is_none());
        assert!(acceptance("3").is_none());
    }

    #[test]
    fn every_table_maps_into_reachable_states() {
        for (code, state, _) in UPLOAD_CODES {
            assert!(
                SubmissionState::Pending.can_transition_to(*state),
                "upload code {code} maps to unreachable {state}"
            );
        }
        for (code, state, _) in BATCH_CODES.iter().chain(DOCUMENT_CODES) {
            assert!(
                SubmissionState::Sent.can_transition_to(*state),
                "status code {code} maps to unreachable {state}"
            );
        }
    }

    #[test]
    fn acceptance_table() {
        assert_eq!(acceptance("0").unwrap().0, CounterpartyResponse::Accepted);
        assert_eq!(acceptance("1").unwrap().0, CounterpartyResponse::AcceptedWithDiscrepancies);
        assert_eq!(acceptance("2").unwrap().0, CounterpartyResponse::Rejected);
    }
}
