//! # Grant Proofs
//!
//! The Authority hands out numbering capacity as a grant document. The
//! allocator stores the document verbatim with the range and reads the
//! fields it needs to cross-check the range the operator declared:
//!
//! ```text
//! <Grant>
//!   <Issuer>76086428-5</Issuer>
//!   <Kind>33</Kind>
//!   <From>100</From>
//!   <To>199</To>
//! </Grant>
//! ```
//!
//! The `<Grant>` element may be the root or nested inside a wrapper.

use dte_core::{DocumentKind, TaxId, XmlElement};

use crate::error::FolioError;

/// Fields read from a grant document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantProof {
    /// Taxpayer the range was granted to, when stated.
    pub issuer: Option<TaxId>,
    /// Document kind the range is for.
    pub kind: DocumentKind,
    /// First folio.
    pub from: u64,
    /// Last folio.
    pub to: u64,
}

impl GrantProof {
    /// Parse a grant document.
    pub fn parse(xml: &str) -> Result<Self, FolioError> {
        let root = XmlElement::parse(xml).map_err(|e| invalid(&e.to_string()))?;
        let grant = if root.name() == "Grant" {
            &root
        } else {
            root.descendant("Grant")
                .ok_or_else(|| invalid("no <Grant> element"))?
        };

        let issuer = grant
            .child_text("Issuer")
            .map(TaxId::new)
            .transpose()
            .map_err(|e| invalid(&e.to_string()))?;
        let code: u16 = number(grant, "Kind")?;
        let kind = DocumentKind::from_code(code).map_err(|e| invalid(&e.to_string()))?;
        let from = number(grant, "From")?;
        let to = number(grant, "To")?;
        if from == 0 || from > to {
            return Err(invalid(&format!("range [{from}, {to}] is empty")));
        }
        Ok(Self {
            issuer,
            kind,
            from,
            to,
        })
    }

    /// Fail unless the proof covers exactly `kind` and `[start, end]`.
    pub fn check_matches(&self, kind: DocumentKind, start: u64, end: u64) -> Result<(), FolioError> {
        if self.kind != kind {
            return Err(invalid(&format!(
                "grant is for kind {}, range declared for kind {kind}",
                self.kind
            )));
        }
        if self.from != start || self.to != end {
            return Err(invalid(&format!(
                "grant covers [{}, {}], declared range is [{start}, {end}]",
                self.from, self.to
            )));
        }
        Ok(())
    }
}

fn number<T: std::str::FromStr>(grant: &XmlElement, name: &str) -> Result<T, FolioError> {
    let text = grant
        .child_text(name)
        .ok_or_else(|| invalid(&format!("missing <{name}>")))?;
    text.parse()
        .map_err(|_| invalid(&format!("<{name}> is not a number: {text:?}")))
}

fn invalid(reason: &str) -> FolioError {
    FolioError::InvalidGrant(reason.to_string())
}
