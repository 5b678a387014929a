//! # Document Canonicalizer
//!
//! Turns a validated [`DocumentDraft`] plus its allocated folio into a
//! [`DocumentEnvelope`]: the structured document and its canonical XML.
//!
//! ## Canonical layout
//!
//! ```text
//! <Document ID="K33F100">
//!   <Header>
//!     <Identification><Kind/><Folio/><IssueDate/></Identification>
//!     <Issuer><TaxId/><Name/><Address/>?</Issuer>
//!     <Receiver><TaxId/><Name/><Address/>?</Receiver>
//!     <Totals><Net/><Exempt/><TaxRate/><Tax/><Total/></Totals>
//!   </Header>
//!   <Detail line="1"><Description/><Quantity/><UnitPrice/><Exempt/>?<Amount/></Detail>*
//!   <Reference line="1"><Kind/><Folio/><Date/><Reason/><Note/>?</Reference>*
//! </Document>
//! ```
//!
//! Element order is fixed by this module and never depends on map
//! iteration or input ordering beyond the order of lines and references.

use chrono::NaiveDate;
use dte_core::{AccountId, CanonicalXml, DocumentKind, Folio, XmlElement};
use serde::Serialize;

use crate::draft::{DocumentDraft, LineItem, Party, Reference};
use crate::error::DocumentError;
use crate::totals::{TaxRate, Totals};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// An unsigned, numbered document ready for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentEnvelope {
    /// Issuing account.
    pub account: AccountId,
    /// Document kind.
    pub kind: DocumentKind,
    /// Allocated folio.
    pub folio: Folio,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Issuer.
    pub issuer: Party,
    /// Counterparty.
    pub receiver: Party,
    /// Line items.
    pub lines: Vec<LineItem>,
    /// References to corrected documents.
    pub references: Vec<Reference>,
    /// Tax rate applied to the net bucket.
    pub tax_rate: TaxRate,
    /// Recomputed totals.
    pub totals: Totals,
    /// Canonical XML of the `<Document>` element.
    #[serde(skip)]
    pub canonical: CanonicalXml,
}

impl DocumentEnvelope {
    /// The `ID` attribute of the `<Document>` element.
    pub fn document_ref(&self) -> String {
        document_ref(self.kind, self.folio)
    }

    /// The `<Document>` element tree.
    pub fn to_element(&self) -> XmlElement {
        document_element(
            self.kind,
            self.folio,
            self.issue_date,
            &self.issuer,
            &self.receiver,
            &self.lines,
            &self.references,
            self.tax_rate,
            &self.totals,
        )
    }
}

/// `K{kind}F{folio}`, e.g. `K33F100`.
pub fn document_ref(kind: DocumentKind, folio: Folio) -> String {
    format!("K{}F{}", kind.code(), folio.value())
}

/// Validate `draft`, number it with `folio`, and render canonical XML.
pub fn canonicalize(
    account: &AccountId,
    draft: &DocumentDraft,
    folio: Folio,
    rate: TaxRate,
) -> Result<DocumentEnvelope, DocumentError> {
    let totals = draft.validate(rate)?;
    let element = document_element(
        draft.kind,
        folio,
        draft.issue_date,
        &draft.issuer,
        &draft.receiver,
        &draft.lines,
        &draft.references,
        rate,
        &totals,
    );
    let canonical = CanonicalXml::render(&element)?;
    tracing::debug!(
        account = %account,
        kind = %draft.kind,
        folio = %folio,
        total = totals.total,
        "canonicalized document"
    );
    Ok(DocumentEnvelope {
        account: account.clone(),
        kind: draft.kind,
        folio,
        issue_date: draft.issue_date,
        issuer: draft.issuer.clone(),
        receiver: draft.receiver.clone(),
        lines: draft.lines.clone(),
        references: draft.references.clone(),
        tax_rate: rate,
        totals,
        canonical,
    })
}

#[allow(clippy::too_many_arguments)]
fn document_element(
    kind: DocumentKind,
    folio: Folio,
    issue_date: NaiveDate,
    issuer: &Party,
    receiver: &Party,
    lines: &[LineItem],
    references: &[Reference],
    rate: TaxRate,
    totals: &Totals,
) -> XmlElement {
    let header = XmlElement::new("Header")
        .child(
            XmlElement::new("Identification")
                .text_child("Kind", kind.code().to_string())
                .text_child("Folio", folio.value().to_string())
                .text_child("IssueDate", issue_date.format(DATE_FORMAT).to_string()),
        )
        .child(party_element("Issuer", issuer))
        .child(party_element("Receiver", receiver))
        .child(
            XmlElement::new("Totals")
                .text_child("Net", totals.net.to_string())
                .text_child("Exempt", totals.exempt.to_string())
                .text_child("TaxRate", rate.to_string())
                .text_child("Tax", totals.tax.to_string())
                .text_child("Total", totals.total.to_string()),
        );

    let mut document = XmlElement::new("Document")
        .attr("ID", document_ref(kind, folio))
        .child(header);

    for (i, line) in lines.iter().enumerate() {
        let mut detail = XmlElement::new("Detail")
            .attr("line", (i + 1).to_string())
            .text_child("Description", line.description.clone())
            .text_child("Quantity", line.quantity.to_string())
            .text_child("UnitPrice", line.unit_price.to_string());
        if line.exempt {
            detail = detail.text_child("Exempt", "1");
        }
        // Amounts were checked by validation; a recomputation cannot fail.
        let amount = line.amount().unwrap_or_default();
        document.push(detail.text_child("Amount", amount.to_string()));
    }

    for (i, reference) in references.iter().enumerate() {
        document.push(
            XmlElement::new("Reference")
                .attr("line", (i + 1).to_string())
                .text_child("Kind", reference.kind.code().to_string())
                .text_child("Folio", reference.folio.value().to_string())
                .text_child("Date", reference.date.format(DATE_FORMAT).to_string())
                .text_child("Reason", reference.reason.code().to_string())
                .optional_text_child("Note", reference.note.as_deref()),
        );
    }
    document
}

fn party_element(name: &str, party: &Party) -> XmlElement {
    XmlElement::new(name)
        .text_child("TaxId", party.tax_id.as_str())
        .text_child("Name", party.name.clone())
        .optional_text_child("Address", party.address.as_deref())
}

/// Identification read back from a `<Document>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    /// Document kind.
    pub kind: DocumentKind,
    /// Folio.
    pub folio: Folio,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Issuer tax id, as written.
    pub issuer_tax_id: String,
    /// Grand total.
    pub total: i64,
}

impl DocumentSummary {
    /// Read the identification and total from a `<Document>` element.
    pub fn from_element(document: &XmlElement) -> Result<Self, DocumentError> {
        let header = document
            .find("Header")
            .ok_or_else(|| malformed("missing <Header>"))?;
        let ident = header
            .find("Identification")
            .ok_or_else(|| malformed("missing <Identification>"))?;
        let kind_code: u16 = parse_field(ident, "Kind")?;
        let folio: u64 = parse_field(ident, "Folio")?;
        let date_text = ident
            .child_text("IssueDate")
            .ok_or_else(|| malformed("missing <IssueDate>"))?;
        let issue_date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT)
            .map_err(|e| malformed(&format!("bad <IssueDate> {date_text:?}: {e}")))?;
        let issuer_tax_id = header
            .find("Issuer")
            .and_then(|i| i.child_text("TaxId"))
            .ok_or_else(|| malformed("missing issuer <TaxId>"))?;
        let totals = header
            .find("Totals")
            .ok_or_else(|| malformed("missing <Totals>"))?;
        let total: i64 = parse_field(totals, "Total")?;
        Ok(Self {
            kind: DocumentKind::from_code(kind_code)?,
            folio: Folio::new(folio)?,
            issue_date,
            issuer_tax_id,
            total,
        })
    }
}

fn parse_field<T: std::str::FromStr>(parent: &XmlElement, name: &str) -> Result<T, DocumentError> {
    let text = parent
        .child_text(name)
        .ok_or_else(|| malformed(&format!("missing <{name}>")))?;
    text.parse()
        .map_err(|_| malformed(&format!("<{name}> is not a number: {text:?}")))
}

fn malformed(reason: &str) -> DocumentError {
    DocumentError::Malformed(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::tests::sample_draft;
    use crate::draft::ReferenceReason;
    use proptest::prelude::*;

    fn account() -> AccountId {
        AccountId::new("acme").unwrap()
    }

    #[test]
    fn canonical_layout() {
        let env = canonicalize(&account(), &sample_draft(), Folio::new(100).unwrap(), TaxRate::STANDARD).unwrap();
        assert_eq!(
            env.canonical.as_str(),
            "<Document ID=\"K33F100\"><Header>\
             <Identification><Kind>33</Kind><Folio>100</Folio><IssueDate>2026-03-02</IssueDate></Identification>\
             <Issuer><TaxId>76086428-5</TaxId><Name>Acme SpA</Name><Address>Av. Siempre Viva 742</Address></Issuer>\
             <Receiver><TaxId>11111111-1</TaxId><Name>Cliente Ltda</Name></Receiver>\
             <Totals><Net>10000</Net><Exempt>5000</Exempt><TaxRate>19.00</TaxRate><Tax>1900</Tax><Total>16900</Total></Totals>\
             </Header>\
             <Detail line=\"1\"><Description>Consulting</Description><Quantity>1</Quantity><UnitPrice>10000</UnitPrice><Amount>10000</Amount></Detail>\
             <Detail line=\"2\"><Description>Books</Description><Quantity>1</Quantity><UnitPrice>5000</UnitPrice><Exempt>1</Exempt><Amount>5000</Amount></Detail>\
             </Document>"
        );
        assert_eq!(env.to_element(), XmlElement::parse(env.canonical.as_str()).unwrap());
    }

    #[test]
    fn invalid_draft_fails_before_rendering() {
        let mut draft = sample_draft();
        draft.lines.clear();
        assert!(canonicalize(&account(), &draft, Folio::new(1).unwrap(), TaxRate::STANDARD).is_err());
    }

    #[test]
    fn references_are_rendered_in_order() {
        let mut draft = sample_draft();
        draft.kind = DocumentKind::CreditNote;
        draft.references.push(Reference {
            kind: DocumentKind::Invoice,
            folio: Folio::new(100).unwrap(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            reason: ReferenceReason::Void,
            note: Some("duplicate".to_string()),
        });
        let env = canonicalize(&account(), &draft, Folio::new(7).unwrap(), TaxRate::STANDARD).unwrap();
        assert!(env.canonical.as_str().ends_with(
            "<Reference line=\"1\"><Kind>33</Kind><Folio>100</Folio><Date>2026-03-01</Date>\
             <Reason>1</Reason><Note>duplicate</Note></Reference></Document>"
        ));
        assert_eq!(env.document_ref(), "K61F7");
    }

    #[test]
    fn summary_reads_back_identification() {
        let env = canonicalize(&account(), &sample_draft(), Folio::new(100).unwrap(), TaxRate::STANDARD).unwrap();
        let summary = DocumentSummary::from_element(&env.to_element()).unwrap();
        assert_eq!(summary.kind, DocumentKind::Invoice);
        assert_eq!(summary.folio.value(), 100);
        assert_eq!(summary.total, 16_900);
        assert_eq!(summary.issuer_tax_id, "76086428-5");
    }

    proptest! {
        #[test]
        fn canonicalization_is_deterministic(
            desc in "[A-Za-z][A-Za-z &<>]{0,19}",
            qty in 0i64..1000,
            price in 0i64..100_000,
            folio in 1u64..1_000_000,
        ) {
            let build = || {
                let mut draft = sample_draft();
                draft.lines[0].description = desc.clone();
                draft.lines[0].quantity = qty;
                draft.lines[0].unit_price = price;
                canonicalize(&account(), &draft, Folio::new(folio).unwrap(), TaxRate::STANDARD).unwrap()
            };
            let a = build();
            let b = build();
            prop_assert_eq!(a.canonical.as_bytes(), b.canonical.as_bytes());
        }
    }
}
