//! Field extraction from a (possibly wrapped) UBL 2.1 invoice.
//!
//! The tax authority delivers invoices inside an `AttachedDocument` envelope,
//! with the invoice itself escaped in a CDATA section. [`extract_invoice`]
//! unwraps the first such section if there is one and otherwise parses the
//! text as the invoice directly. Only one layer is unwrapped: the second CDATA
//! section of an envelope carries the authority's application response, not
//! the invoice.
//!
//! Lookups are tolerant. A node that is absent, or present without text,
//! yields the documented placeholder for its field. Only markup that does not
//! parse is an error.

use std::sync::OnceLock;

use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::model::{
    Invoice, InvoiceLine, Party, Totals, ValidationStamp, DEFAULT_CURRENCY, PLACEHOLDER, ZERO,
};

pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
pub const CAC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
pub const STS: &str = "dian:gov:co:facturaelectronica:Structures-2-1";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invoice markup is not well-formed: {0}")]
    Markup(#[from] roxmltree::Error),
}

/// One step of a lookup path: namespace URI and local name.
type Step = (&'static str, &'static str);

fn escaped_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("escaped block pattern is valid")
    })
}

/// Content of the first CDATA section in `text`, if any.
pub fn unwrap_escaped_block(text: &str) -> Option<&str> {
    escaped_block_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn extract_invoice(text: &str) -> Result<Invoice, ExtractError> {
    let working = match unwrap_escaped_block(text) {
        Some(inner) => {
            debug!(len = inner.len(), "[INVOICE] Found escaped block, parsing its content");
            inner
        }
        None => {
            debug!("[INVOICE] No escaped block, parsing input directly");
            text
        }
    };

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(working.trim(), options)?;
    let root = doc.root_element();

    let unique_id = text_or(root, &[(CBC, "UUID")], PLACEHOLDER);
    if unique_id == PLACEHOLDER {
        warn!("[INVOICE] Document carries no unique identifier (UUID)");
    }

    let invoice = Invoice {
        number: text_or(root, &[(CBC, "ID")], PLACEHOLDER),
        issue_date: text_or(root, &[(CBC, "IssueDate")], PLACEHOLDER),
        issue_time: text_or(root, &[(CBC, "IssueTime")], PLACEHOLDER),
        unique_id,
        currency: text_or(root, &[(CBC, "DocumentCurrencyCode")], DEFAULT_CURRENCY),
        issuer: find(root, &[(CAC, "AccountingSupplierParty")]).map(|n| party(n, true)),
        recipient: find(root, &[(CAC, "AccountingCustomerParty")]).map(|n| party(n, false)),
        totals: find(root, &[(CAC, "LegalMonetaryTotal")]).map(totals),
        lines: descendants(root, (CAC, "InvoiceLine")).map(line).collect(),
        validation: ValidationStamp {
            authorization: text_or(root, &[(STS, "InvoiceAuthorization")], PLACEHOLDER),
            qr_code: text_or(root, &[(STS, "QRCode")], PLACEHOLDER),
        },
    };

    info!(
        number = %invoice.number,
        lines = invoice.lines.len(),
        issuer = invoice.issuer.is_some(),
        recipient = invoice.recipient.is_some(),
        "[INVOICE] Extracted invoice"
    );
    Ok(invoice)
}

fn party(node: Node, with_contact: bool) -> Party {
    Party {
        name: text_or(node, &[(CBC, "RegistrationName")], PLACEHOLDER),
        tax_id: text_or(node, &[(CBC, "CompanyID")], PLACEHOLDER),
        address: text_or(node, &[(CAC, "AddressLine"), (CBC, "Line")], PLACEHOLDER),
        city: text_or(node, &[(CBC, "CityName")], PLACEHOLDER),
        phone: with_contact.then(|| text_or(node, &[(CBC, "Telephone")], PLACEHOLDER)),
        email: with_contact.then(|| text_or(node, &[(CBC, "ElectronicMail")], PLACEHOLDER)),
    }
}

fn totals(node: Node) -> Totals {
    Totals {
        subtotal: text_or(node, &[(CBC, "LineExtensionAmount")], ZERO),
        tax_inclusive: text_or(node, &[(CBC, "TaxInclusiveAmount")], ZERO),
        payable: text_or(node, &[(CBC, "PayableAmount")], ZERO),
    }
}

fn line(node: Node) -> InvoiceLine {
    InvoiceLine {
        id: text_or(node, &[(CBC, "ID")], PLACEHOLDER),
        description: text_or(node, &[(CBC, "Description")], PLACEHOLDER),
        quantity: text_or(node, &[(CBC, "InvoicedQuantity")], ZERO),
        unit_price: text_or(node, &[(CBC, "PriceAmount")], ZERO),
        line_total: text_or(node, &[(CBC, "LineExtensionAmount")], ZERO),
    }
}

fn is(node: &Node, (ns, name): Step) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == Some(ns)
}

/// Elements below `node` (not `node` itself) matching `step`, in document order.
fn descendants<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    step: Step,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants().skip(1).filter(move |n| is(n, step))
}

/// First match of `path`: the first step searches all descendants, later steps direct children.
fn find<'a, 'input: 'a>(node: Node<'a, 'input>, path: &[Step]) -> Option<Node<'a, 'input>> {
    let (first, rest) = path.split_first()?;
    descendants(node, *first).find_map(|start| {
        rest.iter().try_fold(start, |current, step| {
            current.children().find(|c| is(c, *step))
        })
    })
}

fn text_or(node: Node, path: &[Step], default: &str) -> String {
    find(node, path)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE: &str = r#"<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"
        xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2"
        xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
        xmlns:sts="dian:gov:co:facturaelectronica:Structures-2-1">
  <sts:InvoiceAuthorization>18764028267127</sts:InvoiceAuthorization>
  <cbc:ID>FE-881</cbc:ID>
  <cbc:UUID schemeName="CUFE-SHA384">abc123</cbc:UUID>
  <cbc:IssueDate>2022-06-14</cbc:IssueDate>
  <cbc:IssueTime>10:36:05-05:00</cbc:IssueTime>
  <cac:AccountingSupplierParty><cac:Party>
    <cac:PartyTaxScheme>
      <cbc:RegistrationName>HOSPITAL SAN IGNACIO</cbc:RegistrationName>
      <cbc:CompanyID>860015536</cbc:CompanyID>
    </cac:PartyTaxScheme>
    <cac:PhysicalLocation><cac:Address>
      <cbc:CityName>Bogotá</cbc:CityName>
      <cac:AddressLine><cbc:Line>Cra 7 # 40-62</cbc:Line></cac:AddressLine>
    </cac:Address></cac:PhysicalLocation>
    <cac:Contact><cbc:ElectronicMail>factura@example.org</cbc:ElectronicMail></cac:Contact>
  </cac:Party></cac:AccountingSupplierParty>
  <cac:LegalMonetaryTotal>
    <cbc:LineExtensionAmount currencyID="COP">333004.00</cbc:LineExtensionAmount>
    <cbc:PayableAmount currencyID="COP">300000.00</cbc:PayableAmount>
  </cac:LegalMonetaryTotal>
  <cac:InvoiceLine>
    <cbc:ID>1</cbc:ID>
    <cbc:InvoicedQuantity unitCode="94">1.0</cbc:InvoicedQuantity>
    <cbc:LineExtensionAmount currencyID="COP">65700.0</cbc:LineExtensionAmount>
    <cac:Item><cbc:Description>CUPS:890702 - CONSULTA DE URGENCIAS</cbc:Description></cac:Item>
    <cac:Price><cbc:PriceAmount currencyID="COP">65700.0</cbc:PriceAmount></cac:Price>
  </cac:InvoiceLine>
  <cac:InvoiceLine>
    <cbc:ID>2</cbc:ID>
    <cac:Item><cbc:Description>   </cbc:Description></cac:Item>
  </cac:InvoiceLine>
</Invoice>"#;

    #[test]
    fn first_escaped_block_is_returned() {
        let text = "<a><![CDATA[ first ]]><b><![CDATA[second]]></b></a>";
        assert_eq!(unwrap_escaped_block(text), Some(" first "));
        assert_eq!(unwrap_escaped_block("<a/>"), None);
    }

    #[test]
    fn bare_invoice_is_parsed_directly() {
        let invoice = extract_invoice(INVOICE).unwrap();
        assert_eq!(invoice.number, "FE-881");
        assert_eq!(invoice.unique_id, "abc123");
        assert_eq!(invoice.issue_time, "10:36:05-05:00");
        assert_eq!(invoice.currency, DEFAULT_CURRENCY);
        assert_eq!(invoice.validation.authorization, "18764028267127");
        assert_eq!(invoice.validation.qr_code, PLACEHOLDER);
    }

    #[test]
    fn wrapped_and_bare_yield_the_same_invoice() {
        let wrapped = format!(
            "<AttachedDocument><cac:Attachment xmlns:cac=\"{CAC}\"><![CDATA[{INVOICE}]]></cac:Attachment></AttachedDocument>"
        );
        assert_eq!(extract_invoice(&wrapped).unwrap(), extract_invoice(INVOICE).unwrap());
    }

    #[test]
    fn missing_fields_read_as_placeholders() {
        let invoice = extract_invoice(INVOICE).unwrap();
        let issuer = invoice.issuer.unwrap();
        assert_eq!(issuer.name, "HOSPITAL SAN IGNACIO");
        assert_eq!(issuer.address, "Cra 7 # 40-62");
        assert_eq!(issuer.city, "Bogotá");
        assert_eq!(issuer.phone.as_deref(), Some(PLACEHOLDER));
        assert_eq!(issuer.email.as_deref(), Some("factura@example.org"));
        assert!(invoice.recipient.is_none());

        let totals = invoice.totals.unwrap();
        assert_eq!(totals.subtotal, "333004.00");
        assert_eq!(totals.tax_inclusive, ZERO);
        assert_eq!(totals.payable, "300000.00");
    }

    #[test]
    fn incomplete_lines_degrade_field_by_field() {
        let invoice = extract_invoice(INVOICE).unwrap();
        assert_eq!(invoice.lines.len(), 2);
        assert_eq!(invoice.lines[0].description, "CUPS:890702 - CONSULTA DE URGENCIAS");
        assert_eq!(invoice.lines[0].unit_price, "65700.0");
        let second = &invoice.lines[1];
        assert_eq!(second.id, "2");
        assert_eq!(second.description, PLACEHOLDER);
        assert_eq!(second.quantity, ZERO);
        assert_eq!(second.line_total, ZERO);
    }

    #[test]
    fn malformed_markup_is_an_error() {
        let err = extract_invoice("<![CDATA[<Invoice><cbc:ID>1</Invoice>]]>").unwrap_err();
        assert!(err.to_string().starts_with("invoice markup is not well-formed"));
    }
}
