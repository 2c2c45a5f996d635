use serde::Serialize;

/// Stand-in for any text field the document does not carry.
pub const PLACEHOLDER: &str = "N/A";
/// Currency assumed when the document names none.
pub const DEFAULT_CURRENCY: &str = "COP";
/// Stand-in for missing amounts and quantities.
pub const ZERO: &str = "0";

/// An electronic invoice as read from the innermost document.
///
/// Amounts stay as the decimal strings found in the markup; they are only
/// parsed when the report is rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub number: String,
    pub issue_date: String,
    pub issue_time: String,
    /// CUFE: the unique invoice code assigned by the tax authority.
    pub unique_id: String,
    pub currency: String,
    pub issuer: Option<Party>,
    pub recipient: Option<Party>,
    pub totals: Option<Totals>,
    pub lines: Vec<InvoiceLine>,
    pub validation: ValidationStamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Party {
    pub name: String,
    pub tax_id: String,
    pub address: String,
    pub city: String,
    /// Only read for the issuer.
    pub phone: Option<String>,
    /// Only read for the issuer.
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub subtotal: String,
    pub tax_inclusive: String,
    pub payable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceLine {
    pub id: String,
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub line_total: String,
}

/// Authorization and verification references. Carried through as-is, never checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationStamp {
    pub authorization: String,
    pub qr_code: String,
}
