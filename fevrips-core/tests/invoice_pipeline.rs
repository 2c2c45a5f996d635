use fevrips_core::config::InvoiceConfig;
use fevrips_core::invoice::model::PLACEHOLDER;
use fevrips_core::invoice::render::ReportModel;
use fevrips_core::invoice::{self, extract_invoice, unwrap_escaped_block, RenderOptions};
use tempfile::TempDir;

const ATTACHED_DOCUMENT: &str = include_str!("fixtures/attached_document.xml");

#[test]
fn envelope_yields_the_inner_invoice_not_the_envelope() {
    let invoice = extract_invoice(ATTACHED_DOCUMENT).expect("fixture should extract");

    assert_eq!(invoice.number, "1SE2");
    assert_eq!(invoice.issue_date, "2024-02-29");
    assert_eq!(invoice.issue_time, "10:41:27-05:00");
    assert_eq!(invoice.currency, "COP");
    assert!(invoice.unique_id.starts_with("806d488ca9b7"));
    assert_eq!(invoice.unique_id.len(), 96);
    assert_eq!(invoice.validation.authorization, "18764028267127");
    assert!(invoice.validation.qr_code.starts_with("NumFac: 1SE2"));

    let issuer = invoice.issuer.as_ref().expect("issuer");
    assert_eq!(issuer.name, "COMERCIALIZADORA LA ISABELA");
    assert_eq!(issuer.tax_id, "530520110");
    assert_eq!(issuer.address, "Calle 41 No. 13-04 Piso 4");
    assert_eq!(issuer.city, "Bogotá D.C.");
    assert_eq!(issuer.phone.as_deref(), Some("5946161"));

    let recipient = invoice.recipient.as_ref().expect("recipient");
    assert_eq!(recipient.name, "EPS");
    assert_eq!(recipient.city, "Pasto");
    assert_eq!(recipient.phone, None);
    assert_eq!(recipient.email, None);

    let lines: Vec<(&str, &str)> = invoice
        .lines
        .iter()
        .map(|l| (l.id.as_str(), l.line_total.as_str()))
        .collect();
    assert_eq!(lines, [("1", "65700.0"), ("2", "62700.0"), ("3", "204604.0")]);
    assert_eq!(
        invoice.lines[2].description,
        "CUPS:873210 - RADIOGRAFÍA DE ANTEBRAZO"
    );
}

#[test]
fn unwrapped_payload_extracts_to_the_same_invoice() {
    let inner = unwrap_escaped_block(ATTACHED_DOCUMENT).expect("fixture has an escaped block");
    assert_eq!(
        extract_invoice(inner).unwrap(),
        extract_invoice(ATTACHED_DOCUMENT).unwrap()
    );
}

#[test]
fn missing_issuer_phone_reads_as_placeholder() {
    let without_phone = ATTACHED_DOCUMENT.replace("<cbc:Telephone>5946161</cbc:Telephone>", "");
    let invoice = extract_invoice(&without_phone).unwrap();
    assert_eq!(
        invoice.issuer.unwrap().phone.as_deref(),
        Some(PLACEHOLDER)
    );
}

#[test]
fn fixture_totals_render_as_currency() {
    let invoice = extract_invoice(ATTACHED_DOCUMENT).unwrap();
    let model = ReportModel::build(&invoice, &RenderOptions::default()).unwrap();

    let totals: Vec<(&str, &str, bool)> = model
        .totals
        .iter()
        .map(|r| (r.label, r.amount.as_str(), r.emphasized))
        .collect();
    assert_eq!(
        totals,
        [
            ("Subtotal", "$333,004.00", false),
            ("Total incl. tax", "$333,004.00", false),
            ("TOTAL", "$300,000.00", true),
        ]
    );
    assert_eq!(model.items[1].unit_price, "$62,700.00");
    assert!(model.items[1].description.ends_with("..."));
    assert_eq!(model.items[1].description.chars().count(), 83);
}

#[test]
fn run_writes_a_timestamped_pdf_and_summarises() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("attached.xml");
    std::fs::write(&input, ATTACHED_DOCUMENT).unwrap();
    let output_dir = dir.path().join("reports");

    let summary = invoice::run(&InvoiceConfig {
        input,
        output_dir: output_dir.clone(),
        render: RenderOptions::default(),
    })
    .expect("run should succeed");

    assert_eq!(summary.number, "1SE2");
    assert_eq!(summary.issuer, "COMERCIALIZADORA LA ISABELA");
    assert_eq!(summary.recipient, "EPS");
    assert_eq!(summary.payable, "$300,000.00");

    assert_eq!(summary.report.parent(), Some(output_dir.as_path()));
    let name = summary.report.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("factura_1SE2_"), "{name}");
    assert!(name.ends_with(".pdf"), "{name}");
    // factura_1SE2_YYYYmmdd_HHMMSS.pdf
    assert_eq!(name.len(), "factura_1SE2_".len() + 15 + ".pdf".len());

    let bytes = std::fs::read(&summary.report).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn malformed_payload_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.xml");
    std::fs::write(&input, "<![CDATA[<Invoice><cbc:ID>1</Invoice>]]>").unwrap();

    let err = invoice::run(&InvoiceConfig {
        input,
        output_dir: dir.path().join("reports"),
        render: RenderOptions::default(),
    })
    .unwrap_err();

    assert!(matches!(err, invoice::InvoiceError::Extract(_)), "{err}");
    assert!(!dir.path().join("reports").exists());
}
