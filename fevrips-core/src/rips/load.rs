//! Sheet → record loading for the four RIPS sheets.
//!
//! Each loader checks the sheet's column schema first, then reads rows in
//! source order. Values go through [`coerce`] with the column's rule, so
//! dates, identifiers and blanks are normalised here and nowhere else.

use std::collections::HashSet;

use tracing::{debug, info};

use super::assemble::{ItemKind, LineItems, Orphan};
use super::coerce::{coerce, FormatRules, Scalar};
use super::model::{
    Consultation, PendingItem, Procedure, Services, Subject, Transaction, COLLECTION_CONCEPT,
    DEFAULT_ROUTE, NOTE_TYPE, NO_DISABILITY, OBLIGOR_DOCUMENT_TYPE, PROCEDURE_PURPOSE, USER_TYPE,
};
use crate::contract::{LoadError, Sheet};

pub const TRANSACTION_COLUMNS: &[&str] = &["numDocumentoIdObligado", "numNota", "codPrestador"];

pub const SUBJECT_COLUMNS: &[&str] = &[
    "tipoDocumento",
    "numDocumento",
    "fechaNacimiento",
    "codSexo",
    "PaisResidencia",
    "MunicipioResidencia",
    "ZonaResidencia",
    "PaisOrigen",
];

pub const CONSULTATION_COLUMNS: &[&str] = &[
    "IDPaciente",
    "fechaInicioAtencion",
    "CUPS",
    "codServicio",
    "finalidadTecnologiaSalud",
    "causaMotivoAtencion",
    "CIE10_Principal",
    "CIE10_relacionado1",
    "CIE10_relacionado2",
    "CIE10_relacionado3",
    "tipoDiagnosticoPrincipal",
];

pub const PROCEDURE_COLUMNS: &[&str] = &[
    "IDPaciente",
    "fechaInicioAtencion",
    "CUPS",
    "codServicio",
    "CIE10_Principal",
    "CIE10_relacionado",
];

/// Reads coerced values out of one row of a sheet.
struct RowReader<'a> {
    sheet: &'a Sheet,
    rules: &'a FormatRules,
    row: usize,
}

impl<'a> RowReader<'a> {
    fn new(sheet: &'a Sheet, rules: &'a FormatRules, row: usize) -> Self {
        Self { sheet, rules, row }
    }

    /// 1-based data row number used in diagnostics. The header row is not
    /// counted; blank rows are.
    fn line(&self) -> usize {
        self.row + 1
    }

    fn scalar(&self, column: &str) -> Result<Scalar, LoadError> {
        let cell = self.sheet.cell(self.row, column)?;
        coerce(cell, self.rules.format_for(column)).map_err(|e| LoadError::InvalidDate {
            sheet: self.sheet.name.clone(),
            row: self.line(),
            column: column.to_string(),
            value: e.0,
        })
    }

    fn text(&self, column: &str) -> Result<Option<String>, LoadError> {
        Ok(self.scalar(column)?.into_text())
    }

    fn required(&self, column: &str) -> Result<String, LoadError> {
        self.text(column)?.ok_or_else(|| LoadError::MissingValue {
            sheet: self.sheet.name.clone(),
            row: self.line(),
            column: column.to_string(),
        })
    }
}

/// The header record comes from the first data row of the transaction sheet.
pub fn load_transaction(sheet: &Sheet, rules: &FormatRules) -> Result<Transaction, LoadError> {
    sheet.require_columns(TRANSACTION_COLUMNS)?;
    let row = RowReader::new(sheet, rules, sheet.data_rows().next().unwrap_or(0));
    let transaction = Transaction {
        num_documento_id_obligado: row.required("numDocumentoIdObligado")?,
        num_nota: row.text("numNota")?,
        tipo_nota: NOTE_TYPE.to_string(),
        cod_prestador: row.text("codPrestador")?,
    };
    info!(
        obligor = %transaction.num_documento_id_obligado,
        note = transaction.num_nota.as_deref().unwrap_or("-"),
        "[RIPS] Loaded transaction header"
    );
    Ok(transaction)
}

pub fn load_subjects(sheet: &Sheet, rules: &FormatRules) -> Result<Vec<Subject>, LoadError> {
    sheet.require_columns(SUBJECT_COLUMNS)?;
    let mut seen = HashSet::new();
    let mut subjects = Vec::with_capacity(sheet.len());

    for i in sheet.data_rows() {
        let row = RowReader::new(sheet, rules, i);
        let id = row.required("numDocumento")?;
        if !seen.insert(id.clone()) {
            return Err(LoadError::DuplicateSubject {
                sheet: sheet.name.clone(),
                row: row.line(),
                id,
            });
        }
        subjects.push(Subject {
            tipo_documento_identificacion: row.text("tipoDocumento")?,
            num_documento_identificacion: id,
            tipo_usuario: USER_TYPE.to_string(),
            fecha_nacimiento: row.required("fechaNacimiento")?,
            cod_sexo: row.text("codSexo")?,
            cod_pais_residencia: row.text("PaisResidencia")?,
            cod_municipio_residencia: row.text("MunicipioResidencia")?,
            cod_zona_territorial_residencia: row.text("ZonaResidencia")?,
            incapacidad: NO_DISABILITY.to_string(),
            cod_pais_origen: row.text("PaisOrigen")?,
            consecutivo: subjects.len() + 1,
            servicios: Some(Services::empty()),
        });
    }

    info!(count = subjects.len(), "[RIPS] Loaded subjects");
    Ok(subjects)
}

/// Rows whose `IDPaciente` is blank or names no entry of `known` are set aside
/// as orphans before any other column is read, so their contents never fail
/// the load.
pub fn load_consultations(
    sheet: &Sheet,
    transaction: &Transaction,
    known: &HashSet<String>,
    rules: &FormatRules,
) -> Result<LineItems<Consultation>, LoadError> {
    sheet.require_columns(CONSULTATION_COLUMNS)?;
    let items = load_line_items(sheet, known, rules, ItemKind::Consultation, |row| {
        Ok(Consultation {
            cod_prestador: transaction.cod_prestador.clone(),
            fecha_inicio_atencion: row.required("fechaInicioAtencion")?,
            num_autorizacion: String::new(),
            cod_consulta: row.text("CUPS")?,
            via_ingreso_servicio_salud: DEFAULT_ROUTE.to_string(),
            modalidad_grupo_servicio_tec_sal: DEFAULT_ROUTE.to_string(),
            grupo_servicios: DEFAULT_ROUTE.to_string(),
            cod_servicio: row.scalar("codServicio")?,
            finalidad_tecnologia_salud: row.text("finalidadTecnologiaSalud")?,
            causa_motivo_atencion: row.text("causaMotivoAtencion")?,
            cod_diagnostico_principal: row.text("CIE10_Principal")?,
            cod_diagnostico_relacionado1: row.text("CIE10_relacionado1")?,
            cod_diagnostico_relacionado2: row.text("CIE10_relacionado2")?,
            cod_diagnostico_relacionado3: row.text("CIE10_relacionado3")?,
            tipo_diagnostico_principal: row.text("tipoDiagnosticoPrincipal")?,
            tipo_documento_identificacion: OBLIGOR_DOCUMENT_TYPE.to_string(),
            num_documento_identificacion: transaction.num_documento_id_obligado.clone(),
            vr_servicio: 0,
            valor_pago_moderador: 0,
            concepto_recaudo: COLLECTION_CONCEPT.to_string(),
            num_fev_pago_moderador: String::new(),
            consecutivo: 0,
        })
    })?;

    debug!(
        count = items.items.len(),
        orphans = items.orphans.len(),
        sheet = %sheet.name,
        "[RIPS] Read consultation rows"
    );
    Ok(items)
}

/// Same orphan handling as [`load_consultations`].
pub fn load_procedures(
    sheet: &Sheet,
    transaction: &Transaction,
    known: &HashSet<String>,
    rules: &FormatRules,
) -> Result<LineItems<Procedure>, LoadError> {
    sheet.require_columns(PROCEDURE_COLUMNS)?;
    let items = load_line_items(sheet, known, rules, ItemKind::Procedure, |row| {
        Ok(Procedure {
            cod_prestador: transaction.cod_prestador.clone(),
            fecha_inicio_atencion: row.required("fechaInicioAtencion")?,
            id_mipres: String::new(),
            num_autorizacion: String::new(),
            cod_procedimiento: row.text("CUPS")?,
            via_ingreso_servicio_salud: DEFAULT_ROUTE.to_string(),
            modalidad_grupo_servicio_tec_sal: DEFAULT_ROUTE.to_string(),
            grupo_servicios: DEFAULT_ROUTE.to_string(),
            cod_servicio: row.scalar("codServicio")?,
            finalidad_tecnologia_salud: PROCEDURE_PURPOSE.to_string(),
            tipo_documento_identificacion: OBLIGOR_DOCUMENT_TYPE.to_string(),
            num_documento_identificacion: transaction.num_documento_id_obligado.clone(),
            cod_diagnostico_principal: row.text("CIE10_Principal")?,
            cod_diagnostico_relacionado: row.text("CIE10_relacionado")?,
            cod_complicacion: None,
            vr_servicio: 0,
            concepto_recaudo: COLLECTION_CONCEPT.to_string(),
            valor_pago_moderador: 0,
            num_fev_pago_moderador: String::new(),
            consecutivo: 0,
        })
    })?;

    debug!(
        count = items.items.len(),
        orphans = items.orphans.len(),
        sheet = %sheet.name,
        "[RIPS] Read procedure rows"
    );
    Ok(items)
}

fn load_line_items<T>(
    sheet: &Sheet,
    known: &HashSet<String>,
    rules: &FormatRules,
    kind: ItemKind,
    read: impl Fn(&RowReader<'_>) -> Result<T, LoadError>,
) -> Result<LineItems<T>, LoadError> {
    let mut loaded = LineItems::default();

    for i in sheet.data_rows() {
        let row = RowReader::new(sheet, rules, i);
        let subject_id = row.text("IDPaciente")?;
        match subject_id {
            Some(id) if known.contains(&id) => loaded.items.push(PendingItem {
                subject_id: Some(id),
                source_row: row.line(),
                record: read(&row)?,
            }),
            other => loaded.orphans.push(Orphan::skipped(kind, other, row.line())),
        }
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Cell;

    fn sheet(name: &str, columns: &[&str], rows: Vec<Vec<Cell>>) -> Sheet {
        Sheet::new(name, columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    fn transaction() -> Transaction {
        Transaction {
            num_documento_id_obligado: "900123456".into(),
            num_nota: Some("N-7".into()),
            tipo_nota: NOTE_TYPE.into(),
            cod_prestador: Some("110010123401".into()),
        }
    }

    fn known(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn transaction_codes_are_strings() {
        let s = sheet(
            "TRANSACCION",
            TRANSACTION_COLUMNS,
            vec![vec![Cell::Float(900123456.0), Cell::Int(7), Cell::Float(110010123401.0)]],
        );
        let t = load_transaction(&s, &FormatRules::rips()).unwrap();
        assert_eq!(t.num_documento_id_obligado, "900123456");
        assert_eq!(t.num_nota.as_deref(), Some("7"));
        assert_eq!(t.cod_prestador.as_deref(), Some("110010123401"));
        assert_eq!(t.tipo_nota, "RS");
    }

    #[test]
    fn empty_transaction_sheet_reports_missing_value() {
        let s = sheet("TRANSACCION", TRANSACTION_COLUMNS, vec![]);
        let err = load_transaction(&s, &FormatRules::rips()).unwrap_err();
        assert!(matches!(err, LoadError::MissingValue { .. }), "{err}");
    }

    #[test]
    fn subjects_are_numbered_by_position() {
        let row = |id: i64| {
            vec![
                Cell::text("CC"),
                Cell::Int(id),
                Cell::text("1990-01-31"),
                Cell::text("F"),
                Cell::Int(170),
                Cell::Int(11001),
                Cell::text("01"),
                Cell::Int(170),
            ]
        };
        let s = sheet("USUARIOS", SUBJECT_COLUMNS, vec![row(11), row(22)]);
        let subjects = load_subjects(&s, &FormatRules::rips()).unwrap();
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[1].num_documento_identificacion, "22");
        assert_eq!(subjects[1].consecutivo, 2);
        assert_eq!(subjects[0].fecha_nacimiento, "1990-01-31");
        assert_eq!(subjects[0].cod_pais_residencia.as_deref(), Some("170"));
    }

    #[test]
    fn duplicate_subject_ids_are_rejected() {
        let row = || {
            let mut r = vec![Cell::text("CC"), Cell::text("42"), Cell::text("2000-05-05")];
            r.resize(SUBJECT_COLUMNS.len(), Cell::Empty);
            r
        };
        let s = sheet("USUARIOS", SUBJECT_COLUMNS, vec![row(), row()]);
        let err = load_subjects(&s, &FormatRules::rips()).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateSubject { row: 2, .. }), "{err}");
    }

    #[test]
    fn blank_related_diagnoses_are_null_not_text() {
        let s = sheet(
            "CONSULTAS",
            CONSULTATION_COLUMNS,
            vec![vec![
                Cell::Float(42.0),
                Cell::text("2025-09-02 08:30:00"),
                Cell::Int(890201),
                Cell::Int(328),
                Cell::Int(44),
                Cell::Int(38),
                Cell::text("J029"),
                Cell::text("nan"),
                Cell::Float(f64::NAN),
                Cell::Empty,
                Cell::Int(1),
            ]],
        );
        let items =
            load_consultations(&s, &transaction(), &known(&["42"]), &FormatRules::rips()).unwrap();
        assert!(items.orphans.is_empty());
        let item = &items.items[0];
        assert_eq!(item.subject_id.as_deref(), Some("42"));
        assert_eq!(item.record.fecha_inicio_atencion, "2025-09-02 08:30");
        assert_eq!(item.record.cod_consulta.as_deref(), Some("890201"));
        assert_eq!(item.record.cod_servicio, Scalar::Int(328));
        assert_eq!(item.record.cod_diagnostico_relacionado1, None);
        assert_eq!(item.record.cod_diagnostico_relacionado2, None);
        assert_eq!(item.record.cod_diagnostico_relacionado3, None);
        assert_eq!(item.record.num_documento_identificacion, "900123456");
        assert_eq!(item.record.cod_prestador.as_deref(), Some("110010123401"));
    }

    #[test]
    fn procedure_schema_is_checked_before_reading() {
        let s = sheet("PROCEDIMIENTOS", &["IDPaciente", "CUPS"], vec![]);
        let err =
            load_procedures(&s, &transaction(), &known(&[]), &FormatRules::rips()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "sheet 'PROCEDIMIENTOS' has no column 'fechaInicioAtencion'"
        );
    }

    #[test]
    fn orphan_rows_are_set_aside_before_their_dates_are_read() {
        let s = sheet(
            "PROCEDIMIENTOS",
            PROCEDURE_COLUMNS,
            vec![
                vec![Cell::text("ZZZ"), Cell::Empty, Cell::Empty],
                vec![Cell::Empty, Cell::text("not a date"), Cell::Int(871121)],
                vec![
                    Cell::Int(7),
                    Cell::text("2025-09-02 14:05"),
                    Cell::Int(871121),
                    Cell::Int(706),
                ],
            ],
        );
        let items = load_procedures(&s, &transaction(), &known(&["7"]), &FormatRules::rips())
            .expect("orphan rows must not fail the load");

        assert_eq!(items.items.len(), 1);
        assert_eq!(items.items[0].source_row, 3);
        let orphans: Vec<_> = items
            .orphans
            .iter()
            .map(|o| (o.subject_id.as_deref(), o.source_row))
            .collect();
        assert_eq!(orphans, [(Some("ZZZ"), 1), (None, 2)]);
    }

    #[test]
    fn known_subject_with_bad_date_still_fails() {
        let s = sheet(
            "CONSULTAS",
            CONSULTATION_COLUMNS,
            vec![vec![Cell::text("7"), Cell::text("yesterday")]],
        );
        let err = load_consultations(&s, &transaction(), &known(&["7"]), &FormatRules::rips())
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidDate { row: 1, .. }), "{err}");
    }

    #[test]
    fn blank_rows_keep_later_row_numbers_and_subject_numbering() {
        let row = |id: &str| {
            let mut r = vec![Cell::text("CC"), Cell::text(id), Cell::text("2000-05-05")];
            r.resize(SUBJECT_COLUMNS.len(), Cell::Empty);
            r
        };
        let s = sheet("USUARIOS", SUBJECT_COLUMNS, vec![row("1"), vec![], row("2"), row("2")]);
        let err = load_subjects(&s, &FormatRules::rips()).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateSubject { row: 4, .. }), "{err}");

        let s = sheet("USUARIOS", SUBJECT_COLUMNS, vec![row("1"), vec![], row("2")]);
        let subjects = load_subjects(&s, &FormatRules::rips()).unwrap();
        assert_eq!(subjects.iter().map(|s| s.consecutivo).collect::<Vec<_>>(), [1, 2]);
    }
}
