//! RIPS record types. Field names follow the ministry's JSON layout.

use serde::Serialize;

use super::coerce::Scalar;

pub const NOTE_TYPE: &str = "RS";
pub const USER_TYPE: &str = "12";
pub const NO_DISABILITY: &str = "NO";
pub const DEFAULT_ROUTE: &str = "01";
pub const OBLIGOR_DOCUMENT_TYPE: &str = "CC";
pub const COLLECTION_CONCEPT: &str = "05";
pub const PROCEDURE_PURPOSE: &str = "15";

/// The batch header, read from the single row of the transaction sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub num_documento_id_obligado: String,
    pub num_nota: Option<String>,
    pub tipo_nota: String,
    pub cod_prestador: Option<String>,
}

/// One patient ("usuario") and the services attached to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub tipo_documento_identificacion: Option<String>,
    pub num_documento_identificacion: String,
    pub tipo_usuario: String,
    pub fecha_nacimiento: String,
    pub cod_sexo: Option<String>,
    pub cod_pais_residencia: Option<String>,
    pub cod_municipio_residencia: Option<String>,
    pub cod_zona_territorial_residencia: Option<String>,
    pub incapacidad: String,
    pub cod_pais_origen: Option<String>,
    pub consecutivo: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servicios: Option<Services>,
}

impl Subject {
    pub fn consultation_count(&self) -> usize {
        self.servicios
            .as_ref()
            .and_then(|s| s.consultas.as_ref())
            .map_or(0, Vec::len)
    }

    pub fn procedure_count(&self) -> usize {
        self.servicios
            .as_ref()
            .and_then(|s| s.procedimientos.as_ref())
            .map_or(0, Vec::len)
    }
}

/// Item container. A group is `None` once pruned; an empty container is removed from its subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Services {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultas: Option<Vec<Consultation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedimientos: Option<Vec<Procedure>>,
}

impl Services {
    pub fn empty() -> Self {
        Self {
            consultas: Some(Vec::new()),
            procedimientos: Some(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.consultas.is_none() && self.procedimientos.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub cod_prestador: Option<String>,
    pub fecha_inicio_atencion: String,
    pub num_autorizacion: String,
    pub cod_consulta: Option<String>,
    pub via_ingreso_servicio_salud: String,
    pub modalidad_grupo_servicio_tec_sal: String,
    pub grupo_servicios: String,
    pub cod_servicio: Scalar,
    pub finalidad_tecnologia_salud: Option<String>,
    pub causa_motivo_atencion: Option<String>,
    pub cod_diagnostico_principal: Option<String>,
    pub cod_diagnostico_relacionado1: Option<String>,
    pub cod_diagnostico_relacionado2: Option<String>,
    pub cod_diagnostico_relacionado3: Option<String>,
    pub tipo_diagnostico_principal: Option<String>,
    pub tipo_documento_identificacion: String,
    pub num_documento_identificacion: String,
    pub vr_servicio: i64,
    pub valor_pago_moderador: i64,
    pub concepto_recaudo: String,
    #[serde(rename = "numFEVPagoModerador")]
    pub num_fev_pago_moderador: String,
    pub consecutivo: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub cod_prestador: Option<String>,
    pub fecha_inicio_atencion: String,
    #[serde(rename = "idMIPRES")]
    pub id_mipres: String,
    pub num_autorizacion: String,
    pub cod_procedimiento: Option<String>,
    pub via_ingreso_servicio_salud: String,
    pub modalidad_grupo_servicio_tec_sal: String,
    pub grupo_servicios: String,
    pub cod_servicio: Scalar,
    pub finalidad_tecnologia_salud: String,
    pub tipo_documento_identificacion: String,
    pub num_documento_identificacion: String,
    pub cod_diagnostico_principal: Option<String>,
    pub cod_diagnostico_relacionado: Option<String>,
    pub cod_complicacion: Option<String>,
    pub vr_servicio: i64,
    pub concepto_recaudo: String,
    pub valor_pago_moderador: i64,
    #[serde(rename = "numFEVPagoModerador")]
    pub num_fev_pago_moderador: String,
    pub consecutivo: usize,
}

/// A line item not yet attached to its subject.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem<T> {
    /// Identification number of the owning subject, as written in the sheet.
    pub subject_id: Option<String>,
    /// 1-based data row in the source sheet, blank rows included. Row 1 is
    /// the first row under the header.
    pub source_row: usize,
    pub record: T,
}

/// Sequence numbers are assigned when an item is attached.
pub trait Sequenced {
    fn set_consecutivo(&mut self, n: usize);
}

impl Sequenced for Consultation {
    fn set_consecutivo(&mut self, n: usize) {
        self.consecutivo = n;
    }
}

impl Sequenced for Procedure {
    fn set_consecutivo(&mut self, n: usize) {
        self.consecutivo = n;
    }
}
