//! Joins line items onto their subjects and trims the result to its minimal shape.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use super::model::{Consultation, PendingItem, Procedure, Sequenced, Services, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Consultation,
    Procedure,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Consultation => write!(f, "consultation"),
            ItemKind::Procedure => write!(f, "procedure"),
        }
    }
}

/// A line item whose subject key matched no subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Orphan {
    pub kind: ItemKind,
    pub subject_id: Option<String>,
    pub source_row: usize,
}

impl Orphan {
    /// Record a skipped row and log it.
    pub fn skipped(kind: ItemKind, subject_id: Option<String>, source_row: usize) -> Self {
        warn!(
            kind = %kind,
            subject_id = subject_id.as_deref().unwrap_or("<blank>"),
            row = source_row,
            "[RIPS] No subject for line item, skipping row"
        );
        Self {
            kind,
            subject_id,
            source_row,
        }
    }
}

/// Rows read from one line-item sheet: those with an owner, and the orphans
/// skipped while reading.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItems<T> {
    pub items: Vec<PendingItem<T>>,
    pub orphans: Vec<Orphan>,
}

impl<T> Default for LineItems<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            orphans: Vec::new(),
        }
    }
}

impl<T> From<Vec<PendingItem<T>>> for LineItems<T> {
    fn from(items: Vec<PendingItem<T>>) -> Self {
        Self {
            items,
            orphans: Vec::new(),
        }
    }
}

/// Per-subject counts taken after attaching and before pruning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectCounts {
    pub subject_id: String,
    pub consultations: usize,
    pub procedures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub subjects: Vec<SubjectCounts>,
    pub orphans: Vec<Orphan>,
}

impl AssemblyReport {
    pub fn consultations(&self) -> usize {
        self.subjects.iter().map(|s| s.consultations).sum()
    }

    pub fn procedures(&self) -> usize {
        self.subjects.iter().map(|s| s.procedures).sum()
    }
}

fn consultations(services: &mut Services) -> &mut Vec<Consultation> {
    services.consultas.get_or_insert_with(Vec::new)
}

fn procedures(services: &mut Services) -> &mut Vec<Procedure> {
    services.procedimientos.get_or_insert_with(Vec::new)
}

/// Append every item to its subject's group in source order, numbering each
/// group from 1. Items without a matching subject are skipped and reported
/// after the orphans the loaders already set aside.
pub fn attach(
    subjects: &mut [Subject],
    consultation_items: LineItems<Consultation>,
    procedure_items: LineItems<Procedure>,
) -> AssemblyReport {
    let index: HashMap<String, usize> = subjects
        .iter()
        .enumerate()
        .map(|(i, s)| (s.num_documento_identificacion.clone(), i))
        .collect();

    let mut orphans = Vec::new();
    orphans.extend(consultation_items.orphans);
    attach_group(
        subjects,
        &index,
        consultation_items.items,
        ItemKind::Consultation,
        consultations,
        &mut orphans,
    );
    orphans.extend(procedure_items.orphans);
    attach_group(
        subjects,
        &index,
        procedure_items.items,
        ItemKind::Procedure,
        procedures,
        &mut orphans,
    );

    let counts = subjects
        .iter()
        .map(|s| SubjectCounts {
            subject_id: s.num_documento_identificacion.clone(),
            consultations: s.consultation_count(),
            procedures: s.procedure_count(),
        })
        .collect();

    let report = AssemblyReport {
        subjects: counts,
        orphans,
    };
    info!(
        consultations = report.consultations(),
        procedures = report.procedures(),
        orphans = report.orphans.len(),
        "[RIPS] Attached line items to subjects"
    );
    report
}

fn attach_group<T: Sequenced>(
    subjects: &mut [Subject],
    index: &HashMap<String, usize>,
    items: Vec<PendingItem<T>>,
    kind: ItemKind,
    group: fn(&mut Services) -> &mut Vec<T>,
    orphans: &mut Vec<Orphan>,
) {
    for item in items {
        let owner = item.subject_id.as_ref().and_then(|id| index.get(id)).copied();
        let Some(pos) = owner else {
            orphans.push(Orphan::skipped(kind, item.subject_id, item.source_row));
            continue;
        };
        let services = subjects[pos].servicios.get_or_insert_with(Services::empty);
        let list = group(services);
        let mut record = item.record;
        record.set_consecutivo(list.len() + 1);
        list.push(record);
    }
}

/// Drop empty groups, then drop containers left with no groups.
pub fn prune_empty_services(subjects: &mut [Subject]) {
    for subject in subjects.iter_mut() {
        let Some(services) = subject.servicios.as_mut() else {
            continue;
        };
        if services.consultas.as_ref().is_some_and(Vec::is_empty) {
            services.consultas = None;
        }
        if services.procedimientos.as_ref().is_some_and(Vec::is_empty) {
            services.procedimientos = None;
        }
        if services.is_empty() {
            subject.servicios = None;
        }
    }
}
