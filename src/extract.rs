//! Record extraction and plan driving.
//!
//! Given a parsed snapshot and a compiled plan, the driver resolves the
//! repeating roots (or the anchored region's items) and produces one record
//! per element. Every record carries the full declared field set: a field
//! whose element is absent receives its sentinel value, so downstream
//! serialization never sees ragged shapes. An absent anchor or region is a
//! valid outcome of a whole run — it yields an empty result set, not an
//! error.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::dom::{Document, ElementHandle};
use crate::metrics::RunMetrics;
use crate::normalize::{NormalizeError, apply_transforms};
use crate::plan::{CompiledField, CompiledPlan, CompiledPlanKind, ExtractMode};

/// One extracted record. Field order is the plan's declaration order and the
/// record is immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Ordered sequence of records; insertion order is DOM order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    records: Vec<Record>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    fn push(&mut self, record: Record) {
        self.records.push(record);
    }
}

impl Serialize for ResultSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in &self.records {
            seq.serialize_element(record)?;
        }
        seq.end()
    }
}

/// Execute a compiled plan against a snapshot.
pub fn run_plan(
    document: &Document,
    plan: &CompiledPlan,
    metrics: &mut RunMetrics,
) -> Result<ResultSet, NormalizeError> {
    let mut results = ResultSet::default();

    let items: Vec<ElementHandle<'_>> = match &plan.kind {
        CompiledPlanKind::List { root } => document.find_all(root),
        CompiledPlanKind::Anchored {
            anchor,
            region,
            item,
        } => {
            let Some(anchor) = document.find_one(anchor) else {
                return Ok(results);
            };
            let Some(region) = anchor.find_one(region) else {
                return Ok(results);
            };
            region.find_all(item)
        }
    };

    for root in items {
        metrics.roots_matched += 1;
        if let Some(record) = extract_record(&root, &plan.fields, metrics)? {
            results.push(record);
            metrics.records_emitted += 1;
        }
    }

    Ok(results)
}

/// Produce one record from a root element, or `None` when a required field
/// is absent and the item is skipped.
fn extract_record(
    root: &ElementHandle<'_>,
    fields: &[CompiledField],
    metrics: &mut RunMetrics,
) -> Result<Option<Record>, NormalizeError> {
    let mut values = Vec::with_capacity(fields.len());

    for field in fields {
        match resolve_field(root, field) {
            Some(raw) => {
                let value = apply_transforms(&field.name, &raw, &field.transforms)?;
                values.push((field.name.clone(), value));
            }
            None if field.required => {
                metrics.items_skipped += 1;
                return Ok(None);
            }
            None => {
                metrics.fields_defaulted += 1;
                values.push((field.name.clone(), field.sentinel.clone()));
            }
        }
    }

    Ok(Some(Record { fields: values }))
}

/// Resolve one field within a root element's scope. `None` means the field's
/// element (or its intermediate container) is absent.
fn resolve_field(root: &ElementHandle<'_>, field: &CompiledField) -> Option<String> {
    // An absent container short-circuits without attempting the inner lookup.
    let scope = match &field.within {
        Some(container) => root.find_one(container)?,
        None => *root,
    };

    match &field.mode {
        ExtractMode::SingleText => scope.find_one(&field.selector).map(|el| el.text()),
        ExtractMode::MultiText { separator } => {
            let matches = scope.find_all(&field.selector);
            if matches.is_empty() {
                None
            } else {
                Some(
                    matches
                        .iter()
                        .map(ElementHandle::text)
                        .collect::<Vec<_>>()
                        .join(separator),
                )
            }
        }
        ExtractMode::Attribute { name } => scope
            .find_one(&field.selector)
            .and_then(|el| el.attribute(name)),
    }
}
