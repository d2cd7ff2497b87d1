//! Full-document snapshot persistence.
//!
//! # Responsibility
//! - Write one document's labels and attributes into the snapshot schema.
//! - Rebuild a document from persisted rows through the attribute factory.
//!
//! # Invariants
//! - Label ids survive save/load unchanged; id gaps left by removed labels
//!   are preserved as dead placeholder slots.
//! - Every attribute round-trips through its ordered field list; the store
//!   knows no attribute type by name.
//! - Loaded labels carry the imported flag.

use crate::document::{AttrSlot, Document, LabelFlags, LabelId};
use crate::model::attribute::{AttributeFactory, Field, FieldValue};
use crate::store::{StoreError, StoreResult};
use log::info;
use rusqlite::{params, Connection};
use std::time::Instant;
use uuid::Uuid;

/// Writes a full snapshot of `document`, replacing any prior content.
///
/// Undo/redo history and the logbook are session state and are not written.
pub fn save_document(document: &Document, conn: &mut Connection) -> StoreResult<()> {
    let started_at = Instant::now();
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM attributes;", [])?;
    tx.execute("DELETE FROM labels;", [])?;

    let mut label_count = 0u64;
    let mut attribute_count = 0u64;
    for index in 0..document.arena.len() as u32 {
        let label = LabelId::from_raw(index);
        let node = match document.arena.node(label) {
            Some(node) if !node.dead => node,
            _ => continue,
        };
        tx.execute(
            "INSERT INTO labels (label_id, parent_id, tag, flags) VALUES (?1, ?2, ?3, ?4);",
            params![
                i64::from(index),
                node.parent.map(|parent| i64::from(parent.raw())),
                i64::from(node.tag),
                node.flags.to_bits(),
            ],
        )?;
        label_count += 1;

        for (type_uuid, slot) in &node.attributes {
            for (field_index, field) in slot.value.fields().iter().enumerate() {
                insert_field_row(
                    &tx,
                    label,
                    *type_uuid,
                    slot.forgotten,
                    field_index,
                    field,
                )?;
            }
            attribute_count += 1;
        }
    }
    tx.commit()?;

    info!(
        "event=document_save module=store status=ok labels={label_count} attributes={attribute_count} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(())
}

fn insert_field_row(
    tx: &rusqlite::Transaction<'_>,
    label: LabelId,
    type_uuid: Uuid,
    forgotten: bool,
    field_index: usize,
    field: &Field,
) -> StoreResult<()> {
    let (int_value, real_value, text_value, uuid_value) = match &field.value {
        FieldValue::Int(value) => (Some(*value), None, None, None),
        FieldValue::Real(value) => (None, Some(*value), None, None),
        FieldValue::Text(value) => (None, None, Some(value.clone()), None),
        FieldValue::Id(value) => (None, None, None, Some(value.to_string())),
        FieldValue::None => (None, None, None, None),
    };
    tx.execute(
        "INSERT INTO attributes (
            label_id,
            type_uuid,
            forgotten,
            field_index,
            field_name,
            field_kind,
            int_value,
            real_value,
            text_value,
            uuid_value
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
        params![
            i64::from(label.raw()),
            type_uuid.to_string(),
            forgotten,
            field_index as i64,
            field.name,
            field.value.kind(),
            int_value,
            real_value,
            text_value,
            uuid_value,
        ],
    )?;
    Ok(())
}

/// Rebuilds a document from a snapshot database.
pub fn load_document(conn: &Connection, factory: &AttributeFactory) -> StoreResult<Document> {
    let started_at = Instant::now();
    let mut document = Document::new();

    load_labels(conn, &mut document)?;
    let attribute_count = load_attributes(conn, &mut document, factory)?;

    info!(
        "event=document_load module=store status=ok labels={} attributes={attribute_count} duration_ms={}",
        document.live_labels().len(),
        started_at.elapsed().as_millis()
    );
    Ok(document)
}

fn load_labels(conn: &Connection, document: &mut Document) -> StoreResult<()> {
    let mut stmt =
        conn.prepare("SELECT label_id, parent_id, tag, flags FROM labels ORDER BY label_id;")?;
    let mut rows = stmt.query([])?;

    let mut saw_root = false;
    while let Some(row) = rows.next()? {
        let label_id: i64 = row.get(0)?;
        let parent_id: Option<i64> = row.get(1)?;
        let tag: i64 = row.get(2)?;
        let flags_bits: i64 = row.get(3)?;

        let mut flags = LabelFlags::from_bits(flags_bits);
        flags.imported = true;

        if label_id == 0 {
            if parent_id.is_some() {
                return Err(StoreError::InvalidData(
                    "root label carries a parent".to_string(),
                ));
            }
            if let Some(node) = document.arena.node_mut(document.root()) {
                node.flags = flags;
            }
            saw_root = true;
            continue;
        }

        if !saw_root {
            return Err(StoreError::InvalidData(
                "snapshot does not start at the root label".to_string(),
            ));
        }
        let parent_id = parent_id.ok_or_else(|| {
            StoreError::InvalidData(format!("label {label_id} has no parent"))
        })?;
        if parent_id >= label_id || parent_id < 0 {
            return Err(StoreError::InvalidData(format!(
                "label {label_id} references parent {parent_id} out of order"
            )));
        }
        let tag = u32::try_from(tag).map_err(|_| {
            StoreError::InvalidData(format!("label {label_id} has invalid tag {tag}"))
        })?;

        // Preserve id gaps left by structurally removed labels.
        while (document.arena.len() as i64) < label_id {
            document.arena.new_placeholder();
        }
        if document.arena.len() as i64 != label_id {
            return Err(StoreError::InvalidData(format!(
                "duplicate label id {label_id}"
            )));
        }

        let parent = LabelId::from_raw(parent_id as u32);
        if document.arena.alive(parent).is_err() {
            return Err(StoreError::InvalidData(format!(
                "label {label_id} references dead parent {parent_id}"
            )));
        }
        let label = document.arena.new_node(parent, tag);
        document
            .arena
            .attach_child(parent, label)
            .map_err(StoreError::InvalidData)?;
        if let Some(node) = document.arena.node_mut(label) {
            node.flags = flags;
        }
    }

    if !saw_root {
        return Err(StoreError::InvalidData(
            "snapshot holds no root label".to_string(),
        ));
    }
    Ok(())
}

fn load_attributes(
    conn: &Connection,
    document: &mut Document,
    factory: &AttributeFactory,
) -> StoreResult<u64> {
    let mut stmt = conn.prepare(
        "SELECT label_id, type_uuid, forgotten, field_name, field_kind,
                int_value, real_value, text_value, uuid_value
         FROM attributes
         ORDER BY label_id, type_uuid, field_index;",
    )?;
    let mut rows = stmt.query([])?;

    let mut count = 0u64;
    let mut group: Option<(LabelId, Uuid, bool, Vec<Field>)> = None;
    while let Some(row) = rows.next()? {
        let label_id: i64 = row.get(0)?;
        let type_uuid: String = row.get(1)?;
        let forgotten: bool = row.get(2)?;
        let field_name: String = row.get(3)?;
        let field_kind: String = row.get(4)?;

        let label = u32::try_from(label_id)
            .map(LabelId::from_raw)
            .map_err(|_| StoreError::InvalidData(format!("invalid label id {label_id}")))?;
        let type_uuid = Uuid::parse_str(&type_uuid)
            .map_err(|_| StoreError::InvalidData(format!("invalid type id {type_uuid}")))?;

        let value = match field_kind.as_str() {
            "int" => FieldValue::Int(row.get::<_, Option<i64>>(5)?.ok_or_else(|| {
                StoreError::InvalidData(format!("int field `{field_name}` holds no value"))
            })?),
            "real" => FieldValue::Real(row.get::<_, Option<f64>>(6)?.ok_or_else(|| {
                StoreError::InvalidData(format!("real field `{field_name}` holds no value"))
            })?),
            "text" => FieldValue::Text(row.get::<_, Option<String>>(7)?.ok_or_else(|| {
                StoreError::InvalidData(format!("text field `{field_name}` holds no value"))
            })?),
            "id" => {
                let raw = row.get::<_, Option<String>>(8)?.ok_or_else(|| {
                    StoreError::InvalidData(format!("id field `{field_name}` holds no value"))
                })?;
                FieldValue::Id(Uuid::parse_str(&raw).map_err(|_| {
                    StoreError::InvalidData(format!("id field `{field_name}` is not a uuid"))
                })?)
            }
            "none" => FieldValue::None,
            other => {
                return Err(StoreError::InvalidData(format!(
                    "unknown field kind `{other}`"
                )))
            }
        };

        match &mut group {
            Some((current_label, current_type, _, fields))
                if *current_label == label && *current_type == type_uuid =>
            {
                fields.push(Field::new(field_name, value));
            }
            _ => {
                if let Some(finished) = group.take() {
                    flush_attribute(document, factory, finished)?;
                    count += 1;
                }
                group = Some((label, type_uuid, forgotten, vec![Field::new(field_name, value)]));
            }
        }
    }
    if let Some(finished) = group.take() {
        flush_attribute(document, factory, finished)?;
        count += 1;
    }
    Ok(count)
}

fn flush_attribute(
    document: &mut Document,
    factory: &AttributeFactory,
    (label, type_uuid, forgotten, fields): (LabelId, Uuid, bool, Vec<Field>),
) -> StoreResult<()> {
    let value = factory.rebuild(type_uuid, &fields)?;
    let node = document.arena.alive_mut(label).map_err(|_| {
        StoreError::InvalidData(format!("attribute row references dead label {label}"))
    })?;
    if node.attributes.contains_key(&type_uuid) {
        return Err(StoreError::InvalidData(format!(
            "label {label} holds attribute type {type_uuid} twice"
        )));
    }
    let mut slot = AttrSlot::fresh(value);
    slot.forgotten = forgotten;
    node.attributes.insert(type_uuid, slot);
    Ok(())
}
