//! Diesel row types and their direct, single-table queries.
//!
//! Mirrors the teacher's split between ORM row structs (this module) and the
//! orchestration that composes them into the spec's components
//! (`dictionary`, `resolver`, `versioner`, `reader`). Each row type knows how
//! to load/insert/update itself; it does not know about business rules.

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use capture_core::{error::CaptureError, model, value::DataType};

use super::schema::{
    audit_event, capture_data, capture_data_version, context_group, context_group_item,
    field_definition, field_definition_version,
};

fn parse_data_type(raw: &str) -> Result<DataType, CaptureError> {
    raw.parse()
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = field_definition)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FieldDefinitionRow {
    pub id: i64,
    pub application: String,
    pub field_name: String,
    pub data_type: String,
    pub label: String,
    pub attributes_blob: Vec<u8>,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub created_by: String,
    pub updated_by: String,
}

impl FieldDefinitionRow {
    pub fn into_domain(self) -> Result<model::FieldDefinition, CaptureError> {
        Ok(model::FieldDefinition {
            id: self.id,
            application: self.application,
            field_name: self.field_name,
            data_type: parse_data_type(&self.data_type)?,
            label: self.label,
            attributes: self.attributes_blob,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            created_by: self.created_by,
            updated_by: self.updated_by,
        })
    }

    pub async fn find(
        conn: &mut AsyncPgConnection,
        application: &str,
        field_name: &str,
    ) -> QueryResult<Option<FieldDefinitionRow>> {
        field_definition::table
            .filter(field_definition::application.eq(application))
            .filter(field_definition::field_name.eq(field_name))
            .select(FieldDefinitionRow::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list(
        conn: &mut AsyncPgConnection,
        application: &str,
        field_names: Option<&[String]>,
    ) -> QueryResult<Vec<FieldDefinitionRow>> {
        let mut query = field_definition::table
            .filter(field_definition::application.eq(application))
            .into_boxed();
        if let Some(names) = field_names {
            query = query.filter(field_definition::field_name.eq_any(names));
        }
        query
            .select(FieldDefinitionRow::as_select())
            .load(conn)
            .await
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = field_definition)]
pub struct NewFieldDefinition<'a> {
    pub application: &'a str,
    pub field_name: &'a str,
    pub data_type: String,
    pub label: &'a str,
    pub attributes_blob: &'a [u8],
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub created_by: &'a str,
    pub updated_by: &'a str,
}

impl<'a> NewFieldDefinition<'a> {
    pub async fn insert(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> QueryResult<FieldDefinitionRow> {
        diesel::insert_into(field_definition::table)
            .values(self)
            .returning(FieldDefinitionRow::as_returning())
            .get_result(conn)
            .await
    }
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = field_definition)]
pub struct FieldDefinitionForm<'a> {
    pub data_type: String,
    pub label: &'a str,
    pub attributes_blob: &'a [u8],
    pub active: bool,
    pub updated_at: NaiveDateTime,
    pub updated_by: &'a str,
}

impl<'a> FieldDefinitionForm<'a> {
    pub async fn apply(
        &self,
        conn: &mut AsyncPgConnection,
        id: i64,
    ) -> QueryResult<FieldDefinitionRow> {
        diesel::update(field_definition::table.find(id))
            .set(self)
            .returning(FieldDefinitionRow::as_returning())
            .get_result(conn)
            .await
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = field_definition_version)]
pub struct NewFieldDefinitionVersion<'a> {
    pub field_definition_id: i64,
    pub effective_from: NaiveDateTime,
    pub actor: &'a str,
    pub change_description: Option<&'a str>,
    pub previous_blob: Option<&'a [u8]>,
    pub new_blob: &'a [u8],
}

impl<'a> NewFieldDefinitionVersion<'a> {
    pub async fn insert(&self, conn: &mut AsyncPgConnection) -> QueryResult<i64> {
        diesel::insert_into(field_definition_version::table)
            .values(self)
            .returning(field_definition_version::id)
            .get_result(conn)
            .await
    }
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = context_group)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContextGroupRow {
    pub id: i64,
    pub application: String,
    pub fingerprint: String,
    pub created_at: NaiveDateTime,
}

impl ContextGroupRow {
    pub async fn find_by_fingerprint(
        conn: &mut AsyncPgConnection,
        application: &str,
        fingerprint: &str,
    ) -> QueryResult<Option<ContextGroupRow>> {
        context_group::table
            .filter(context_group::application.eq(application))
            .filter(context_group::fingerprint.eq(fingerprint))
            .select(ContextGroupRow::as_select())
            .first(conn)
            .await
            .optional()
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = context_group)]
pub struct NewContextGroup<'a> {
    pub application: &'a str,
    pub fingerprint: &'a str,
    pub created_at: NaiveDateTime,
}

impl<'a> NewContextGroup<'a> {
    pub async fn insert(&self, conn: &mut AsyncPgConnection) -> QueryResult<ContextGroupRow> {
        diesel::insert_into(context_group::table)
            .values(self)
            .returning(ContextGroupRow::as_returning())
            .get_result(conn)
            .await
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = context_group_item)]
pub struct NewContextGroupItem<'a> {
    pub context_group_id: i64,
    pub key: &'a str,
    pub value: &'a str,
}

impl<'a> NewContextGroupItem<'a> {
    pub async fn insert_all(
        items: &[NewContextGroupItem<'a>],
        conn: &mut AsyncPgConnection,
    ) -> QueryResult<usize> {
        diesel::insert_into(context_group_item::table)
            .values(items)
            .execute(conn)
            .await
    }
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = capture_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CaptureDataRow {
    pub id: i64,
    pub field_definition_id: i64,
    pub context_group_id: i64,
    pub value_string: Option<String>,
    pub value_number: Option<BigDecimal>,
    pub current_version_id: Option<i64>,
    pub current_version_num: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CaptureDataRow {
    pub fn into_domain(self) -> model::CaptureDatum {
        model::CaptureDatum {
            id: self.id,
            field_definition_id: self.field_definition_id,
            context_group_id: self.context_group_id,
            value_string: self.value_string,
            value_number: self.value_number,
            current_version_id: self.current_version_id,
            current_version_num: self.current_version_num,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Locks the hot row for `(context_group_id, field_definition_id)` with
    /// `SELECT ... FOR UPDATE`, blocking concurrent writers to the same pair
    /// until the caller's transaction ends. See spec.md §4.3 step 3.
    pub async fn lock_for_pair(
        conn: &mut AsyncPgConnection,
        context_group_id: i64,
        field_definition_id: i64,
    ) -> QueryResult<Option<CaptureDataRow>> {
        capture_data::table
            .filter(capture_data::context_group_id.eq(context_group_id))
            .filter(capture_data::field_definition_id.eq(field_definition_id))
            .select(CaptureDataRow::as_select())
            .for_update()
            .first(conn)
            .await
            .optional()
    }

    pub async fn find_for_context(
        conn: &mut AsyncPgConnection,
        context_group_id: i64,
        field_definition_ids: &[i64],
    ) -> QueryResult<Vec<CaptureDataRow>> {
        capture_data::table
            .filter(capture_data::context_group_id.eq(context_group_id))
            .filter(capture_data::field_definition_id.eq_any(field_definition_ids))
            .select(CaptureDataRow::as_select())
            .load(conn)
            .await
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = capture_data)]
pub struct NewCaptureData {
    pub field_definition_id: i64,
    pub context_group_id: i64,
    pub value_string: Option<String>,
    pub value_number: Option<BigDecimal>,
    pub current_version_id: Option<i64>,
    pub current_version_num: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewCaptureData {
    pub async fn insert(&self, conn: &mut AsyncPgConnection) -> QueryResult<CaptureDataRow> {
        diesel::insert_into(capture_data::table)
            .values(self)
            .returning(CaptureDataRow::as_returning())
            .get_result(conn)
            .await
    }
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = capture_data)]
pub struct CaptureDataForm {
    pub value_string: Option<String>,
    pub value_number: Option<BigDecimal>,
    pub current_version_id: Option<i64>,
    pub current_version_num: i32,
    pub updated_at: NaiveDateTime,
}

impl CaptureDataForm {
    pub async fn apply(
        &self,
        conn: &mut AsyncPgConnection,
        id: i64,
    ) -> QueryResult<CaptureDataRow> {
        diesel::update(capture_data::table.find(id))
            .set(self)
            .returning(CaptureDataRow::as_returning())
            .get_result(conn)
            .await
    }
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = capture_data_version)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CaptureDataVersionRow {
    pub id: i64,
    pub capture_data_id: i64,
    pub sequential_version_num: i32,
    pub value_string_versioned: Option<String>,
    pub value_number_versioned: Option<BigDecimal>,
    pub changed_at: NaiveDateTime,
    pub changed_by: String,
    pub change_reason: Option<String>,
    pub signature_type: Option<String>,
    pub event_type: Option<String>,
}

impl CaptureDataVersionRow {
    pub fn into_domain(self) -> model::CaptureDatumVersion {
        model::CaptureDatumVersion {
            id: self.id,
            capture_data_id: self.capture_data_id,
            sequential_version_num: self.sequential_version_num,
            value_string_versioned: self.value_string_versioned,
            value_number_versioned: self.value_number_versioned,
            changed_at: self.changed_at,
            changed_by: self.changed_by,
            change_reason: self.change_reason,
            signature_type: self.signature_type,
            event_type: self.event_type,
        }
    }

    pub async fn history_for(
        conn: &mut AsyncPgConnection,
        capture_data_id: i64,
    ) -> QueryResult<Vec<CaptureDataVersionRow>> {
        capture_data_version::table
            .filter(capture_data_version::capture_data_id.eq(capture_data_id))
            .order(capture_data_version::sequential_version_num.asc())
            .select(CaptureDataVersionRow::as_select())
            .load(conn)
            .await
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = capture_data_version)]
pub struct NewCaptureDataVersion<'a> {
    pub capture_data_id: i64,
    pub sequential_version_num: i32,
    pub value_string_versioned: Option<String>,
    pub value_number_versioned: Option<BigDecimal>,
    pub changed_at: NaiveDateTime,
    pub changed_by: &'a str,
    pub change_reason: Option<&'a str>,
    pub signature_type: Option<&'a str>,
    pub event_type: Option<&'a str>,
}

impl<'a> NewCaptureDataVersion<'a> {
    pub async fn insert(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> QueryResult<CaptureDataVersionRow> {
        diesel::insert_into(capture_data_version::table)
            .values(self)
            .returning(CaptureDataVersionRow::as_returning())
            .get_result(conn)
            .await
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = audit_event)]
pub struct NewAuditEvent<'a> {
    pub timestamp: NaiveDateTime,
    pub actor: &'a str,
    pub application: &'a str,
    pub event_type: &'a str,
    pub affected_type: &'a str,
    pub affected_id: &'a str,
    pub details_blob: &'a [u8],
}

impl<'a> NewAuditEvent<'a> {
    pub async fn insert(&self, conn: &mut AsyncPgConnection) -> QueryResult<()> {
        diesel::insert_into(audit_event::table)
            .values(self)
            .execute(conn)
            .await
            .map(|_| ())
    }
}
