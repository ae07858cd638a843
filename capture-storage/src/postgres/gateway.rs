//! Service Facade (spec.md §4.5): the single `DataCaptureService` implementor,
//! orchestrating the dictionary/resolver/versioner/reader components inside
//! Postgres transactions.
//!
//! As in the teacher's storage layer, the individual components here never
//! open a transaction themselves — they operate on whatever connection they
//! are handed. This module is the only place that begins, commits, or rolls
//! one back.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel_async::{
    pooled_connection::deadpool::Pool, scoped_futures::ScopedFutureExt, AsyncConnection,
    AsyncPgConnection,
};
use tracing::{error, info, warn};

use capture_core::{
    clock::Clock,
    error::CaptureError,
    model::{
        FieldDefinition, FieldDefinitionInput, FieldSave, FieldView, SaveDefaults,
        SaveRecordResult, VersionRecord,
    },
    service::DataCaptureService,
};

use super::{dictionary, error::from_diesel, orm::NewAuditEvent, reader, resolver, versioner};

/// Lets `AsyncConnection::transaction` wrap its own internal commit/rollback
/// failures alongside the `CaptureError`s our own components return, without
/// making `capture-core` depend on diesel just to satisfy that bound.
enum TxError {
    Capture(CaptureError),
    Diesel(diesel::result::Error),
}

impl From<CaptureError> for TxError {
    fn from(e: CaptureError) -> Self {
        TxError::Capture(e)
    }
}

impl From<diesel::result::Error> for TxError {
    fn from(e: diesel::result::Error) -> Self {
        TxError::Diesel(e)
    }
}

impl TxError {
    fn into_capture(self) -> CaptureError {
        match self {
            TxError::Capture(e) => e,
            TxError::Diesel(e) => from_diesel(e, "transaction", ""),
        }
    }
}

/// Postgres-backed implementation of [`DataCaptureService`].
pub struct PostgresGateway<C: Clock> {
    pool: Pool<AsyncPgConnection>,
    clock: C,
}

impl<C: Clock> PostgresGateway<C> {
    pub fn new(pool: Pool<AsyncPgConnection>, clock: C) -> Self {
        Self { pool, clock }
    }

    async fn conn(
        &self,
    ) -> Result<impl std::ops::DerefMut<Target = AsyncPgConnection> + Send, CaptureError> {
        self.pool
            .get()
            .await
            .map_err(|e| CaptureError::Storage(format!("could not acquire connection: {e}")))
    }

    async fn record_audit(
        conn: &mut AsyncPgConnection,
        actor: &str,
        application: &str,
        event_type: &str,
        affected_type: &str,
        affected_id: &str,
        now: chrono::NaiveDateTime,
    ) -> Result<(), CaptureError> {
        NewAuditEvent {
            timestamp: now,
            actor,
            application,
            event_type,
            affected_type,
            affected_id,
            details_blob: b"{}",
        }
        .insert(conn)
        .await
        .map_err(|e| from_diesel(e, "AuditEvent", affected_id))
    }
}

#[async_trait]
impl<C: Clock> DataCaptureService for PostgresGateway<C> {
    async fn define_field(
        &self,
        application: &str,
        input: FieldDefinitionInput,
        actor: &str,
    ) -> Result<FieldDefinition, CaptureError> {
        let now = self.clock.now();
        let mut conn = self.conn().await?;
        let application = application.to_string();
        let actor = actor.to_string();

        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                let definition = dictionary::define_field(conn, &application, &input, &actor, now).await?;
                Self::record_audit(
                    conn,
                    &actor,
                    &application,
                    "define_field",
                    "field_definition",
                    &definition.field_name,
                    now,
                )
                .await?;
                info!(application = %application, field = %definition.field_name, "field definition saved");
                Ok(definition)
            }
            .scope_boxed()
        })
        .await
        .map_err(TxError::into_capture)
    }

    async fn save_record(
        &self,
        application: &str,
        context: &[(String, String)],
        fields: Vec<FieldSave>,
        actor: &str,
        defaults: SaveDefaults,
    ) -> Result<SaveRecordResult, CaptureError> {
        let now = self.clock.now();
        let mut conn = self.conn().await?;
        let application = application.to_string();
        let actor = actor.to_string();
        let context = context.to_vec();

        // The context-resolution insert can race a concurrent first-saver for
        // the same business keys; retry once before giving up, per spec.md §4.5.
        let mut attempts = 0;
        loop {
            attempts += 1;
            let application = application.clone();
            let actor = actor.clone();
            let context = context.clone();
            let fields = fields.clone();
            let defaults = defaults.clone();

            let result = conn
                .transaction::<_, TxError, _>(|conn| {
                    async move {
                        let group = resolver::resolve(conn, &application, &context, now).await?;

                        let field_names: Vec<String> =
                            fields.iter().map(|f| f.field_name.clone()).collect();
                        let definitions =
                            dictionary::lookup(conn, &application, Some(&field_names)).await?;
                        let mut by_name: BTreeMap<&str, &FieldDefinition> =
                            definitions.iter().map(|d| (d.field_name.as_str(), d)).collect();

                        let mut saved = Vec::with_capacity(fields.len());
                        for field in &fields {
                            let definition = by_name.remove(field.field_name.as_str()).ok_or_else(|| {
                                CaptureError::UnknownField {
                                    application: application.clone(),
                                    field: field.field_name.clone(),
                                }
                            })?;
                            let outcome = versioner::save_field(
                                conn, group.id, definition, field, &defaults, &actor, now,
                            )
                            .await?;
                            PostgresGateway::<C>::record_audit(
                                conn,
                                &actor,
                                &application,
                                field.event_type.as_deref().unwrap_or("save_record"),
                                "capture_data",
                                &field.field_name,
                                now,
                            )
                            .await?;
                            saved.push(outcome);
                        }

                        Ok(SaveRecordResult { context_group_id: group.id, saved })
                    }
                    .scope_boxed()
                })
                .await
                .map_err(TxError::into_capture);

            match result {
                Err(e) if e.is_conflict() && attempts == 1 => {
                    warn!(application = %application, "context resolution conflict, retrying once");
                    continue;
                }
                Ok(ref saved) => {
                    info!(
                        application = %application,
                        context_group_id = saved.context_group_id,
                        fields = saved.saved.len(),
                        "record saved"
                    );
                    return result;
                }
                Err(ref e) => {
                    error!(application = %application, error = %e, "save_record failed");
                    return result;
                }
            }
        }
    }

    async fn get_record(
        &self,
        application: &str,
        context: &[(String, String)],
        field_names: Option<Vec<String>>,
    ) -> Result<BTreeMap<String, FieldView>, CaptureError> {
        let mut conn = self.conn().await?;
        let definitions = dictionary::lookup(&mut conn, application, field_names.as_deref()).await?;
        let Some(group) = resolver::find(&mut conn, application, context).await? else {
            return Ok(BTreeMap::new());
        };
        reader::get_record(&mut conn, group.id, &definitions).await
    }

    async fn get_field_audit_trail(
        &self,
        application: &str,
        context: &[(String, String)],
        field_name: &str,
    ) -> Result<Vec<VersionRecord>, CaptureError> {
        let mut conn = self.conn().await?;
        let definitions =
            dictionary::lookup(&mut conn, application, Some(&[field_name.to_string()])).await?;
        let definition = definitions.into_iter().next().ok_or_else(|| CaptureError::UnknownField {
            application: application.to_string(),
            field: field_name.to_string(),
        })?;
        let Some(group) = resolver::find(&mut conn, application, context).await? else {
            return Ok(Vec::new());
        };
        reader::get_field_audit_trail(&mut conn, group.id, &definition).await
    }
}
