//! Integration tests for the Postgres-backed data capture engine, covering
//! the scenarios documented alongside the component specification.
//!
//! Most scenarios run inside a single rolled-back test transaction (fast,
//! fully isolated). The scenarios that need either two independent
//! connections racing a real lock or a full `PostgresGateway` transaction
//! boundary run through `capture_storage::postgres::testing::run_against_db`
//! instead and clean up afterwards.
//!
//! Fixtures that aren't the thing under test are built through
//! `postgres::db_fixtures`, which inserts rows directly rather than going
//! through `dictionary::define_field`/`resolver::resolve` — so a bug in
//! either of those components can't mask itself in a test that assumes its
//! fixture was set up correctly.

use bigdecimal::BigDecimal;
use capture_core::{
    model::{FieldDefinitionInput, FieldSave, SaveDefaults},
    value::{CaptureValue, DataType},
    CaptureError,
};
use capture_storage::postgres::{db_fixtures, dictionary, reader, resolver, testing, versioner};
use chrono::NaiveDate;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use pretty_assertions::assert_eq;

async fn test_conn() -> AsyncPgConnection {
    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for storage tests");
    let mut conn = AsyncPgConnection::establish(&db_url).await.expect("connect");
    conn.begin_test_transaction().await.expect("begin test transaction");
    conn
}

fn now() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

async fn quantity_field_fixture(conn: &mut AsyncPgConnection) -> capture_core::model::FieldDefinition {
    db_fixtures::insert_field_definition(conn, "SALES", "ITEM_QTY", DataType::Number, "Qty", true, now()).await
}

#[tokio::test]
async fn s1_define_and_capture() {
    let mut conn = test_conn().await;
    let definition = quantity_field_fixture(&mut conn).await;

    let context = vec![("ORDER".to_string(), "SO1".to_string()), ("LINE".to_string(), "1".to_string())];
    let group = db_fixtures::insert_context_group(&mut conn, "SALES", &context, now()).await;

    let save = FieldSave {
        field_name: "ITEM_QTY".into(),
        value: CaptureValue::Number(BigDecimal::from(5)),
        reason: Some("initial".into()),
        event_type: None,
        signature_type: None,
    };
    let outcome = versioner::save_field(
        &mut conn,
        group.id,
        &definition,
        &save,
        &SaveDefaults::default(),
        "u1",
        now(),
    )
    .await
    .expect("save field");
    assert_eq!(outcome.sequential_version_num, 1);

    let record = reader::get_record(&mut conn, group.id, &[definition.clone()]).await.expect("get record");
    let view = &record["ITEM_QTY"];
    assert_eq!(view.value, Some(CaptureValue::Number(BigDecimal::from(5))));
    assert_eq!(view.version, Some(1));

    let trail = reader::get_field_audit_trail(&mut conn, group.id, &definition)
        .await
        .expect("audit trail");
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].sequential_version_num, 1);
    assert_eq!(trail[0].value, Some(CaptureValue::Number(BigDecimal::from(5))));
    assert_eq!(trail[0].actor, "u1");
    assert_eq!(trail[0].change_reason.as_deref(), Some("initial"));
}

#[tokio::test]
async fn s2_correction_appends_a_new_version() {
    let mut conn = test_conn().await;
    let definition = quantity_field_fixture(&mut conn).await;
    let context = vec![("ORDER".to_string(), "SO1".to_string()), ("LINE".to_string(), "1".to_string())];
    let group = db_fixtures::insert_context_group(&mut conn, "SALES", &context, now()).await;

    let first = FieldSave {
        field_name: "ITEM_QTY".into(),
        value: CaptureValue::Number(BigDecimal::from(5)),
        reason: None,
        event_type: None,
        signature_type: None,
    };
    versioner::save_field(&mut conn, group.id, &definition, &first, &SaveDefaults::default(), "u1", now())
        .await
        .unwrap();

    let correction = FieldSave {
        field_name: "ITEM_QTY".into(),
        value: CaptureValue::Number(BigDecimal::from(7)),
        reason: Some("typo".into()),
        event_type: None,
        signature_type: None,
    };
    let second_now = now() + chrono::Duration::seconds(1);
    let outcome = versioner::save_field(
        &mut conn,
        group.id,
        &definition,
        &correction,
        &SaveDefaults::default(),
        "u2",
        second_now,
    )
    .await
    .unwrap();
    assert_eq!(outcome.sequential_version_num, 2);

    let record = reader::get_record(&mut conn, group.id, &[definition.clone()]).await.unwrap();
    assert_eq!(record["ITEM_QTY"].value, Some(CaptureValue::Number(BigDecimal::from(7))));
    assert_eq!(record["ITEM_QTY"].version, Some(2));

    let trail = reader::get_field_audit_trail(&mut conn, group.id, &definition).await.unwrap();
    assert_eq!(trail.len(), 2);
    let values: Vec<_> = trail.iter().map(|v| v.value.clone()).collect();
    assert_eq!(
        values,
        vec![
            Some(CaptureValue::Number(BigDecimal::from(5))),
            Some(CaptureValue::Number(BigDecimal::from(7))),
        ]
    );
    let actors: Vec<_> = trail.iter().map(|v| v.actor.as_str()).collect();
    assert_eq!(actors, vec!["u1", "u2"]);
}

#[tokio::test]
async fn s3_idempotent_context_resolution() {
    let mut conn = test_conn().await;
    let context = vec![("ORDER".to_string(), "SO1".to_string()), ("LINE".to_string(), "1".to_string())];

    let first = resolver::resolve(&mut conn, "SALES", &context, now()).await.unwrap();
    let second = resolver::resolve(&mut conn, "SALES", &context, now()).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn s4_unknown_field_in_batch_is_rejected_before_any_write() {
    let mut conn = test_conn().await;
    let definition = quantity_field_fixture(&mut conn).await;
    let context = vec![("ORDER".to_string(), "SO2".to_string()), ("LINE".to_string(), "1".to_string())];
    let group = db_fixtures::insert_context_group(&mut conn, "SALES", &context, now()).await;

    // The orchestration that enforces batch atomicity lives in `gateway`;
    // here we exercise the per-field lookup failure it depends on directly.
    let unknown = dictionary::lookup(&mut conn, "SALES", Some(&["DOES_NOT_EXIST".to_string()]))
        .await
        .unwrap();
    assert!(unknown.is_empty());

    // No hot row should exist yet for the known field in this fresh context.
    let record = reader::get_record(&mut conn, group.id, &[definition]).await.unwrap();
    assert_eq!(record["ITEM_QTY"].value, None);
}

#[tokio::test]
async fn s5_same_subject_different_scope_are_independent() {
    let mut conn = test_conn().await;
    let definition = quantity_field_fixture(&mut conn).await;

    let clinic_a = vec![("SUBJECT".to_string(), "P007".to_string()), ("SCOPE".to_string(), "CLINIC_A".to_string())];
    let study_x = vec![("SUBJECT".to_string(), "P007".to_string()), ("SCOPE".to_string(), "STUDY_X".to_string())];

    let group_a = db_fixtures::insert_context_group(&mut conn, "SALES", &clinic_a, now()).await;
    let group_b = db_fixtures::insert_context_group(&mut conn, "SALES", &study_x, now()).await;
    assert_ne!(group_a.id, group_b.id);

    let save_a = FieldSave {
        field_name: "ITEM_QTY".into(),
        value: CaptureValue::Number(BigDecimal::from(1)),
        reason: None,
        event_type: None,
        signature_type: None,
    };
    versioner::save_field(&mut conn, group_a.id, &definition, &save_a, &SaveDefaults::default(), "u1", now())
        .await
        .unwrap();

    let trail_a = reader::get_field_audit_trail(&mut conn, group_a.id, &definition).await.unwrap();
    let trail_b = reader::get_field_audit_trail(&mut conn, group_b.id, &definition).await.unwrap();
    assert_eq!(trail_a.len(), 1);
    assert_eq!(trail_b.len(), 0);
}

#[test_log::test(tokio::test)]
async fn s6_concurrent_writers_on_a_fresh_pair_serialize_through_save_record() {
    use capture_core::{clock::SystemClock, DataCaptureService};
    use capture_storage::PostgresGateway;

    testing::run_against_db(|pool| async move {
        let mut setup_conn = pool.get().await.expect("conn");
        db_fixtures::insert_field_definition(
            &mut setup_conn,
            "SALES",
            "ITEM_QTY",
            DataType::Number,
            "Qty",
            true,
            now(),
        )
        .await;
        drop(setup_conn);

        let context = vec![("ORDER".to_string(), "SO_CONCURRENT".to_string())];

        // Both writers race `save_record`'s own context-resolution retry and
        // the hot row's unique constraint, not `versioner::save_field`
        // directly — that's the only path spec.md §4.3/§8 actually guards.
        let gateway_a = PostgresGateway::new(pool.clone(), SystemClock);
        let gateway_b = PostgresGateway::new(pool.clone(), SystemClock);
        let context_a = context.clone();
        let context_b = context.clone();

        let task_a = async move {
            gateway_a
                .save_record(
                    "SALES",
                    &context_a,
                    vec![FieldSave {
                        field_name: "ITEM_QTY".into(),
                        value: CaptureValue::Number(BigDecimal::from(1)),
                        reason: None,
                        event_type: None,
                        signature_type: None,
                    }],
                    "writer_a",
                    SaveDefaults::default(),
                )
                .await
                .expect("writer_a save_record")
        };
        let task_b = async move {
            gateway_b
                .save_record(
                    "SALES",
                    &context_b,
                    vec![FieldSave {
                        field_name: "ITEM_QTY".into(),
                        value: CaptureValue::Number(BigDecimal::from(2)),
                        reason: None,
                        event_type: None,
                        signature_type: None,
                    }],
                    "writer_b",
                    SaveDefaults::default(),
                )
                .await
                .expect("writer_b save_record")
        };

        let (a, b) = tokio::join!(tokio::spawn(task_a), tokio::spawn(task_b));
        let a = a.expect("writer_a task").saved;
        let b = b.expect("writer_b task").saved;

        let mut versions = vec![a[0].sequential_version_num, b[0].sequential_version_num];
        versions.sort();
        assert_eq!(versions, vec![1, 2]);
        assert_ne!(a[0].version_id, b[0].version_id);

        let mut conn = pool.get().await.expect("conn");
        let definition = dictionary::lookup(&mut conn, "SALES", Some(&["ITEM_QTY".to_string()]))
            .await
            .unwrap()
            .remove(0);
        let group = resolver::find(&mut conn, "SALES", &context)
            .await
            .unwrap()
            .expect("context was resolved by one of the writers");
        let record = reader::get_record(&mut conn, group.id, &[definition]).await.unwrap();
        let final_version = record["ITEM_QTY"].version.unwrap();
        assert_eq!(final_version, 2);
    })
    .await;
}

#[test_log::test(tokio::test)]
async fn s4_batch_with_unknown_field_leaves_no_partial_writes() {
    use capture_core::{clock::SystemClock, DataCaptureService};
    use capture_storage::PostgresGateway;

    testing::run_against_db(|pool| async move {
        let gateway = PostgresGateway::new(pool.clone(), SystemClock);
        gateway
            .define_field(
                "SALES",
                FieldDefinitionInput {
                    field_name: "ITEM_QTY".into(),
                    data_type: DataType::Number,
                    label: "Qty".into(),
                    attributes: Vec::new(),
                    active: true,
                },
                "u1",
            )
            .await
            .expect("define field");

        let context = vec![("ORDER".to_string(), "SO_BATCH".to_string()), ("LINE".to_string(), "1".to_string())];
        let fields = vec![
            FieldSave {
                field_name: "ITEM_QTY".into(),
                value: CaptureValue::Number(BigDecimal::from(9)),
                reason: None,
                event_type: None,
                signature_type: None,
            },
            FieldSave {
                field_name: "DOES_NOT_EXIST".into(),
                value: CaptureValue::String("x".into()),
                reason: None,
                event_type: None,
                signature_type: None,
            },
        ];

        let result = gateway
            .save_record("SALES", &context, fields, "u1", SaveDefaults::default())
            .await;
        assert!(matches!(result, Err(capture_core::CaptureError::UnknownField { .. })));

        let record = gateway
            .get_record("SALES", &context, Some(vec!["ITEM_QTY".to_string()]))
            .await
            .expect("get record");
        assert_eq!(record["ITEM_QTY"].value, None);
    })
    .await;
}

#[test_log::test(tokio::test)]
async fn s7_inactive_field_rejects_save_record() {
    use capture_core::{clock::SystemClock, DataCaptureService};
    use capture_storage::PostgresGateway;

    testing::run_against_db(|pool| async move {
        let gateway = PostgresGateway::new(pool.clone(), SystemClock);
        gateway
            .define_field(
                "SALES",
                FieldDefinitionInput {
                    field_name: "ITEM_QTY".into(),
                    data_type: DataType::Number,
                    label: "Qty".into(),
                    attributes: Vec::new(),
                    active: false,
                },
                "u1",
            )
            .await
            .expect("define inactive field");

        let context = vec![("ORDER".to_string(), "SO_INACTIVE".to_string())];
        let result = gateway
            .save_record(
                "SALES",
                &context,
                vec![FieldSave {
                    field_name: "ITEM_QTY".into(),
                    value: CaptureValue::Number(BigDecimal::from(1)),
                    reason: None,
                    event_type: None,
                    signature_type: None,
                }],
                "u1",
                SaveDefaults::default(),
            )
            .await;
        assert!(matches!(result, Err(CaptureError::InactiveField { .. })));

        // Re-defining the field active again must lift the rejection.
        gateway
            .define_field(
                "SALES",
                FieldDefinitionInput {
                    field_name: "ITEM_QTY".into(),
                    data_type: DataType::Number,
                    label: "Qty".into(),
                    attributes: Vec::new(),
                    active: true,
                },
                "u1",
            )
            .await
            .expect("reactivate field");

        let result = gateway
            .save_record(
                "SALES",
                &context,
                vec![FieldSave {
                    field_name: "ITEM_QTY".into(),
                    value: CaptureValue::Number(BigDecimal::from(1)),
                    reason: None,
                    event_type: None,
                    signature_type: None,
                }],
                "u1",
                SaveDefaults::default(),
            )
            .await;
        assert!(result.is_ok());
    })
    .await;
}
