// @generated in spirit: hand-maintained to match migrations/, in the style
// diesel print-schema would produce.

diesel::table! {
    field_definition (id) {
        id -> BigInt,
        application -> Text,
        field_name -> Text,
        data_type -> Text,
        label -> Text,
        attributes_blob -> Binary,
        active -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        created_by -> Text,
        updated_by -> Text,
    }
}

diesel::table! {
    field_definition_version (id) {
        id -> BigInt,
        field_definition_id -> BigInt,
        effective_from -> Timestamp,
        actor -> Text,
        change_description -> Nullable<Text>,
        previous_blob -> Nullable<Binary>,
        new_blob -> Binary,
    }
}

diesel::table! {
    context_group (id) {
        id -> BigInt,
        application -> Text,
        fingerprint -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    context_group_item (id) {
        id -> BigInt,
        context_group_id -> BigInt,
        key -> Text,
        value -> Text,
    }
}

diesel::table! {
    capture_data (id) {
        id -> BigInt,
        field_definition_id -> BigInt,
        context_group_id -> BigInt,
        value_string -> Nullable<Text>,
        value_number -> Nullable<Numeric>,
        current_version_id -> Nullable<BigInt>,
        current_version_num -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    capture_data_version (id) {
        id -> BigInt,
        capture_data_id -> BigInt,
        sequential_version_num -> Integer,
        value_string_versioned -> Nullable<Text>,
        value_number_versioned -> Nullable<Numeric>,
        changed_at -> Timestamp,
        changed_by -> Text,
        change_reason -> Nullable<Text>,
        signature_type -> Nullable<Text>,
        event_type -> Nullable<Text>,
    }
}

diesel::table! {
    audit_event (id) {
        id -> BigInt,
        timestamp -> Timestamp,
        actor -> Text,
        application -> Text,
        event_type -> Text,
        affected_type -> Text,
        affected_id -> Text,
        details_blob -> Binary,
    }
}

diesel::joinable!(field_definition_version -> field_definition (field_definition_id));
diesel::joinable!(context_group_item -> context_group (context_group_id));
diesel::joinable!(capture_data -> field_definition (field_definition_id));
diesel::joinable!(capture_data -> context_group (context_group_id));
diesel::joinable!(capture_data_version -> capture_data (capture_data_id));

diesel::allow_tables_to_appear_in_same_query!(
    field_definition,
    field_definition_version,
    context_group,
    context_group_item,
    capture_data,
    capture_data_version,
    audit_event,
);
