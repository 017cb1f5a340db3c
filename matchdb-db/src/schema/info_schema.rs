pub mod info {
    diesel::table! {
        info.audit_log (id) {
            id -> Int8,
            table_name -> Text,
            record_id -> Int8,
            action -> Text,
            old_data -> Nullable<Jsonb>,
            new_data -> Nullable<Jsonb>,
            changed_by -> Text,
            changed_at -> Timestamp,
        }
    }

    diesel::table! {
        info.promotion_errors (id) {
            id -> Int8,
            staging_game_id -> Int8,
            source_match_key -> Text,
            message -> Text,
            errored_at -> Timestamp,
        }
    }

    diesel::allow_tables_to_appear_in_same_query!(audit_log, promotion_errors);
}
