pub mod staging {
    diesel::table! {
        staging.games (id) {
            id -> Int8,
            source_platform -> Text,
            source_match_key -> Text,
            match_number -> Nullable<Text>,
            match_date -> Nullable<Date>,
            match_time -> Nullable<Time>,
            home_team_name -> Text,
            away_team_name -> Text,
            home_score -> Nullable<Int4>,
            away_score -> Nullable<Int4>,
            event_source_id -> Nullable<Text>,
            event_name -> Nullable<Text>,
            event_kind -> Nullable<Text>,
            venue -> Nullable<Text>,
            division -> Nullable<Text>,
            state -> Nullable<Text>,
            status -> Text,
            raw_data -> Jsonb,
            processed -> Bool,
            scraped_at -> Timestamp,
        }
    }

    diesel::table! {
        staging.events (id) {
            id -> Int8,
            source_platform -> Text,
            source_event_id -> Text,
            name -> Text,
            kind -> Text,
            year -> Nullable<Int4>,
            scraped_at -> Timestamp,
        }
    }

    diesel::table! {
        staging.rejected (id) {
            id -> Int8,
            source_platform -> Text,
            source_match_key -> Text,
            match_date -> Nullable<Date>,
            home_team_name -> Text,
            away_team_name -> Text,
            home_score -> Nullable<Int4>,
            away_score -> Nullable<Int4>,
            event_name -> Nullable<Text>,
            raw_data -> Jsonb,
            rejection_code -> Text,
            rejection_reason -> Text,
            rejected_at -> Timestamp,
        }
    }

    diesel::allow_tables_to_appear_in_same_query!(games, events, rejected);
}
