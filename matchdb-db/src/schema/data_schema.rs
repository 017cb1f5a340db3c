pub mod data {
    diesel::table! {
        data.teams (id) {
            id -> Int8,
            display_name -> Text,
            canonical_name -> Text,
            birth_year -> Nullable<Int4>,
            gender -> Nullable<Text>,
            state -> Nullable<Text>,
            matches_played -> Int4,
            wins -> Int4,
            losses -> Int4,
            draws -> Int4,
            elo_rating -> Nullable<Float8>,
            national_rank -> Nullable<Int4>,
            state_rank -> Nullable<Int4>,
            regional_rank -> Nullable<Int4>,
            gotsport_points -> Nullable<Float8>,
            status -> Text,
            merged_into -> Nullable<Int8>,
            merged_at -> Nullable<Timestamp>,
            merge_reason -> Nullable<Text>,
            data_quality_flags -> Array<Text>,
            created_at -> Timestamp,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        data.matches (id) {
            id -> Int8,
            match_date -> Date,
            match_time -> Nullable<Time>,
            home_team_id -> Int8,
            away_team_id -> Int8,
            home_score -> Nullable<Int4>,
            away_score -> Nullable<Int4>,
            league_id -> Nullable<Int8>,
            tournament_id -> Nullable<Int8>,
            venue -> Nullable<Text>,
            division -> Nullable<Text>,
            source_platform -> Text,
            source_match_key -> Text,
            deleted_at -> Nullable<Timestamp>,
            deletion_reason -> Nullable<Text>,
            created_at -> Timestamp,
        }
    }

    diesel::table! {
        data.leagues (id) {
            id -> Int8,
            name -> Text,
            source_event_id -> Nullable<Text>,
            source_platform -> Nullable<Text>,
            start_date -> Nullable<Date>,
            end_date -> Nullable<Date>,
            created_at -> Timestamp,
        }
    }

    diesel::table! {
        data.tournaments (id) {
            id -> Int8,
            name -> Text,
            source_event_id -> Nullable<Text>,
            source_platform -> Nullable<Text>,
            start_date -> Nullable<Date>,
            end_date -> Nullable<Date>,
            created_at -> Timestamp,
        }
    }

    diesel::table! {
        data.canonical_teams (id) {
            id -> Int8,
            canonical_name -> Text,
            birth_year -> Int4,
            gender -> Text,
            state -> Nullable<Text>,
            team_id -> Int8,
            aliases -> Array<Text>,
            created_at -> Timestamp,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        data.source_entity_map (id) {
            id -> Int8,
            source_platform -> Text,
            source_entity_type -> Text,
            source_entity_key -> Text,
            production_id -> Int8,
            created_at -> Timestamp,
        }
    }

    diesel::table! {
        data.league_standings (id) {
            id -> Int8,
            league_id -> Int8,
            team_id -> Int8,
            division -> Nullable<Text>,
            played -> Int4,
            wins -> Int4,
            losses -> Int4,
            draws -> Int4,
            points -> Int4,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        data.rank_history (id) {
            id -> Int8,
            team_id -> Int8,
            snapshot_date -> Date,
            elo_rating -> Nullable<Float8>,
            national_rank -> Nullable<Int4>,
            state_rank -> Nullable<Int4>,
        }
    }

    diesel::table! {
        data.seasons (id) {
            id -> Int8,
            year -> Int4,
            is_current -> Bool,
        }
    }

    diesel::allow_tables_to_appear_in_same_query!(
        teams,
        matches,
        leagues,
        tournaments,
        canonical_teams,
        source_entity_map,
        league_standings,
        rank_history,
        seasons,
    );
}
