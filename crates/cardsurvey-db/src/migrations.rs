use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, sessions, surveys, answers)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                password      TEXT NOT NULL,
                display_name  TEXT NOT NULL,
                photo_url     TEXT,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                revoked_at  TEXT
            );

            CREATE TABLE surveys (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                survey_type     TEXT NOT NULL DEFAULT 'card',
                questions       TEXT NOT NULL,
                question_count  INTEGER NOT NULL,
                responses       INTEGER NOT NULL DEFAULT 0,
                skip_count      INTEGER NOT NULL DEFAULT 0,
                status          TEXT NOT NULL CHECK (status IN ('draft', 'active', 'closed')),
                privacy         TEXT NOT NULL CHECK (privacy IN ('public', 'private')),
                created_by      TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_surveys_creator
                ON surveys(created_by, created_at);

            CREATE INDEX idx_surveys_public
                ON surveys(status, privacy, created_at);

            CREATE TABLE survey_option_counts (
                survey_id     TEXT NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
                position      INTEGER NOT NULL,
                option_value  TEXT NOT NULL,
                count         INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (survey_id, option_value)
            );

            CREATE TABLE user_survey_answers (
                user_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                survey_id     TEXT NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
                question_id   TEXT NOT NULL,
                answer_value  TEXT,
                is_skipped    INTEGER NOT NULL,
                answered_at   TEXT NOT NULL,
                PRIMARY KEY (user_id, survey_id)
            );

            CREATE INDEX idx_answers_survey
                ON user_survey_answers(survey_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
