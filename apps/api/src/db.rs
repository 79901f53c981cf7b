use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Tables and indexes, created idempotently at startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS job_descriptions (
        id          UUID PRIMARY KEY,
        text        TEXT NOT NULL,
        filename    TEXT NOT NULL,
        s3_key      TEXT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cvs (
        id          UUID PRIMARY KEY,
        job_id      UUID NOT NULL REFERENCES job_descriptions (id) ON DELETE CASCADE,
        text        TEXT NOT NULL,
        filename    TEXT NOT NULL,
        s3_key      TEXT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS evaluations (
        id                   UUID PRIMARY KEY,
        cv_id                UUID NOT NULL REFERENCES cvs (id) ON DELETE CASCADE,
        skill_score          DOUBLE PRECISION NOT NULL,
        cultural_score       DOUBLE PRECISION NOT NULL,
        overall_score        DOUBLE PRECISION NOT NULL,
        skill_assessment     TEXT NOT NULL,
        cultural_assessment  TEXT NOT NULL,
        summary              TEXT NOT NULL,
        recommendation       TEXT NOT NULL,
        raw_output           TEXT NOT NULL,
        error_flag           BOOLEAN NOT NULL DEFAULT FALSE,
        status               TEXT NOT NULL,
        transitions          JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cvs_job_id ON cvs (job_id)",
    "CREATE INDEX IF NOT EXISTS idx_evaluations_cv_id ON evaluations (cv_id, created_at DESC)",
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

pub async fn init_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready ({} statements)", SCHEMA.len());
    Ok(())
}
