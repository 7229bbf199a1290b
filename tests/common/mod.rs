//! Shared fixtures: a seeded SQLite meetings store and generator helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use meeting_sql_agent::catalog::SchemaCatalog;
use meeting_sql_agent::config::{AgentSettings, PoolOptions};
use meeting_sql_agent::db::DbPool;
use meeting_sql_agent::error::GenerationError;
use meeting_sql_agent::llm::{ScriptedGenerator, TextGenerator};
use meeting_sql_agent::models::ConnectionConfig;
use meeting_sql_agent::RetrievalAgent;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempPath;

const SCHEMA: &[&str] = &[
    "CREATE TABLE firms (
        firm_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        sector TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE employees (
        employee_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE contacts (
        contact_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT,
        address TEXT,
        firm_id TEXT REFERENCES firms(firm_id),
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE meetings (
        meeting_id TEXT PRIMARY KEY,
        beam_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT,
        date TEXT NOT NULL,
        created_at TEXT NOT NULL,
        firm_attended_id TEXT REFERENCES firms(firm_id)
    )",
    "CREATE TABLE meeting_firms (meeting_id TEXT, firm_id TEXT)",
    "CREATE TABLE contact_meetings (contact_id TEXT, meeting_id TEXT)",
    "CREATE TABLE employee_meetings (employee_id TEXT, meeting_id TEXT)",
    "CREATE VIEW meeting_notes AS
        SELECT m.beam_id, m.title, m.content, m.date,
               fa.name AS firm_attended, fa.sector AS firm_attended_sector,
               (SELECT group_concat(f.name, ', ') FROM meeting_firms mf
                  JOIN firms f ON f.firm_id = mf.firm_id
                 WHERE mf.meeting_id = m.meeting_id) AS firms_discussed,
               (SELECT group_concat(c.name, ', ') FROM contact_meetings cm
                  JOIN contacts c ON c.contact_id = cm.contact_id
                 WHERE cm.meeting_id = m.meeting_id) AS contacts,
               (SELECT group_concat(e.name, ', ') FROM employee_meetings em
                  JOIN employees e ON e.employee_id = em.employee_id
                 WHERE em.meeting_id = m.meeting_id) AS employees
          FROM meetings m
          LEFT JOIN firms fa ON fa.firm_id = m.firm_attended_id",
];

const SEED: &[&str] = &[
    "INSERT INTO firms VALUES
        ('f-acme', 'Acme Capital', 'Finance', '2024-01-01 09:00:00'),
        ('f-globex', 'Globex Energy', 'Energy', '2024-01-01 09:00:00'),
        ('f-nimbus', 'Nimbus Robotics', 'Technology', '2024-01-01 09:00:00')",
    "INSERT INTO employees VALUES
        ('e-harper', 'Alice Harper', 'alice.harper@harveys.example', '2024-01-01 09:00:00'),
        ('e-stone', 'Bob Stone', 'bob.stone@harveys.example', '2024-01-01 09:00:00')",
    "INSERT INTO contacts VALUES
        ('c-diaz', 'Carol Diaz', 'carol@acme.example', '1 Main St', 'f-acme', '2024-01-01 09:00:00')",
    "INSERT INTO meetings VALUES
        ('m-1', 'BEAM-001', 'Quarterly review with Acme',
         'Acme walked through their plans to use AI for credit scoring. Nimbus Robotics was mentioned as a vendor.',
         '2024-03-05 10:00:00', '2024-03-05 12:00:00', 'f-acme'),
        ('m-2', 'BEAM-002', 'Energy outlook',
         'Globex presented the twelve month pipeline for offshore wind projects.',
         '2024-04-10 15:00:00', '2024-04-10 17:00:00', 'f-globex')",
    "INSERT INTO meeting_firms VALUES ('m-1', 'f-nimbus'), ('m-2', 'f-globex')",
    "INSERT INTO contact_meetings VALUES ('c-diaz', 'm-1')",
    "INSERT INTO employee_meetings VALUES ('e-harper', 'm-1'), ('e-stone', 'm-2')",
];

/// A seeded meetings store in a temporary file.
pub struct TestStore {
    path: TempPath,
}

impl TestStore {
    pub async fn seeded() -> Self {
        let path = tempfile::NamedTempFile::new().unwrap().into_temp_path();
        let store = Self { path };

        let writer = store.writable_pool().await;
        for statement in SCHEMA.iter().chain(SEED) {
            sqlx::query(statement).execute(&writer).await.unwrap();
        }
        writer.close().await;
        store
    }

    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    /// Writable pool for setup and for checking the store afterwards.
    pub async fn writable_pool(&self) -> SqlitePool {
        let options = SqliteConnectOptions::from_str(&self.url())
            .unwrap()
            .create_if_missing(true);
        SqlitePool::connect_with(options).await.unwrap()
    }

    /// Read-only pool, as the agent uses it.
    pub async fn agent_pool(&self) -> DbPool {
        let config = ConnectionConfig::new(self.url(), PoolOptions::default()).unwrap();
        DbPool::connect(&config).await.unwrap()
    }

    pub async fn agent(&self, generator: Arc<dyn TextGenerator>, settings: AgentSettings) -> RetrievalAgent {
        RetrievalAgent::new(
            self.agent_pool().await,
            Arc::new(SchemaCatalog::meetings()),
            generator,
            &settings,
        )
    }

    pub async fn count(&self, table: &str) -> i64 {
        let pool = self.writable_pool().await;
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap();
        pool.close().await;
        count
    }
}

/// Generator output proposing `sql`.
pub fn query(sql: &str) -> String {
    serde_json::json!({
        "thoughts": ["Work out the tables and joins needed."],
        "possible": true,
        "query": sql,
    })
    .to_string()
}

pub fn scripted<I, S>(responses: I) -> Arc<ScriptedGenerator>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Arc::new(ScriptedGenerator::new(responses))
}

/// Answers by prompt content instead of call order, so it can serve
/// concurrent requests: query prompts get `sql`, answer prompts get `answer`.
pub struct PromptRouter {
    pub sql: String,
    pub answer: String,
}

#[async_trait]
impl TextGenerator for PromptRouter {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.contains("<data>") {
            Ok(self.answer.clone())
        } else {
            Ok(query(&self.sql))
        }
    }
}
