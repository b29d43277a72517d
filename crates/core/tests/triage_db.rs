use rusqlite::Connection;
use tempfile::tempdir;
use triage_core::db::{DbError, PersistenceGateway, Record, Table, TriageDb};
use triage_core::model::{Classification, ClassificationResult, SessionRecord};

fn verdict(sample: &str, hash: &str) -> ClassificationResult {
    ClassificationResult {
        sample_output_name: sample.to_string(),
        classification: Classification::ProbablyExploitable,
        description: "Heap error".to_string(),
        fault_hash: hash.to_string(),
        comment: String::new(),
    }
}

#[test]
fn triage_db_initializes_schema_and_persists_across_reopen() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("triage.db");

    {
        let db = TriageDb::open(&db_path).expect("open db");
        let version: i32 = db
            .connection()
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, 2);

        assert!(db.insert(&Record::Classification(verdict("fuzz000:id:1", "aa.bb"))).expect("insert"));
        assert!(db.exists(Table::Classifications, "fuzz000:id:1").expect("exists"));
        assert!(!db.exists(Table::Classifications, "fuzz000:id:2").expect("exists"));
    }

    {
        let db = TriageDb::open(&db_path).expect("re-open db");
        let rows = db.list_classifications().expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sample, "fuzz000:id:1");
        assert_eq!(rows[0].classification, "PROBABLY_EXPLOITABLE");
        assert_eq!(rows[0].hash, "aa.bb");
        assert!(!rows[0].recorded_at.is_empty());
    }
}

#[test]
fn repeated_insert_of_same_key_is_a_no_op() {
    let db = TriageDb::open_in_memory().expect("open db");
    let record = Record::Classification(verdict("fuzz000:id:1", "aa.bb"));
    assert!(db.insert(&record).expect("first insert"));
    assert!(!db.insert(&record).expect("second insert"));

    let changed = Record::Classification(verdict("fuzz000:id:1", "cc.dd"));
    assert!(!db.insert(&changed).expect("conflicting insert"));
    let rows = db.list_classifications().expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].hash, "aa.bb");
}

#[test]
fn sessions_are_stored_and_looked_up_explicitly() {
    let db = TriageDb::open_in_memory().expect("open db");
    let session = SessionRecord { session_id: "run-1".to_string(), process_group_id: 4242 };
    let record = Record::Session(session.clone());
    assert_eq!(record.table(), Table::Sessions);
    assert_eq!(record.key(), "run-1");

    assert!(db.insert(&record).expect("insert session"));
    assert!(db.exists(Table::Sessions, "run-1").expect("exists"));
    assert_eq!(db.load_session("run-1").expect("load"), Some(session));
    assert_eq!(db.load_session("run-2").expect("load missing"), None);
}

#[test]
fn triage_db_open_errors_on_unsupported_schema_version() {
    let tmp = tempdir().expect("temp dir");
    let db_path = tmp.path().join("triage.db");
    {
        let conn = Connection::open(&db_path).expect("open raw sqlite db");
        conn.pragma_update(None, "user_version", 99_i32).expect("set user_version pragma");
    }

    match TriageDb::open(&db_path) {
        Err(DbError::UnsupportedSchemaVersion { found, min_supported, max_supported }) => {
            assert_eq!(found, 99);
            assert_eq!(min_supported, 0);
            assert_eq!(max_supported, 2);
        }
        Err(err) => panic!("expected UnsupportedSchemaVersion error, got different DbError: {err}"),
        Ok(_) => panic!("expected UnsupportedSchemaVersion error, got Ok(_)"),
    }
}

#[test]
fn version_one_database_is_migrated_forward() {
    let tmp = tempdir().expect("temp dir");
    let db_path = tmp.path().join("triage.db");
    {
        let conn = Connection::open(&db_path).expect("open raw sqlite db");
        conn.execute_batch(
            r#"
            CREATE TABLE classifications (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                sample         TEXT NOT NULL UNIQUE,
                classification TEXT NOT NULL,
                description    TEXT NOT NULL,
                hash           TEXT NOT NULL,
                user_comment   TEXT NOT NULL DEFAULT '',
                recorded_at    TEXT NOT NULL
            );
            PRAGMA user_version = 1;
            "#,
        )
        .expect("seed v1 schema");
    }

    let db = TriageDb::open(&db_path).expect("open v1 db");
    let session = SessionRecord { session_id: "s".to_string(), process_group_id: 1 };
    assert!(db.insert_session(&session).expect("sessions table exists"));
}
