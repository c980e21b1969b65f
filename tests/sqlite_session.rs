use std::fs;

use anyhow::Result;
use rust_sqlserver::{
    ColumnData, Error, SqliteSession, Table, TemplateContext, Value,
};
use tempfile::{NamedTempFile, TempDir};

// Helper function to create an in-memory database for testing
fn create_test_db() -> Result<SqliteSession> {
    let mut session = SqliteSession::open_in_memory()?;
    initialize_schema(&mut session)?;
    Ok(session)
}

// Helper function to create a temporary file-based database
fn create_temp_db() -> Result<(SqliteSession, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let mut session = SqliteSession::open_sqlite(temp_file.path())?;
    initialize_schema(&mut session)?;
    Ok((session, temp_file))
}

fn initialize_schema(session: &mut SqliteSession) -> Result<()> {
    session.execute(
        r#"
        CREATE TABLE Customers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            score REAL,
            active INTEGER
        );
        INSERT INTO Customers (id, name, score, active) VALUES (1, 'Ada', 9.5, 1);
        INSERT INTO Customers (id, name, score, active) VALUES (2, 'Grace', NULL, 0);
        "#,
    )?;
    Ok(())
}

fn template_dir() -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("select_all.sql"), "SELECT * FROM {{ target }} ORDER BY id")?;
    fs::write(
        dir.path().join("rename.sql"),
        "UPDATE {{ target }} SET name = '{{ name }}' WHERE id = {{ id }}",
    )?;
    fs::write(
        dir.path().join("half_broken.sql"),
        "INSERT INTO {{ target }} (id, name) VALUES (10, 'Linus');\nINSERT INTO no_such_table VALUES (1);",
    )?;
    Ok(dir)
}

fn new_customers() -> Result<Table> {
    Ok(Table::new()
        .with_column("id", ColumnData::Integer(vec![Some(3), Some(4), Some(5)]))?
        .with_column(
            "name",
            ColumnData::Text(vec![Some("Edsger".into()), Some("Barbara".into()), Some("Ken".into())]),
        )?
        .with_column("score", ColumnData::Real(vec![Some(7.25), None, Some(f64::NAN)]))?
        .with_column("active", ColumnData::Boolean(vec![Some(true), None, Some(false)]))?)
}

fn count(session: &mut SqliteSession, sql: &str) -> Result<i64> {
    let table = session.raw_query(sql)?;
    Ok(table.value(0, "n").and_then(|v| v.as_i64()).unwrap_or(-1))
}

#[test]
fn test_query_to_table_renders_target() {
    test_query_to_table_renders_target_impl().unwrap();
}

fn test_query_to_table_renders_target_impl() -> Result<()> {
    let mut session = create_test_db()?;
    let dir = template_dir()?;

    let ctx = TemplateContext::new().with_value("target", "Customers");
    let table = session.query_to_table("select_all.sql", dir.path(), &ctx)?;

    assert_eq!(table.column_names(), vec!["id", "name", "score", "active"]);
    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.value(0, "name"), Some(Value::Text("Ada".into())));
    assert_eq!(table.value(1, "score"), Some(Value::Null));
    Ok(())
}

#[test]
fn test_rendered_template_matches_literal_sql() -> Result<()> {
    let mut session = create_test_db()?;
    let dir = template_dir()?;
    let ctx = TemplateContext::new().with_value("target", "Customers");

    let rendered = rust_sqlserver::render_template("select_all.sql", dir.path(), &ctx)?;
    assert_eq!(rendered, "SELECT * FROM Customers ORDER BY id");

    let from_template = session.query_to_table("select_all.sql", dir.path(), &ctx)?;
    let from_literal = session.raw_query(&rendered)?;
    assert_eq!(from_template, from_literal);
    Ok(())
}

#[test]
fn test_execute_template_commits() -> Result<()> {
    let (mut session, temp_file) = create_temp_db()?;
    let dir = template_dir()?;

    let ctx = TemplateContext::new()
        .with_value("target", "Customers")
        .with_value("name", "Ada Lovelace")
        .with_value("id", 1);
    session.execute_template("rename.sql", dir.path(), &ctx)?;
    drop(session);

    // Visible from a fresh connection only if it was committed
    let mut reopened = SqliteSession::open_sqlite(temp_file.path())?;
    let table = reopened.raw_query("SELECT name FROM Customers WHERE id = 1")?;
    assert_eq!(table.value(0, "name"), Some(Value::Text("Ada Lovelace".into())));
    Ok(())
}

#[test]
fn test_execute_template_failure_rolls_back() -> Result<()> {
    let mut session = create_test_db()?;
    let dir = template_dir()?;

    let ctx = TemplateContext::new().with_value("target", "Customers");
    let err = session
        .execute_template("half_broken.sql", dir.path(), &ctx)
        .unwrap_err();
    assert!(matches!(err, Error::Query { .. }));
    assert_eq!(count(&mut session, "SELECT COUNT(*) AS n FROM Customers")?, 2);
    Ok(())
}

#[test]
fn test_missing_template_is_template_error() -> Result<()> {
    let mut session = create_test_db()?;
    let dir = template_dir()?;

    let err = session
        .query_to_table("missing.sql", dir.path(), TemplateContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::Template(_)));
    Ok(())
}

#[test]
fn test_raw_query_failure_is_query_error() -> Result<()> {
    let mut session = create_test_db()?;

    let err = session.raw_query("SELECT * FROM Nowhere").unwrap_err();
    match err {
        Error::Query { sql, .. } => assert_eq!(sql, "SELECT * FROM Nowhere"),
        other => panic!("expected query error, got {other:?}"),
    }

    // The session stays usable after a failed statement
    assert_eq!(count(&mut session, "SELECT COUNT(*) AS n FROM Customers")?, 2);
    Ok(())
}

#[test]
fn test_bulk_write_truncate_replaces_rows() -> Result<()> {
    let mut session = create_test_db()?;
    let input = new_customers()?;

    let summary = session.bulk_write(&input, "Customers", true)?;
    assert_eq!(summary.rows, 3);
    assert!(summary.truncated);
    assert_eq!(summary.target, "Customers");

    let table = session.raw_query("SELECT id FROM Customers ORDER BY id")?;
    assert_eq!(
        table.column("id"),
        Some(&ColumnData::Integer(vec![Some(3), Some(4), Some(5)]))
    );
    Ok(())
}

#[test]
fn test_bulk_write_appends_without_truncate() -> Result<()> {
    let mut session = create_test_db()?;
    let input = new_customers()?;

    let summary = session.bulk_write(&input, "Customers", false)?;
    assert_eq!(summary.rows, 3);
    assert!(!summary.truncated);

    let table = session.raw_query("SELECT id FROM Customers ORDER BY id")?;
    assert_eq!(
        table.column("id"),
        Some(&ColumnData::Integer(vec![Some(1), Some(2), Some(3), Some(4), Some(5)]))
    );
    Ok(())
}

#[test]
fn test_missing_values_round_trip_as_null() -> Result<()> {
    let mut session = create_test_db()?;
    let dir = template_dir()?;
    session.bulk_write(&new_customers()?, "Customers", true)?;

    let ctx = TemplateContext::new().with_value("target", "Customers");
    let table = session.query_to_table("select_all.sql", dir.path(), &ctx)?;

    assert_eq!(table.value(0, "score"), Some(Value::Real(7.25)));
    // None and NaN both land as NULL, never as a sentinel number
    assert_eq!(table.value(1, "score"), Some(Value::Null));
    assert_eq!(table.value(2, "score"), Some(Value::Null));
    assert_eq!(table.value(1, "active"), Some(Value::Null));
    // Booleans are stored by SQLite as integers
    assert_eq!(table.value(0, "active"), Some(Value::Integer(1)));
    assert_eq!(table.value(2, "active"), Some(Value::Integer(0)));

    assert_eq!(
        count(&mut session, "SELECT COUNT(*) AS n FROM Customers WHERE score IS NULL")?,
        2
    );
    Ok(())
}

#[test]
fn test_failed_insert_rolls_back() -> Result<()> {
    let mut session = create_test_db()?;

    // Third row violates NOT NULL on name
    let input = Table::new()
        .with_column("id", ColumnData::Integer(vec![Some(10), Some(11), Some(12)]))?
        .with_column(
            "name",
            ColumnData::Text(vec![Some("ok".into()), Some("ok".into()), None]),
        )?;

    let err = session.bulk_write(&input, "Customers", false).unwrap_err();
    match &err {
        Error::Write { target, .. } => assert_eq!(target, "Customers"),
        other => panic!("expected write error, got {other:?}"),
    }
    assert_eq!(count(&mut session, "SELECT COUNT(*) AS n FROM Customers")?, 2);

    // Same answer straight from the connection, outside the session
    let rows: i64 = session
        .backend()
        .connection()
        .query_row("SELECT COUNT(*) FROM Customers", [], |row| row.get(0))?;
    assert_eq!(rows, 2);
    Ok(())
}

#[test]
fn test_mixed_type_column_reads_as_text() -> Result<()> {
    let mut session = create_test_db()?;
    session.execute(
        "CREATE TABLE Codes (code); INSERT INTO Codes VALUES ('A1'); INSERT INTO Codes VALUES (42); INSERT INTO Codes VALUES (NULL);",
    )?;

    let table = session.raw_query("SELECT code FROM Codes ORDER BY rowid")?;
    assert_eq!(
        table.column("code"),
        Some(&ColumnData::Text(vec![Some("A1".into()), Some("42".into()), None]))
    );
    Ok(())
}

#[test]
fn test_bulk_write_into_missing_table_is_write_error() -> Result<()> {
    let mut session = create_test_db()?;

    let err = session
        .bulk_write(&new_customers()?, "NoSuchTable", false)
        .unwrap_err();
    assert!(matches!(err, Error::Write { .. }));
    Ok(())
}

#[test]
fn test_empty_input_is_not_an_error() -> Result<()> {
    let mut session = create_test_db()?;

    let empty = Table::new()
        .with_column("id", ColumnData::Integer(vec![]))?
        .with_column("name", ColumnData::Text(vec![]))?;
    let summary = session.bulk_write(&empty, "Customers", false)?;
    assert_eq!(summary.rows, 0);
    assert_eq!(count(&mut session, "SELECT COUNT(*) AS n FROM Customers")?, 2);

    let summary = session.bulk_write(&Table::new(), "Customers", true)?;
    assert_eq!(summary.rows, 0);
    assert_eq!(count(&mut session, "SELECT COUNT(*) AS n FROM Customers")?, 0);
    Ok(())
}

#[test]
fn test_bulk_write_quotes_column_names() -> Result<()> {
    let mut session = create_test_db()?;
    session.execute(r#"CREATE TABLE Notes ("note text" TEXT, "order" INTEGER)"#)?;

    let input = Table::new()
        .with_column("note text", ColumnData::Text(vec![Some("hello".into())]))?
        .with_column("order", ColumnData::Integer(vec![Some(1)]))?;
    session.bulk_write(&input, "Notes", false)?;

    let table = session.raw_query(r#"SELECT "note text", "order" FROM Notes"#)?;
    assert_eq!(
        table.row(0),
        Some(vec![Value::Text("hello".into()), Value::Integer(1)])
    );
    Ok(())
}

#[test]
fn test_bulk_write_commits_to_disk() -> Result<()> {
    let (mut session, temp_file) = create_temp_db()?;
    session.bulk_write(&new_customers()?, "Customers", false)?;
    drop(session);

    let mut reopened = SqliteSession::open_sqlite(temp_file.path())?;
    assert_eq!(count(&mut reopened, "SELECT COUNT(*) AS n FROM Customers")?, 5);
    Ok(())
}
