use std::sync::Arc;
use std::thread;

use anyhow::Result;
use rust_sqlite_storage::{
    storage_record, BatchLimits, ConnectionPool, SqliteConfig, StatementKind, Storage,
    StorageError, Value,
};
use tempfile::NamedTempFile;

#[derive(Debug, Default, Clone, PartialEq)]
struct User {
    id: i64,
    name: String,
    email: String,
    age: Option<i64>,
    balance: f64,
}

storage_record!(User {
    id => "id" [identity, auto_generated],
    name => "name",
    email => "email",
    age => "age",
    balance => "balance",
});

/// Same table, but updates are matched on `email` instead of `id`.
#[derive(Debug, Default, Clone, PartialEq)]
struct UserByEmail {
    id: i64,
    email: String,
    name: String,
}

storage_record!(UserByEmail {
    id => "id" [identity, auto_generated],
    email => "email" [update_key],
    name => "name",
});

fn user(name: &str, email: &str, age: Option<i64>) -> User {
    User {
        name: name.to_string(),
        email: email.to_string(),
        age,
        ..Default::default()
    }
}

// Initialize the database schema
fn initialize_schema(pool: &ConnectionPool) -> Result<()> {
    pool.get()?.execute_batch(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            age INTEGER,
            balance TEXT NOT NULL DEFAULT '0',
            active INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX idx_users_email ON users(email);
        "#,
    )?;
    Ok(())
}

// Helper function to create an in-memory database for testing
fn create_test_pool() -> Result<Arc<ConnectionPool>> {
    let pool = Arc::new(ConnectionPool::new(SqliteConfig::in_memory()));
    initialize_schema(&pool)?;
    Ok(pool)
}

// Helper function to create a temporary file-based database
fn create_temp_pool(max_open: usize) -> Result<(Arc<ConnectionPool>, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let path = temp_file.path().to_string_lossy().into_owned();
    let pool = Arc::new(ConnectionPool::new(
        SqliteConfig::new(path).with_max_open_connections(max_open),
    ));
    initialize_schema(&pool)?;
    Ok((pool, temp_file))
}

fn seed(users: &Storage<User>) -> Result<()> {
    users.insert(&[
        user("John Doe", "john@example.com", Some(30)),
        user("Jane Roe", "jane@example.com", None),
        user("Max Poe", "max@example.com", Some(41)),
    ])?;
    Ok(())
}

#[tokio::test]
async fn test_basic_operations() {
    test_basic_operations_impl().unwrap();
}

fn test_basic_operations_impl() -> Result<()> {
    let pool = create_test_pool()?;
    let users = Storage::<User>::table(pool, "users")?;

    let outcome = users.insert(&[
        user("John Doe", "john@example.com", Some(30)),
        user("Jane Roe", "jane@example.com", None),
        user("Max Poe", "max@example.com", Some(41)),
    ])?;
    assert_eq!(outcome.rows_affected, 3);
    assert_eq!(outcome.last_insert_id, 3);

    let mut john = users
        .get(&["email"], &[Value::from("john@example.com")])?
        .pop()
        .expect("john was inserted");
    assert_eq!(john.id, 1);
    assert_eq!(john.name, "John Doe");
    assert_eq!(john.age, Some(30));

    john.age = Some(31);
    john.balance = 12.5;
    let outcome = users.update(&john)?;
    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.last_insert_id, 0);
    assert_eq!(users.get(&["id"], &[Value::from(1)])?, vec![john]);

    let outcome = users.remove_by_identity(&[Value::from(1)])?;
    assert_eq!(outcome.rows_affected, 1);
    assert!(users.get(&["id"], &[Value::from(1)])?.is_empty());
    assert_eq!(users.get(&[], &[])?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_compiled_statement_text() {
    test_compiled_statement_text_impl().unwrap();
}

fn test_compiled_statement_text_impl() -> Result<()> {
    #[derive(Debug, Default)]
    struct Member {
        id: i64,
        name: String,
    }
    storage_record!(Member {
        id => "id" [identity, auto_generated],
        name => "name",
    });

    let pool = create_test_pool()?;
    let members = Storage::<Member>::table(pool, "users")?;
    let statements = members.statements();

    assert_eq!(
        statements.update(),
        Some("UPDATE users SET name = ? WHERE id = ?;")
    );
    assert_eq!(statements.insert_fields(), ["name"]);
    assert_eq!(
        statements.select_sql(&["id"]),
        "SELECT id, name FROM users WHERE id = ?;"
    );
    Ok(())
}

#[tokio::test]
async fn test_insert_limit() {
    test_insert_limit_impl().unwrap();
}

fn test_insert_limit_impl() -> Result<()> {
    let pool = create_test_pool()?;
    let users = Storage::<User>::table(pool, "users")?.with_limits(BatchLimits {
        insert: 2,
        remove: 2,
    });

    let batch = [
        user("a", "a@example.com", None),
        user("b", "b@example.com", None),
        user("c", "c@example.com", None),
    ];
    let err = users.insert(&batch).unwrap_err();
    assert!(matches!(
        err,
        StorageError::BatchLimit { operation: "insert", limit: 2, got: 3 }
    ));
    assert!(users.get(&[], &[])?.is_empty());

    assert_eq!(users.insert(&batch[..2])?.rows_affected, 2);
    Ok(())
}

#[tokio::test]
async fn test_limits_are_checked_before_connecting() {
    test_limits_are_checked_before_connecting_impl().unwrap();
}

fn test_limits_are_checked_before_connecting_impl() -> Result<()> {
    // Any attempt to connect here would fail with a connection error.
    let pool = Arc::new(ConnectionPool::new(SqliteConfig::new(
        "/nonexistent-dir/for/sure/users.db",
    )));
    let mut users = Storage::<User>::table(Arc::clone(&pool), "users")?;
    users.set_insert_limit(1);
    users.set_remove_limit(1);

    let err = users
        .insert(&[user("a", "a@x", None), user("b", "b@x", None)])
        .unwrap_err();
    assert!(matches!(err, StorageError::BatchLimit { .. }));

    let err = users
        .remove_by_identity(&[Value::from(1), Value::from(2)])
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::BatchLimit { operation: "remove_by_identity", .. }
    ));

    assert_eq!(pool.open_connections(), 0);
    assert!(matches!(
        users.remove_by_identity(&[Value::from(1)]),
        Err(StorageError::Connection(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_remove_variants() {
    test_remove_variants_impl().unwrap();
}

fn test_remove_variants_impl() -> Result<()> {
    let pool = create_test_pool()?;
    let users = Storage::<User>::table(pool, "users")?;
    seed(&users)?;

    assert_eq!(
        users.statements().delete_in_sql(2),
        "DELETE FROM users WHERE id IN (?, ?);"
    );
    let outcome = users.remove_by_identity(&[Value::from(1), Value::from(3), Value::from(99)])?;
    assert_eq!(outcome.rows_affected, 2);

    let outcome = users.remove(
        &["name", "email"],
        &[Value::from("Jane Roe"), Value::from("nobody@example.com")],
    )?;
    assert_eq!(outcome.rows_affected, 0);

    let outcome = users.remove(&["email"], &[Value::from("jane@example.com")])?;
    assert_eq!(outcome.rows_affected, 1);
    assert!(users.get(&[], &[])?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_keys_on_unmapped_columns() {
    test_keys_on_unmapped_columns_impl().unwrap();
}

fn test_keys_on_unmapped_columns_impl() -> Result<()> {
    let pool = create_test_pool()?;
    let users = Storage::<User>::table(Arc::clone(&pool), "users")?;
    seed(&users)?;

    // `active` is a real column that `User` does not map.
    pool.get()?
        .execute("UPDATE users SET active = 0 WHERE email = 'jane@example.com'", [])?;

    let inactive = users.get(&["active"], &[Value::from(0)])?;
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].name, "Jane Roe");
    assert_eq!(users.get(&["users.active"], &[Value::from(1)])?.len(), 2);

    let outcome = users.remove(&["active", "name"], &[Value::from(0), Value::from("Jane Roe")])?;
    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(users.get(&[], &[])?.len(), 2);

    let err = users
        .get(&["active OR 1=1 --"], &[Value::from(0)])
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidColumn { .. }));
    Ok(())
}

#[tokio::test]
async fn test_update_key() {
    test_update_key_impl().unwrap();
}

fn test_update_key_impl() -> Result<()> {
    let pool = create_test_pool()?;
    let users = Storage::<User>::table(Arc::clone(&pool), "users")?;
    seed(&users)?;

    let by_email = Storage::<UserByEmail>::table(pool, "users")?;
    assert_eq!(
        by_email.statements().update(),
        Some("UPDATE users SET name = ? WHERE email = ?;")
    );
    let outcome = by_email.update(&UserByEmail {
        id: 0,
        email: "max@example.com".to_string(),
        name: "Maxine Poe".to_string(),
    })?;
    assert_eq!(outcome.rows_affected, 1);

    let max = users.get(&["id"], &[Value::from(3)])?;
    assert_eq!(max[0].name, "Maxine Poe");
    Ok(())
}

#[tokio::test]
async fn test_view_is_read_only() {
    test_view_is_read_only_impl().unwrap();
}

fn test_view_is_read_only_impl() -> Result<()> {
    let pool = create_test_pool()?;
    let users = Storage::<User>::table(Arc::clone(&pool), "users")?;
    seed(&users)?;

    let adults = Storage::<User>::view(
        pool,
        "adults",
        "SELECT * FROM users WHERE age IS NOT NULL;",
    )?;
    assert!(adults.is_view());

    let names: Vec<String> = adults.get(&[], &[])?.into_iter().map(|u| u.name).collect();
    assert_eq!(names, ["John Doe", "Max Poe"]);
    assert_eq!(adults.get(&["age"], &[Value::from(41)])?.len(), 1);

    let john = user("John Doe", "john@example.com", Some(30));
    assert!(matches!(
        adults.update(&john),
        Err(StorageError::ReadOnlyView { operation: "update", .. })
    ));
    assert!(matches!(
        adults.insert(&[john]),
        Err(StorageError::ReadOnlyView { operation: "insert", .. })
    ));
    assert!(matches!(
        adults.remove_by_identity(&[Value::from(1)]),
        Err(StorageError::ReadOnlyView { .. })
    ));
    assert!(matches!(
        adults.remove(&["id"], &[Value::from(1)]),
        Err(StorageError::ReadOnlyView { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_get_where() {
    test_get_where_impl().unwrap();
}

fn test_get_where_impl() -> Result<()> {
    let pool = create_test_pool()?;
    let users = Storage::<User>::table(pool, "users")?;
    seed(&users)?;

    let found = users.get_where("age > ? OR age IS NULL", &[Value::from(35)])?;
    let emails: Vec<&str> = found.iter().map(|u| u.email.as_str()).collect();
    assert_eq!(emails, ["jane@example.com", "max@example.com"]);

    let err = users.get_where("no_such_column = ?", &[Value::from(1)]).unwrap_err();
    assert!(matches!(
        err,
        StorageError::Execution { kind: StatementKind::Select, .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_decimal_text_and_decode_errors() {
    test_decimal_text_and_decode_errors_impl().unwrap();
}

fn test_decimal_text_and_decode_errors_impl() -> Result<()> {
    let pool = create_test_pool()?;
    let users = Storage::<User>::table(Arc::clone(&pool), "users")?;

    pool.get()?.execute_batch(
        "INSERT INTO users (name, email, balance) VALUES ('Ann', 'ann@example.com', '1024.75');
         INSERT INTO users (name, email, balance) VALUES ('Bob', 'bob@example.com', 'n/a');",
    )?;

    let ann = users.get(&["name"], &[Value::from("Ann")])?;
    assert_eq!(ann[0].balance, 1024.75);

    match users.get(&["name"], &[Value::from("Bob")]) {
        Err(StorageError::Decode { column, field, .. }) => {
            assert_eq!(column, "balance");
            assert_eq!(field, "balance");
        }
        other => panic!("expected a decode error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_engine_errors_are_returned() {
    test_engine_errors_are_returned_impl().unwrap();
}

fn test_engine_errors_are_returned_impl() -> Result<()> {
    let pool = create_test_pool()?;
    let users = Storage::<User>::table(Arc::clone(&pool), "users")?;
    seed(&users)?;

    // UNIQUE(email)
    let err = users
        .insert(&[user("Dup", "john@example.com", None)])
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Execution { kind: StatementKind::Insert, .. }
    ));

    // The connection went back to the pool despite the failure.
    assert_eq!(users.get(&[], &[])?.len(), 3);
    assert_eq!(pool.open_connections(), 1);

    let missing = Storage::<User>::table(pool, "no_such_table")?;
    assert!(matches!(
        missing.remove_by_identity(&[Value::from(1)]),
        Err(StorageError::Execution { kind: StatementKind::Delete, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_readers() {
    test_concurrent_readers_impl().unwrap();
}

fn test_concurrent_readers_impl() -> Result<()> {
    let (pool, _temp_file) = create_temp_pool(4)?;
    let users = Arc::new(Storage::<User>::table(Arc::clone(&pool), "users")?);

    let batch: Vec<User> = (0..50)
        .map(|i| user(&format!("user {i}"), &format!("user{i}@example.com"), Some(i)))
        .collect();
    assert_eq!(users.insert(&batch)?.rows_affected, 50);

    let handles: Vec<_> = (0..8i64)
        .map(|t| {
            let users = Arc::clone(&users);
            thread::spawn(move || -> rust_sqlite_storage::Result<usize> {
                let mut found = 0;
                for i in (t..50).step_by(8) {
                    found += users.get(&["age"], &[Value::from(i)])?.len();
                }
                Ok(found)
            })
        })
        .collect();

    let mut total = 0;
    for handle in handles {
        total += handle.join().expect("reader panicked")?;
    }
    assert_eq!(total, 50);
    assert!(pool.open_connections() <= 4);
    Ok(())
}
