use persondb_core::db::open_db;
use persondb_core::db::schema::ensure_users_table;
use persondb_core::{
    Person, PersonRepository, PersonStore, PersonTransaction, RepoConfig, RepoError,
    SqlitePersonRepository,
};
use std::time::Duration;

fn file_repo(dir: &tempfile::TempDir) -> SqlitePersonRepository {
    let conn = open_db(dir.path().join("people.sqlite3")).unwrap();
    ensure_users_table(&conn).unwrap();
    SqlitePersonRepository::try_new(conn).unwrap()
}

#[test]
fn committed_writes_are_visible_and_durable() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = file_repo(&dir);

    let tx = repo.begin().unwrap();
    tx.create(&Person::new(1, "Otabek", "otabek94_30@mail.ru"))
        .unwrap();
    tx.create(&Person::new(2, "Ilyosbek", "ilyosbek@mail.ru"))
        .unwrap();
    assert_eq!(tx.find().unwrap().len(), 2);
    tx.commit().unwrap();

    assert_eq!(repo.find().unwrap().len(), 2);
    repo.close().unwrap();

    let reopened = file_repo(&dir);
    assert_eq!(reopened.find_by_id(2).unwrap().name, "Ilyosbek");
}

#[test]
fn rollback_discards_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = file_repo(&dir);
    repo.create(&Person::new(1, "Otabek", "otabek94_30@mail.ru"))
        .unwrap();

    let tx = repo.begin().unwrap();
    tx.update(&Person::new(1, "Otaiba", "otaiba94_30@mail.ru"))
        .unwrap();
    tx.delete(1).unwrap();
    assert!(matches!(tx.find_by_id(1), Err(RepoError::NotFound(1))));
    tx.rollback().unwrap();

    assert_eq!(repo.find_by_id(1).unwrap().name, "Otabek");
}

#[test]
fn dropping_transaction_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = file_repo(&dir);

    {
        let tx = repo.begin().unwrap();
        tx.create(&Person::new(7, "Dropped", "dropped@mail.ru"))
            .unwrap();
    }

    assert!(repo.find().unwrap().is_empty());
}

#[test]
fn failed_statement_inside_transaction_keeps_earlier_writes_until_commit() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = file_repo(&dir);

    let tx = repo.begin().unwrap();
    tx.create(&Person::new(1, "Otabek", "otabek94_30@mail.ru"))
        .unwrap();
    let err = tx
        .create(&Person::new(1, "Again", "again@mail.ru"))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateId(1)));
    tx.commit().unwrap();

    assert_eq!(
        repo.find().unwrap(),
        vec![Person::new(1, "Otabek", "otabek94_30@mail.ru")]
    );
}

#[test]
fn interrupted_write_aborts_the_whole_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("people.sqlite3")).unwrap();
    ensure_users_table(&conn).unwrap();
    conn.execute_batch(
        "CREATE TABLE filler (n INTEGER);
         WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 3000)
         INSERT INTO filler SELECT n FROM seq;
         CREATE TRIGGER slow_insert BEFORE INSERT ON users WHEN NEW.id = 99
         BEGIN
             SELECT count(*) FROM filler a, filler b, filler c;
         END;",
    )
    .unwrap();
    let mut repo = SqlitePersonRepository::with_config(
        conn,
        RepoConfig::with_statement_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    let tx = repo.begin().unwrap();
    tx.create(&Person::new(1, "Ann", "ann@example.com")).unwrap();
    let slow = tx.create(&Person::new(99, "Slow", "slow@example.com"));
    assert!(matches!(slow, Err(RepoError::DeadlineExceeded(_))));

    let after = tx.create(&Person::new(2, "Bob", "bob@example.com"));
    assert!(matches!(after, Err(RepoError::TransactionAborted)));
    assert!(matches!(tx.find(), Err(RepoError::TransactionAborted)));
    assert!(matches!(tx.commit(), Err(RepoError::TransactionAborted)));

    assert!(repo.find().unwrap().is_empty());
}

#[test]
fn aborted_transaction_rejects_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("people.sqlite3")).unwrap();
    ensure_users_table(&conn).unwrap();
    conn.execute_batch(
        "CREATE TABLE filler (n INTEGER);
         WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 3000)
         INSERT INTO filler SELECT n FROM seq;
         CREATE TRIGGER slow_update BEFORE UPDATE ON users WHEN NEW.name = 'slow'
         BEGIN
             SELECT count(*) FROM filler a, filler b, filler c;
         END;",
    )
    .unwrap();
    let mut repo = SqlitePersonRepository::with_config(
        conn,
        RepoConfig::with_statement_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    repo.create(&Person::new(1, "Ann", "ann@example.com")).unwrap();

    let tx = repo.begin().unwrap();
    tx.delete(1).unwrap();
    tx.create(&Person::new(1, "slow", "ann@example.com")).unwrap();
    let slow = tx.update(&Person::new(1, "slow", "ann@example.com"));
    assert!(matches!(slow, Err(RepoError::DeadlineExceeded(_))));
    assert!(matches!(tx.rollback(), Err(RepoError::TransactionAborted)));

    let people = repo.find().unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].name, "Ann");
}
