use persondb_core::db::open_db_in_memory;
use persondb_core::db::schema::ensure_users_table;
use persondb_core::{
    CancelToken, Person, PersonRepository, RepoConfig, RepoError, SqlitePersonRepository,
};
use std::time::{Duration, Instant};

fn repo_with(config: RepoConfig) -> SqlitePersonRepository {
    let conn = open_db_in_memory().unwrap();
    ensure_users_table(&conn).unwrap();
    SqlitePersonRepository::with_config(conn, config).unwrap()
}

#[test]
fn default_config_uses_five_second_timeout() {
    let repo = repo_with(RepoConfig::default());
    assert_eq!(repo.config().statement_timeout, Duration::from_secs(5));
}

#[test]
fn past_external_deadline_fails_without_writing() {
    let repo = repo_with(RepoConfig::default());
    repo.set_deadline(Some(Instant::now() - Duration::from_millis(5)));

    let err = repo
        .create(&Person::new(1, "Otabek", "otabek94_30@mail.ru"))
        .unwrap_err();
    assert!(matches!(err, RepoError::DeadlineExceeded("person_create")));

    repo.set_deadline(None);
    assert!(repo.find().unwrap().is_empty());
}

#[test]
fn deadline_applies_to_every_following_call() {
    let repo = repo_with(RepoConfig::default());
    repo.create(&Person::new(1, "Otabek", "otabek94_30@mail.ru"))
        .unwrap();
    repo.set_deadline(Some(Instant::now() - Duration::from_millis(5)));

    assert!(matches!(
        repo.find(),
        Err(RepoError::DeadlineExceeded("person_find"))
    ));
    assert!(matches!(
        repo.find_by_id(1),
        Err(RepoError::DeadlineExceeded("person_find_by_id"))
    ));
    assert!(matches!(
        repo.delete(1),
        Err(RepoError::DeadlineExceeded("person_delete"))
    ));
}

#[test]
fn zero_timeout_fails_every_call() {
    let repo = repo_with(RepoConfig::with_statement_timeout(Duration::ZERO));

    assert!(matches!(
        repo.update(&Person::new(1, "Otabek", "otabek94_30@mail.ru")),
        Err(RepoError::DeadlineExceeded("person_update"))
    ));
}

#[test]
fn cancelled_token_stops_calls() {
    let token = CancelToken::new();
    let repo = repo_with(RepoConfig::default()).with_cancel_token(token.clone());
    repo.create(&Person::new(1, "Otabek", "otabek94_30@mail.ru"))
        .unwrap();

    token.cancel();

    let err = repo.find().unwrap_err();
    assert!(matches!(err, RepoError::Cancelled("person_find")));
    assert_eq!(err.to_string(), "person_find was cancelled");
}

#[test]
fn each_call_gets_a_fresh_budget() {
    let repo = repo_with(RepoConfig::with_statement_timeout(Duration::from_millis(200)));
    repo.create(&Person::new(1, "Otabek", "otabek94_30@mail.ru"))
        .unwrap();

    std::thread::sleep(Duration::from_millis(300));

    assert_eq!(repo.find_by_id(1).unwrap().id, 1);
}
