//! In-memory person repository.
//!
//! Substitutes for [`SqlitePersonRepository`](super::person_repo::SqlitePersonRepository)
//! in tests and tools that should not touch a database. Write, conflict and
//! not-found semantics match the SQLite implementation; rows are returned in
//! id order and calls carry no time budget.

use super::person_repo::{
    PersonRepository, PersonStore, PersonTransaction, RepoError, RepoResult,
};
use crate::model::person::{Person, PersonId};
use log::debug;
use std::cell::RefCell;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

type Rows = BTreeMap<PersonId, Person>;

#[derive(Debug, Default)]
pub struct InMemoryPersonRepository {
    rows: RefCell<Rows>,
}

impl InMemoryPersonRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the repository; later entries replace earlier ones with the same id.
    pub fn with_rows(people: impl IntoIterator<Item = Person>) -> Self {
        let rows = people
            .into_iter()
            .map(|person| (person.id, person.persisted()))
            .collect();
        Self {
            rows: RefCell::new(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }
}

impl PersonRepository for InMemoryPersonRepository {
    fn create(&self, person: &Person) -> RepoResult<()> {
        insert(&self.rows, person)
    }

    fn update(&self, person: &Person) -> RepoResult<()> {
        update(&self.rows, person)
    }

    fn find(&self) -> RepoResult<Vec<Person>> {
        Ok(self.rows.borrow().values().cloned().collect())
    }

    fn find_by_id(&self, id: PersonId) -> RepoResult<Person> {
        find_by_id(&self.rows, id)
    }

    fn delete(&self, id: PersonId) -> RepoResult<()> {
        delete(&self.rows, id)
    }
}

impl PersonStore for InMemoryPersonRepository {
    type Transaction<'a>
        = InMemoryPersonTransaction<'a>
    where
        Self: 'a;

    fn begin(&mut self) -> RepoResult<InMemoryPersonTransaction<'_>> {
        let staged = self.rows.borrow().clone();
        Ok(InMemoryPersonTransaction {
            target: &self.rows,
            staged: RefCell::new(staged),
        })
    }

    fn close(self) -> RepoResult<()> {
        debug!(
            "event=db_close module=repo status=ok rows={}",
            self.rows.borrow().len()
        );
        Ok(())
    }
}

/// Transaction staging changes on a copy of the rows until commit.
#[derive(Debug)]
pub struct InMemoryPersonTransaction<'repo> {
    target: &'repo RefCell<Rows>,
    staged: RefCell<Rows>,
}

impl PersonRepository for InMemoryPersonTransaction<'_> {
    fn create(&self, person: &Person) -> RepoResult<()> {
        insert(&self.staged, person)
    }

    fn update(&self, person: &Person) -> RepoResult<()> {
        update(&self.staged, person)
    }

    fn find(&self) -> RepoResult<Vec<Person>> {
        Ok(self.staged.borrow().values().cloned().collect())
    }

    fn find_by_id(&self, id: PersonId) -> RepoResult<Person> {
        find_by_id(&self.staged, id)
    }

    fn delete(&self, id: PersonId) -> RepoResult<()> {
        delete(&self.staged, id)
    }
}

impl PersonTransaction for InMemoryPersonTransaction<'_> {
    fn commit(self) -> RepoResult<()> {
        *self.target.borrow_mut() = self.staged.into_inner();
        Ok(())
    }

    fn rollback(self) -> RepoResult<()> {
        Ok(())
    }
}

fn insert(rows: &RefCell<Rows>, person: &Person) -> RepoResult<()> {
    person.validate()?;
    match rows.borrow_mut().entry(person.id) {
        Entry::Occupied(_) => Err(RepoError::DuplicateId(person.id)),
        Entry::Vacant(slot) => {
            slot.insert(person.persisted());
            Ok(())
        }
    }
}

fn update(rows: &RefCell<Rows>, person: &Person) -> RepoResult<()> {
    person.validate()?;
    let mut rows = rows.borrow_mut();
    let stored = rows
        .get_mut(&person.id)
        .ok_or(RepoError::NotFound(person.id))?;
    stored.name.clone_from(&person.name);
    stored.email.clone_from(&person.email);
    Ok(())
}

fn find_by_id(rows: &RefCell<Rows>, id: PersonId) -> RepoResult<Person> {
    rows.borrow()
        .get(&id)
        .cloned()
        .ok_or(RepoError::NotFound(id))
}

fn delete(rows: &RefCell<Rows>, id: PersonId) -> RepoResult<()> {
    rows.borrow_mut()
        .remove(&id)
        .map(|_| ())
        .ok_or(RepoError::NotFound(id))
}
