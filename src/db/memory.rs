//! In-memory database for tests. A transaction works on a snapshot of the rows and
//! merges its own inserts, updates and deletes back on commit. Emails behave like a
//! unique index: an email inserted by another open transaction, or committed after
//! this snapshot was taken, is rejected at insert time.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Database, TxHandle};
use crate::{
    auth::password,
    error::{AppError, AppResult},
    users::{
        model::User,
        repo::{UserRepository, UserStore},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub user: User,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

type Rows = HashMap<Uuid, StoredUser>;

#[derive(Debug, Default)]
struct Shared {
    rows: Rows,
    // emails inserted by transactions that have not ended yet
    claimed: HashSet<String>,
}

#[derive(Debug, Default)]
struct Counters {
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Mutex<Shared>>,
    counters: Arc<Counters>,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
}

impl MemoryDatabase {
    pub fn failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn commits(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }

    /// Committed row for `email`, if any.
    pub fn find(&self, email: &str) -> Option<StoredUser> {
        let shared = self.shared.lock().expect("shared lock");
        shared.rows.values().find(|r| r.user.email == email).cloned()
    }
}

pub struct MemoryTx {
    shared: Arc<Mutex<Shared>>,
    snapshot: Rows,
    staged: Rows,
    claimed: Vec<String>,
    counters: Arc<Counters>,
    fail_commit: bool,
    fail_rollback: bool,
}

impl MemoryTx {
    fn release_claims(&self, shared: &mut Shared) {
        for email in &self.claimed {
            shared.claimed.remove(email);
        }
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, sqlx::Error> {
        if self.fail_begin {
            return Err(sqlx::Error::PoolClosed);
        }
        let snapshot = self.shared.lock().expect("shared lock").rows.clone();
        Ok(MemoryTx {
            shared: self.shared.clone(),
            staged: snapshot.clone(),
            snapshot,
            claimed: Vec::new(),
            counters: self.counters.clone(),
            fail_commit: self.fail_commit,
            fail_rollback: self.fail_rollback,
        })
    }
}

#[async_trait]
impl TxHandle for MemoryTx {
    async fn commit(self) -> Result<(), sqlx::Error> {
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        let mut shared = self.shared.lock().expect("shared lock");
        self.release_claims(&mut shared);
        if self.fail_commit {
            return Err(sqlx::Error::PoolTimedOut);
        }

        for id in self.snapshot.keys() {
            if !self.staged.contains_key(id) {
                shared.rows.remove(id);
            }
        }
        for (id, row) in &self.staged {
            match self.snapshot.get(id) {
                Some(before) if before == row => {}
                // updated here; skip if another transaction deleted it meanwhile
                Some(_) => {
                    if let Some(current) = shared.rows.get_mut(id) {
                        *current = row.clone();
                    }
                }
                None => {
                    shared.rows.insert(*id, row.clone());
                }
            }
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        let mut shared = self.shared.lock().expect("shared lock");
        self.release_claims(&mut shared);
        if self.fail_rollback {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }
}

impl UserStore for MemoryTx {
    type Users<'t> = MemoryUsers<'t>;

    fn users(&mut self) -> Self::Users<'_> {
        MemoryUsers {
            shared: &self.shared,
            snapshot: &self.snapshot,
            staged: &mut self.staged,
            claimed: &mut self.claimed,
        }
    }
}

pub struct MemoryUsers<'t> {
    shared: &'t Mutex<Shared>,
    snapshot: &'t Rows,
    staged: &'t mut Rows,
    claimed: &'t mut Vec<String>,
}

impl MemoryUsers<'_> {
    /// Reserves `email` the way a unique index would, or reports it taken.
    fn claim(&mut self, email: &str) -> AppResult<()> {
        if self.staged.values().any(|r| r.user.email == email) {
            return Err(AppError::UserAlreadyRegistered);
        }
        let mut shared = self.shared.lock().expect("shared lock");
        let deleted_here =
            |id: &Uuid| self.snapshot.contains_key(id) && !self.staged.contains_key(id);
        let committed = shared
            .rows
            .iter()
            .any(|(id, r)| r.user.email == email && !deleted_here(id));
        if committed || shared.claimed.contains(email) {
            return Err(AppError::UserAlreadyRegistered);
        }
        shared.claimed.insert(email.to_owned());
        self.claimed.push(email.to_owned());
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUsers<'_> {
    async fn find_by_email(&mut self, email: &str) -> AppResult<User> {
        self.staged
            .values()
            .find(|r| r.user.email == email)
            .map(|r| r.user.clone())
            .ok_or(AppError::NotFound)
    }

    async fn regist(&mut self, user: &User, now: OffsetDateTime) -> AppResult<()> {
        self.claim(&user.email)?;
        let (hash, salt) = user.encrypt_password()?;
        let id = Uuid::new_v4();
        let stored = User::new(Some(id), user.name.clone(), user.email.clone(), hash, salt);
        self.staged.insert(
            id,
            StoredUser {
                user: stored,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn update(&mut self, user: &User, now: OffsetDateTime) -> AppResult<()> {
        let id = user.id.ok_or(AppError::NotFound)?;
        let hash = password::hash(&user.password, &user.salt)?;
        let row = self.staged.get_mut(&id).ok_or(AppError::NotFound)?;
        row.user.name = user.name.clone();
        row.user.password = hash;
        row.updated_at = now;
        Ok(())
    }

    async fn delete(&mut self, user: &User) -> AppResult<()> {
        let id = user.id.ok_or(AppError::NotFound)?;
        self.staged.remove(&id).ok_or(AppError::NotFound)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::services::UserService;

    fn user(email: &str) -> User {
        User::new(None, "n", email, "p", "")
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    #[tokio::test]
    async fn overlapping_registrations_of_one_email_let_only_one_win() {
        let db = MemoryDatabase::default();
        let mut first = db.begin().await.unwrap();
        let mut second = db.begin().await.unwrap();

        UserService::new(first.users())
            .regist(&user("a@x.com"), now())
            .await
            .expect("first registers");

        // the second snapshot cannot see the uncommitted row
        let seen = UserService::new(second.users())
            .is_duplicate("a@x.com")
            .await
            .unwrap();
        assert!(!seen);
        let err = UserService::new(second.users())
            .regist(&user("a@x.com"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserAlreadyRegistered));

        first.commit().await.unwrap();
        second.rollback().await.unwrap();
        assert!(db.find("a@x.com").is_some());
    }

    #[tokio::test]
    async fn insert_after_concurrent_commit_is_rejected() {
        let db = MemoryDatabase::default();
        let mut late = db.begin().await.unwrap();

        let mut early = db.begin().await.unwrap();
        early.users().regist(&user("a@x.com"), now()).await.unwrap();
        early.commit().await.unwrap();

        let err = late.users().regist(&user("a@x.com"), now()).await.unwrap_err();
        assert!(matches!(err, AppError::UserAlreadyRegistered));
    }

    #[tokio::test]
    async fn overlapping_commits_keep_each_others_rows() {
        let db = MemoryDatabase::default();
        let mut first = db.begin().await.unwrap();
        let mut second = db.begin().await.unwrap();

        first.users().regist(&user("a@x.com"), now()).await.unwrap();
        second.users().regist(&user("b@x.com"), now()).await.unwrap();
        first.commit().await.unwrap();
        second.commit().await.unwrap();

        assert!(db.find("a@x.com").is_some());
        assert!(db.find("b@x.com").is_some());
    }

    #[tokio::test]
    async fn rollback_releases_the_email() {
        let db = MemoryDatabase::default();
        let mut first = db.begin().await.unwrap();
        first.users().regist(&user("a@x.com"), now()).await.unwrap();
        first.rollback().await.unwrap();

        let mut second = db.begin().await.unwrap();
        second.users().regist(&user("a@x.com"), now()).await.unwrap();
        second.commit().await.unwrap();
        assert!(db.find("a@x.com").is_some());
    }

    #[tokio::test]
    async fn writes_to_missing_rows_are_not_found() {
        let db = MemoryDatabase::default();
        let mut tx = db.begin().await.unwrap();
        let ghost = User::new(Some(Uuid::new_v4()), "n", "g@x.com", "p", "0123456789abcdef");

        let err = tx.users().update(&ghost, now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        let err = tx.users().delete(&ghost).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
