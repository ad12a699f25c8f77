//! In-process store backed by hash maps.
//!
//! Used by the test suites and by `--in-memory` runs. Every operation runs
//! under a single lock, which makes conditional status updates atomic in the
//! same way a single `UPDATE ... WHERE status = ANY(...)` is in PostgreSQL.
//! Timestamps are strictly increasing so `updated_at` ordering is total.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::{cmp::Reverse, collections::HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    NewUser, Note, NoteFilter, NoteStatus, NoteStore, StatusCounts, StoreError, User,
    UserCredentials, UserStore,
};

#[derive(Debug, Clone)]
struct UserRow {
    user: User,
    password_hash: Option<String>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, UserRow>,
    notes: HashMap<Uuid, Note>,
    last_tick: Option<DateTime<Utc>>,
}

impl Tables {
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(next);
        next
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).map(|row| row.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|row| row.user.email == email)
            .map(|row| row.user.clone()))
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|row| row.user.google_id.as_deref() == Some(google_id))
            .map(|row| row.user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|row| row.user.email == email)
            .map(|row| UserCredentials {
                user: row.user.clone(),
                password_hash: row.password_hash.clone(),
            }))
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|row| row.user.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        if let Some(google_id) = user.google_id.as_deref() {
            if tables
                .users
                .values()
                .any(|row| row.user.google_id.as_deref() == Some(google_id))
            {
                return Err(StoreError::UniqueViolation("users_google_id_key".to_string()));
            }
        }

        let now = tables.tick();
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            google_id: user.google_id,
            has_password: user.password_hash.is_some(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(
            record.id,
            UserRow {
                user: record.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(record)
    }

    async fn link_google_id(&self, id: Uuid, google_id: &str) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .values()
            .any(|row| row.user.google_id.as_deref() == Some(google_id))
        {
            return Err(StoreError::UniqueViolation("users_google_id_key".to_string()));
        }
        let now = tables.tick();
        let Some(row) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if row.user.google_id.is_some() {
            return Ok(None);
        }
        row.user.google_id = Some(google_id.to_string());
        row.user.updated_at = now;
        Ok(Some(row.user.clone()))
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn insert(&self, owner: Uuid, title: &str, content: &str) -> Result<Note, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = tables.tick();
        let note = Note {
            id: Uuid::new_v4(),
            user_id: owner,
            title: title.to_string(),
            content: content.to_string(),
            status: NoteStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tables.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn find(&self, owner: Uuid, id: Uuid) -> Result<Option<Note>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .notes
            .get(&id)
            .filter(|note| note.user_id == owner)
            .cloned())
    }

    async fn find_many(
        &self,
        filter: &NoteFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Note>, StoreError> {
        let tables = self.tables.lock().await;
        let mut notes: Vec<Note> = tables
            .notes
            .values()
            .filter(|note| filter.matches(note))
            .cloned()
            .collect();
        notes.sort_by_key(|note| Reverse((note.updated_at, note.created_at, note.id)));

        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(notes.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, filter: &NoteFilter) -> Result<i64, StoreError> {
        let tables = self.tables.lock().await;
        let count = tables.notes.values().filter(|note| filter.matches(note)).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn update_content(
        &self,
        owner: Uuid,
        id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Option<Note>, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = tables.tick();
        let Some(note) = tables.notes.get_mut(&id).filter(|note| note.user_id == owner) else {
            return Ok(None);
        };
        note.title = title.to_string();
        note.content = content.to_string();
        note.updated_at = now;
        Ok(Some(note.clone()))
    }

    async fn update_status(
        &self,
        owner: Uuid,
        id: Uuid,
        from: &[NoteStatus],
        to: NoteStatus,
    ) -> Result<Option<Note>, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = tables.tick();
        let Some(note) = tables
            .notes
            .get_mut(&id)
            .filter(|note| note.user_id == owner && from.contains(&note.status))
        else {
            return Ok(None);
        };
        note.status = to;
        note.updated_at = now;
        Ok(Some(note.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        let owned = tables
            .notes
            .get(&id)
            .is_some_and(|note| note.user_id == owner);
        if owned {
            tables.notes.remove(&id);
        }
        Ok(owned)
    }

    async fn count_by_status(&self, owner: Uuid) -> Result<StatusCounts, StoreError> {
        let tables = self.tables.lock().await;
        let mut counts = StatusCounts::default();
        for note in tables.notes.values().filter(|note| note.user_id == owner) {
            counts.add(note.status, 1);
        }
        Ok(counts)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: None,
            password_hash: Some("hash".to_string()),
            google_id: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = MemoryStore::new();
        UserStore::insert(&store, new_user("a@example.com")).await.unwrap();
        let err = UserStore::insert(&store, new_user("a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn credentials_expose_hash_only_through_login_lookup() {
        let store = MemoryStore::new();
        let user = UserStore::insert(&store, new_user("a@example.com")).await.unwrap();
        assert!(user.has_password);

        let creds = store.find_credentials("a@example.com").await.unwrap().unwrap();
        assert_eq!(creds.password_hash.as_deref(), Some("hash"));
        assert_eq!(store.find_by_id(user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn link_google_id_only_once() {
        let store = MemoryStore::new();
        let user = UserStore::insert(&store, new_user("a@example.com")).await.unwrap();
        let linked = store.link_google_id(user.id, "g-1").await.unwrap().unwrap();
        assert_eq!(linked.google_id.as_deref(), Some("g-1"));
        assert!(store.link_google_id(user.id, "g-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn timestamps_are_strictly_increasing() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let first = NoteStore::insert(&store, owner, "a", "a").await.unwrap();
        let second = NoteStore::insert(&store, owner, "b", "b").await.unwrap();
        assert!(second.updated_at > first.updated_at);

        let listed = store
            .find_many(&NoteFilter::new(owner, NoteStatus::Active), 0, 10)
            .await
            .unwrap();
        assert_eq!(listed.first().map(|n| n.id), Some(second.id));
    }

    #[tokio::test]
    async fn update_status_requires_allowed_source() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let note = NoteStore::insert(&store, owner, "a", "a").await.unwrap();

        let missed = store
            .update_status(owner, note.id, &[NoteStatus::Trash], NoteStatus::Active)
            .await
            .unwrap();
        assert!(missed.is_none());

        let archived = store
            .update_status(owner, note.id, &[NoteStatus::Active], NoteStatus::Archived)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archived.status, NoteStatus::Archived);
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let note = NoteStore::insert(&store, owner, "a", "a").await.unwrap();
        assert!(!store.delete(Uuid::new_v4(), note.id).await.unwrap());
        assert!(store.delete(owner, note.id).await.unwrap());
        assert!(store.find(owner, note.id).await.unwrap().is_none());
    }
}
