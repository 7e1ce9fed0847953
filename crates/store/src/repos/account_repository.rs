//! Account repository for database operations.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::entities::{Account, Contact};
use crate::errors::{StoreError, StoreResult};

const ACCOUNT_COLUMNS: &str =
    "id, name, email, password_hash, avatar_url, is_online, last_seen, created_at, updated_at";

/// Repository for account rows and the contact graph.
#[derive(Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an account. Emails are stored lowercased and must be unique.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Account> {
        let id = cuid2::create_id();
        let email = email.trim().to_lowercase();
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO accounts (id, name, email, password_hash, is_online, last_seen, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name.trim())
        .bind(&email)
        .bind(password_hash)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StoreError::EmailTaken);
            }
            Err(e) => return Err(e.into()),
        }

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| StoreError::Connection("created account missing".to_string()))
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_account))
    }

    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_account))
    }

    /// Flip the online flag on. Owned by the presence service.
    pub async fn set_online(&self, id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE accounts SET is_online = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Flip the online flag off and stamp the last-seen time.
    pub async fn set_offline(&self, id: &str, last_seen: &str) -> StoreResult<()> {
        sqlx::query("UPDATE accounts SET is_online = 0, last_seen = ?, updated_at = ? WHERE id = ?")
            .bind(last_seen)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ids of the account's contacts.
    pub async fn contact_ids_of(&self, id: &str) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT contact_id FROM contacts WHERE account_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Ids of accounts whose contact list includes the given account: the
    /// presence audience. Under the mutual add-contact flow this coincides
    /// with `contact_ids_of`; a one-sided edge notifies the side that holds
    /// the contact.
    pub async fn audience_of(&self, id: &str) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT account_id FROM contacts WHERE contact_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Full contact list, with presence fields for list views.
    pub async fn contacts_of(&self, id: &str) -> StoreResult<Vec<Contact>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.name, a.email, a.avatar_url, a.is_online, a.last_seen
            FROM contacts c
            JOIN accounts a ON a.id = c.contact_id
            WHERE c.account_id = ?
            ORDER BY a.name COLLATE NOCASE
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Contact {
                id: row.get("id"),
                name: row.get("name"),
                email: row.get("email"),
                avatar_url: row.get("avatar_url"),
                is_online: row.get("is_online"),
                last_seen: row.get("last_seen"),
            })
            .collect())
    }

    pub async fn are_contacts(&self, account_id: &str, other_id: &str) -> StoreResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM contacts WHERE account_id = ? AND contact_id = ?",
        )
        .bind(account_id)
        .bind(other_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Record a mutual contact relationship (one row per direction).
    pub async fn add_contact(&self, account_id: &str, contact_id: &str) -> StoreResult<()> {
        if self.are_contacts(account_id, contact_id).await? {
            return Err(StoreError::AlreadyContact);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO contacts (account_id, contact_id, created_at) VALUES (?, ?, ?)")
            .bind(account_id)
            .bind(contact_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO contacts (account_id, contact_id, created_at) VALUES (?, ?, ?)")
            .bind(contact_id)
            .bind(account_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn map_account(row: sqlx::sqlite::SqliteRow) -> Account {
    Account {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        avatar_url: row.get("avatar_url"),
        is_online: row.get("is_online"),
        last_seen: row.get("last_seen"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    #[tokio::test]
    async fn create_and_find_account() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(pool);

        let account = repo.create("Ada", "Ada@Example.com", "hash").await.unwrap();
        assert_eq!(account.email, "ada@example.com");
        assert!(!account.is_online);

        let found = repo.find_by_email("ada@example.com").await.unwrap();
        assert_eq!(found.unwrap().id, account.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(pool);

        repo.create("Ada", "ada@example.com", "hash").await.unwrap();
        let err = repo.create("Imposter", "ada@example.com", "hash").await;
        assert!(matches!(err, Err(StoreError::EmailTaken)));
    }

    #[tokio::test]
    async fn contacts_are_mutual_and_deduplicated() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(pool);

        let a = repo.create("Ada", "ada@example.com", "hash").await.unwrap();
        let b = repo.create("Bob", "bob@example.com", "hash").await.unwrap();

        repo.add_contact(&a.id, &b.id).await.unwrap();
        assert!(repo.are_contacts(&a.id, &b.id).await.unwrap());
        assert!(repo.are_contacts(&b.id, &a.id).await.unwrap());

        let err = repo.add_contact(&a.id, &b.id).await;
        assert!(matches!(err, Err(StoreError::AlreadyContact)));

        let contacts = repo.contacts_of(&a.id).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, b.id);
    }

    #[tokio::test]
    async fn online_flag_and_last_seen_round_trip() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(pool);

        let a = repo.create("Ada", "ada@example.com", "hash").await.unwrap();
        repo.set_online(&a.id).await.unwrap();
        assert!(repo.find_by_id(&a.id).await.unwrap().unwrap().is_online);

        repo.set_offline(&a.id, "2026-01-01T00:00:00+00:00")
            .await
            .unwrap();
        let account = repo.find_by_id(&a.id).await.unwrap().unwrap();
        assert!(!account.is_online);
        assert_eq!(account.last_seen, "2026-01-01T00:00:00+00:00");
    }
}
