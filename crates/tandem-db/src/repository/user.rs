//! # User Repository
//!
//! Database operations for users.

use tracing::debug;

use tandem_core::validation::{validate_id, validate_user_name};
use tandem_core::User;

use crate::connection::Connection;
use crate::database::RoutedDatabase;
use crate::error::{DbError, DbResult};
use crate::scope::RequestScope;
use crate::sqlite::SqliteEndpoint;
use crate::value::{Row, Value};

/// Repository for user database operations.
pub struct UserRepository<C: Connection = SqliteEndpoint> {
    db: RoutedDatabase<C>,
}

impl<C: Connection> Clone for UserRepository<C> {
    fn clone(&self) -> Self {
        UserRepository {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> UserRepository<C> {
    /// Creates a new UserRepository.
    pub fn new(db: RoutedDatabase<C>) -> Self {
        UserRepository { db }
    }

    pub async fn select_all(&self, scope: &RequestScope) -> DbResult<Vec<User>> {
        let rows = self
            .db
            .query(scope, "SELECT id, name FROM users ORDER BY id", &[])
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    pub async fn find_by_id(&self, scope: &RequestScope, id: i64) -> DbResult<Option<User>> {
        let row = self
            .db
            .query_row(scope, "SELECT id, name FROM users WHERE id = ?", &[Value::from(id)])
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Stores a new user and returns it with its id.
    pub async fn store(&self, scope: &RequestScope, name: &str) -> DbResult<User> {
        validate_user_name(name)?;
        debug!(name, "Storing user");

        let result = self
            .db
            .execute(scope, "INSERT INTO users (name) VALUES (?)", &[Value::from(name)])
            .await?;

        let id = result
            .last_insert_id
            .ok_or_else(|| DbError::Internal("insert returned no id".into()))?;
        Ok(User {
            id,
            name: name.to_string(),
        })
    }

    /// Deletes a user.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - No user with that id
    pub async fn delete(&self, scope: &RequestScope, id: i64) -> DbResult<()> {
        validate_id("id", id)?;
        debug!(id, "Deleting user");

        let result = self
            .db
            .execute(scope, "DELETE FROM users WHERE id = ?", &[Value::from(id)])
            .await?;

        if result.rows_affected == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }
}

fn user_from_row(row: &Row) -> DbResult<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sqlite_cluster, stub_set, StubOp};

    #[tokio::test]
    async fn test_store_find_delete() {
        let (_dir, db) = sqlite_cluster(2).await;
        let repo = db.users();
        let scope = RequestScope::new();

        let ana = repo.store(&scope, "ana").await.unwrap();
        let bo = repo.store(&scope, "bo").await.unwrap();
        assert_eq!(repo.select_all(&scope).await.unwrap(), vec![ana.clone(), bo]);

        repo.delete(&scope, ana.id).await.unwrap();
        assert_eq!(repo.find_by_id(&scope, ana.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        let (_dir, db) = sqlite_cluster(1).await;
        let err = db.users().delete(&RequestScope::new(), 9).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_repository_works_over_any_connection() {
        let (db, _stubs, log) = stub_set(3);
        let repo = UserRepository::new(db);
        let scope = RequestScope::new();

        // The stub has no users table; only routing is observed here
        let _ = repo.select_all(&scope).await;
        let _ = repo.store(&scope, "cy").await;
        let _ = repo.select_all(&scope).await;

        let reads = log.indices(StubOp::Query);
        assert_eq!(reads.len(), 2);
        assert_ne!(reads[0], 0);
        assert_eq!(reads[1], 0);
    }
}
