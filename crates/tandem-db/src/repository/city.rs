//! # City Repository
//!
//! Database operations for cities.

use chrono::Utc;
use tracing::debug;

use tandem_core::validation::validate_id;
use tandem_core::{City, CityName};

use crate::connection::Connection;
use crate::database::RoutedDatabase;
use crate::error::{DbError, DbResult};
use crate::scope::RequestScope;
use crate::sqlite::SqliteEndpoint;
use crate::value::{Row, Value};

/// Repository for city database operations.
pub struct CityRepository<C: Connection = SqliteEndpoint> {
    db: RoutedDatabase<C>,
}

impl<C: Connection> Clone for CityRepository<C> {
    fn clone(&self) -> Self {
        CityRepository {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> CityRepository<C> {
    /// Creates a new CityRepository.
    pub fn new(db: RoutedDatabase<C>) -> Self {
        CityRepository { db }
    }

    /// Lists every city ordered by id.
    pub async fn select_all(&self, scope: &RequestScope) -> DbResult<Vec<City>> {
        let rows = self
            .db
            .query(
                scope,
                "SELECT city_id, city, country_id, last_update FROM city ORDER BY city_id",
                &[],
            )
            .await?;
        rows.iter().map(city_from_row).collect()
    }

    /// Lists the cities of one country ordered by id.
    pub async fn list_by_country(
        &self,
        scope: &RequestScope,
        country_id: i64,
    ) -> DbResult<Vec<City>> {
        validate_id("country_id", country_id)?;
        let rows = self
            .db
            .query(
                scope,
                "SELECT city_id, city, country_id, last_update FROM city \
                 WHERE country_id = ? ORDER BY city_id",
                &[Value::from(country_id)],
            )
            .await?;
        rows.iter().map(city_from_row).collect()
    }

    /// Inserts a city under an existing country.
    ///
    /// ## Errors
    /// * `DbError::Invalid` - Empty or overlong name, non-positive country id
    /// * routed write error wrapping `ForeignKeyViolation` - Unknown country
    pub async fn insert(&self, scope: &RequestScope, country_id: i64, name: &str) -> DbResult<City> {
        validate_id("country_id", country_id)?;
        let name = CityName::parse(name)?;
        let now = Utc::now();

        debug!(city = %name, country_id, "Inserting city");

        let result = self
            .db
            .execute(
                scope,
                "INSERT INTO city (city, country_id, last_update) VALUES (?, ?, ?)",
                &[
                    Value::from(name.as_str()),
                    Value::from(country_id),
                    Value::from(now),
                ],
            )
            .await?;

        let city_id = result
            .last_insert_id
            .ok_or_else(|| DbError::Internal("insert returned no id".into()))?;
        Ok(City {
            city_id,
            city: name,
            country_id,
            last_update: now,
        })
    }
}

fn city_from_row(row: &Row) -> DbResult<City> {
    Ok(City {
        city_id: row.get("city_id")?,
        city: CityName::parse(row.get::<String>("city")?)?,
        country_id: row.get("country_id")?,
        last_update: row.get("last_update")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;
    use crate::testing::sqlite_cluster;
    use std::error::Error as _;

    #[tokio::test]
    async fn test_insert_and_list() {
        let (_dir, db) = sqlite_cluster(2).await;
        let scope = RequestScope::new();

        let spain = db.countries().insert(&scope, "Spain").await.unwrap();
        let madrid = db.cities().insert(&scope, spain.country_id, "Madrid").await.unwrap();
        let sevilla = db.cities().insert(&scope, spain.country_id, "Sevilla").await.unwrap();

        let listed = db.cities().list_by_country(&scope, spain.country_id).await.unwrap();
        assert_eq!(listed, vec![madrid, sevilla]);
        assert_eq!(db.cities().select_all(&scope).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_country_is_foreign_key_violation() {
        let (_dir, db) = sqlite_cluster(1).await;

        let err = db
            .cities()
            .insert(&RequestScope::new(), 404, "Nowhere")
            .await
            .unwrap_err();

        assert_eq!(err.operation(), Some(Operation::Write));
        let source = err.source().unwrap().to_string();
        assert!(source.contains("Foreign key violation"));
    }

    #[tokio::test]
    async fn test_non_positive_country_id_is_rejected() {
        let (_dir, db) = sqlite_cluster(1).await;
        let result = db.cities().list_by_country(&RequestScope::new(), 0).await;
        assert!(matches!(result, Err(DbError::Invalid(_))));
    }
}
