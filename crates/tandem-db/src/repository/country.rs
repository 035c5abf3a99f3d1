//! # Country Repository
//!
//! Database operations for countries.
//!
//! ## Key Operations
//! - Listing and lookup (replica reads until the scope writes)
//! - Insert (primary)
//! - Insert with cities in one transaction

use chrono::Utc;
use tracing::debug;

use tandem_core::{City, CityName, Country, CountryName};

use crate::connection::Connection;
use crate::database::RoutedDatabase;
use crate::error::{DbError, DbResult};
use crate::scope::RequestScope;
use crate::sqlite::SqliteEndpoint;
use crate::value::{Row, Value};

/// Repository for country database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.countries();
///
/// let scope = RequestScope::new();
/// let japan = repo.insert(&scope, "Japan").await?;
/// let found = repo.get_by_id(&scope, japan.country_id).await?; // primary, sees the insert
/// ```
pub struct CountryRepository<C: Connection = SqliteEndpoint> {
    db: RoutedDatabase<C>,
}

impl<C: Connection> Clone for CountryRepository<C> {
    fn clone(&self) -> Self {
        CountryRepository {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> CountryRepository<C> {
    /// Creates a new CountryRepository.
    pub fn new(db: RoutedDatabase<C>) -> Self {
        CountryRepository { db }
    }

    /// Lists every country ordered by id.
    pub async fn select_all(&self, scope: &RequestScope) -> DbResult<Vec<Country>> {
        let rows = self
            .db
            .query(
                scope,
                "SELECT country_id, country, last_update FROM country ORDER BY country_id",
                &[],
            )
            .await?;
        rows.iter().map(country_from_row).collect()
    }

    /// Gets a country by id.
    ///
    /// ## Returns
    /// * `Ok(Some(country))` - Found
    /// * `Ok(None)` - No such country
    pub async fn get_by_id(&self, scope: &RequestScope, id: i64) -> DbResult<Option<Country>> {
        let row = self
            .db
            .query_row(
                scope,
                "SELECT country_id, country, last_update FROM country WHERE country_id = ?",
                &[Value::from(id)],
            )
            .await?;
        row.as_ref().map(country_from_row).transpose()
    }

    /// Inserts a country and returns it with its new id.
    pub async fn insert(&self, scope: &RequestScope, name: &str) -> DbResult<Country> {
        let name = CountryName::parse(name)?;
        let now = Utc::now();

        debug!(country = %name, "Inserting country");

        let result = self
            .db
            .execute(
                scope,
                "INSERT INTO country (country, last_update) VALUES (?, ?)",
                &[Value::from(name.as_str()), Value::from(now)],
            )
            .await?;

        let id = result
            .last_insert_id
            .ok_or_else(|| DbError::Internal("insert returned no id".into()))?;
        Ok(Country::new(id, name, now))
    }

    /// Inserts a country and its cities atomically.
    ///
    /// Every name is validated before the transaction opens. If any insert
    /// fails, nothing is written.
    pub async fn insert_with_cities(
        &self,
        scope: &RequestScope,
        name: &str,
        cities: &[&str],
    ) -> DbResult<(Country, Vec<City>)> {
        let name = CountryName::parse(name)?;
        let city_names = cities
            .iter()
            .map(|c| CityName::parse(*c))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(country = %name, cities = city_names.len(), "Inserting country with cities");

        self.db
            .run_in_transaction(scope, move |tx| {
                Box::pin(async move {
                    let now = Utc::now();
                    let result = tx
                        .execute(
                            "INSERT INTO country (country, last_update) VALUES (?, ?)",
                            &[Value::from(name.as_str()), Value::from(now)],
                        )
                        .await?;
                    let country_id = result
                        .last_insert_id
                        .ok_or_else(|| DbError::Internal("insert returned no id".into()))?;

                    let mut created = Vec::with_capacity(city_names.len());
                    for city in city_names {
                        let result = tx
                            .execute(
                                "INSERT INTO city (city, country_id, last_update) VALUES (?, ?, ?)",
                                &[
                                    Value::from(city.as_str()),
                                    Value::from(country_id),
                                    Value::from(now),
                                ],
                            )
                            .await?;
                        let city_id = result
                            .last_insert_id
                            .ok_or_else(|| DbError::Internal("insert returned no id".into()))?;
                        created.push(City {
                            city_id,
                            city,
                            country_id,
                            last_update: now,
                        });
                    }

                    Ok((Country::new(country_id, name, now), created))
                })
            })
            .await
    }
}

fn country_from_row(row: &Row) -> DbResult<Country> {
    Ok(Country::new(
        row.get("country_id")?,
        CountryName::parse(row.get::<String>("country")?)?,
        row.get("last_update")?,
    ))
}

// =============================================================================
// Unit Tests
// =============================================================================
