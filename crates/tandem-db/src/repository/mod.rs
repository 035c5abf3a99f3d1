//! # Repository Module
//!
//! Routing-agnostic data access for Tandem entities.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories over RoutedDatabase                     │
//! │                                                                         │
//! │  Service / handler                                                     │
//! │       │                                                                 │
//! │       │  countries.insert(&scope, "Japan")                             │
//! │       ▼                                                                 │
//! │  CountryRepository                                                     │
//! │  ├── select_all(&scope)                                                │
//! │  ├── get_by_id(&scope, id)                                             │
//! │  ├── insert(&scope, name)                                              │
//! │  └── insert_with_cities(&scope, name, cities)                          │
//! │       │                                                                 │
//! │       │  SQL through the same surface a single handle offers           │
//! │       ▼                                                                 │
//! │  RoutedDatabase ──► primary / replica                                  │
//! │                                                                         │
//! │  Repositories never pick an endpoint. Passing one scope through a      │
//! │  request is enough for it to read its own writes.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CountryRepository`] - Countries, with transactional city creation
//! - [`CityRepository`] - Cities by country
//! - [`UserRepository`] - Users

pub mod city;
pub mod country;
pub mod user;

pub use city::CityRepository;
pub use country::CountryRepository;
pub use user::UserRepository;

use crate::connection::Connection;
use crate::database::RoutedDatabase;

impl<C: Connection> RoutedDatabase<C> {
    /// Returns the country repository.
    pub fn countries(&self) -> CountryRepository<C> {
        CountryRepository::new(self.clone())
    }

    /// Returns the city repository.
    pub fn cities(&self) -> CityRepository<C> {
        CityRepository::new(self.clone())
    }

    /// Returns the user repository.
    pub fn users(&self) -> UserRepository<C> {
        UserRepository::new(self.clone())
    }
}
