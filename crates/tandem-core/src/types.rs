//! # Domain Types
//!
//! Entities read and written through the routing database layer.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Country      │   │      City       │   │      User       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  country_id     │◄──│  country_id(FK) │   │  id             │       │
//! │  │  country        │   │  city_id        │   │  name           │       │
//! │  │  last_update    │   │  city           │   │                 │       │
//! │  └─────────────────┘   │  last_update    │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Names are validated newtypes: a `CountryName` that exists is never empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::validation::{validate_city_name, validate_country_name};

// =============================================================================
// Validated Names
// =============================================================================

/// A validated country name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryName(String);

impl CountryName {
    /// Validates and wraps a country name.
    pub fn parse(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_country_name(&name)?;
        Ok(CountryName(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CountryName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CountryName::parse(value)
    }
}

impl From<CountryName> for String {
    fn from(name: CountryName) -> Self {
        name.0
    }
}

impl fmt::Display for CountryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated city name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CityName(String);

impl CityName {
    /// Validates and wraps a city name.
    pub fn parse(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_city_name(&name)?;
        Ok(CityName(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CityName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CityName::parse(value)
    }
}

impl From<CityName> for String {
    fn from(name: CityName) -> Self {
        name.0
    }
}

impl fmt::Display for CityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Country
// =============================================================================

/// A country row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    /// Primary key.
    pub country_id: i64,

    /// Display name.
    pub country: CountryName,

    /// Time of the last write to this row.
    pub last_update: DateTime<Utc>,
}

impl Country {
    /// Creates a country entity.
    pub fn new(country_id: i64, country: CountryName, last_update: DateTime<Utc>) -> Self {
        Country {
            country_id,
            country,
            last_update,
        }
    }
}

// =============================================================================
// City
// =============================================================================

/// A city row, owned by one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// Primary key.
    pub city_id: i64,

    /// Display name.
    pub city: CityName,

    /// Owning country.
    pub country_id: i64,

    /// Time of the last write to this row.
    pub last_update: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// An application user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
