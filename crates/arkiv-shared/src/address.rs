//! Messaging addresses of the form `node@domain[/resource]`.
//!
//! Storage always persists the canonical bare form (`node@domain`); the
//! resource part only matters when addressing a specific session on the
//! wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// A parsed messaging address.
///
/// Equality and hashing include the resource, so two sessions of the same
/// account compare unequal; use [`bare`](Self::bare) when only the account
/// identity matters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Address {
    bare: String,
    resource: Option<String>,
}

impl Address {
    /// Parse `node@domain` or `node@domain/resource`.
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let (bare, resource) = match text.split_once('/') {
            Some((bare, resource)) => {
                if resource.is_empty() {
                    return Err(AddressError::Malformed(text.to_string()));
                }
                (bare, Some(resource.to_string()))
            }
            None => (text, None),
        };

        match bare.split_once('@') {
            Some((node, domain)) if !node.is_empty() && !domain.is_empty() => Ok(Self {
                bare: bare.to_string(),
                resource,
            }),
            _ => Err(AddressError::Malformed(text.to_string())),
        }
    }

    /// The canonical bare form, `node@domain`.
    pub fn bare(&self) -> &str {
        &self.bare
    }

    /// The full form, `node@domain/resource` when a resource is present.
    pub fn full(&self) -> String {
        match &self.resource {
            Some(resource) => format!("{}/{}", self.bare, resource),
            None => self.bare.clone(),
        }
    }

    /// The resource part, if any.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// A copy with the resource stripped.
    pub fn to_bare(&self) -> Self {
        Self {
            bare: self.bare.clone(),
            resource: None,
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full())
    }
}
