use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, PartyId};

/// Party kind: customer or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

impl core::fmt::Display for PartyKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PartyKind::Customer => f.write_str("customer"),
            PartyKind::Supplier => f.write_str("supplier"),
        }
    }
}

/// Party status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    #[default]
    Active,
    Suspended,
}

/// Contact information for a party.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Customer or supplier record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub status: PartyStatus,
}

impl Party {
    pub fn new(id: PartyId, kind: PartyKind, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("party name cannot be empty"));
        }
        Ok(Self {
            id,
            kind,
            name,
            contact: ContactInfo::default(),
            status: PartyStatus::Active,
        })
    }

    pub fn customer(name: impl Into<String>) -> DomainResult<Self> {
        Self::new(PartyId::new(), PartyKind::Customer, name)
    }

    pub fn supplier(name: impl Into<String>) -> DomainResult<Self> {
        Self::new(PartyId::new(), PartyKind::Supplier, name)
    }

    pub fn with_contact(mut self, contact: ContactInfo) -> Self {
        self.contact = contact;
        self
    }

    /// Suspended parties cannot transact.
    pub fn can_transact(&self) -> bool {
        self.status == PartyStatus::Active
    }

    /// Case-insensitive match on name, email or phone (directory search).
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term)
            || self
                .contact
                .email
                .as_deref()
                .is_some_and(|e| e.to_lowercase().contains(&term))
            || self.contact.phone.as_deref().is_some_and(|p| p.contains(&term))
    }
}
