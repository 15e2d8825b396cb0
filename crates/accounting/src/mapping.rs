//! Logical account roles → concrete store account ids.

use serde::{Deserialize, Serialize};

use stockledger_core::{AccountId, DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Cash,
    Inventory,
    Sales,
    Cogs,
    Receivable,
    Payable,
}

impl AccountRole {
    pub const ALL: [AccountRole; 6] = [
        AccountRole::Cash,
        AccountRole::Inventory,
        AccountRole::Sales,
        AccountRole::Cogs,
        AccountRole::Receivable,
        AccountRole::Payable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccountRole::Cash => "cash",
            AccountRole::Inventory => "inventory",
            AccountRole::Sales => "sales",
            AccountRole::Cogs => "cogs",
            AccountRole::Receivable => "receivable",
            AccountRole::Payable => "payable",
        }
    }
}

impl core::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Possibly incomplete mapping, as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountMapping {
    pub cash: Option<AccountId>,
    pub inventory: Option<AccountId>,
    pub sales: Option<AccountId>,
    pub cogs: Option<AccountId>,
    pub receivable: Option<AccountId>,
    pub payable: Option<AccountId>,
}

impl AccountMapping {
    pub fn get(&self, role: AccountRole) -> Option<AccountId> {
        match role {
            AccountRole::Cash => self.cash,
            AccountRole::Inventory => self.inventory,
            AccountRole::Sales => self.sales,
            AccountRole::Cogs => self.cogs,
            AccountRole::Receivable => self.receivable,
            AccountRole::Payable => self.payable,
        }
    }

    pub fn set(&mut self, role: AccountRole, account_id: AccountId) {
        let slot = match role {
            AccountRole::Cash => &mut self.cash,
            AccountRole::Inventory => &mut self.inventory,
            AccountRole::Sales => &mut self.sales,
            AccountRole::Cogs => &mut self.cogs,
            AccountRole::Receivable => &mut self.receivable,
            AccountRole::Payable => &mut self.payable,
        };
        *slot = Some(account_id);
    }

    pub fn with(mut self, role: AccountRole, account_id: AccountId) -> Self {
        self.set(role, account_id);
        self
    }

    pub fn resolve(&self, role: AccountRole) -> DomainResult<AccountId> {
        self.get(role)
            .ok_or_else(|| DomainError::configuration(format!("no account mapped for role '{role}'")))
    }

    pub fn missing_roles(&self) -> Vec<AccountRole> {
        AccountRole::ALL
            .into_iter()
            .filter(|r| self.get(*r).is_none())
            .collect()
    }

    /// Resolve every role at once.
    pub fn resolve_all(&self) -> DomainResult<ResolvedAccounts> {
        let missing = self.missing_roles();
        if !missing.is_empty() {
            let names: Vec<_> = missing.iter().map(|r| r.as_str()).collect();
            return Err(DomainError::configuration(format!(
                "no account mapped for role(s): {}",
                names.join(", ")
            )));
        }
        Ok(ResolvedAccounts {
            cash: self.resolve(AccountRole::Cash)?,
            inventory: self.resolve(AccountRole::Inventory)?,
            sales: self.resolve(AccountRole::Sales)?,
            cogs: self.resolve(AccountRole::Cogs)?,
            receivable: self.resolve(AccountRole::Receivable)?,
            payable: self.resolve(AccountRole::Payable)?,
        })
    }
}

/// Fully resolved mapping; every role has an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAccounts {
    pub cash: AccountId,
    pub inventory: AccountId,
    pub sales: AccountId,
    pub cogs: AccountId,
    pub receivable: AccountId,
    pub payable: AccountId,
}

impl ResolvedAccounts {
    pub fn get(&self, role: AccountRole) -> AccountId {
        match role {
            AccountRole::Cash => self.cash,
            AccountRole::Inventory => self.inventory,
            AccountRole::Sales => self.sales,
            AccountRole::Cogs => self.cogs,
            AccountRole::Receivable => self.receivable,
            AccountRole::Payable => self.payable,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AccountRole, AccountId)> + '_ {
        AccountRole::ALL.into_iter().map(|r| (r, self.get(r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_role_is_a_configuration_error() {
        let mapping = AccountMapping::default().with(AccountRole::Cash, AccountId::new());
        let err = mapping.resolve(AccountRole::Payable).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(msg) if msg.contains("payable")));
    }

    #[test]
    fn resolve_all_lists_every_missing_role() {
        let mapping = AccountMapping::default()
            .with(AccountRole::Cash, AccountId::new())
            .with(AccountRole::Sales, AccountId::new());

        match mapping.resolve_all().unwrap_err() {
            DomainError::Configuration(msg) => {
                assert!(msg.contains("inventory, cogs, receivable, payable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn complete_mapping_resolves() {
        let mut mapping = AccountMapping::default();
        for role in AccountRole::ALL {
            mapping.set(role, AccountId::new());
        }
        let resolved = mapping.resolve_all().unwrap();
        assert_eq!(resolved.iter().count(), 6);
        assert_eq!(Some(resolved.cogs), mapping.cogs);
    }
}
