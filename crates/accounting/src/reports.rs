//! Read-side financial summary over committed account balances.

use serde::{Deserialize, Serialize};

use stockledger_core::{AccountId, Amount, DomainError, DomainResult};

use crate::account::{Account, AccountKind};
use crate::mapping::AccountMapping;

pub const RECEIVABLE_ACCOUNT_NAME: &str = "Accounts Receivable";
pub const PAYABLE_ACCOUNT_NAME: &str = "Accounts Payable";
pub const CASH_ACCOUNT_NAME: &str = "Cash";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub revenue: Amount,
    pub cogs: Amount,
    pub receivables: Amount,
    pub payables: Amount,
    pub cash: Amount,
}

impl FinancialSummary {
    pub fn net_profit(&self) -> DomainResult<Amount> {
        self.revenue
            .checked_sub(self.cogs)
            .ok_or_else(|| DomainError::validation("net profit overflows"))
    }
}

fn accumulate(bucket: &mut Amount, balance: Amount) -> DomainResult<()> {
    *bucket = bucket
        .checked_add(balance)
        .ok_or_else(|| DomainError::validation("summary total overflows"))?;
    Ok(())
}

/// Bucket balances. Receivables, payables and cash are matched by mapped id
/// when a mapping is given, by conventional account name otherwise.
pub fn summarize(
    accounts: &[Account],
    mapping: Option<&AccountMapping>,
) -> DomainResult<FinancialSummary> {
    let mut summary = FinancialSummary::default();

    for account in accounts {
        match account.kind {
            AccountKind::Revenue => accumulate(&mut summary.revenue, account.balance)?,
            AccountKind::Expense => accumulate(&mut summary.cogs, account.balance)?,
            AccountKind::Asset | AccountKind::Liability => {}
        }

        let matches = |mapped: Option<AccountId>, name: &str| match mapping {
            Some(_) => mapped == Some(account.id),
            None => account.name == name,
        };
        if matches(mapping.and_then(|m| m.receivable), RECEIVABLE_ACCOUNT_NAME) {
            accumulate(&mut summary.receivables, account.balance)?;
        }
        if matches(mapping.and_then(|m| m.payable), PAYABLE_ACCOUNT_NAME) {
            accumulate(&mut summary.payables, account.balance)?;
        }
        if matches(mapping.and_then(|m| m.cash), CASH_ACCOUNT_NAME) {
            accumulate(&mut summary.cash, account.balance)?;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::AccountRole;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn account(name: &str, kind: AccountKind, balance: Amount) -> Account {
        Account {
            balance,
            ..Account::new(name, kind)
        }
    }

    #[test]
    fn buckets_by_conventional_names() {
        let accounts = vec![
            account("Cash", AccountKind::Asset, dec!(1250)),
            account("Accounts Receivable", AccountKind::Asset, dec!(300)),
            account("Inventory", AccountKind::Asset, dec!(900)),
            account("Accounts Payable", AccountKind::Liability, dec!(400)),
            account("Sales", AccountKind::Revenue, dec!(2000)),
            account("Service Income", AccountKind::Revenue, dec!(150)),
            account("Cost of Goods Sold", AccountKind::Expense, dec!(1200)),
        ];

        let summary = summarize(&accounts, None).unwrap();
        assert_eq!(summary.revenue, dec!(2150));
        assert_eq!(summary.cogs, dec!(1200));
        assert_eq!(summary.receivables, dec!(300));
        assert_eq!(summary.payables, dec!(400));
        assert_eq!(summary.cash, dec!(1250));
        assert_eq!(summary.net_profit().unwrap(), dec!(950));
    }

    #[test]
    fn mapping_takes_precedence_over_names() {
        let till = account("Till", AccountKind::Asset, dec!(75));
        let legacy_cash = account("Cash", AccountKind::Asset, dec!(10));
        let mapping = AccountMapping::default().with(AccountRole::Cash, till.id);

        let summary = summarize(&[till, legacy_cash], Some(&mapping)).unwrap();
        assert_eq!(summary.cash, dec!(75));
        assert_eq!(summary.receivables, Amount::ZERO);
    }

    #[test]
    fn empty_ledger_summarizes_to_zero() {
        assert_eq!(summarize(&[], None).unwrap(), FinancialSummary::default());
    }

    #[test]
    fn overflowing_bucket_is_a_validation_error() {
        let huge = Amount::MAX / dec!(2) + dec!(1000);
        let accounts = vec![
            account("Sales", AccountKind::Revenue, huge),
            account("Service Income", AccountKind::Revenue, huge),
        ];
        assert!(matches!(summarize(&accounts, None), Err(DomainError::Validation(_))));

        let lopsided = FinancialSummary {
            revenue: Amount::MAX,
            cogs: -Amount::MAX,
            ..FinancialSummary::default()
        };
        assert!(lopsided.net_profit().is_err());
    }

    proptest! {
        /// Property: net profit is revenue-type minus expense-type balances.
        #[test]
        fn net_profit_is_revenue_minus_expenses(
            balances in prop::collection::vec((0u8..4, -1_000_000i64..1_000_000), 0..20)
        ) {
            let kinds = [AccountKind::Asset, AccountKind::Liability, AccountKind::Revenue, AccountKind::Expense];
            let accounts: Vec<Account> = balances
                .iter()
                .enumerate()
                .map(|(i, (k, cents))| account(&format!("acct-{i}"), kinds[*k as usize], Amount::new(*cents, 2)))
                .collect();

            let expected: Amount = accounts
                .iter()
                .map(|a| match a.kind {
                    AccountKind::Revenue => a.balance,
                    AccountKind::Expense => -a.balance,
                    _ => Amount::ZERO,
                })
                .sum();

            prop_assert_eq!(summarize(&accounts, None).unwrap().net_profit().unwrap(), expected);
        }
    }
}
