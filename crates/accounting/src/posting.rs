//! Posting rules: order → balanced journal draft.
//!
//! Sale:     Dr Cash|Receivable / Cr Sales for revenue,
//!           Dr COGS / Cr Inventory for Σ(quantity × cost_basis).
//! Purchase: Dr Inventory / Cr Cash|Payable for the order total.

use tracing::debug;

use stockledger_core::{DomainError, DomainResult};
use stockledger_orders::{OrderDraft, OrderKind, OrderStatus, PaymentMethod};

use crate::journal::JournalDraft;
use crate::mapping::{AccountMapping, ResolvedAccounts};

/// Stateless apart from the mapping it was built with.
#[derive(Debug, Clone, Copy)]
pub struct PostingEngine {
    accounts: ResolvedAccounts,
}

impl PostingEngine {
    /// Fails with a configuration error if any role is unmapped.
    pub fn new(mapping: &AccountMapping) -> DomainResult<Self> {
        Ok(Self {
            accounts: mapping.resolve_all()?,
        })
    }

    pub fn accounts(&self) -> &ResolvedAccounts {
        &self.accounts
    }

    pub fn post(&self, order: &OrderDraft) -> DomainResult<JournalDraft> {
        if order.status() != OrderStatus::ReadyToSubmit {
            return Err(DomainError::validation(
                "only orders ready to submit can be posted",
            ));
        }
        let payment = order
            .payment_method()
            .ok_or_else(|| DomainError::validation("payment method must be selected"))?;

        let draft = match order.kind() {
            OrderKind::Sale => self.post_sale(order, payment)?,
            OrderKind::Purchase => self.post_purchase(order, payment)?,
        };
        draft.ensure_balanced()?;

        let (debits, _) = draft.totals()?;
        debug!(
            order_id = %order.id_typed(),
            kind = %order.kind(),
            legs = draft.legs().len(),
            %debits,
            "journal draft computed"
        );
        Ok(draft)
    }

    fn post_sale(&self, order: &OrderDraft, payment: PaymentMethod) -> DomainResult<JournalDraft> {
        let revenue = order.total()?;
        let cogs = order.cost_total()?;
        let settlement = match payment {
            PaymentMethod::Cash => self.accounts.cash,
            PaymentMethod::Credit => self.accounts.receivable,
        };

        let mut draft = JournalDraft::new(format!("Sale & COGS: {}", order.counterparty_name()));
        draft.debit(settlement, revenue)?;
        draft.credit(self.accounts.sales, revenue)?;
        draft.debit(self.accounts.cogs, cogs)?;
        draft.credit(self.accounts.inventory, cogs)?;
        Ok(draft)
    }

    fn post_purchase(
        &self,
        order: &OrderDraft,
        payment: PaymentMethod,
    ) -> DomainResult<JournalDraft> {
        let total = order.total()?;
        let settlement = match payment {
            PaymentMethod::Cash => self.accounts.cash,
            PaymentMethod::Credit => self.accounts.payable,
        };

        let mut draft = JournalDraft::new(format!(
            "Purchase ({payment}) from {}",
            order.counterparty_name()
        ));
        draft.debit(self.accounts.inventory, total)?;
        draft.credit(settlement, total)?;
        Ok(draft)
    }
}
