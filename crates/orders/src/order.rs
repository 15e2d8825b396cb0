use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateRoot, Amount, DomainError, DomainResult, ItemId, JournalEntryId, OrderId,
    SubmissionKey, line_amount, money::checked_sum,
};
use stockledger_inventory::{Item, StockPlan};
use stockledger_parties::{Party, PartyKind};

use crate::pricing::resolve_price;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Sale,
    Purchase,
}

impl OrderKind {
    /// Counterparty kind an order of this kind must be built against.
    pub fn counterparty_kind(self) -> PartyKind {
        match self {
            OrderKind::Sale => PartyKind::Customer,
            OrderKind::Purchase => PartyKind::Supplier,
        }
    }
}

impl core::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OrderKind::Sale => f.write_str("sale"),
            OrderKind::Purchase => f.write_str("purchase"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Credit,
}

impl core::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PaymentMethod::Cash => f.write_str("cash"),
            PaymentMethod::Credit => f.write_str("credit"),
        }
    }
}

/// Order lifecycle.
///
/// `Empty → Building → ReadyToSubmit → {Posted | Rejected}`; any edit while
/// ready returns to `Building`, and a rejected order can be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Empty,
    Building,
    ReadyToSubmit,
    Posted,
    Rejected,
}

/// Order line with its frozen cost basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: i64,
    pub unit_price: Amount,
    /// Item cost per unit when the line was added.
    pub cost_basis: Amount,
    /// Item quantity known when the line was added.
    pub known_stock: i64,
}

impl OrderLine {
    pub fn amount(&self) -> DomainResult<Amount> {
        line_amount(self.quantity, self.unit_price)
    }

    pub fn cost_amount(&self) -> DomainResult<Amount> {
        line_amount(self.quantity, self.cost_basis)
    }
}

/// Command: AddLine. `item` is `None` when nothing was selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub item: Option<Item>,
    pub quantity: i64,
    pub unit_price: Option<Amount>,
}

/// Command: EditLine. `None` fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLine {
    pub index: usize,
    pub quantity: Option<i64>,
    pub unit_price: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    SelectCounterparty(Party),
    SelectPaymentMethod(PaymentMethod),
    AddLine(AddLine),
    EditLine(EditLine),
    RemoveLine { index: usize },
    MarkReady,
    MarkPosted { entry_id: JournalEntryId },
    MarkRejected { reason: String },
    Reopen { submission_key: SubmissionKey },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    CounterpartySelected(Party),
    PaymentMethodSelected(PaymentMethod),
    LineAdded(OrderLine),
    LineEdited {
        index: usize,
        quantity: i64,
        unit_price: Amount,
    },
    LineRemoved {
        index: usize,
    },
    MarkedReady,
    Posted {
        entry_id: JournalEntryId,
    },
    Rejected {
        reason: String,
    },
    Reopened {
        submission_key: SubmissionKey,
    },
}

/// Aggregate root: an order being built for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    id: OrderId,
    kind: OrderKind,
    counterparty: Option<Party>,
    payment_method: Option<PaymentMethod>,
    lines: Vec<OrderLine>,
    status: OrderStatus,
    submission_key: SubmissionKey,
    posted_entry: Option<JournalEntryId>,
    rejection: Option<String>,
    version: u64,
}

impl OrderDraft {
    pub fn new(kind: OrderKind) -> Self {
        Self {
            id: OrderId::new(),
            kind,
            counterparty: None,
            payment_method: None,
            lines: Vec::new(),
            status: OrderStatus::Empty,
            submission_key: SubmissionKey::new(),
            posted_entry: None,
            rejection: None,
            version: 0,
        }
    }

    pub fn sale() -> Self {
        Self::new(OrderKind::Sale)
    }

    pub fn purchase() -> Self {
        Self::new(OrderKind::Purchase)
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn counterparty(&self) -> Option<&Party> {
        self.counterparty.as_ref()
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn submission_key(&self) -> SubmissionKey {
        self.submission_key
    }

    pub fn posted_entry(&self) -> Option<JournalEntryId> {
        self.posted_entry
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection.as_deref()
    }

    pub fn is_modifiable(&self) -> bool {
        !matches!(self.status, OrderStatus::Posted | OrderStatus::Rejected)
    }

    /// Sum of line amounts.
    pub fn total(&self) -> DomainResult<Amount> {
        let amounts = self
            .lines
            .iter()
            .map(OrderLine::amount)
            .collect::<DomainResult<Vec<_>>>()?;
        checked_sum(amounts)
    }

    /// Sum of `quantity × cost_basis` over all lines.
    pub fn cost_total(&self) -> DomainResult<Amount> {
        let amounts = self
            .lines
            .iter()
            .map(OrderLine::cost_amount)
            .collect::<DomainResult<Vec<_>>>()?;
        checked_sum(amounts)
    }

    /// Name of the selected counterparty (empty if none).
    pub fn counterparty_name(&self) -> &str {
        self.counterparty.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }

    /// Net per-item stock change this order implies.
    pub fn stock_plan(&self) -> DomainResult<StockPlan> {
        let lines = self
            .lines
            .iter()
            .map(|l| (l.item_id, l.item_name.as_str(), l.quantity));
        match self.kind {
            OrderKind::Sale => StockPlan::outbound(lines),
            OrderKind::Purchase => StockPlan::inbound(lines),
        }
    }

    pub fn select_counterparty(&mut self, party: Party) -> DomainResult<()> {
        self.execute(&OrderCommand::SelectCounterparty(party)).map(drop)
    }

    pub fn select_payment_method(&mut self, method: PaymentMethod) -> DomainResult<()> {
        self.execute(&OrderCommand::SelectPaymentMethod(method)).map(drop)
    }

    /// Add a line; returns its index.
    pub fn add_line(
        &mut self,
        item: Option<&Item>,
        quantity: i64,
        unit_price: Option<Amount>,
    ) -> DomainResult<usize> {
        self.execute(&OrderCommand::AddLine(AddLine {
            item: item.cloned(),
            quantity,
            unit_price,
        }))?;
        Ok(self.lines.len() - 1)
    }

    pub fn edit_line(
        &mut self,
        index: usize,
        quantity: Option<i64>,
        unit_price: Option<Amount>,
    ) -> DomainResult<()> {
        self.execute(&OrderCommand::EditLine(EditLine {
            index,
            quantity,
            unit_price,
        }))
        .map(drop)
    }

    pub fn remove_line(&mut self, index: usize) -> DomainResult<()> {
        self.execute(&OrderCommand::RemoveLine { index }).map(drop)
    }

    pub fn mark_ready(&mut self) -> DomainResult<()> {
        self.execute(&OrderCommand::MarkReady).map(drop)
    }

    pub fn mark_posted(&mut self, entry_id: JournalEntryId) -> DomainResult<()> {
        self.execute(&OrderCommand::MarkPosted { entry_id }).map(drop)
    }

    pub fn mark_rejected(&mut self, reason: impl Into<String>) -> DomainResult<()> {
        self.execute(&OrderCommand::MarkRejected {
            reason: reason.into(),
        })
        .map(drop)
    }

    /// Reopen a rejected order under a fresh submission key.
    pub fn reopen(&mut self) -> DomainResult<()> {
        self.execute(&OrderCommand::Reopen {
            submission_key: SubmissionKey::new(),
        })
        .map(drop)
    }
}

impl AggregateRoot for OrderDraft {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for OrderDraft {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::CounterpartySelected(party) => {
                self.counterparty = Some(party.clone());
                self.status = self.editing_status();
            }
            OrderEvent::PaymentMethodSelected(method) => {
                self.payment_method = Some(*method);
                self.status = self.editing_status();
            }
            OrderEvent::LineAdded(line) => {
                self.lines.push(line.clone());
                self.status = self.editing_status();
            }
            OrderEvent::LineEdited {
                index,
                quantity,
                unit_price,
            } => {
                if let Some(line) = self.lines.get_mut(*index) {
                    line.quantity = *quantity;
                    line.unit_price = *unit_price;
                }
                self.status = self.editing_status();
            }
            OrderEvent::LineRemoved { index } => {
                if *index < self.lines.len() {
                    self.lines.remove(*index);
                }
                self.status = self.editing_status();
            }
            OrderEvent::MarkedReady => {
                self.status = OrderStatus::ReadyToSubmit;
            }
            OrderEvent::Posted { entry_id } => {
                self.posted_entry = Some(*entry_id);
                self.status = OrderStatus::Posted;
            }
            OrderEvent::Rejected { reason } => {
                self.rejection = Some(reason.clone());
                self.status = OrderStatus::Rejected;
            }
            OrderEvent::Reopened { submission_key } => {
                self.submission_key = *submission_key;
                self.rejection = None;
                self.status = self.editing_status();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::SelectCounterparty(party) => self.handle_select_counterparty(party),
            OrderCommand::SelectPaymentMethod(method) => {
                self.ensure_modifiable()?;
                Ok(vec![OrderEvent::PaymentMethodSelected(*method)])
            }
            OrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            OrderCommand::EditLine(cmd) => self.handle_edit_line(cmd),
            OrderCommand::RemoveLine { index } => {
                self.ensure_modifiable()?;
                self.ensure_index(*index)?;
                Ok(vec![OrderEvent::LineRemoved { index: *index }])
            }
            OrderCommand::MarkReady => self.handle_mark_ready(),
            OrderCommand::MarkPosted { entry_id } => {
                self.ensure_status(OrderStatus::ReadyToSubmit, "only ready orders can be posted")?;
                Ok(vec![OrderEvent::Posted {
                    entry_id: *entry_id,
                }])
            }
            OrderCommand::MarkRejected { reason } => {
                self.ensure_status(OrderStatus::ReadyToSubmit, "only ready orders can be rejected")?;
                Ok(vec![OrderEvent::Rejected {
                    reason: reason.clone(),
                }])
            }
            OrderCommand::Reopen { submission_key } => {
                self.ensure_status(OrderStatus::Rejected, "only rejected orders can be reopened")?;
                Ok(vec![OrderEvent::Reopened {
                    submission_key: *submission_key,
                }])
            }
        }
    }
}

impl OrderDraft {
    fn editing_status(&self) -> OrderStatus {
        if self.lines.is_empty() && self.counterparty.is_none() && self.payment_method.is_none() {
            OrderStatus::Empty
        } else {
            OrderStatus::Building
        }
    }

    fn ensure_modifiable(&self) -> Result<(), DomainError> {
        if !self.is_modifiable() {
            return Err(DomainError::validation(
                "cannot modify an order once it is posted or rejected",
            ));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: OrderStatus, msg: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::validation(msg));
        }
        Ok(())
    }

    fn ensure_index(&self, index: usize) -> Result<(), DomainError> {
        if index >= self.lines.len() {
            return Err(DomainError::validation(format!("no order line at index {index}")));
        }
        Ok(())
    }

    /// Quantity of `item_id` already on the order, ignoring line `skip`.
    fn quantity_on_order(&self, item_id: ItemId, skip: Option<usize>) -> i64 {
        self.lines
            .iter()
            .enumerate()
            .filter(|(idx, l)| l.item_id == item_id && Some(*idx) != skip)
            .map(|(_, l)| l.quantity)
            .fold(0i64, i64::saturating_add)
    }

    fn ensure_stock(&self, name: &str, requested: i64, known: i64) -> Result<(), DomainError> {
        if self.kind == OrderKind::Sale && requested > known {
            return Err(DomainError::insufficient_stock(name, requested, known));
        }
        Ok(())
    }

    fn handle_select_counterparty(&self, party: &Party) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_modifiable()?;

        let expected = self.kind.counterparty_kind();
        if party.kind != expected {
            return Err(DomainError::validation(format!(
                "a {} order needs a {expected}, got {}",
                self.kind, party.kind
            )));
        }
        if !party.can_transact() {
            return Err(DomainError::validation(format!(
                "{} is suspended",
                party.name
            )));
        }

        Ok(vec![OrderEvent::CounterpartySelected(party.clone())])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_modifiable()?;

        let item = cmd
            .item
            .as_ref()
            .ok_or_else(|| DomainError::validation("an item must be selected"))?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let price = resolve_price(self.kind, item, cmd.unit_price)?;

        let requested = self
            .quantity_on_order(item.id, None)
            .checked_add(cmd.quantity)
            .ok_or_else(|| DomainError::validation("quantity overflows"))?;
        self.ensure_stock(&item.name, requested, item.quantity)?;

        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;

        Ok(vec![OrderEvent::LineAdded(OrderLine {
            line_no,
            item_id: item.id,
            item_name: item.name.clone(),
            quantity: cmd.quantity,
            unit_price: price.unit_price,
            cost_basis: price.cost_basis,
            known_stock: item.quantity,
        })])
    }

    fn handle_edit_line(&self, cmd: &EditLine) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_modifiable()?;
        self.ensure_index(cmd.index)?;

        let line = &self.lines[cmd.index];
        let quantity = cmd.quantity.unwrap_or(line.quantity);
        let unit_price = cmd.unit_price.unwrap_or(line.unit_price);

        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if unit_price <= Amount::ZERO {
            return Err(DomainError::validation(format!(
                "unit price for {} must be positive",
                line.item_name
            )));
        }

        let requested = self
            .quantity_on_order(line.item_id, Some(cmd.index))
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("quantity overflows"))?;
        self.ensure_stock(&line.item_name, requested, line.known_stock)?;

        Ok(vec![OrderEvent::LineEdited {
            index: cmd.index,
            quantity,
            unit_price,
        }])
    }

    fn handle_mark_ready(&self) -> Result<Vec<OrderEvent>, DomainError> {
        match self.status {
            OrderStatus::ReadyToSubmit => return Ok(vec![]),
            OrderStatus::Posted | OrderStatus::Rejected => self.ensure_modifiable()?,
            OrderStatus::Empty | OrderStatus::Building => {}
        }

        if self.counterparty.is_none() {
            return Err(DomainError::validation(format!(
                "a {} must be selected",
                self.kind.counterparty_kind()
            )));
        }
        if self.payment_method.is_none() {
            return Err(DomainError::validation("a payment method must be selected"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("order has no lines"));
        }
        // Surfaces overflow before the order can be submitted.
        self.total()?;
        self.cost_total()?;

        Ok(vec![OrderEvent::MarkedReady])
    }
}
