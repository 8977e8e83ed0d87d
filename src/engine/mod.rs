//! Group ledger engine.
//!
//! The engine accepts records for one group (roster changes, expenses,
//! direct payments, soft deletions), validates them at entry, and answers
//! balance and settlement queries by recomputing over everything it holds.
//! Also supports async stream of records.

use std::collections::{BTreeMap, HashMap};
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Amount;
use crate::balance::{Balances, aggregate, check_closure, net_balances};
use crate::model::{
    CurrencyCode, Expense, MemberId, Record, RecordId, Settlement, SettlementMode, SplitType,
    Transaction,
};
use crate::pairwise::pairwise;
use crate::settle::simplify_all;

mod state;
pub use state::Roster;

mod error;
pub use error::{EngineError, ExpenseError, IntegrityError, RemovalError, TransactionError};

/// Upper bound on the gross amount recorded per currency.
///
/// Any balance or sheet total computed from the stored records stays within
/// twice this bound, which fits in an `i64`.
const VOLUME_LIMIT: Amount = Amount::from_scaled(i64::MAX / 2);

/// Where a stored record lives.
#[derive(Debug, Clone, Copy)]
enum Entry {
    Expense(usize),
    Transaction(usize),
}

/// The group ledger engine.
///
/// Holds the roster and every accepted record, including soft-deleted ones.
pub struct Engine {
    roster: Roster,
    expenses: Vec<Expense>,
    transactions: Vec<Transaction>,
    /// Record positions by id, for duplicate checks and removal
    index: HashMap<RecordId, Entry>,
    /// Gross amount recorded per currency, removed records included
    volume: HashMap<CurrencyCode, Amount>,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self {
            roster: Roster::default(),
            expenses: Vec::new(),
            transactions: Vec::new(),
            index: HashMap::new(),
            volume: HashMap::new(),
        }
    }

    /// Create an engine seeded with a member roster.
    pub fn with_members<I, M>(members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: AsRef<str>,
    {
        let mut engine = Self::new();
        for member in members {
            engine.add_member(member.as_ref());
        }
        engine
    }

    /// Add a member to the roster. Returns false if already present.
    pub fn add_member(&mut self, member: &str) -> bool {
        self.roster.insert(member)
    }

    /// Run the engine with the given record stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = Record> + Unpin) {
        while let Some(record) = stream.next().await {
            // a rejected record should not stop the engine, the result is logged by `apply`
            let _ = self.apply(record);
        }
    }

    /// Apply a single record on top of the current engine state
    pub fn apply(&mut self, record: Record) -> Result<(), EngineError> {
        match record {
            Record::Member(member) => {
                if self.add_member(&member) {
                    info!(member = %member, "member joined");
                }
            }
            Record::Expense(expense) => {
                let (id, amount) = (expense.id.clone(), expense.amount);
                let result = self.apply_expense(expense);
                Self::log_result("expense", &id, Some(amount), &result);
                result?;
            }
            Record::Transaction(tx) => {
                let (id, amount) = (tx.id.clone(), tx.amount);
                let result = self.apply_transaction(tx);
                Self::log_result("payment", &id, Some(amount), &result);
                result?;
            }
            Record::Remove(id) => {
                let result = self.apply_remove(&id);
                Self::log_result("removal", &id, None, &result);
                result?;
            }
        }
        Ok(())
    }

    /// Members in join order.
    pub fn members(&self) -> &[MemberId] {
        self.roster.as_slice()
    }

    /// Every accepted expense, active or not.
    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    /// Every accepted direct payment, active or not.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Net balances per currency, negligible entries dropped.
    pub fn balances(&self) -> Balances {
        aggregate(&self.expenses, &self.transactions, self.members())
    }

    /// Suggested transfers per currency.
    ///
    /// `Simplified` runs the debt simplifier over the net balances;
    /// `Pairwise` reports the direct debts between members instead.
    pub fn settlements(&self, mode: SettlementMode) -> BTreeMap<CurrencyCode, Vec<Settlement>> {
        match mode {
            SettlementMode::Simplified => {
                // an open sheet is logged and settled anyway
                let _ = self.check_integrity();
                simplify_all(&self.balances())
            }
            SettlementMode::Pairwise => pairwise(&self.expenses, &self.transactions),
        }
    }

    /// Check that every currency's balances sum to zero within tolerance.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let result = check_closure(&net_balances(
            &self.expenses,
            &self.transactions,
            self.members(),
        ));
        if let Err(e) = &result {
            warn!(reason = %e, "ledger integrity check failed");
        }
        result
    }
}

/// Private API
impl Engine {
    /// Small helper to log `apply` results
    fn log_result<E: std::fmt::Display>(
        kind: &str,
        id: &str,
        amount: Option<Amount>,
        result: &Result<(), E>,
    ) {
        match (result, amount) {
            (Ok(()), Some(amt)) => info!(id, amount = %amt, "{kind} applied"),
            (Ok(()), None) => info!(id, "{kind} applied"),
            (Err(e), Some(amt)) => info!(id, amount = %amt, reason = %e, "{kind} skipped"),
            (Err(e), None) => info!(id, reason = %e, "{kind} skipped"),
        }
    }

    /// Ensure the record ID is unused
    fn is_unique(&self, id: &str) -> bool {
        !self.index.contains_key(id)
    }

    /// The volume of `currency` after adding `amount`, if it stays within [`VOLUME_LIMIT`].
    fn grown_volume(&self, currency: &str, amount: Amount) -> Option<Amount> {
        let volume = self
            .volume
            .get(currency)
            .copied()
            .unwrap_or_default()
            .checked_add(amount)?;
        (volume <= VOLUME_LIMIT).then_some(volume)
    }

    fn enroll<'a>(&mut self, members: impl Iterator<Item = &'a MemberId>) {
        for member in members {
            if self.roster.insert(member) {
                info!(member = %member, "member joined through a record");
            }
        }
    }

    /// Apply a `Record::Expense`:
    /// - Ensure the record ID is unique
    /// - Validate amount, payers and split weights
    /// - Ensure the currency volume stays within bounds
    /// - Enroll every referenced member
    /// - Store the expense
    fn apply_expense(&mut self, expense: Expense) -> Result<(), ExpenseError> {
        if !self.is_unique(&expense.id) {
            return Err(ExpenseError::DuplicateId(expense.id));
        }
        validate_expense(&expense)?;
        let Some(volume) = self.grown_volume(&expense.currency, expense.amount) else {
            return Err(ExpenseError::TooLarge(expense.id));
        };
        self.volume.insert(expense.currency.clone(), volume);

        let members: Vec<MemberId> = expense.members().cloned().collect();
        self.enroll(members.iter());

        self.index
            .insert(expense.id.clone(), Entry::Expense(self.expenses.len()));
        self.expenses.push(expense);

        Ok(())
    }

    /// Apply a `Record::Transaction`:
    /// - Ensure the record ID is unique
    /// - Validate amount and parties
    /// - Ensure the currency volume stays within bounds
    /// - Enroll both parties
    /// - Store the payment
    fn apply_transaction(&mut self, tx: Transaction) -> Result<(), TransactionError> {
        if !self.is_unique(&tx.id) {
            return Err(TransactionError::DuplicateId(tx.id));
        }
        if tx.currency.is_empty() {
            return Err(TransactionError::MissingCurrency(tx.id));
        }
        if !tx.amount.is_positive() {
            return Err(TransactionError::NonPositiveAmount(tx.id, tx.amount));
        }
        if tx.payer_id == tx.receiver_id {
            return Err(TransactionError::SelfPayment(tx.id, tx.payer_id));
        }
        let Some(volume) = self.grown_volume(&tx.currency, tx.amount) else {
            return Err(TransactionError::TooLarge(tx.id));
        };
        self.volume.insert(tx.currency.clone(), volume);

        self.enroll([&tx.payer_id, &tx.receiver_id].into_iter());

        self.index
            .insert(tx.id.clone(), Entry::Transaction(self.transactions.len()));
        self.transactions.push(tx);

        Ok(())
    }

    /// Apply a `Record::Remove`:
    /// - Find the referenced record
    /// - Check it is still active
    /// - Mark it inactive (it stays stored for audit)
    fn apply_remove(&mut self, id: &str) -> Result<(), RemovalError> {
        let entry = *self
            .index
            .get(id)
            .ok_or_else(|| RemovalError::NotFound(id.to_string()))?;

        let is_active = match entry {
            Entry::Expense(idx) => &mut self.expenses[idx].is_active,
            Entry::Transaction(idx) => &mut self.transactions[idx].is_active,
        };
        if !*is_active {
            return Err(RemovalError::AlreadyInactive(id.to_string()));
        }
        *is_active = false;

        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry validation for an expense; the split evaluator itself accepts anything.
fn validate_expense(expense: &Expense) -> Result<(), ExpenseError> {
    let id = || expense.id.clone();

    if expense.currency.is_empty() {
        return Err(ExpenseError::MissingCurrency(id()));
    }
    if !expense.amount.is_positive() {
        return Err(ExpenseError::NonPositiveAmount(id(), expense.amount));
    }
    if expense.is_active && expense.split_to.is_empty() {
        return Err(ExpenseError::NoParticipants(id()));
    }

    if expense.paid_by.is_empty() {
        return Err(ExpenseError::NoPayers(id()));
    }
    if let Some((payer, _)) = expense.paid_by.iter().find(|(_, paid)| !paid.is_positive()) {
        return Err(ExpenseError::NonPositivePayment(id(), payer.clone()));
    }
    let paid = Amount::checked_sum(expense.paid_by.values())
        .ok_or_else(|| ExpenseError::TooLarge(id()))?;
    if !(paid - expense.amount).is_negligible() {
        return Err(ExpenseError::PaidMismatch {
            id: id(),
            paid,
            amount: expense.amount,
        });
    }

    if expense.split_type == SplitType::Equally {
        return Ok(());
    }

    for (member, weight) in &expense.split_data {
        if weight.is_negative() {
            return Err(ExpenseError::NegativeWeight(id(), member.clone()));
        }
        if !expense.split_to.contains(member) {
            return Err(ExpenseError::WeightOutsideSplit(id(), member.clone()));
        }
    }

    let actual = Amount::checked_sum(expense.split_data.values())
        .ok_or_else(|| ExpenseError::TooLarge(id()))?;
    let expected = match expense.split_type {
        SplitType::FixedAmount => expense.amount,
        SplitType::Percentage => Amount::from_whole(100),
        SplitType::Shares if actual.is_positive() => return Ok(()),
        SplitType::Shares => return Err(ExpenseError::ZeroShares(id())),
        SplitType::Equally => return Ok(()),
    };
    if !(actual - expected).is_negligible() {
        return Err(ExpenseError::SplitMismatch {
            id: id(),
            split_type: expense.split_type,
            expected,
            actual,
        });
    }

    Ok(())
}
