//! Core domain types for the balance and settlement engine.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::Amount;

/// Member identifier.
pub type MemberId = String;

/// ISO-4217-like currency code. Every balance is scoped to one currency.
pub type CurrencyCode = String;

/// Identifier of an expense or a direct payment.
pub type RecordId = String;

/// How an expense's amount is divided among its participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SplitType {
    /// Every participant bears the same share; weights are ignored.
    #[default]
    Equally,
    /// Each participant owes exactly its stored weight.
    FixedAmount,
    /// Weights are percentages of the total.
    Percentage,
    /// Weights are relative shares of the total.
    Shares,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized split type '{0}'")]
pub struct ParseSplitTypeError(pub String);

impl SplitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitType::Equally => "equally",
            SplitType::FixedAmount => "fixedAmount",
            SplitType::Percentage => "percentage",
            SplitType::Shares => "shares",
        }
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitType {
    type Err = ParseSplitTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equally" => Ok(SplitType::Equally),
            "fixedAmount" => Ok(SplitType::FixedAmount),
            "percentage" => Ok(SplitType::Percentage),
            "shares" => Ok(SplitType::Shares),
            other => Err(ParseSplitTypeError(other.to_string())),
        }
    }
}

/// An amount owed collectively by a subset of members, paid by one or more payers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    pub id: RecordId,
    /// Total cost.
    pub amount: Amount,
    pub currency: CurrencyCode,
    /// Portion of `amount` each payer actually paid.
    pub paid_by: BTreeMap<MemberId, Amount>,
    /// Members who owe a share.
    pub split_to: BTreeSet<MemberId>,
    pub split_type: SplitType,
    /// Per-member weight, interpreted according to `split_type`.
    pub split_data: BTreeMap<MemberId, Amount>,
    /// Inactive expenses are kept for audit but never balanced.
    pub is_active: bool,
}

impl Expense {
    /// Create an active, equally split expense with no payers or participants yet.
    pub fn new(
        id: impl Into<RecordId>,
        currency: impl Into<CurrencyCode>,
        amount: Amount,
    ) -> Self {
        Self {
            id: id.into(),
            amount,
            currency: currency.into(),
            paid_by: BTreeMap::new(),
            split_to: BTreeSet::new(),
            split_type: SplitType::Equally,
            split_data: BTreeMap::new(),
            is_active: true,
        }
    }

    pub fn paid_by(mut self, member: impl Into<MemberId>, amount: Amount) -> Self {
        self.paid_by.insert(member.into(), amount);
        self
    }

    pub fn split_to<I, M>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MemberId>,
    {
        self.split_to.extend(members.into_iter().map(Into::into));
        self
    }

    pub fn split_type(mut self, split_type: SplitType) -> Self {
        self.split_type = split_type;
        self
    }

    /// Add `member` as a participant with the given weight.
    pub fn weight(mut self, member: impl Into<MemberId>, weight: Amount) -> Self {
        let member = member.into();
        self.split_to.insert(member.clone());
        self.split_data.insert(member, weight);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Weight stored for `member`, zero when absent.
    pub fn weight_of(&self, member: &str) -> Amount {
        self.split_data.get(member).copied().unwrap_or_default()
    }

    /// Amount `member` actually paid, zero when absent.
    pub fn paid_amount(&self, member: &str) -> Amount {
        self.paid_by.get(member).copied().unwrap_or_default()
    }

    /// Every member this expense references, payers and participants.
    pub fn members(&self) -> impl Iterator<Item = &MemberId> + '_ {
        self.paid_by.keys().chain(self.split_to.iter())
    }
}

/// A direct settlement payment from one member to another, outside of any expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: RecordId,
    pub payer_id: MemberId,
    pub receiver_id: MemberId,
    pub amount: Amount,
    pub currency: CurrencyCode,
    pub is_active: bool,
}

impl Transaction {
    pub fn new(
        id: impl Into<RecordId>,
        currency: impl Into<CurrencyCode>,
        payer_id: impl Into<MemberId>,
        receiver_id: impl Into<MemberId>,
        amount: Amount,
    ) -> Self {
        Self {
            id: id.into(),
            payer_id: payer_id.into(),
            receiver_id: receiver_id.into(),
            amount,
            currency: currency.into(),
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A suggested single-direction payment that helps zero out net balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub sender_id: MemberId,
    pub receiver_id: MemberId,
    pub amount: Amount,
    pub currency: CurrencyCode,
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {} {}",
            self.sender_id, self.receiver_id, self.amount, self.currency
        )
    }
}

/// Whether a group settles through debt simplification or keeps direct debts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettlementMode {
    #[default]
    Simplified,
    Pairwise,
}

/// A record representing the possible inputs of the engine.
#[derive(Debug, Clone)]
pub enum Record {
    /// Add a member to the group roster.
    Member(MemberId),
    /// Record a shared expense.
    Expense(Expense),
    /// Record a direct payment between two members.
    Transaction(Transaction),
    /// Soft-delete the expense or payment with this id.
    Remove(RecordId),
}
