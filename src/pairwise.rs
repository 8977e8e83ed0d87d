//! Pairwise (non-simplified) debts.
//!
//! Keeps track of which member owes which other member directly, for groups
//! that turn debt simplification off. Built from the same split evaluation as
//! the net balances, never passed through the simplifier.

use std::collections::BTreeMap;

use crate::Amount;
use crate::model::{CurrencyCode, Expense, MemberId, Settlement, Transaction};
use crate::split::allocate;

/// Signed debt per ordered member pair: positive when the first member owes the second.
type PairDebts = BTreeMap<(MemberId, MemberId), Amount>;

/// Direct debts per currency, reported debtor to creditor.
///
/// Each participant owes each payer the part of its share proportional to
/// that payer's portion of the amount paid. A direct payment reduces what the
/// payer owes the receiver. Opposite debts within a pair cancel out, each
/// remaining debt is rounded to whole cents, and pairs rounding to zero are
/// dropped.
pub fn pairwise(
    expenses: &[Expense],
    transactions: &[Transaction],
) -> BTreeMap<CurrencyCode, Vec<Settlement>> {
    let mut ledger: BTreeMap<CurrencyCode, PairDebts> = BTreeMap::new();

    for expense in expenses.iter().filter(|expense| expense.is_active) {
        let paid_total: Amount = expense.paid_by.values().sum();
        if !paid_total.is_positive() {
            continue;
        }
        let debts = ledger.entry(expense.currency.clone()).or_default();
        for (participant, share) in allocate(expense) {
            for (payer, &paid) in &expense.paid_by {
                if *payer != participant {
                    owe(debts, &participant, payer, share.mul_ratio(paid, paid_total));
                }
            }
        }
    }

    for tx in transactions.iter().filter(|tx| tx.is_active) {
        let debts = ledger.entry(tx.currency.clone()).or_default();
        owe(debts, &tx.receiver_id, &tx.payer_id, tx.amount);
    }

    ledger
        .into_iter()
        .filter_map(|(currency, debts)| {
            let settlements: Vec<_> = debts
                .into_iter()
                .map(|(pair, amount)| (pair, amount.round_to_cents()))
                .filter(|(_, amount)| !amount.is_zero())
                .map(|((first, second), amount)| {
                    let (sender_id, receiver_id) = if amount.is_positive() {
                        (first, second)
                    } else {
                        (second, first)
                    };
                    Settlement {
                        sender_id,
                        receiver_id,
                        amount: amount.abs(),
                        currency: currency.clone(),
                    }
                })
                .collect();
            (!settlements.is_empty()).then_some((currency, settlements))
        })
        .collect()
}

fn owe(debts: &mut PairDebts, debtor: &MemberId, creditor: &MemberId, amount: Amount) {
    if debtor < creditor {
        *debts.entry((debtor.clone(), creditor.clone())).or_default() += amount;
    } else {
        *debts.entry((creditor.clone(), debtor.clone())).or_default() -= amount;
    }
}
