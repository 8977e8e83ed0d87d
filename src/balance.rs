//! Aggregation of expenses and direct payments into net balances.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::Amount;
use crate::engine::IntegrityError;
use crate::model::{CurrencyCode, Expense, MemberId, Transaction};
use crate::split::{allocate, net_delta_with};

/// Net balance per member, per currency. Positive means "is owed".
pub type Balances = BTreeMap<CurrencyCode, BTreeMap<MemberId, Amount>>;

/// Fold every active expense and transaction into full-precision net balances.
///
/// Every member of `members` starts at zero in every currency that appears in
/// an active record. Inactive records are skipped. Expenses only move the
/// balances of roster members; transactions always move both parties.
pub fn net_balances(
    expenses: &[Expense],
    transactions: &[Transaction],
    members: &[MemberId],
) -> Balances {
    let mut balances = Balances::new();

    let currencies = expenses
        .iter()
        .filter(|expense| expense.is_active)
        .map(|expense| &expense.currency)
        .chain(
            transactions
                .iter()
                .filter(|tx| tx.is_active)
                .map(|tx| &tx.currency),
        );
    for currency in currencies {
        balances.entry(currency.clone()).or_insert_with(|| {
            members
                .iter()
                .map(|member| (member.clone(), Amount::ZERO))
                .collect()
        });
    }

    for expense in expenses.iter().filter(|expense| expense.is_active) {
        let shares = allocate(expense);
        let sheet = balances.entry(expense.currency.clone()).or_default();
        for member in members {
            *sheet.entry(member.clone()).or_default() += net_delta_with(member, expense, &shares);
        }
    }

    for tx in transactions.iter().filter(|tx| tx.is_active) {
        let sheet = balances.entry(tx.currency.clone()).or_default();
        *sheet.entry(tx.payer_id.clone()).or_default() += tx.amount;
        *sheet.entry(tx.receiver_id.clone()).or_default() -= tx.amount;
    }

    balances
}

/// Net balances as handed to presentation.
///
/// Each sheet goes through [`round_sheet`], entries that round to zero are
/// dropped, and currencies left without entries are omitted.
pub fn aggregate(
    expenses: &[Expense],
    transactions: &[Transaction],
    members: &[MemberId],
) -> Balances {
    net_balances(expenses, transactions, members)
        .into_iter()
        .filter_map(|(currency, sheet)| {
            let sheet: BTreeMap<_, _> = round_sheet(&sheet)
                .into_iter()
                .filter(|(_, balance)| !balance.is_zero())
                .collect();
            (!sheet.is_empty()).then_some((currency, sheet))
        })
        .collect()
}

/// Round every balance of a sheet to whole cents, keeping the sheet's total.
///
/// Balances are floored to cents, then the cents still missing from the
/// rounded total go to the largest remainders, ties by member id. Each
/// balance moves by less than one cent, zero stays zero, and a sheet summing
/// to zero still does afterwards.
pub fn round_sheet(sheet: &BTreeMap<MemberId, Amount>) -> BTreeMap<MemberId, Amount> {
    let cent = i128::from(Amount::CENT.scaled());
    let total: i128 = sheet.values().map(|b| i128::from(b.scaled())).sum();
    let rem = total % cent;
    let target = if rem.abs() * 2 >= cent {
        total - rem + cent * rem.signum()
    } else {
        total - rem
    };

    let mut rounded = BTreeMap::new();
    let mut remainders = Vec::new();
    let mut floored: i128 = 0;
    for (member, &balance) in sheet {
        let floor = balance.floor_to_cents();
        let remainder = balance - floor;
        if remainder.is_positive() {
            remainders.push((Reverse(remainder), member));
        }
        floored += i128::from(floor.scaled());
        rounded.insert(member.clone(), floor);
    }
    remainders.sort();

    let missing = usize::try_from((target - floored) / cent).unwrap_or_default();
    for (_, member) in remainders.into_iter().take(missing) {
        if let Some(balance) = rounded.get_mut(member) {
            *balance += Amount::CENT;
        }
    }

    rounded
}

/// Assert every currency's balances sum to zero within tolerance.
///
/// The simplifier does not check this itself; callers that care about ledger
/// integrity run it before settling.
pub fn check_closure(balances: &Balances) -> Result<(), IntegrityError> {
    for (currency, sheet) in balances {
        let residual: Amount = sheet.values().sum();
        if !residual.is_negligible() {
            return Err(IntegrityError::Unbalanced {
                currency: currency.clone(),
                residual,
            });
        }
    }
    Ok(())
}
