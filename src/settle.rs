//! Greedy debt simplification.
//!
//! Reduces a single-currency balance sheet to a short list of transfers by
//! repeatedly pairing the smallest outstanding creditor with the smallest
//! outstanding debtor.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::debug;

use crate::Amount;
use crate::balance::{Balances, round_sheet};
use crate::model::{CurrencyCode, MemberId, Settlement};

/// Min-heap of outstanding magnitudes, ties broken by member id.
type Outstanding = BinaryHeap<Reverse<(Amount, MemberId)>>;

/// Compute the transfers that settle `balances` in `currency`.
///
/// The sheet is first rounded to whole cents with [`round_sheet`] and members
/// that round to zero are ignored, so every transfer is a whole number of
/// cents. On a sheet summing to zero, replaying the transfers gives back each
/// balance to within one cent. Settlements are returned in emission order and
/// at most `creditors + debtors - 1` are produced. If the sheet does not sum
/// to zero, whatever cannot be matched is discarded.
pub fn simplify(currency: &str, balances: &BTreeMap<MemberId, Amount>) -> Vec<Settlement> {
    let mut creditors = Outstanding::new();
    let mut debtors = Outstanding::new();

    for (member, balance) in round_sheet(balances) {
        if balance.is_positive() {
            creditors.push(Reverse((balance, member)));
        } else if balance.is_negative() {
            debtors.push(Reverse((-balance, member)));
        }
    }

    let (creditor_count, debtor_count) = (creditors.len(), debtors.len());
    let mut settlements = Vec::with_capacity((creditor_count + debtor_count).saturating_sub(1));

    while let (Some(Reverse((credit, creditor))), Some(Reverse((debt, debtor)))) =
        (creditors.peek().cloned(), debtors.peek().cloned())
    {
        creditors.pop();
        debtors.pop();

        let transfer = credit.min(debt);
        settlements.push(Settlement {
            sender_id: debtor.clone(),
            receiver_id: creditor.clone(),
            amount: transfer,
            currency: currency.to_string(),
        });

        // both sides are whole cents, so the remainders are too
        let (credit, debt) = (credit - transfer, debt - transfer);
        if credit.is_positive() {
            creditors.push(Reverse((credit, creditor)));
        }
        if debt.is_positive() {
            debtors.push(Reverse((debt, debtor)));
        }
    }

    debug!(
        currency,
        creditors = creditor_count,
        debtors = debtor_count,
        settlements = settlements.len(),
        "balances simplified"
    );

    settlements
}

/// Run [`simplify`] once per currency.
pub fn simplify_all(balances: &Balances) -> BTreeMap<CurrencyCode, Vec<Settlement>> {
    balances
        .iter()
        .map(|(currency, sheet)| (currency.clone(), simplify(currency, sheet)))
        .filter(|(_, settlements)| !settlements.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn sheet(entries: &[(&str, &str)]) -> BTreeMap<MemberId, Amount> {
        entries
            .iter()
            .map(|(member, balance)| (member.to_string(), amt(balance)))
            .collect()
    }

    fn transfer(settlement: &Settlement) -> (&str, &str, Amount) {
        (
            settlement.sender_id.as_str(),
            settlement.receiver_id.as_str(),
            settlement.amount,
        )
    }

    fn replay(settlements: &[Settlement]) -> BTreeMap<MemberId, Amount> {
        let mut net = BTreeMap::new();
        for s in settlements {
            *net.entry(s.receiver_id.clone()).or_insert(Amount::ZERO) += s.amount;
            *net.entry(s.sender_id.clone()).or_insert(Amount::ZERO) -= s.amount;
        }
        net
    }

    #[test]
    fn single_creditor_two_debtors() {
        let settlements = simplify("USD", &sheet(&[("a", "60"), ("b", "-30"), ("c", "-30")]));

        assert_eq!(settlements.len(), 2);
        assert_eq!(transfer(&settlements[0]), ("b", "a", amt("30")));
        assert_eq!(transfer(&settlements[1]), ("c", "a", amt("30")));
        assert!(settlements.iter().all(|s| s.currency == "USD"));
    }

    #[test]
    fn smallest_debtor_settles_first() {
        let settlements = simplify("USD", &sheet(&[("a", "-50"), ("b", "70"), ("c", "-20")]));

        assert_eq!(settlements.len(), 2);
        assert_eq!(transfer(&settlements[0]), ("c", "b", amt("20")));
        assert_eq!(transfer(&settlements[1]), ("a", "b", amt("50")));
    }

    #[test]
    fn direct_payment_reversal() {
        let settlements = simplify("USD", &sheet(&[("a", "40"), ("b", "-40")]));
        assert_eq!(settlements.len(), 1);
        assert_eq!(transfer(&settlements[0]), ("b", "a", amt("40")));
    }

    #[test]
    fn balanced_sheet_needs_no_transfers() {
        let settlements = simplify("USD", &sheet(&[("a", "0"), ("b", "0"), ("c", "0")]));
        assert!(settlements.is_empty());
    }

    #[test]
    fn balances_rounding_to_zero_are_ignored() {
        let settlements = simplify("USD", &sheet(&[("a", "0.0040"), ("b", "-0.0040")]));
        assert!(settlements.is_empty());
    }

    #[test]
    fn sub_cent_sheet_settles_in_whole_cents() {
        let balances = sheet(&[
            ("a", "5.0295"),
            ("b", "-1.0059"),
            ("c", "-1.0059"),
            ("d", "-1.0059"),
            ("e", "-1.0059"),
            ("f", "-1.0059"),
        ]);
        let settlements = simplify("USD", &balances);

        assert_eq!(settlements.len(), 5);
        assert_eq!(transfer(&settlements[0]), ("b", "a", amt("1.00")));
        assert_eq!(transfer(&settlements[1]), ("c", "a", amt("1.00")));
        assert_eq!(transfer(&settlements[2]), ("d", "a", amt("1.01")));
        assert_eq!(transfer(&settlements[3]), ("e", "a", amt("1.01")));
        assert_eq!(transfer(&settlements[4]), ("f", "a", amt("1.01")));

        let replayed = replay(&settlements);
        for (member, balance) in &balances {
            assert!((replayed[member] - *balance).is_negligible(), "{member} drifted");
        }
    }

    #[test]
    fn thirds_settle_in_whole_cents() {
        let balances = sheet(&[("a", "66.6667"), ("b", "-33.3333"), ("c", "-33.3334")]);
        let settlements = simplify("USD", &balances);

        assert_eq!(transfer(&settlements[0]), ("b", "a", amt("33.33")));
        assert_eq!(transfer(&settlements[1]), ("c", "a", amt("33.34")));
        assert!(settlements.iter().all(|s| s.amount == s.amount.round_to_cents()));
    }

    #[test]
    fn partial_transfers_reinsert_remainder() {
        let balances = sheet(&[
            ("a", "100"),
            ("b", "25"),
            ("c", "-45"),
            ("d", "-80"),
        ]);
        let settlements = simplify("USD", &balances);

        assert_eq!(transfer(&settlements[0]), ("c", "b", amt("25")));
        assert_eq!(transfer(&settlements[1]), ("c", "a", amt("20")));
        assert_eq!(transfer(&settlements[2]), ("d", "a", amt("80")));
        assert_eq!(settlements.len(), 3);
        assert_eq!(replay(&settlements), balances);
    }

    #[test]
    fn ties_break_by_member_id() {
        let balances = sheet(&[("z", "10"), ("y", "10"), ("x", "-10"), ("w", "-10")]);
        let settlements = simplify("USD", &balances);

        assert_eq!(transfer(&settlements[0]), ("w", "y", amt("10")));
        assert_eq!(transfer(&settlements[1]), ("x", "z", amt("10")));
    }

    #[test]
    fn transfer_count_is_bounded() {
        let balances = sheet(&[
            ("a", "13.37"),
            ("b", "21.10"),
            ("c", "5.53"),
            ("d", "-9.99"),
            ("e", "-17.01"),
            ("f", "-13"),
        ]);
        let settlements = simplify("USD", &balances);

        assert!(settlements.len() <= 5);
        assert!(settlements.iter().all(|s| s.amount.is_positive()));
        assert!(settlements.iter().all(|s| s.sender_id != s.receiver_id));
        assert_eq!(replay(&settlements), balances);
    }

    #[test]
    fn unbalanced_sheet_discards_leftover() {
        let settlements = simplify("USD", &sheet(&[("a", "50"), ("b", "-20")]));
        assert_eq!(settlements.len(), 1);
        assert_eq!(transfer(&settlements[0]), ("b", "a", amt("20")));
    }

    #[test]
    fn deterministic_across_runs() {
        let balances = sheet(&[("a", "7"), ("b", "7"), ("c", "-3"), ("d", "-11")]);
        assert_eq!(simplify("USD", &balances), simplify("USD", &balances));
    }

    #[test]
    fn simplify_all_covers_each_currency() {
        let mut balances = Balances::new();
        balances.insert("USD".to_string(), sheet(&[("a", "5"), ("b", "-5")]));
        balances.insert("EUR".to_string(), sheet(&[("a", "-2"), ("b", "2")]));
        balances.insert("JPY".to_string(), sheet(&[("a", "0")]));

        let all = simplify_all(&balances);
        assert_eq!(all.len(), 2);
        assert_eq!(transfer(&all["USD"][0]), ("b", "a", amt("5")));
        assert_eq!(transfer(&all["EUR"][0]), ("a", "b", amt("2")));
        assert_eq!(all["EUR"][0].currency, "EUR");
    }
}
