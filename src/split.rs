//! Split policy evaluation.
//!
//! Turns a single expense into the share each participant owes and the net
//! effect the expense has on one member's balance. Every function here is
//! total: malformed weights produce degenerate shares, never errors.

use std::collections::BTreeMap;

use crate::Amount;
use crate::model::{Expense, MemberId, SplitType};

/// Compute every participant's share of `expense` in one pass.
///
/// Only members of `split_to` appear in the result.
///
/// Proportional policies (`Equally`, `Percentage`, `Shares`) floor the
/// running total at each participant, in member-id order, and hand out the
/// difference. Each share is within 0.0001 of the exact quotient and the
/// shares sum to the expense amount whenever all of the weight belongs to
/// participants.
pub fn allocate(expense: &Expense) -> BTreeMap<MemberId, Amount> {
    match expense.split_type {
        SplitType::FixedAmount => expense
            .split_to
            .iter()
            .map(|member| (member.clone(), expense.weight_of(member)))
            .collect(),
        SplitType::Equally => proportional(
            expense.amount,
            expense.split_to.iter().map(|member| (member, 1)),
            expense.split_to.len() as i128,
        ),
        SplitType::Percentage | SplitType::Shares => {
            let total = expense.split_data.values().copied().map(effective_weight).sum();
            proportional(
                expense.amount,
                expense
                    .split_to
                    .iter()
                    .map(|member| (member, effective_weight(expense.weight_of(member)))),
                total,
            )
        }
    }
}

/// The amount `member` is responsible for out of `expense.amount`.
///
/// Zero for members outside `split_to`; callers distinguish "owes nothing"
/// from "not participating" by checking membership themselves.
pub fn share_of(member: &str, expense: &Expense) -> Amount {
    allocate(expense).get(member).copied().unwrap_or_default()
}

/// Net effect of `expense` on `member`'s balance: what they paid minus what they owe.
pub fn net_delta(member: &str, expense: &Expense) -> Amount {
    net_delta_with(member, expense, &allocate(expense))
}

/// [`net_delta`] against shares already computed by [`allocate`].
///
/// A payer who is also a participant nets both sides in one step.
pub(crate) fn net_delta_with(
    member: &str,
    expense: &Expense,
    shares: &BTreeMap<MemberId, Amount>,
) -> Amount {
    let paid = expense.paid_amount(member);
    let owed = shares.get(member).copied().unwrap_or_default();

    if expense.paid_by.contains_key(member) {
        paid - owed
    } else if expense.split_to.contains(member) {
        -owed
    } else {
        paid
    }
}

/// Negative weights count as zero.
fn effective_weight(weight: Amount) -> i128 {
    weight.scaled().max(0) as i128
}

fn proportional<'a>(
    amount: Amount,
    weights: impl Iterator<Item = (&'a MemberId, i128)>,
    total: i128,
) -> BTreeMap<MemberId, Amount> {
    let amount = amount.scaled() as i128;
    let mut cumulative = 0_i128;
    let mut allocated = 0_i128;

    weights
        .map(|(member, weight)| {
            if total <= 0 {
                return (member.clone(), Amount::ZERO);
            }
            cumulative += weight;
            let upto = (amount * cumulative).div_euclid(total);
            let share = upto - allocated;
            allocated = upto;
            (member.clone(), Amount::from_scaled(share as i64))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn dinner() -> Expense {
        Expense::new("e1", "USD", amt("90"))
            .paid_by("a", amt("90"))
            .split_to(["a", "b", "c"])
    }

    // Equally

    #[test]
    fn equally_splits_evenly() {
        let expense = dinner();
        for member in ["a", "b", "c"] {
            assert_eq!(share_of(member, &expense), amt("30"));
        }
    }

    #[test]
    fn equally_ignores_weights() {
        let expense = dinner().weight("a", amt("80"));
        assert_eq!(share_of("a", &expense), amt("30"));
        assert_eq!(share_of("b", &expense), amt("30"));
    }

    #[test]
    fn equally_thirds_sum_to_total() {
        let expense = Expense::new("e1", "USD", amt("100"))
            .paid_by("a", amt("100"))
            .split_to(["a", "b", "c"]);
        let shares = allocate(&expense);

        assert_eq!(shares["a"], amt("33.3333"));
        assert_eq!(shares["b"], amt("33.3333"));
        assert_eq!(shares["c"], amt("33.3334"));
        assert_eq!(shares.values().sum::<Amount>(), amt("100"));
    }

    #[test]
    fn net_delta_for_payer_and_participants() {
        let expense = dinner();
        assert_eq!(net_delta("a", &expense), amt("60"));
        assert_eq!(net_delta("b", &expense), amt("-30"));
        assert_eq!(net_delta("c", &expense), amt("-30"));
    }

    // Fixed amount

    #[test]
    fn fixed_amount_reports_stored_values() {
        let expense = Expense::new("e1", "USD", amt("50"))
            .paid_by("a", amt("50"))
            .split_type(SplitType::FixedAmount)
            .weight("a", amt("10"))
            .weight("b", amt("40"));

        assert_eq!(share_of("a", &expense), amt("10"));
        assert_eq!(share_of("b", &expense), amt("40"));
        assert_eq!(net_delta("a", &expense), amt("40"));
    }

    #[test]
    fn fixed_amount_missing_weight_defaults_to_zero() {
        let expense = Expense::new("e1", "USD", amt("50"))
            .paid_by("a", amt("50"))
            .split_type(SplitType::FixedAmount)
            .weight("a", amt("50"))
            .split_to(["b"]);

        assert_eq!(share_of("b", &expense), Amount::ZERO);
        assert_eq!(net_delta("b", &expense), Amount::ZERO);
    }

    #[test]
    fn fixed_amount_mismatch_is_not_reconciled() {
        let expense = Expense::new("e1", "USD", amt("50"))
            .paid_by("a", amt("50"))
            .split_type(SplitType::FixedAmount)
            .weight("a", amt("5"))
            .weight("b", amt("5"));

        assert_eq!(allocate(&expense).values().sum::<Amount>(), amt("10"));
    }

    // Percentage and shares

    #[test]
    fn percentage_split() {
        let expense = Expense::new("e1", "USD", amt("100"))
            .paid_by("b", amt("100"))
            .split_type(SplitType::Percentage)
            .weight("a", amt("50"))
            .weight("b", amt("30"))
            .weight("c", amt("20"));

        assert_eq!(share_of("a", &expense), amt("50"));
        assert_eq!(share_of("b", &expense), amt("30"));
        assert_eq!(share_of("c", &expense), amt("20"));

        assert_eq!(net_delta("a", &expense), amt("-50"));
        assert_eq!(net_delta("b", &expense), amt("70"));
        assert_eq!(net_delta("c", &expense), amt("-20"));
    }

    #[test]
    fn shares_split_is_relative() {
        let expense = Expense::new("e1", "USD", amt("70"))
            .paid_by("a", amt("70"))
            .split_type(SplitType::Shares)
            .weight("a", amt("1"))
            .weight("b", amt("2"))
            .weight("c", amt("4"));

        assert_eq!(share_of("a", &expense), amt("10"));
        assert_eq!(share_of("b", &expense), amt("20"));
        assert_eq!(share_of("c", &expense), amt("40"));
    }

    #[test]
    fn shares_with_remainder_sum_to_total() {
        let expense = Expense::new("e1", "USD", amt("10"))
            .paid_by("a", amt("10"))
            .split_type(SplitType::Shares)
            .weight("a", amt("1"))
            .weight("b", amt("1"))
            .weight("c", amt("1"));

        assert_eq!(allocate(&expense).values().sum::<Amount>(), amt("10"));
    }

    #[test]
    fn zero_weight_sum_yields_zero_shares() {
        let expense = Expense::new("e1", "USD", amt("60"))
            .paid_by("a", amt("60"))
            .split_type(SplitType::Percentage)
            .weight("a", Amount::ZERO)
            .weight("b", Amount::ZERO);

        assert_eq!(share_of("a", &expense), Amount::ZERO);
        assert_eq!(share_of("b", &expense), Amount::ZERO);
        assert_eq!(net_delta("a", &expense), amt("60"));
        assert_eq!(net_delta("b", &expense), Amount::ZERO);
    }

    #[test]
    fn negative_weights_count_as_zero() {
        let expense = Expense::new("e1", "USD", amt("40"))
            .paid_by("a", amt("40"))
            .split_type(SplitType::Shares)
            .weight("a", amt("1"))
            .weight("b", amt("-5"))
            .weight("c", amt("1"));

        assert_eq!(share_of("a", &expense), amt("20"));
        assert_eq!(share_of("b", &expense), Amount::ZERO);
        assert_eq!(share_of("c", &expense), amt("20"));
    }

    #[test]
    fn weights_outside_participants_dilute_shares() {
        let mut expense = Expense::new("e1", "USD", amt("100"))
            .paid_by("a", amt("100"))
            .split_type(SplitType::Percentage)
            .weight("a", amt("50"))
            .split_to(["b"]);
        expense.split_data.insert("z".to_string(), amt("50"));

        assert_eq!(share_of("a", &expense), amt("50"));
        assert_eq!(share_of("b", &expense), Amount::ZERO);
    }

    // Membership

    #[test]
    fn non_participant_has_no_share() {
        let expense = dinner();
        assert_eq!(share_of("d", &expense), Amount::ZERO);
        assert_eq!(net_delta("d", &expense), Amount::ZERO);
    }

    #[test]
    fn payer_outside_split_is_credited_in_full() {
        let expense = Expense::new("e1", "USD", amt("20"))
            .paid_by("a", amt("20"))
            .split_to(["b", "c"]);

        assert_eq!(net_delta("a", &expense), amt("20"));
        assert_eq!(net_delta("b", &expense), amt("-10"));
    }

    #[test]
    fn multiple_payers_net_independently() {
        let expense = Expense::new("e1", "USD", amt("90"))
            .paid_by("a", amt("60"))
            .paid_by("b", amt("30"))
            .split_to(["a", "b", "c"]);

        assert_eq!(net_delta("a", &expense), amt("30"));
        assert_eq!(net_delta("b", &expense), Amount::ZERO);
        assert_eq!(net_delta("c", &expense), amt("-30"));
    }
}
