pub mod amount;
pub mod balance;
pub mod csv;
pub mod engine;
pub mod model;
pub mod pairwise;
pub mod settle;
pub mod split;

pub use amount::Amount;
pub use balance::{Balances, aggregate, check_closure, net_balances, round_sheet};
pub use engine::Engine;
pub use model::{
    CurrencyCode, Expense, MemberId, Record, RecordId, Settlement, SettlementMode, SplitType,
    Transaction,
};
pub use pairwise::pairwise;
pub use settle::{simplify, simplify_all};
pub use split::{allocate, net_delta, share_of};
