//! Concrete bank alert parsers.
//!
//! Each parser is an independent value implementing [`AlertParser`](crate::AlertParser)
//! and fixes its own sign convention: outflows are negative, inflows positive.

mod capital_one;
mod chase;
mod wells_fargo;

pub use capital_one::CapitalOneTransactionParser;
pub use chase::{ChaseCreditBalanceParser, ChaseCreditPaymentParser, ChaseCreditTransactionParser};
pub use wells_fargo::{WellsFargoBalanceParser, WellsFargoDepositParser, WellsFargoWithdrawalParser};
