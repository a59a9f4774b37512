//! # alertledger-parse
//!
//! Turns bank alert emails into typed financial values.
//!
//! This crate provides:
//! - **Input model**: the normalized [`EmailMessage`] handed over by the mail collaborator
//! - **Preprocessing**: forwarded-message unwrapping, whitespace normalization, amount parsing
//! - **Parsers**: one [`AlertParser`] per bank, account type and alert kind
//! - **Dispatch**: an explicitly constructed [`ParserRegistry`] and a [`Dispatcher`]
//!   that picks the first matching parser and classifies failures
//!
//! Nothing in this crate performs I/O.
//!
//! ## Quick Start
//!
//! ```ignore
//! use alertledger_parse::{Dispatcher, ParserRegistry};
//!
//! let dispatcher = Dispatcher::new(ParserRegistry::with_defaults());
//! match dispatcher.dispatch(&email, &accounts) {
//!     Ok(dispatched) => println!("{} -> {:?}", dispatched.parser, dispatched.result),
//!     Err(failure) => println!("{}: {}", failure.kind, failure.message),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod dispatch;
mod email;
mod error;
mod model;
mod parser;
pub mod parsers;
mod registry;
pub mod text;

pub use dispatch::{AccountLookup, DispatchFailure, Dispatched, Dispatcher, validate};
pub use email::{AccountId, EmailMessage, SyncSourceId, UserId};
pub use error::{Error, Result};
pub use model::{
    AccountType, AlertKind, Bank, Capabilities, FailureKind, ParseResult, ParsedAccountBalance,
    ParsedCreditUpdate, ParsedPayment, ParsedTransaction,
};
pub use parser::{AlertParser, sent_by};
pub use registry::ParserRegistry;
