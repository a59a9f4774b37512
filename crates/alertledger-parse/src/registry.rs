//! Ordered collection of parsers.

use crate::parser::AlertParser;
use crate::parsers::{
    CapitalOneTransactionParser, ChaseCreditBalanceParser, ChaseCreditPaymentParser,
    ChaseCreditTransactionParser, WellsFargoBalanceParser, WellsFargoDepositParser,
    WellsFargoWithdrawalParser,
};

/// Parsers in evaluation order.
///
/// The first parser whose `can_parse` accepts an email wins, so more specific
/// parsers must be registered before general ones from the same sender.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Box<dyn AlertParser>>,
}

impl ParserRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in parser, specific before general.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with(ChaseCreditPaymentParser)
            .with(ChaseCreditBalanceParser)
            .with(ChaseCreditTransactionParser)
            .with(WellsFargoDepositParser)
            .with(WellsFargoWithdrawalParser)
            .with(WellsFargoBalanceParser)
            .with(CapitalOneTransactionParser)
    }

    /// Append a parser, builder style.
    #[must_use]
    pub fn with(mut self, parser: impl AlertParser + 'static) -> Self {
        self.register(Box::new(parser));
        self
    }

    /// Append a parser after all previously registered ones.
    pub fn register(&mut self, parser: Box<dyn AlertParser>) {
        self.parsers.push(parser);
    }

    /// Iterate parsers in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn AlertParser> {
        self.parsers.iter().map(AsRef::as_ref)
    }

    /// Number of registered parsers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Whether no parser is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Registered parser names, in evaluation order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(AlertParser::name).collect()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.names())
            .finish()
    }
}
