//! Value objects: equality by value, not identity.
//!
//! `Money` carries an exact decimal amount together with its currency. The
//! currency travels with the amount everywhere; nothing in this workspace
//! converts between currencies.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Supported settlement currencies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Dkk,
    Sek,
    Gbp,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Eur,
        Currency::Usd,
        Currency::Dkk,
        Currency::Sek,
        Currency::Gbp,
    ];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Dkk => "DKK",
            Currency::Sek => "SEK",
            Currency::Gbp => "GBP",
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnsupportedCurrency(s.to_string()))
    }
}

/// A monetary amount in a specific currency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    value: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Build a non-negative amount (invoices never carry credit balances).
    pub fn try_new(value: Decimal, currency: Currency) -> Result<Self, DomainError> {
        Self::new(value, currency).non_negative()
    }

    /// `self`, or a validation error when the amount is below zero.
    pub fn non_negative(self) -> Result<Self, DomainError> {
        if self.is_negative() {
            return Err(DomainError::validation(format!(
                "amount must not be negative (got {self})"
            )));
        }
        Ok(self)
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }

    /// Subtract `other`, refusing to mix currencies.
    pub fn checked_sub(&self, other: &Money) -> Option<Money> {
        if !self.same_currency(other) {
            return None;
        }
        self.value
            .checked_sub(other.value)
            .map(|value| Money::new(value, self.currency))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}
