//! Client-side checks mirroring contract `require`s.
//!
//! Every helper returns [`Error::Precondition`] on failure, so wrappers can
//! chain them with `?` before anything is sent to the node.

use crate::address::Address;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub fn ensure(condition: bool, message: impl Into<String>) -> Result<()> {
    //! Fail with `message` unless `condition` holds.
    if condition {
        Ok(())
    } else {
        Err(Error::Precondition(message.into()))
    }
}

pub fn non_zero_address(address: Address, what: &str) -> Result<()> {
    //! `what` names the argument in the message.
    ensure(!address.is_zero(), format!("{what} must not be the zero address"))
}

pub fn positive_amount(amount: Decimal, what: &str) -> Result<()> {
    //! Strictly positive.
    ensure(amount > Decimal::ZERO, format!("{what} must be greater than zero"))
}

pub fn date_in_future(date: DateTime<Utc>, what: &str) -> Result<()> {
    //! Compared against the local clock.
    ensure(date > Utc::now(), format!("{what} must be in the future"))
}

pub fn date_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    //! `start` strictly before `end`.
    ensure(start < end, "Start date must be before end date")
}

pub fn equal_lengths(lengths: &[usize], what: &str) -> Result<()> {
    //! All argument arrays of a batch call must have the same length.
    ensure(
        lengths.windows(2).all(|pair| pair[0] == pair[1]),
        format!("Argument arrays of {what} must have equal lengths"),
    )
}

pub fn percentage_in_range(percentage: Decimal, what: &str) -> Result<()> {
    //! Percentages are in `(0, 100]`.
    ensure(
        percentage > Decimal::ZERO && percentage <= Decimal::ONE_HUNDRED,
        format!("{what} must be greater than 0 and at most 100"),
    )
}

pub fn sufficient_balance(balance: Decimal, required: Decimal) -> Result<()> {
    //! `balance` covers `required`.
    ensure(
        balance >= required,
        format!("Insufficient balance: {balance} available, {required} required"),
    )
}

pub fn sufficient_allowance(allowance: Decimal, required: Decimal) -> Result<()> {
    //! `allowance` covers `required`.
    ensure(
        allowance >= required,
        format!("Insufficient allowance: {allowance} approved, {required} required"),
    )
}

pub fn is_owner(owner: Address, sender: Address) -> Result<()> {
    //! `sender` is `owner`.
    ensure(owner == sender, format!("Sender {sender} is not the owner"))
}
