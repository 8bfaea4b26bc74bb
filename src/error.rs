//! Error types for addresses, CIDR blocks and ranges.

use crate::address::Address;
use crate::cidr::CidrBlock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address: {0}")]
    Parse(String),

    #[error("Address must be 4 or 16 bytes long, got {0}")]
    Length(usize),

    #[error("Stepping {address} by {offset} leaves the address space")]
    Overflow { address: Address, offset: i128 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CidrError {
    #[error("Prefix length {prefix} exceeds {max}")]
    InvalidPrefix { prefix: u16, max: u8 },

    #[error("Netmask {0} is not contiguous")]
    InvalidNetmask(Address),

    #[error("Address {address} is not within {block}")]
    NotWithin { block: CidrBlock, address: Address },

    #[error("Invalid CIDR format: {0}")]
    Malformed(String),

    #[error(transparent)]
    Address(#[from] AddressError),
}

/// Violations of the `first <= last` range invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("First address {first} is greater than last address {last}")]
    Inverted { first: Address, last: Address },

    #[error("Range bounds {first} and {last} belong to different address families")]
    MixedFamily { first: Address, last: Address },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Cidr(#[from] CidrError),

    #[error(transparent)]
    Range(#[from] RangeError),
}
