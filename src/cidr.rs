use crate::address::{Address, Family};
use crate::error::CidrError;
use lazy_static::lazy_static;
use log::trace;
use num_bigint::BigUint;
use regex::Regex;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt::{Display, Error, Formatter};
use std::str::FromStr;

/// Netmask with the leading `prefix` bits set.
pub fn prefix_to_netmask(family: Family, prefix: u8) -> Result<Address, CidrError> {
    let max = family.bit_width();
    if prefix > max {
        return Err(CidrError::InvalidPrefix {
            prefix: prefix.into(),
            max,
        });
    }
    Ok(Address::all_ones(family).mask(prefix))
}

/// Prefix length of a contiguous netmask such as `255.255.240.0`.
pub fn netmask_to_prefix(netmask: &Address) -> Result<u8, CidrError> {
    let ones = Address::all_ones(netmask.family());
    let prefix = netmask.xor(&ones).leading_zeros();
    if ones.mask(prefix) != *netmask {
        return Err(CidrError::InvalidNetmask(*netmask));
    }
    Ok(prefix)
}

/// An aligned block of addresses: a base address with its host bits cleared and a prefix length.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CidrBlock {
    base: Address,
    prefix: u8,
}

impl CidrBlock {
    /// Host bits of `address` beyond `prefix` are cleared.
    pub fn new(address: Address, prefix: u8) -> Result<Self, CidrError> {
        let max = address.bit_width();
        if prefix > max {
            return Err(CidrError::InvalidPrefix {
                prefix: prefix.into(),
                max,
            });
        }
        Ok(CidrBlock::masked(address, prefix))
    }

    /// Caller guarantees `prefix <= address.bit_width()`.
    pub(crate) fn masked(address: Address, prefix: u8) -> Self {
        debug_assert!(prefix <= address.bit_width());
        CidrBlock {
            base: address.mask(prefix),
            prefix,
        }
    }

    pub fn with_netmask(address: Address, netmask: Address) -> Result<Self, CidrError> {
        CidrBlock::new(address, netmask_to_prefix(&netmask)?)
    }

    pub fn first(&self) -> Address {
        self.base
    }

    pub fn last(&self) -> Address {
        self.base.fill(self.prefix)
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn family(&self) -> Family {
        self.base.family()
    }

    pub fn netmask(&self) -> Address {
        Address::all_ones(self.family()).mask(self.prefix)
    }

    pub fn hostmask(&self) -> Address {
        Address::zero(self.family()).fill(self.prefix)
    }

    /// Number of addresses in the block, `2^(bit_width - prefix)`.
    pub fn size(&self) -> BigUint {
        BigUint::from(1u32) << (self.base.bit_width() - self.prefix) as usize
    }

    pub fn contains_address(&self, address: &Address) -> bool {
        address.family() == self.family() && address.mask(self.prefix) == self.base
    }

    pub fn contains_block(&self, block: &CidrBlock) -> bool {
        block.family() == self.family()
            && block.prefix >= self.prefix
            && block.base.mask(self.prefix) == self.base
    }

    /// Bisects the block into its two halves, `None` for a single address block.
    pub fn split(&self) -> Option<(CidrBlock, CidrBlock)> {
        let width = self.base.bit_width();
        if self.prefix >= width {
            return None;
        }
        let prefix = self.prefix + 1;
        let half = 1u128 << (width - prefix);
        let upper = Address::from_u128(self.family(), self.base.to_u128() | half)?;
        Some((
            CidrBlock {
                base: self.base,
                prefix,
            },
            CidrBlock {
                base: upper,
                prefix,
            },
        ))
    }

    /// The other half of the enclosing block, `None` for `/0`.
    pub fn sibling(&self) -> Option<CidrBlock> {
        if self.prefix == 0 {
            return None;
        }
        let bit = 1u128 << (self.base.bit_width() - self.prefix);
        let base = Address::from_u128(self.family(), self.base.to_u128() ^ bit)?;
        Some(CidrBlock {
            base,
            prefix: self.prefix,
        })
    }

    pub fn supernet(&self) -> Option<CidrBlock> {
        if self.prefix == 0 {
            return None;
        }
        let prefix = self.prefix - 1;
        Some(CidrBlock {
            base: self.base.mask(prefix),
            prefix,
        })
    }

    /// Partitions the block into the fewest aligned blocks covering everything but `address`.
    ///
    /// The block is halved repeatedly; the half without `address` is kept and the other half is
    /// split again until it is a single address. The result is in ascending order and is empty
    /// when the block is that single address.
    pub fn exclude(&self, address: &Address) -> Result<Vec<CidrBlock>, CidrError> {
        if !self.contains_address(address) {
            return Err(CidrError::NotWithin {
                block: *self,
                address: *address,
            });
        }
        let mut blocks = Vec::new();
        let mut current = *self;
        while let Some((lower, upper)) = current.split() {
            if lower.contains_address(address) {
                blocks.push(upper);
                current = lower;
            } else {
                blocks.push(lower);
                current = upper;
            }
        }
        blocks.sort();
        trace!("{} without {} -> {} blocks", self, address, blocks.len());
        Ok(blocks)
    }
}

impl FromStr for CidrBlock {
    type Err = CidrError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RE: Regex =
                Regex::new(r"^\s*([0-9A-Fa-f:.]+)\s*(?:/\s*([0-9]{1,3})|\s+([0-9A-Fa-f:.]+))?\s*$")
                    .expect("Not possible");
        }
        let caps = RE
            .captures(s)
            .ok_or_else(|| CidrError::Malformed(s.to_owned()))?;
        let address = Address::from_str(&caps[1])?;
        if let Some(prefix) = caps.get(2) {
            let prefix = prefix
                .as_str()
                .parse::<u16>()
                .map_err(|_| CidrError::Malformed(s.to_owned()))?;
            let max = address.bit_width();
            return match u8::try_from(prefix) {
                Ok(prefix) if prefix <= max => Ok(CidrBlock::masked(address, prefix)),
                _ => Err(CidrError::InvalidPrefix { prefix, max }),
            };
        }
        if let Some(netmask) = caps.get(3) {
            let netmask = Address::from_str(netmask.as_str())?;
            if netmask.family() != address.family() {
                return Err(CidrError::InvalidNetmask(netmask));
            }
            return CidrBlock::with_netmask(address, netmask);
        }
        CidrBlock::new(address, address.bit_width())
    }
}

impl Display for CidrBlock {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{}/{}", self.base, self.prefix)
    }
}

/// A set of blocks kept in aggregated form.
///
/// Inserting a block drops it if it is already covered, removes the blocks it covers and
/// merges it with an equal size sibling into the enclosing block, repeatedly.
#[derive(Debug, Default)]
pub struct CidrSet {
    inner: BTreeMap<Address, CidrBlock>,
}

impl CidrSet {
    pub fn new() -> Self {
        CidrSet {
            inner: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, mut cidr: CidrBlock) {
        loop {
            let mut covered = Vec::new();
            for (&k, v) in self.inner.iter() {
                if v.contains_block(&cidr) {
                    return;
                }
                if cidr.contains_block(v) {
                    covered.push(k);
                }
            }
            for k in covered {
                self.inner.remove(&k);
            }
            if let (Some(sibling), Some(parent)) = (cidr.sibling(), cidr.supernet()) {
                if self.inner.get(&sibling.first()) == Some(&sibling) {
                    trace!("merging {} and {} into {}", cidr, sibling, parent);
                    self.inner.remove(&sibling.first());
                    cidr = parent;
                    continue;
                }
            }
            self.inner.insert(cidr.first(), cidr);
            break;
        }
    }

    pub fn contains_address(&self, address: &Address) -> bool {
        self.inner
            .range(..=*address)
            .next_back()
            .map_or(false, |(_, block)| block.contains_address(address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CidrBlock> {
        self.inner.values()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Extend<CidrBlock> for CidrSet {
    fn extend<T: IntoIterator<Item = CidrBlock>>(&mut self, iter: T) {
        for block in iter {
            self.insert(block);
        }
    }
}

impl Display for CidrSet {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        for v in self.inner.values() {
            writeln!(f, "{}", v)?;
        }
        Ok(())
    }
}
