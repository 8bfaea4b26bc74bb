use crate::error::AddressError;
use std::convert::TryFrom;
use std::fmt::{Display, Error, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn bit_width(self) -> u8 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }
}

/// A fixed-width IPv4 or IPv6 address.
///
/// Addresses order by family first and then byte-lexicographically over their octets,
/// which is the unsigned big-endian numeric order for addresses of the same family.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Address {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl Address {
    pub fn from_octets(bytes: &[u8]) -> Result<Self, AddressError> {
        match bytes.len() {
            4 => {
                let mut b = [0u8; 4];
                b.copy_from_slice(bytes);
                Ok(Address::V4(b))
            }
            16 => {
                let mut b = [0u8; 16];
                b.copy_from_slice(bytes);
                Ok(Address::V6(b))
            }
            n => Err(AddressError::Length(n)),
        }
    }

    pub fn zero(family: Family) -> Self {
        match family {
            Family::V4 => Address::V4([0; 4]),
            Family::V6 => Address::V6([0; 16]),
        }
    }

    pub fn all_ones(family: Family) -> Self {
        match family {
            Family::V4 => Address::V4([0xff; 4]),
            Family::V6 => Address::V6([0xff; 16]),
        }
    }

    /// Builds an address of `family` from its numeric value, `None` if it does not fit.
    pub fn from_u128(family: Family, value: u128) -> Option<Self> {
        match family {
            Family::V4 => u32::try_from(value)
                .ok()
                .map(|v| Address::V4(v.to_be_bytes())),
            Family::V6 => Some(Address::V6(value.to_be_bytes())),
        }
    }

    pub fn octets(&self) -> &[u8] {
        match self {
            Address::V4(b) => b,
            Address::V6(b) => b,
        }
    }

    fn octets_mut(&mut self) -> &mut [u8] {
        match self {
            Address::V4(b) => b,
            Address::V6(b) => b,
        }
    }

    pub fn family(&self) -> Family {
        match self {
            Address::V4(_) => Family::V4,
            Address::V6(_) => Family::V6,
        }
    }

    pub fn bit_width(&self) -> u8 {
        self.family().bit_width()
    }

    pub fn to_u128(&self) -> u128 {
        self.octets()
            .iter()
            .fold(0u128, |acc, &b| (acc << 8) | b as u128)
    }

    pub fn checked_add(&self, n: u128) -> Option<Self> {
        self.to_u128()
            .checked_add(n)
            .and_then(|v| Self::from_u128(self.family(), v))
    }

    pub fn checked_sub(&self, n: u128) -> Option<Self> {
        self.to_u128()
            .checked_sub(n)
            .and_then(|v| Self::from_u128(self.family(), v))
    }

    /// Moves `offset` addresses forward (or backward when negative).
    ///
    /// Fails instead of wrapping when the result would fall outside the address space.
    pub fn step(&self, offset: i128) -> Result<Self, AddressError> {
        let moved = if offset >= 0 {
            self.checked_add(offset as u128)
        } else {
            self.checked_sub(offset.unsigned_abs())
        };
        moved.ok_or(AddressError::Overflow {
            address: *self,
            offset,
        })
    }

    pub fn next(&self) -> Result<Self, AddressError> {
        self.step(1)
    }

    pub fn prev(&self) -> Result<Self, AddressError> {
        self.step(-1)
    }

    /// Bytewise exclusive or. Both addresses are expected to share a family.
    pub fn xor(&self, other: &Address) -> Self {
        let mut out = *self;
        for (a, b) in out.octets_mut().iter_mut().zip(other.octets()) {
            *a ^= b;
        }
        out
    }

    pub fn leading_zeros(&self) -> u8 {
        let mut n = 0;
        for b in self.octets() {
            if *b != 0 {
                return n + b.leading_zeros() as u8;
            }
            n += 8;
        }
        n
    }

    /// Keeps the leading `prefix` bits and clears the rest.
    pub fn mask(&self, prefix: u8) -> Self {
        let mut out = *self;
        for (i, byte) in out.octets_mut().iter_mut().enumerate() {
            let start = i * 8;
            let prefix = prefix as usize;
            if start >= prefix {
                *byte = 0;
            } else if prefix - start < 8 {
                *byte &= !(0xffu8 >> (prefix - start));
            }
        }
        out
    }

    /// Keeps the leading `prefix` bits and sets the rest.
    pub fn fill(&self, prefix: u8) -> Self {
        let mut out = *self;
        for (i, byte) in out.octets_mut().iter_mut().enumerate() {
            let start = i * 8;
            let prefix = prefix as usize;
            if start >= prefix {
                *byte = 0xff;
            } else if prefix - start < 8 {
                *byte |= 0xffu8 >> (prefix - start);
            }
        }
        out
    }

    pub fn to_ip(&self) -> IpAddr {
        match *self {
            Address::V4(b) => IpAddr::V4(Ipv4Addr::from(b)),
            Address::V6(b) => IpAddr::V6(Ipv6Addr::from(b)),
        }
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Address::V4(ip.octets())
    }
}

impl From<Ipv6Addr> for Address {
    fn from(ip: Ipv6Addr) -> Self {
        Address::V6(ip.octets())
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v) => v.into(),
            IpAddr::V6(v) => v.into(),
        }
    }
}

impl From<Address> for IpAddr {
    fn from(address: Address) -> Self {
        address.to_ip()
    }
}

impl FromStr for Address {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<IpAddr>()
            .map(Address::from)
            .map_err(|_| AddressError::Parse(s.to_owned()))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{}", self.to_ip())
    }
}
