//! Contiguous address ranges and their decomposition into CIDR blocks.

use crate::address::{Address, Family};
use crate::cidr::CidrBlock;
use crate::error::{AddressError, CidrError, Error, RangeError};
use log::debug;
use num_bigint::BigUint;
use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};
use std::iter::FusedIterator;
use std::str::FromStr;

/// Anything with a first and a last address that a [`Range`] can be asked to contain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Span {
    Address(Address),
    Block(CidrBlock),
    Range(Range),
}

impl Span {
    pub fn first(&self) -> Address {
        match self {
            Span::Address(a) => *a,
            Span::Block(b) => b.first(),
            Span::Range(r) => r.first,
        }
    }

    pub fn last(&self) -> Address {
        match self {
            Span::Address(a) => *a,
            Span::Block(b) => b.last(),
            Span::Range(r) => r.last,
        }
    }
}

impl From<Address> for Span {
    fn from(a: Address) -> Self {
        Span::Address(a)
    }
}

impl From<CidrBlock> for Span {
    fn from(b: CidrBlock) -> Self {
        Span::Block(b)
    }
}

impl From<Range> for Span {
    fn from(r: Range) -> Self {
        Span::Range(r)
    }
}

impl From<&Address> for Span {
    fn from(a: &Address) -> Self {
        Span::Address(*a)
    }
}

impl From<&CidrBlock> for Span {
    fn from(b: &CidrBlock) -> Self {
        Span::Block(*b)
    }
}

impl From<&Range> for Span {
    fn from(r: &Range) -> Self {
        Span::Range(*r)
    }
}

impl From<&Span> for Span {
    fn from(s: &Span) -> Self {
        *s
    }
}

/// An inclusive interval `[first, last]` of addresses from one family.
///
/// The bounds are validated on construction and the value is never modified afterwards;
/// [`Range::with_first`] and [`Range::with_last`] return new, validated ranges.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Range {
    first: Address,
    last: Address,
}

impl Range {
    pub fn new(first: Address, last: Address) -> Result<Self, RangeError> {
        if first.family() != last.family() {
            return Err(RangeError::MixedFamily { first, last });
        }
        if first > last {
            return Err(RangeError::Inverted { first, last });
        }
        Ok(Range { first, last })
    }

    /// Parses one of the accepted notations, checked in this order:
    ///
    /// * `10.0.0.0/24` or `10.0.0.0 255.255.255.0`: the whole network
    /// * `10.0.*.*`: IPv4 wildcard, `*` spans `0` to `255`
    /// * `10.0.0.1-10.0.0.9`: explicit bounds
    /// * `10.0.0.1`: a single address
    pub fn parse(data: &str) -> Result<Self, Error> {
        let data = data.trim();
        let (first, last) = if data.contains('/') || data.contains(' ') {
            let block = CidrBlock::from_str(data)?;
            (block.first(), block.last())
        } else if data.contains('*') {
            let first = Address::from_str(&data.replace('*', "0"))?;
            let last = Address::from_str(&data.replace('*', "255"))?;
            if first.family() != Family::V4 || last.family() != Family::V4 {
                return Err(AddressError::Parse(data.to_owned()).into());
            }
            (first, last)
        } else if let Some((first, last)) = data.split_once('-') {
            (Address::from_str(first)?, Address::from_str(last)?)
        } else {
            let ip = Address::from_str(data)?;
            (ip, ip)
        };
        debug!("parsed {:?} as {}-{}", data, first, last);
        Ok(Range::new(first, last)?)
    }

    pub fn first(&self) -> Address {
        self.first
    }

    pub fn last(&self) -> Address {
        self.last
    }

    pub fn with_first(&self, first: Address) -> Result<Self, RangeError> {
        Range::new(first, self.last)
    }

    pub fn with_last(&self, last: Address) -> Result<Self, RangeError> {
        Range::new(self.first, last)
    }

    /// True when every address of `find` lies within this range.
    pub fn contains<S: Into<Span>>(&self, find: S) -> bool {
        let find = find.into();
        let (first, last) = (find.first(), find.last());
        first.family() == self.first.family() && first >= self.first && last <= self.last
    }

    /// True when at least one item is contained; `false` for no items.
    pub fn contains_any<I>(&self, items: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Span>,
    {
        items.into_iter().any(|find| self.contains(find))
    }

    /// True when every item is contained; `true` for no items.
    pub fn contains_all<I>(&self, items: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Span>,
    {
        items.into_iter().all(|find| self.contains(find))
    }

    /// The smallest single block holding both bounds.
    ///
    /// Its prefix length is the number of leading bits `first` and `last` agree on.
    pub fn span_network(&self) -> CidrBlock {
        let prefix = self.first.xor(&self.last).leading_zeros();
        CidrBlock::masked(self.first, prefix)
    }

    /// The fewest aligned blocks whose union is exactly this range, in ascending order.
    pub fn networks(&self) -> Result<Vec<CidrBlock>, CidrError> {
        let span = self.span_network();
        if span.first() == self.first && span.last() == self.last {
            return Ok(vec![span]);
        }

        let mut networks = Vec::new();
        if span.first() != self.first {
            let below = self.first.prev()?;
            networks.extend(
                span.exclude(&below)?
                    .into_iter()
                    .filter(|network| network.first() >= self.first),
            );
        }

        if span.last() != self.last {
            let above = self.last.next()?;
            let upper = networks.pop().unwrap_or(span);
            for network in upper.exclude(&above)? {
                networks.push(network);
                if network.last() == self.last {
                    break;
                }
            }
        }

        debug!("{} decomposed into {} networks", self, networks.len());
        Ok(networks)
    }

    pub fn iter(&self) -> Addresses {
        Addresses {
            first: self.first,
            last: self.last,
            position: 0,
            exhausted: false,
        }
    }

    /// Number of addresses in the range, which reaches `2^128` for the whole IPv6 space.
    pub fn count(&self) -> BigUint {
        BigUint::from(self.last.to_u128()) - BigUint::from(self.first.to_u128()) + 1u32
    }
}

impl From<CidrBlock> for Range {
    fn from(block: CidrBlock) -> Self {
        Range {
            first: block.first(),
            last: block.last(),
        }
    }
}

impl FromStr for Range {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Range::parse(s)
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

impl<'a> IntoIterator for &'a Range {
    type Item = Address;
    type IntoIter = Addresses;
    fn into_iter(self) -> Addresses {
        self.iter()
    }
}

/// Lazily walks every address of a range, computing each one from its position.
#[derive(Clone, Debug)]
pub struct Addresses {
    first: Address,
    last: Address,
    position: u128,
    exhausted: bool,
}

impl Addresses {
    /// The address at the cursor, `None` once past the end.
    pub fn current(&self) -> Option<Address> {
        if self.exhausted {
            return None;
        }
        self.first
            .checked_add(self.position)
            .filter(|address| *address <= self.last)
    }

    pub fn position(&self) -> u128 {
        self.position
    }

    pub fn has_more(&self) -> bool {
        self.current().is_some()
    }

    pub fn rewind(&mut self) {
        self.position = 0;
        self.exhausted = false;
    }
}

impl Iterator for Addresses {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        let current = self.current()?;
        match self.position.checked_add(1) {
            Some(position) => self.position = position,
            None => self.exhausted = true,
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.current() {
            Some(current) => {
                let remaining = (self.last.to_u128() - current.to_u128()).saturating_add(1);
                match usize::try_from(remaining) {
                    Ok(n) => (n, Some(n)),
                    Err(_) => (usize::MAX, None),
                }
            }
            None => (0, Some(0)),
        }
    }
}

impl FusedIterator for Addresses {}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;
    use std::net::Ipv4Addr;

    fn a(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn r(s: &str) -> Range {
        Range::parse(s).unwrap()
    }

    fn v4(ip: u32) -> Address {
        Address::from(Ipv4Addr::from(ip))
    }

    fn names(blocks: &[CidrBlock]) -> Vec<String> {
        blocks.iter().map(|b| b.to_string()).collect()
    }

    /// Ascending, aligned, non-overlapping, adjacent, and exactly covering the range.
    fn covers_exactly(range: &Range, blocks: &[CidrBlock]) -> bool {
        let total = blocks
            .iter()
            .fold(BigUint::from(0u32), |acc, b| acc + b.size());
        !blocks.is_empty()
            && blocks[0].first() == range.first()
            && blocks[blocks.len() - 1].last() == range.last()
            && blocks
                .iter()
                .all(|b| CidrBlock::new(b.first(), b.prefix()).ok() == Some(*b))
            && blocks
                .windows(2)
                .all(|w| w[0].last().next().ok() == Some(w[1].first()))
            && total == range.count()
    }

    /// No two neighbouring blocks could be merged into one aligned block.
    fn is_minimal(blocks: &[CidrBlock]) -> bool {
        blocks
            .windows(2)
            .all(|w| !(w[0].prefix() == w[1].prefix() && w[0].sibling() == Some(w[1])))
    }

    #[test]
    fn construction() {
        let range = Range::new(a("10.0.0.1"), a("10.0.0.9")).unwrap();
        assert_eq!(a("10.0.0.1"), range.first());
        assert_eq!(a("10.0.0.9"), range.last());
        assert_eq!(
            Err(RangeError::Inverted {
                first: a("10.0.0.9"),
                last: a("10.0.0.1")
            }),
            Range::new(a("10.0.0.9"), a("10.0.0.1"))
        );
        assert!(matches!(
            Range::new(a("10.0.0.1"), a("::1")),
            Err(RangeError::MixedFamily { .. })
        ));
    }

    #[test]
    fn replacing_bounds() {
        let range = r("10.0.0.5-10.0.0.10");
        assert_eq!(r("10.0.0.1-10.0.0.10"), range.with_first(a("10.0.0.1")).unwrap());
        assert_eq!(r("10.0.0.5-10.0.0.5"), range.with_last(a("10.0.0.5")).unwrap());
        assert!(matches!(
            range.with_first(a("10.0.0.11")),
            Err(RangeError::Inverted { .. })
        ));
        assert!(matches!(
            range.with_last(a("10.0.0.4")),
            Err(RangeError::Inverted { .. })
        ));
        assert_eq!(a("10.0.0.5"), range.first());
    }

    #[test]
    fn parse_notations() {
        assert_eq!(
            Range::new(a("192.168.1.0"), a("192.168.1.255")).unwrap(),
            r("192.168.1.0/24")
        );
        assert_eq!(r("192.168.1.0/24"), r("192.168.1.0 255.255.255.0"));
        assert_eq!(r("192.168.1.0/24"), r("192.168.1.*"));
        assert_eq!(r("10.0.0.0-10.255.255.255"), r("10.*.*.*"));
        assert_eq!(
            Range::new(a("10.0.0.1"), a("10.0.0.254")).unwrap(),
            r("10.0.0.1-10.0.0.254")
        );
        assert_eq!(
            Range::new(a("2001:db8::1"), a("2001:db8::ff")).unwrap(),
            r("2001:db8::1-2001:db8::ff")
        );
        assert_eq!(r("2001:db8::/126"), r("2001:db8::-2001:db8::3"));
        assert_eq!(r("10.0.0.5"), Range::from_str(" 10.0.0.5 ").unwrap());
        assert_eq!("10.0.0.1-10.0.0.3", r("10.0.0.1-10.0.0.3").to_string());
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            Range::parse("10.0.0.9-10.0.0.1"),
            Err(Error::Range(RangeError::Inverted { .. }))
        ));
        assert!(matches!(
            Range::parse("10.0.0.300"),
            Err(Error::Address(AddressError::Parse(_)))
        ));
        assert!(matches!(
            Range::parse("10.0.0.0/40"),
            Err(Error::Cidr(CidrError::InvalidPrefix { prefix: 40, max: 32 }))
        ));
        assert!(matches!(Range::parse("10.0.0.1-"), Err(Error::Address(_))));
        assert_eq!(
            Err(Error::Address(AddressError::Parse("2001:db8::*".to_string()))),
            Range::parse("2001:db8::*")
        );
        assert!(matches!(
            Range::parse("10.0.0.0/999"),
            Err(Error::Cidr(CidrError::InvalidPrefix { prefix: 999, max: 32 }))
        ));
        assert!(matches!(
            Range::parse("10.0.0.1-::1"),
            Err(Error::Range(RangeError::MixedFamily { .. }))
        ));
    }

    #[test]
    fn containment() {
        let range = r("10.0.0.10-10.0.0.20");
        assert!(range.contains(a("10.0.0.10")));
        assert!(range.contains(a("10.0.0.20")));
        assert!(!range.contains(a("10.0.0.9")));
        assert!(!range.contains(a("10.0.0.21")));
        assert!(range.contains(CidrBlock::from_str("10.0.0.12/30").unwrap()));
        assert!(!range.contains(CidrBlock::from_str("10.0.0.8/30").unwrap()));
        assert!(range.contains(r("10.0.0.11-10.0.0.19")));
        assert!(range.contains(&range));
        assert!(!range.contains(r("10.0.0.11-10.0.0.21")));
        assert!(!range.contains(a("::ffff:a00:f")));

        let v6 = r("2001:db8::/32");
        assert!(v6.contains(a("2001:db8:ffff::1")));
        assert!(!v6.contains(a("2001:db9::")));
        assert!(!v6.contains(a("10.0.0.1")));
    }

    #[test]
    fn containment_lists() {
        let range = r("10.0.0.0/24");
        let inside: Vec<Span> = vec![
            a("10.0.0.1").into(),
            CidrBlock::from_str("10.0.0.128/25").unwrap().into(),
            r("10.0.0.5-10.0.0.7").into(),
        ];
        let mut mixed = inside.clone();
        mixed.push(r("10.0.0.200-10.0.1.1").into());

        assert!(range.contains_all(&inside));
        assert!(range.contains_any(&inside));
        assert!(!range.contains_all(&mixed));
        assert!(range.contains_any(&mixed));
        assert!(!range.contains_any(vec![a("10.0.1.0"), a("9.255.255.255")]));

        let empty: Vec<Span> = Vec::new();
        assert!(!range.contains_any(&empty));
        assert!(range.contains_all(&empty));
    }

    #[test]
    fn span_network() {
        assert_eq!("10.0.0.0/24", r("10.0.0.1-10.0.0.254").span_network().to_string());
        assert_eq!("10.0.0.0/23", r("10.0.0.255-10.0.1.0").span_network().to_string());
        assert_eq!("10.0.0.5/32", r("10.0.0.5").span_network().to_string());
        assert_eq!("0.0.0.0/0", r("0.0.0.0-255.255.255.255").span_network().to_string());
        assert_eq!("0.0.0.0/0", r("127.255.255.255-128.0.0.0").span_network().to_string());
        assert_eq!("2001:db8::/64", r("2001:db8::1-2001:db8::ffff:0:0:0").span_network().to_string());
    }

    #[test]
    fn networks_unaligned() {
        let range = r("10.0.0.1-10.0.0.254");
        assert_eq!(BigUint::from(254u32), range.count());
        let blocks = range.networks().unwrap();
        assert_eq!(
            vec![
                "10.0.0.1/32",
                "10.0.0.2/31",
                "10.0.0.4/30",
                "10.0.0.8/29",
                "10.0.0.16/28",
                "10.0.0.32/27",
                "10.0.0.64/26",
                "10.0.0.128/26",
                "10.0.0.192/27",
                "10.0.0.224/28",
                "10.0.0.240/29",
                "10.0.0.248/30",
                "10.0.0.252/31",
                "10.0.0.254/32",
            ],
            names(&blocks)
        );
        assert!(covers_exactly(&range, &blocks));
    }

    #[test]
    fn networks_aligned() {
        let range = r("192.168.1.0-192.168.1.255");
        assert_eq!(vec!["192.168.1.0/24"], names(&range.networks().unwrap()));
        assert_eq!(BigUint::from(256u32), range.count());

        let all = r("0.0.0.0-255.255.255.255");
        assert_eq!(vec!["0.0.0.0/0"], names(&all.networks().unwrap()));
    }

    #[test]
    fn networks_one_side_aligned() {
        assert_eq!(
            vec!["10.0.0.0/26", "10.0.0.64/27", "10.0.0.96/32"],
            names(&r("10.0.0.0-10.0.0.96").networks().unwrap())
        );
        assert_eq!(
            vec!["10.0.0.3/32", "10.0.0.4/30", "10.0.0.8/29"],
            names(&r("10.0.0.3-10.0.0.15").networks().unwrap())
        );
        assert_eq!(
            vec!["255.255.255.253/32", "255.255.255.254/31"],
            names(&r("255.255.255.253-255.255.255.255").networks().unwrap())
        );
        assert_eq!(
            vec!["0.0.0.0/31", "0.0.0.2/32"],
            names(&r("0.0.0.0-0.0.0.2").networks().unwrap())
        );
    }

    #[test]
    fn networks_single_address() {
        let range = r("10.0.0.5");
        assert_eq!(a("10.0.0.5"), range.first());
        assert_eq!(a("10.0.0.5"), range.last());
        assert_eq!(BigUint::from(1u32), range.count());
        assert_eq!(vec!["10.0.0.5/32"], names(&range.networks().unwrap()));
        assert_eq!(vec!["::1/128"], names(&r("::1").networks().unwrap()));
    }

    #[test]
    fn networks_ipv6() {
        let range = r("2001:db8::1-2001:db8::1:0");
        let blocks = range.networks().unwrap();
        assert!(covers_exactly(&range, &blocks));
        assert!(is_minimal(&blocks));
        assert_eq!("2001:db8::1/128", blocks[0].to_string());
        assert_eq!("2001:db8::1:0/128", blocks[blocks.len() - 1].to_string());

        let all = r("::-ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff");
        assert_eq!(vec!["::/0"], names(&all.networks().unwrap()));
        assert_eq!(BigUint::from(1u32) << 128usize, all.count());
    }

    #[test]
    fn iteration() {
        let range = Range::new(a("10.0.0.1"), a("10.0.0.3")).unwrap();
        let mut addresses = range.iter();
        assert_eq!(Some(a("10.0.0.1")), addresses.current());
        assert_eq!(0, addresses.position());
        let first_pass: Vec<Address> = addresses.by_ref().collect();
        assert_eq!(vec![a("10.0.0.1"), a("10.0.0.2"), a("10.0.0.3")], first_pass);
        assert!(!addresses.has_more());
        assert_eq!(3, addresses.position());
        assert_eq!(None, addresses.next());

        addresses.rewind();
        assert!(addresses.has_more());
        assert_eq!(first_pass, addresses.collect::<Vec<_>>());
        assert_eq!(3, (&range).into_iter().count());
    }

    #[test]
    fn iteration_edges() {
        let top = r("255.255.255.254-255.255.255.255");
        assert_eq!(
            vec![a("255.255.255.254"), a("255.255.255.255")],
            top.iter().collect::<Vec<_>>()
        );

        let huge = r("::/0");
        let mut addresses = huge.iter();
        assert_eq!((usize::MAX, None), addresses.size_hint());
        assert_eq!(Some(a("::")), addresses.next());
        assert_eq!(Some(a("::1")), addresses.next());

        let small = r("10.0.0.0/30");
        let mut addresses = small.iter();
        addresses.next();
        assert_eq!((3, Some(3)), addresses.size_hint());
    }

    #[quickcheck]
    fn check_bounds_contained(x: u32, y: u32) -> bool {
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        let range = Range::new(v4(lo), v4(hi)).unwrap();
        range.contains(v4(lo))
            && range.contains(v4(hi))
            && (lo == 0 || !range.contains(v4(lo - 1)))
            && (hi == u32::MAX || !range.contains(v4(hi + 1)))
    }

    #[quickcheck]
    fn check_inverted_rejected(x: u32, y: u32) -> TestResult {
        if x <= y {
            return TestResult::discard();
        }
        TestResult::from_bool(Range::new(v4(x), v4(y)).is_err())
    }

    #[quickcheck]
    fn check_networks_v4(x: u32, y: u32) -> bool {
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        let range = Range::new(v4(lo), v4(hi)).unwrap();
        let blocks = range.networks().unwrap();
        covers_exactly(&range, &blocks) && is_minimal(&blocks)
    }

    #[quickcheck]
    fn check_networks_v6(x: u128, y: u128) -> bool {
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        let range = Range::new(
            Address::V6(lo.to_be_bytes()),
            Address::V6(hi.to_be_bytes()),
        )
        .unwrap();
        let blocks = range.networks().unwrap();
        covers_exactly(&range, &blocks) && is_minimal(&blocks)
    }

    #[quickcheck]
    fn check_span_network(x: u32, y: u32) -> bool {
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        let range = Range::new(v4(lo), v4(hi)).unwrap();
        let span = range.span_network();
        let agreeing = (lo ^ hi).leading_zeros() as u8;
        span.contains_address(&range.first())
            && span.contains_address(&range.last())
            && span.prefix() == agreeing
            && span
                .split()
                .map_or(true, |(lower, upper)| {
                    !lower.contains_address(&range.last()) && !upper.contains_address(&range.first())
                })
    }

    #[quickcheck]
    fn check_count(x: u32, y: u32) -> bool {
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        let range = Range::new(v4(lo), v4(hi)).unwrap();
        range.count() == BigUint::from(hi as u64 - lo as u64 + 1)
    }
}
