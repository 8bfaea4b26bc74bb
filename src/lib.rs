//! IP address ranges and their conversion to CIDR blocks.
//!
//! ```
//! use iprange::Range;
//!
//! let range: Range = "10.0.0.1-10.0.0.6".parse().unwrap();
//! let blocks: Vec<String> = range
//!     .networks()
//!     .unwrap()
//!     .iter()
//!     .map(|b| b.to_string())
//!     .collect();
//! assert_eq!(vec!["10.0.0.1/32", "10.0.0.2/31", "10.0.0.4/31", "10.0.0.6/32"], blocks);
//! ```

pub mod address;
pub mod cidr;
pub mod error;
pub mod range;

pub use address::{Address, Family};
pub use cidr::{CidrBlock, CidrSet};
pub use error::{AddressError, CidrError, Error, RangeError};
pub use range::{Addresses, Range, Span};
