// src/isd_as.rs

//! ISD-AS identifier parsing
//!
//! A SCION AS is named by its Isolation Domain and AS number, written
//! `<isd>-<as>`. AS numbers below 2^32 use the decimal BGP form; larger
//! numbers use three hex groups separated by `:` (canonical) or `_` (the
//! form used in file names and systemd instance names).
//!
//! ```
//! use scionlab_node::IsdAs;
//!
//! let ia = IsdAs::parse("16-ffaa_0_1002").unwrap();
//! assert_eq!(ia.isd(), 16);
//! assert_eq!(ia.as_file(), "ffaa_0_1002");
//! assert_eq!(ia.to_string(), "16-ffaa:0:1002");
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Largest AS number written in decimal form
const MAX_BGP_AS: u64 = u32::MAX as u64;

/// Largest representable AS number (48 bits)
const MAX_AS: u64 = (1 << 48) - 1;

/// A decomposed ISD-AS identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IsdAs {
    isd: u16,
    asn: u64,
}

impl IsdAs {
    /// Parse and validate an identifier such as `16-ffaa_0_1002` or `19-ffaa:1:e4b`
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidIsdAs {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (isd_part, as_part) = value
            .trim()
            .split_once('-')
            .ok_or_else(|| invalid("expected <isd>-<as>"))?;

        if isd_part.is_empty() || !isd_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("ISD must be a decimal number"));
        }
        let isd: u16 = isd_part
            .parse()
            .map_err(|_| invalid("ISD out of range"))?;
        if isd == 0 {
            return Err(invalid("ISD 0 is the wildcard ISD"));
        }

        let asn = parse_as(as_part).map_err(|reason| invalid(reason))?;
        if asn == 0 {
            return Err(invalid("AS 0 is the wildcard AS"));
        }

        Ok(Self { isd, asn })
    }

    /// Isolation domain number
    pub fn isd(&self) -> u16 {
        self.isd
    }

    /// Raw AS number
    pub fn asn(&self) -> u64 {
        self.asn
    }

    /// AS number in file-name form (`ffaa_0_1002`)
    pub fn as_file(&self) -> String {
        self.format_as('_')
    }

    /// Full identifier in file-name form (`16-ffaa_0_1002`)
    pub fn file_fmt(&self) -> String {
        format!("{}-{}", self.isd, self.as_file())
    }

    fn format_as(&self, sep: char) -> String {
        if self.asn <= MAX_BGP_AS {
            return self.asn.to_string();
        }
        format!(
            "{:x}{sep}{:x}{sep}{:x}",
            (self.asn >> 32) & 0xffff,
            (self.asn >> 16) & 0xffff,
            self.asn & 0xffff
        )
    }
}

fn parse_as(s: &str) -> std::result::Result<u64, &'static str> {
    if s.is_empty() {
        return Err("AS part is empty");
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        let asn: u64 = s.parse().map_err(|_| "AS number out of range")?;
        if asn > MAX_BGP_AS {
            return Err("decimal AS numbers must be below 2^32");
        }
        return Ok(asn);
    }

    let sep = match (s.contains(':'), s.contains('_')) {
        (true, false) => ':',
        (false, true) => '_',
        (true, true) => return Err("AS mixes ':' and '_' separators"),
        (false, false) => return Err("AS must be decimal or three hex groups"),
    };

    let groups: Vec<&str> = s.split(sep).collect();
    if groups.len() != 3 {
        return Err("AS must have exactly three hex groups");
    }

    let mut asn = 0u64;
    for group in groups {
        if group.is_empty() || group.len() > 4 {
            return Err("AS hex groups must be 1-4 digits");
        }
        let value = u64::from_str_radix(group, 16).map_err(|_| "AS group is not hex")?;
        asn = (asn << 16) | value;
    }

    debug_assert!(asn <= MAX_AS);
    Ok(asn)
}

impl fmt::Display for IsdAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.isd, self.format_as(':'))
    }
}

impl FromStr for IsdAs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
