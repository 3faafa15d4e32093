//! Render purposes

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Imageable purpose a prim can be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderPurpose {
    Default,
    Render,
    Proxy,
    Guide,
}

impl RenderPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderPurpose::Default => "default",
            RenderPurpose::Render => "render",
            RenderPurpose::Proxy => "proxy",
            RenderPurpose::Guide => "guide",
        }
    }

    /// Parse a comma separated purpose list such as `default,render`.
    ///
    /// Unknown names are rejected; duplicates are dropped.
    pub fn parse_list(list: &str) -> Result<Vec<RenderPurpose>> {
        let mut purposes = Vec::new();
        for name in list.split(',').map(str::trim) {
            let purpose = name.parse::<RenderPurpose>()?;
            if !purposes.contains(&purpose) {
                purposes.push(purpose);
            }
        }
        Ok(purposes)
    }
}

impl FromStr for RenderPurpose {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(RenderPurpose::Default),
            "render" => Ok(RenderPurpose::Render),
            "proxy" => Ok(RenderPurpose::Proxy),
            "guide" => Ok(RenderPurpose::Guide),
            other => Err(Error::InvalidData(format!(
                "unknown render purpose '{}' (expected default, render, proxy or guide)",
                other
            ))),
        }
    }
}

impl fmt::Display for RenderPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let purposes = RenderPurpose::parse_list("default, render,default").unwrap();
        assert_eq!(purposes, vec![RenderPurpose::Default, RenderPurpose::Render]);
    }

    #[test]
    fn test_unknown_purpose_rejected() {
        assert!(RenderPurpose::parse_list("default,preview").is_err());
        assert!(RenderPurpose::parse_list("").is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for purpose in [
            RenderPurpose::Default,
            RenderPurpose::Render,
            RenderPurpose::Proxy,
            RenderPurpose::Guide,
        ] {
            assert_eq!(purpose.to_string().parse::<RenderPurpose>().unwrap(), purpose);
        }
    }
}
