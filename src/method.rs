//! HTTP method as a typed enum.
//!
//! Covers the seven routable verbs. Anything else (CONNECT, TRACE, WebDAV
//! extensions) is rejected at the server level with `405 Method Not Allowed`
//! before it ever reaches a handler.
//!
//! Parsing is case-insensitive: routing compares methods without regard to
//! case, and the `X-HTTP-Method-Override` header arrives in whatever case
//! the client chose.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
        }
    }
}

/// Parses a method string in any case (`"GET"`, `"get"`, `"Get"`).
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            _         => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_any_case() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("GET".parse::<Method>(), Ok(Method::Get));
        assert_eq!("PaTcH".parse::<Method>(), Ok(Method::Patch));
    }

    #[test]
    fn rejects_unknown() {
        assert!("BREW".parse::<Method>().is_err());
        assert!("".parse::<Method>().is_err());
    }
}
