//! Remote endpoint addresses in `user@host[:port]` form.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Port used when the address does not name one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A parsed `user@host[:port]` address.
///
/// IPv6 hosts must be bracketed when a port is given: `deploy@[::1]:2222`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddress {
    /// Login user on the remote host.
    pub user: String,
    /// Host name or IP address, without brackets.
    pub host: String,
    /// SSH port.
    pub port: u16,
}

impl RemoteAddress {
    /// `host:port` form used when dialling and in error messages.
    #[must_use]
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn address_error(input: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: String::from("remote"),
        reason: format!("'{input}' {reason}"),
    }
}

fn parse_port(input: &str, port: &str) -> Result<u16, ConfigError> {
    port.parse::<u16>()
        .ok()
        .filter(|number| *number != 0)
        .ok_or_else(|| address_error(input, "has an invalid port"))
}

impl FromStr for RemoteAddress {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let Some((user, endpoint)) = trimmed.rsplit_once('@') else {
            return Err(address_error(input, "must look like user@host[:port]"));
        };
        if user.is_empty() {
            return Err(address_error(input, "is missing the user"));
        }

        let (host, port) = if let Some(bracketed) = endpoint.strip_prefix('[') {
            let Some((host, rest)) = bracketed.split_once(']') else {
                return Err(address_error(input, "has an unterminated IPv6 bracket"));
            };
            let port = match rest.strip_prefix(':') {
                Some(port) => parse_port(input, port)?,
                None if rest.is_empty() => DEFAULT_SSH_PORT,
                None => return Err(address_error(input, "has trailing text after the host")),
            };
            (host, port)
        } else {
            match endpoint.split_once(':') {
                Some((_, port)) if port.contains(':') => {
                    return Err(address_error(input, "needs brackets around an IPv6 host"));
                }
                Some((host, port)) => (host, parse_port(input, port)?),
                None => (endpoint, DEFAULT_SSH_PORT),
            }
        };

        if host.is_empty() {
            return Err(address_error(input, "is missing a valid host"));
        }
        Ok(Self {
            user: String::from(user),
            host: String::from(host),
            port,
        })
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.authority())
    }
}
