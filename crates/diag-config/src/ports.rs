use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Role a diagnostic port plays in establishing connections.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PortMode {
    /// The runtime binds the address and waits for tools to connect.
    Listen,
    /// The runtime dials a tool listening on the address and advertises
    /// itself (reverse connect).
    #[default]
    Connect,
}

/// One configured diagnostic port.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PortConfig {
    address: Utf8PathBuf,
    mode: PortMode,
    suspend: bool,
}

impl PortConfig {
    /// Builds a listen-mode port.
    #[must_use]
    pub fn listen(address: impl Into<Utf8PathBuf>) -> Self {
        Self {
            address: address.into(),
            mode: PortMode::Listen,
            suspend: false,
        }
    }

    /// Builds a reverse-connect port.
    #[must_use]
    pub fn connect(address: impl Into<Utf8PathBuf>) -> Self {
        Self {
            address: address.into(),
            mode: PortMode::Connect,
            suspend: false,
        }
    }

    /// Returns a copy of the port that pauses runtime start-up until resumed.
    #[must_use]
    pub fn with_suspend(mut self, suspend: bool) -> Self {
        self.suspend = suspend;
        self
    }

    /// Socket path of the port.
    #[must_use]
    pub fn address(&self) -> &Utf8Path {
        self.address.as_ref()
    }

    /// Connection role of the port.
    #[must_use]
    pub fn mode(&self) -> PortMode {
        self.mode
    }

    /// Whether runtime start-up waits for a resume command on this port.
    #[must_use]
    pub fn suspend(&self) -> bool {
        self.suspend
    }

    /// Ensures a listen port's parent directory exists with restrictive
    /// permissions. Connect ports dial somebody else's socket, so there is
    /// nothing to prepare.
    pub fn prepare_filesystem(&self) -> Result<(), PortPreparationError> {
        if self.mode != PortMode::Listen {
            return Ok(());
        }
        let Some(parent) = self.address.parent() else {
            return Err(PortPreparationError::MissingParent {
                path: self.address.clone(),
            });
        };
        if parent.as_str().is_empty() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(PortPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl fmt::Display for PortConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suspend = if self.suspend { "suspend" } else { "nosuspend" };
        write!(formatter, "{},{},{suspend}", self.address, self.mode)
    }
}

impl FromStr for PortConfig {
    type Err = PortParseError;

    /// Parses `address[,listen|connect][,suspend|nosuspend]`. Unspecified
    /// tags fall back to connect mode without suspension.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_port(input, false)
    }
}

/// Parses a `;`-separated port list. Empty entries are skipped, so trailing
/// separators are harmless. Ports without an explicit suspend tag take
/// `default_suspend`.
pub fn parse_port_list(input: &str, default_suspend: bool) -> Result<Vec<PortConfig>, PortParseError> {
    input
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| parse_port(entry, default_suspend))
        .collect()
}

fn parse_port(input: &str, default_suspend: bool) -> Result<PortConfig, PortParseError> {
    let mut parts = input.split(',').map(str::trim);
    let address = parts.next().unwrap_or_default();
    if address.is_empty() {
        return Err(PortParseError::MissingAddress(input.to_owned()));
    }

    let mut port = PortConfig::connect(address).with_suspend(default_suspend);
    for tag in parts {
        match tag {
            "listen" => port.mode = PortMode::Listen,
            "connect" => port.mode = PortMode::Connect,
            "suspend" => port.suspend = true,
            "nosuspend" => port.suspend = false,
            other => {
                return Err(PortParseError::UnknownTag {
                    port: input.to_owned(),
                    tag: other.to_owned(),
                });
            }
        }
    }
    Ok(port)
}

/// Errors encountered while parsing diagnostic port descriptions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortParseError {
    /// The entry had no address before its first tag.
    #[error("missing address in diagnostic port '{0}'")]
    MissingAddress(String),
    /// A tag was neither a mode nor a suspend flag.
    #[error("unknown tag '{tag}' in diagnostic port '{port}'")]
    UnknownTag { port: String, tag: String },
}

/// Errors raised when preparing listen socket directories.
#[derive(Debug, Error)]
pub enum PortPreparationError {
    /// The socket path has no parent component.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent { path: Utf8PathBuf },
    /// Failed to create the socket directory.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}
