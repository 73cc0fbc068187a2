//! Shared messages used across services (`yb` and `yb.consensus`).

use std::fmt;

/// A host and port pair as advertised by a cluster node.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct HostPortPb {
    #[prost(string, required, tag = "1")]
    pub host: String,
    #[prost(uint32, required, tag = "2")]
    pub port: u32,
}

impl fmt::Display for HostPortPb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Placement information for a node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloudInfoPb {
    #[prost(string, optional, tag = "1")]
    pub placement_cloud: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub placement_region: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub placement_zone: Option<String>,
}

impl fmt::Display for CloudInfoPb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.placement_cloud.as_deref().unwrap_or("-"),
            self.placement_region.as_deref().unwrap_or("-"),
            self.placement_zone.as_deref().unwrap_or("-"),
        )
    }
}

/// An application-level status, as carried in response bodies.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppStatusPb {
    #[prost(enumeration = "AppStatusCode", required, tag = "1")]
    pub code: i32,
    #[prost(string, optional, tag = "2")]
    pub message: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub source_file: Option<String>,
    #[prost(int32, optional, tag = "5")]
    pub source_line: Option<i32>,
}

impl AppStatusPb {
    /// Returns the source location as `file:line`, if the server sent one.
    pub fn source_location(&self) -> Option<String> {
        let file = self.source_file.as_deref()?;
        Some(match self.source_line {
            Some(line) => format!("{}:{}", file, line),
            None => file.to_string(),
        })
    }
}

impl fmt::Display for AppStatusPb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match AppStatusCode::try_from(self.code) {
            Ok(code) => write!(f, "{:?}", code)?,
            Err(_) => write!(f, "code {}", self.code)?,
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(location) = self.source_location() {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

/// Status codes used by [`AppStatusPb`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AppStatusCode {
    UnknownError = 999,
    Ok = 0,
    NotFound = 1,
    Corruption = 2,
    NotSupported = 3,
    InvalidArgument = 4,
    IoError = 5,
    AlreadyPresent = 6,
    RuntimeError = 7,
    NetworkError = 8,
    IllegalState = 9,
    NotAuthorized = 10,
    Aborted = 11,
    RemoteError = 12,
    ServiceUnavailable = 13,
    TimedOut = 14,
    Uninitialized = 15,
    ConfigurationError = 16,
    Incomplete = 17,
    EndOfFile = 18,
    InvalidCommand = 19,
    SqlError = 20,
    InternalError = 21,
    ShutdownInProgress = 22,
    MergeInProgress = 23,
    Combined = 24,
    LeaderNotReadyToServe = 25,
    LeaderHasNoLease = 26,
    TryAgain = 27,
    Busy = 28,
}

/// Raft role of a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PeerRole {
    UnknownRole = 7,
    Follower = 0,
    Leader = 1,
    Learner = 2,
    NonParticipant = 3,
    ReadReplica = 4,
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerRole::UnknownRole => "UNKNOWN_ROLE",
            PeerRole::Follower => "FOLLOWER",
            PeerRole::Leader => "LEADER",
            PeerRole::Learner => "LEARNER",
            PeerRole::NonParticipant => "NON_PARTICIPANT",
            PeerRole::ReadReplica => "READ_REPLICA",
        };
        f.write_str(name)
    }
}
