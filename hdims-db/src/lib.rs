//! HDIMS Data Access
//!
//! Contracts for the managed platform the system runs on, and two
//! implementations of them.
//!
//! ## Modules
//!
//! - `facade`: table access, stored procedures, object storage and auth traits
//! - `query`: select/update/delete options
//! - `memory`: in-process platform emulator
//! - `remote`: HTTP client for the hosted platform
//! - `import`: CSV bulk import of districts and facilities

pub mod error;
pub mod facade;
pub mod import;
pub mod memory;
pub mod query;
pub mod remote;

pub use error::{DbError, DbResult};
pub use facade::{
    AuthEvent, AuthProvider, AuthSession, AuthUser, Caller, DataStore, ObjectStorage, Platform,
    Procedure, RpcBackend, UploadOptions,
};
pub use import::{ImportKind, ImportReport, SkippedRow};
pub use memory::{MemoryPlatform, NewUser};
pub use query::{Order, Query, Selection};
pub use remote::{PlatformClient, PlatformConfig};

/// Which platform implementation to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Memory,
    Remote,
}

impl Backend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(Self::Memory),
            "remote" | "platform" => Some(Self::Remote),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
