//! HDIMS Portal
//!
//! Everything behind the dashboard screens except the markup.
//!
//! ## Modules
//!
//! - `session`: sign-in state, persisted between runs
//! - `access`: which frontend roles may open which route
//! - `dashboard`: per-role dashboard data
//! - `submission`: entry form controllers
//! - `review_queue`: the reviewer's work list
//! - `admin`: location and user management

pub mod access;
pub mod admin;
pub mod dashboard;
pub mod error;
pub mod review_queue;
pub mod session;
pub mod submission;

pub use access::{Access, Route};
pub use admin::AdminService;
pub use dashboard::Dashboard;
pub use error::{PortalError, PortalResult};
pub use review_queue::{QueueItem, ReviewQueue};
pub use session::{CurrentUser, FileSessionStore, MemorySessionStore, SessionContext, SessionStore};
pub use submission::{SubmissionController, SubmissionForm};
