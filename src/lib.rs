pub mod admission;
pub mod clock;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod health;
pub mod key;
pub mod metrics;
pub mod middleware;
pub mod quota;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod store;
pub mod sweeper;

pub use admission::{Admission, Verdict, VerdictKind};
pub use config::{Config, Limits};
pub use error::{GateError, Result};
pub use key::ClientKey;
pub use server::{create_app, gate};
