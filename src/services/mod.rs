//! Services layer - Business logic
//!
//! - `countdown`: remaining time, display classification, summary counts
//! - `monitor`: the lifecycle monitor that reconciles expired sessions
//! - `session`: the query service used by the HTTP layer
//! - `clock`: time source shared by all of the above

pub mod clock;
pub mod countdown;
pub mod monitor;
pub mod session;

pub use clock::{Clock, SystemClock};
pub use countdown::{
    is_expired, remaining, session_remaining, Classifier, DisplayState, SessionFilter, SessionSummary,
    DEFAULT_CRITICAL_THRESHOLD_SECS,
};
pub use monitor::{MonitorHandle, SessionMonitor, TickReport, WorkingSet};
pub use session::{Catalog, SessionService, SessionServiceError};
