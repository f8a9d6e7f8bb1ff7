//! Data models
//!
//! Database entities (Session, Duration, TableNumber, User) and the
//! request/response types built from them.

mod duration;
mod session;
mod table_number;
mod user;

pub use duration::{CreateDurationInput, Duration};
pub use session::{
    CreateSessionInput, NewSession, Session, SessionStatus, SessionView, UpdateStatusInput,
    UserSnapshot,
};
pub use table_number::TableNumber;
pub use user::{CreateUserInput, User};
