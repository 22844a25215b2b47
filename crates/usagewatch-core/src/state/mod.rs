//! Last known usage state.
//!
//! The orchestrator is the only writer. Everything else reads owned
//! [`StatusSnapshot`]s, so no lock is held across an await or a render.

mod store;

pub use store::{
    read_status_file, write_json_file, write_status_file, ScrapeStatus, StatusSnapshot,
    StatusStore,
};
