//! automend daemon library: logging setup and the in-memory collaborator
//! backend the standalone binary runs against.

pub mod logging;
pub mod memory;
