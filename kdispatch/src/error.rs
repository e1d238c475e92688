use std::{io, path::PathBuf};

use aya::{maps::MapError, programs::ProgramError};
use thiserror::Error;

use crate::plan::Table;

#[derive(Error, Debug)]
/// Errors produced while populating or configuring the jump tables.
///
/// None of these can happen at dispatch time: an empty slot is not an error
/// but a fall-through, reported as `None` by
/// [`TryDispatch`](crate::TryDispatch).
pub enum DispatchError {
    /// Index does not fit in the table
    #[error("the index is {index} but `max_entries` is {max_entries}")]
    OutOfBounds {
        /// Index requested
        index: u32,
        /// Table capacity
        max_entries: u32,
    },

    /// Stage is not part of the table's enumeration
    #[error("`{stage}` is not a stage of the {table} table")]
    UnknownStage {
        /// Table addressed
        table: Table,
        /// Stage name or number as written in the plan
        stage: String,
    },

    /// Two plan entries address the same slot
    #[error("slot `{stage}` of the {table} table is assigned more than once")]
    DuplicateEntry {
        /// Table addressed
        table: Table,
        /// Stage name
        stage: &'static str,
    },

    /// The eBPF object has no such map
    #[error("map `{name}` not found")]
    MapNotFound {
        /// Map name
        name: &'static str,
    },

    /// The eBPF object has no such program
    #[error("program `{name}` not found")]
    ProgramNotFound {
        /// Program name
        name: String,
    },

    /// Error from the program array
    #[error(transparent)]
    Map(#[from] MapError),

    /// Error obtaining a program's file descriptor
    #[error("program `{name}` cannot be installed")]
    Program {
        /// Program name
        name: String,
        #[source]
        /// Original error
        error: ProgramError,
    },

    /// Could not read a configuration file
    #[error("failed to read `{}`", path.display())]
    Io {
        /// File path
        path: PathBuf,
        #[source]
        /// Original io::Error
        error: io::Error,
    },

    /// Malformed configuration
    #[error("invalid dispatch configuration")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
