#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod command;
mod error;
mod file;
pub mod global;
mod plan;
mod record;
mod tag;

pub use crate::command::{ArgSpec, CommandHandle, CompareArg};
pub use crate::error::PlanError;
pub use crate::file::FileHandle;
pub use crate::plan::{Plan, PLAN_FILE_NAME};
pub use crate::record::{parse_jsonl, CommandRecord, Record, TaskRecord};
pub use crate::tag::Tag;
