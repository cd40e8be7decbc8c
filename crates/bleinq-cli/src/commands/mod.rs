//! Command implementations for the CLI.

mod alias;
mod battery;
mod decode;
mod name;
mod read;
mod scan;

pub use alias::{AliasAction, cmd_alias};
pub use battery::cmd_battery;
pub use decode::cmd_decode;
pub use name::{NameAction, cmd_name};
pub use read::cmd_read;
pub use scan::cmd_scan;
