//! One module per subcommand.

pub mod add;
pub mod delete;
pub mod edit;
pub mod export;
pub mod import_cmd;
pub mod list;
pub mod reset;
pub mod rotate;
