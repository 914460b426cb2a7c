//! One module per subcommand, each exposing `execute`.

pub mod audit_cmd;
pub mod get;
pub mod history;
pub mod init;
pub mod rekey;
pub mod set;
