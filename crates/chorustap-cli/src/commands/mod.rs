mod discover;
mod init;
mod reset;
mod status;
mod sync;

pub use discover::cmd_discover;
pub use init::cmd_init;
pub use reset::cmd_reset;
pub use status::cmd_status;
pub use sync::cmd_sync;
