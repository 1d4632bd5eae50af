//! Process supervision: spawn, stream, bound, and kill

mod kill;
mod supervise;

pub use kill::{platform_killer, ProcessTreeKiller};
#[cfg(unix)]
pub use kill::UnixProcessGroupKiller;
#[cfg(windows)]
pub use kill::WindowsTaskKiller;
pub use supervise::{Supervisor, GRACE_MS};
