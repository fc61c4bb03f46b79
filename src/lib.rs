//! Jailpack Library
//!
//! Packages an application directory into a portable Cage archive and runs
//! Cages as FreeBSD jails.
//!
//! - [`cage`]: builds Cage archives (skeleton root filesystem, application,
//!   startup script)
//! - [`runner`]: extracts a Cage into a jail root and starts the jail
//! - [`status`]: relays the host jail listing
//! - [`host`]: capability traits over tar(1), jail(8) and jls(8)

pub mod cage;
pub mod config;
pub mod host;
pub mod runner;
pub mod status;
pub mod validate;

pub use cage::{build_cage, BuildOptions, CageError, CageSummary};
pub use runner::{CageRunner, RunError, RunRequest};
pub use status::list_jails;
