//! Jail status reporting

use crate::host::{HostError, JailLister};

/// Listing of running jails, exactly as the host lister printed it
pub fn list_jails<L: JailLister + ?Sized>(lister: &L) -> Result<String, HostError> {
    lister.list()
}
