//! Scoped acquisition of the network role.

use crate::net::SimNetwork;

/// RAII guard for the network role.
///
/// Acquires the role on construction and releases it on every exit path,
/// unless [`InNetworkGuard::dismiss`] has been called. Dereferences to the
/// underlying [`SimNetwork`] so driver calls read naturally.
///
/// # Examples
///
/// ```
/// use drydock_sim::SimNetwork;
///
/// let net = SimNetwork::new();
/// {
///     let guard = net.enter();
///     guard.run_ready_network_operations();
/// } // role released here
/// ```
pub struct InNetworkGuard<'a> {
    net: &'a SimNetwork,
    release_on_drop: bool,
}

impl<'a> InNetworkGuard<'a> {
    /// Acquire the network role, blocking until it is free.
    pub fn new(net: &'a SimNetwork) -> Self {
        net.enter_network();
        Self {
            net,
            release_on_drop: true,
        }
    }

    /// Suppress the release on drop, leaving the role held. The caller
    /// takes over sequencing `exit_network` manually.
    pub fn dismiss(&mut self) {
        self.release_on_drop = false;
    }
}

impl Drop for InNetworkGuard<'_> {
    fn drop(&mut self) {
        if self.release_on_drop {
            self.net.exit_network();
        }
    }
}

impl std::ops::Deref for InNetworkGuard<'_> {
    type Target = SimNetwork;

    fn deref(&self) -> &Self::Target {
        self.net
    }
}

impl SimNetwork {
    /// Acquire the network role, scoped to the returned guard.
    pub fn enter(&self) -> InNetworkGuard<'_> {
        InNetworkGuard::new(self)
    }
}
