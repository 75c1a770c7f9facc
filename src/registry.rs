use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::client_connection::ClientConnectionDescriptor;

/// Process-wide map of logged in usernames to the connection holding them.
///
/// The map is only reachable through [`OnlineRegistry::try_login`], which hands out an
/// [`OnlineGuard`]; dropping the guard is the only way an entry is released.
#[derive(Debug, Default)]
pub struct OnlineRegistry {
    online: DashMap<String, ClientConnectionDescriptor>,
}

impl OnlineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `username` for `con`. Returns `None` while another session holds it.
    pub fn try_login(
        self: &Arc<Self>,
        username: &str,
        con: &ClientConnectionDescriptor,
    ) -> Option<OnlineGuard> {
        match self.online.entry(username.to_string()) {
            Entry::Occupied(holder) => {
                debug!(target: "auth", "{} already online via {}", username, holder.get());
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(con.clone());
                Some(OnlineGuard {
                    registry: self.clone(),
                    username: username.to_string(),
                    con: con.clone(),
                })
            }
        }
    }

    #[cfg(test)]
    pub fn is_online(&self, username: &str) -> bool {
        self.online.contains_key(username)
    }

    #[cfg(test)]
    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    fn release(&self, username: &str, con: &ClientConnectionDescriptor) {
        // Only the holder may release its own entry
        self.online.remove_if(username, |_, holder| holder == con);
    }
}

/// Keeps a username marked online for as long as it lives.
#[derive(Debug)]
pub struct OnlineGuard {
    registry: Arc<OnlineRegistry>,
    username: String,
    con: ClientConnectionDescriptor,
}

impl OnlineGuard {
    #[cfg(test)]
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Drop for OnlineGuard {
    fn drop(&mut self) {
        self.registry.release(&self.username, &self.con);
        debug!(target: "auth", "{} released by {}", self.username, self.con);
    }
}
