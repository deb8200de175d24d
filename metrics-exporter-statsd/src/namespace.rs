use std::collections::{btree_map, BTreeMap};

use crate::client::StatsdClient;

/// Names under which a statsd client is made available.
///
/// Every namespace maps to the same client, and so to the same socket. Registering the same name twice has no effect.
#[derive(Clone, Debug)]
pub struct Namespaces {
    clients: BTreeMap<String, StatsdClient>,
}

impl Namespaces {
    /// Creates a new `Namespaces`, registering `client` under every name in `names`.
    pub fn new<I, S>(client: &StatsdClient, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let clients = names.into_iter().map(|name| (name.into(), client.clone())).collect();
        Namespaces { clients }
    }

    /// Returns the client registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&StatsdClient> {
        self.clients.get(name)
    }

    /// Returns an iterator over all registered namespaces and their client, ordered by name.
    pub fn iter(&self) -> btree_map::Iter<'_, String, StatsdClient> {
        self.clients.iter()
    }

    /// Returns the number of registered namespaces.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no namespaces are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl<'a> IntoIterator for &'a Namespaces {
    type Item = (&'a String, &'a StatsdClient);
    type IntoIter = btree_map::Iter<'a, String, StatsdClient>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
