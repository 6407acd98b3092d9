//! Client Registry
//!
//! One client per endpoint URL, shared by every feature that asks for it.
//! Owned by the runtime rather than living in a global.

use crate::core::mode::RuntimeMode;
use crate::core::sync::lock_recover;
use crate::realtime::client::{RealtimeClient, RealtimeClientConfig};
use crate::realtime::transport::Transport;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct ClientRegistry {
    transport: Arc<dyn Transport>,
    defaults: RealtimeClientConfig,
    mode: RuntimeMode,
    clients: Mutex<BTreeMap<String, RealtimeClient>>,
}

impl ClientRegistry {
    /// `defaults` supplies every setting except the URL of clients created
    /// through [`get_or_create`](Self::get_or_create)
    pub fn new(transport: Arc<dyn Transport>, defaults: RealtimeClientConfig, mode: RuntimeMode) -> Self {
        Self {
            transport,
            defaults,
            mode,
            clients: Mutex::new(BTreeMap::new()),
        }
    }

    /// Client for `url`, created with the registry defaults if missing
    pub fn get_or_create(&self, url: &str) -> RealtimeClient {
        self.get_or_create_with(self.defaults.clone().with_url(url))
    }

    /// Client for `config.url`. An existing client keeps its original
    /// configuration.
    pub fn get_or_create_with(&self, config: RealtimeClientConfig) -> RealtimeClient {
        let mut clients = lock_recover(&self.clients, "client registry");
        clients
            .entry(config.url.clone())
            .or_insert_with(|| {
                log::debug!("[ClientRegistry] Creating client for {}", config.url);
                RealtimeClient::new(config, self.transport.clone(), self.mode)
            })
            .clone()
    }

    /// Client for the default URL
    pub fn default_client(&self) -> RealtimeClient {
        self.get_or_create_with(self.defaults.clone())
    }

    pub fn get(&self, url: &str) -> Option<RealtimeClient> {
        lock_recover(&self.clients, "client registry").get(url).cloned()
    }

    /// Disconnect and forget the client for `url`
    pub fn remove(&self, url: &str) -> bool {
        let removed = lock_recover(&self.clients, "client registry").remove(url);
        match removed {
            Some(client) => {
                client.disconnect();
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> Vec<RealtimeClient> {
        lock_recover(&self.clients, "client registry")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        lock_recover(&self.clients, "client registry").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disconnect and drop every client
    pub fn disconnect_all(&self) {
        let clients = std::mem::take(&mut *lock_recover(&self.clients, "client registry"));
        for client in clients.into_values() {
            client.disconnect();
        }
    }
}
