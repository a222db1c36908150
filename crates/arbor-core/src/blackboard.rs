//! Shared key/value store with per-client access control.
//!
//! Values are stored as [`serde_json::Value`]; the store never checks their
//! shape. Every read and write names the [`ClientId`] performing it and is
//! checked against the keys that client registered.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::BlackboardError;

/// Handle of a registered client. Slots are reused after a client is
/// unregistered; the generation keeps stale handles from reaching the new
/// occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId {
    index: u32,
    generation: u32,
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}.{}", self.index, self.generation)
    }
}

/// Access a client holds on a key. Write access implies read access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    /// Write access no other client may hold at the same time.
    ExclusiveWrite,
}

impl Access {
    pub fn can_write(self) -> bool {
        matches!(self, Access::Write | Access::ExclusiveWrite)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::Read => "READ",
            Access::Write => "WRITE",
            Access::ExclusiveWrite => "EXCLUSIVE_WRITE",
        })
    }
}

#[derive(Debug)]
struct Client {
    name: String,
    keys: BTreeMap<String, Access>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    client: Option<Client>,
}

#[derive(Debug, Default)]
pub struct Blackboard {
    values: BTreeMap<String, Value>,
    clients: Vec<Slot>,
    free: Vec<u32>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_client(&mut self, name: impl Into<String>) -> ClientId {
        let client = Some(Client {
            name: name.into(),
            keys: BTreeMap::new(),
        });
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.clients[index as usize];
                slot.client = client;
                ClientId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.clients.len() as u32;
                self.clients.push(Slot {
                    generation: 0,
                    client,
                });
                ClientId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Drops the client and every key registration it holds. Values it wrote
    /// stay on the blackboard.
    pub fn unregister_client(&mut self, client: ClientId) -> Result<(), BlackboardError> {
        self.client(client)?;
        let slot = &mut self.clients[client.index as usize];
        slot.client = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(client.index);
        Ok(())
    }

    /// Number of clients currently registered.
    pub fn client_count(&self) -> usize {
        self.clients.len() - self.free.len()
    }

    /// Number of client slots, free ones included.
    pub fn client_slots(&self) -> usize {
        self.clients.len()
    }

    pub fn client_name(&self, client: ClientId) -> Option<&str> {
        self.client(client).ok().map(|c| c.name.as_str())
    }

    pub fn register_key(
        &mut self,
        client: ClientId,
        key: impl Into<String>,
        access: Access,
    ) -> Result<(), BlackboardError> {
        let key = key.into();
        self.client(client)?;

        if access.can_write() {
            let conflict = self
                .clients
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != client.index as usize)
                .filter_map(|(_, slot)| slot.client.as_ref())
                .find(|other| match other.keys.get(&key) {
                    Some(Access::ExclusiveWrite) => true,
                    Some(Access::Write) => access == Access::ExclusiveWrite,
                    _ => false,
                });
            if let Some(holder) = conflict {
                return Err(BlackboardError::ExclusiveConflict {
                    key,
                    holder: holder.name.clone(),
                });
            }
        }

        tracing::trace!(%client, %key, %access, "blackboard key registered");
        self.client_mut(client)?.keys.insert(key, access);
        Ok(())
    }

    pub fn unregister_key(&mut self, client: ClientId, key: &str) -> Result<(), BlackboardError> {
        self.client_mut(client)?.keys.remove(key);
        Ok(())
    }

    /// Drops every key registration of `client` and returns them, so they
    /// can be registered again later. The client itself stays registered.
    pub fn release_keys(&mut self, client: ClientId) -> Result<Vec<(String, Access)>, BlackboardError> {
        let keys = std::mem::take(&mut self.client_mut(client)?.keys);
        Ok(keys.into_iter().collect())
    }

    /// Access `client` registered for `key`, if any.
    pub fn access(&self, client: ClientId, key: &str) -> Option<Access> {
        self.client(client).ok()?.keys.get(key).copied()
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn read(&self, client: ClientId, key: &str) -> Result<&Value, BlackboardError> {
        let registered = self.client(client)?;
        if !registered.keys.contains_key(key) {
            return Err(BlackboardError::AccessDenied {
                client: registered.name.clone(),
                key: key.to_string(),
                required: Access::Read,
            });
        }
        self.values
            .get(key)
            .ok_or_else(|| BlackboardError::KeyNotSet {
                key: key.to_string(),
            })
    }

    /// Reads `key` and decodes it into `T`.
    pub fn get<T: DeserializeOwned>(&self, client: ClientId, key: &str) -> Result<T, BlackboardError> {
        let value = self.read(client, key)?;
        T::deserialize(value).map_err(|source| BlackboardError::Decode {
            key: key.to_string(),
            source,
        })
    }

    pub fn write<T: Serialize>(
        &mut self,
        client: ClientId,
        key: &str,
        value: T,
    ) -> Result<(), BlackboardError> {
        let value = serde_json::to_value(value).map_err(|source| BlackboardError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.write_value(client, key, value)
    }

    pub fn write_value(&mut self, client: ClientId, key: &str, value: Value) -> Result<(), BlackboardError> {
        self.check_write(client, key)?;
        tracing::trace!(%client, key, %value, "blackboard write");
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Removes `key`, returning its previous value. Requires write access.
    pub fn unset(&mut self, client: ClientId, key: &str) -> Result<Option<Value>, BlackboardError> {
        self.check_write(client, key)?;
        Ok(self.values.remove(key))
    }

    fn check_write(&self, client: ClientId, key: &str) -> Result<(), BlackboardError> {
        let registered = self.client(client)?;
        match registered.keys.get(key) {
            Some(access) if access.can_write() => Ok(()),
            _ => Err(BlackboardError::AccessDenied {
                client: registered.name.clone(),
                key: key.to_string(),
                required: Access::Write,
            }),
        }
    }

    fn client(&self, client: ClientId) -> Result<&Client, BlackboardError> {
        self.clients
            .get(client.index as usize)
            .filter(|slot| slot.generation == client.generation)
            .and_then(|slot| slot.client.as_ref())
            .ok_or(BlackboardError::UnknownClient(client))
    }

    fn client_mut(&mut self, client: ClientId) -> Result<&mut Client, BlackboardError> {
        self.clients
            .get_mut(client.index as usize)
            .filter(|slot| slot.generation == client.generation)
            .and_then(|slot| slot.client.as_mut())
            .ok_or(BlackboardError::UnknownClient(client))
    }
}
