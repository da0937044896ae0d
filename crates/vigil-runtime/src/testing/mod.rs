//! In-memory store double for exercising the liveness core without a
//! database: leadership is flipped by hand and every mutation is recorded
//! together with the scope that authorized it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use uuid::Uuid;

use vigil_core::error::Result;
use vigil_core::store::{InstanceRow, RequestScope, ServiceRow, Store, User};
use vigil_core::BoxFuture;

/// In-memory `Store` with controllable leadership.
#[derive(Default)]
pub struct MemStore {
    leaders: Mutex<HashMap<String, bool>>,
    campaigns: Mutex<Vec<String>>,
    users: Mutex<Vec<User>>,
    unhealthy: Mutex<Vec<InstanceRow>>,
    empty_services: Mutex<Vec<ServiceRow>>,
    deleted_instances: Mutex<Vec<(RequestScope, Vec<String>)>>,
    deleted_services: Mutex<Vec<(RequestScope, Vec<String>)>>,
    clean_scopes: Mutex<Vec<RequestScope>>,
    instance_tombstones: Mutex<u64>,
    client_tombstones: Mutex<u64>,
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant or revoke leadership for an election key.
    pub fn set_leader(&self, key: &str, leader: bool) {
        self.leaders
            .lock()
            .unwrap()
            .insert(key.to_string(), leader);
    }

    /// Election keys campaigns were started for, in order.
    pub fn campaigns(&self) -> Vec<String> {
        self.campaigns.lock().unwrap().clone()
    }

    /// Seed an account.
    pub fn add_user(&self, name: &str, token: &str) {
        self.users.lock().unwrap().push(User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner: String::new(),
            token: token.to_string(),
        });
    }

    /// Seed the unhealthy-instance result set.
    pub fn set_unhealthy_instances(&self, rows: Vec<InstanceRow>) {
        *self.unhealthy.lock().unwrap() = rows;
    }

    /// Seed the empty auto-created service result set.
    pub fn set_empty_services(&self, rows: Vec<ServiceRow>) {
        *self.empty_services.lock().unwrap() = rows;
    }

    /// Seed the number of instance tombstones waiting to be reaped.
    pub fn set_instance_tombstones(&self, count: u64) {
        *self.instance_tombstones.lock().unwrap() = count;
    }

    /// Seed the number of client tombstones waiting to be reaped.
    pub fn set_client_tombstones(&self, count: u64) {
        *self.client_tombstones.lock().unwrap() = count;
    }

    /// Instance deletions recorded so far, with the authorizing scope.
    pub fn deleted_instances(&self) -> Vec<(RequestScope, Vec<String>)> {
        self.deleted_instances.lock().unwrap().clone()
    }

    /// Service deletions recorded so far, with the authorizing scope.
    pub fn deleted_services(&self) -> Vec<(RequestScope, Vec<String>)> {
        self.deleted_services.lock().unwrap().clone()
    }

    /// Scopes the tombstone-reaping calls ran under.
    pub fn clean_scopes(&self) -> Vec<RequestScope> {
        self.clean_scopes.lock().unwrap().clone()
    }
}

impl Store for MemStore {
    fn start_leader_election(&self, key: &str) -> BoxFuture<'_, Result<()>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut campaigns = self.campaigns.lock().unwrap();
            if !campaigns.contains(&key) {
                campaigns.push(key);
            }
            Ok(())
        })
    }

    fn is_leader(&self, key: &str) -> bool {
        self.leaders.lock().unwrap().get(key).copied().unwrap_or(false)
    }

    fn get_user_by_name(&self, name: &str, owner: &str) -> BoxFuture<'_, Result<Option<User>>> {
        let name = name.to_string();
        let owner = owner.to_string();
        Box::pin(async move {
            let users = self.users.lock().unwrap();
            Ok(users
                .iter()
                .find(|u| u.name == name && u.owner == owner)
                .cloned())
        })
    }

    fn get_unhealthy_instances(&self) -> BoxFuture<'_, Result<Vec<InstanceRow>>> {
        Box::pin(async move { Ok(self.unhealthy.lock().unwrap().clone()) })
    }

    fn batch_delete_instances(
        &self,
        scope: &RequestScope,
        ids: &[String],
    ) -> BoxFuture<'_, Result<()>> {
        let scope = scope.clone();
        let ids = ids.to_vec();
        Box::pin(async move {
            self.unhealthy
                .lock()
                .unwrap()
                .retain(|row| !ids.contains(&row.id));
            self.deleted_instances.lock().unwrap().push((scope, ids));
            Ok(())
        })
    }

    fn get_empty_auto_created_services(&self) -> BoxFuture<'_, Result<Vec<ServiceRow>>> {
        Box::pin(async move { Ok(self.empty_services.lock().unwrap().clone()) })
    }

    fn batch_delete_services(
        &self,
        scope: &RequestScope,
        ids: &[String],
    ) -> BoxFuture<'_, Result<()>> {
        let scope = scope.clone();
        let ids = ids.to_vec();
        Box::pin(async move {
            self.empty_services
                .lock()
                .unwrap()
                .retain(|row| !ids.contains(&row.id));
            self.deleted_services.lock().unwrap().push((scope, ids));
            Ok(())
        })
    }

    fn clean_deleted_instances(
        &self,
        scope: &RequestScope,
        _retention: Duration,
        batch: u32,
    ) -> BoxFuture<'_, Result<u64>> {
        let scope = scope.clone();
        Box::pin(async move {
            self.clean_scopes.lock().unwrap().push(scope);
            let mut remaining = self.instance_tombstones.lock().unwrap();
            let reaped = (*remaining).min(batch as u64);
            *remaining -= reaped;
            Ok(reaped)
        })
    }

    fn clean_deleted_clients(
        &self,
        scope: &RequestScope,
        _retention: Duration,
        batch: u32,
    ) -> BoxFuture<'_, Result<u64>> {
        let scope = scope.clone();
        Box::pin(async move {
            self.clean_scopes.lock().unwrap().push(scope);
            let mut remaining = self.client_tombstones.lock().unwrap();
            let reaped = (*remaining).min(batch as u64);
            *remaining -= reaped;
            Ok(reaped)
        })
    }
}
