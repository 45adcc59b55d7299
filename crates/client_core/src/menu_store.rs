//! Single-owner menu state. The raw tree and permission set live inside one
//! task; callers reach it only through the command queue.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use shared::{
    domain::{MenuItem, PermissionSet},
    protocol::validate_menu,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    config::Settings,
    menu::filter_menu,
    state::{StateStream, StateSubscription},
};

/// Filtered menu as seen by the current user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MenuSnapshot {
    pub items: Vec<MenuItem>,
    pub permissions: PermissionSet,
    pub revision: u64,
}

enum MenuCommand {
    ReplaceMenu(Vec<MenuItem>),
    ReplacePermissions(PermissionSet),
    Snapshot(oneshot::Sender<MenuSnapshot>),
    Shutdown,
}

#[derive(Clone)]
pub struct MenuStoreHandle {
    commands: mpsc::Sender<MenuCommand>,
    snapshots: Arc<StateStream<MenuSnapshot>>,
}

pub struct MenuStore {
    raw_menu: Vec<MenuItem>,
    permissions: PermissionSet,
    current: MenuSnapshot,
    snapshots: Arc<StateStream<MenuSnapshot>>,
}

impl MenuStore {
    /// Starts the owning task. It stops on [`MenuStoreHandle::shutdown`] or
    /// once every handle is dropped, closing the snapshot stream either way.
    pub fn spawn(settings: &Settings) -> (MenuStoreHandle, JoinHandle<()>) {
        let (commands, receiver) = mpsc::channel(settings.menu_command_capacity.max(1));
        let snapshots = Arc::new(StateStream::new(settings.state_channel_capacity));
        let store = MenuStore {
            raw_menu: Vec::new(),
            permissions: PermissionSet::new(),
            current: MenuSnapshot::default(),
            snapshots: Arc::clone(&snapshots),
        };
        let task = tokio::spawn(store.run(receiver));
        (
            MenuStoreHandle {
                commands,
                snapshots,
            },
            task,
        )
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<MenuCommand>) {
        debug!("menu store started");
        while let Some(command) = receiver.recv().await {
            match command {
                MenuCommand::ReplaceMenu(items) => {
                    self.raw_menu = items;
                    self.recompute();
                }
                MenuCommand::ReplacePermissions(permissions) => {
                    self.permissions = permissions;
                    self.recompute();
                }
                MenuCommand::Snapshot(reply) => {
                    let _ = reply.send(self.current.clone());
                }
                MenuCommand::Shutdown => break,
            }
        }
        self.snapshots.close();
        debug!("menu store stopped");
    }

    fn recompute(&mut self) {
        let items = filter_menu(&self.raw_menu, &self.permissions);
        if items == self.current.items && self.permissions == self.current.permissions {
            debug!("menu unchanged after recompute");
            return;
        }
        self.current = MenuSnapshot {
            items,
            permissions: self.permissions.clone(),
            revision: self.current.revision + 1,
        };
        info!(
            revision = self.current.revision,
            visible_roots = self.current.items.len(),
            "menu snapshot updated"
        );
        self.snapshots.publish(self.current.clone());
    }
}

impl MenuStoreHandle {
    /// Replaces the whole raw tree, as delivered by a sync. A tree with
    /// duplicate sibling keys is rejected and the current menu kept.
    pub async fn replace_menu(&self, items: Vec<MenuItem>) -> Result<()> {
        validate_menu(&items).context("menu rejected")?;
        self.send(MenuCommand::ReplaceMenu(items)).await
    }

    pub async fn replace_permissions(&self, permissions: PermissionSet) -> Result<()> {
        self.send(MenuCommand::ReplacePermissions(permissions)).await
    }

    pub async fn snapshot(&self) -> Result<MenuSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(MenuCommand::Snapshot(reply)).await?;
        response.await.map_err(|_| anyhow!("menu store is closed"))
    }

    pub fn subscribe(&self) -> StateSubscription<MenuSnapshot> {
        self.snapshots.subscribe()
    }

    /// Stops the store task and waits for it. Other handles then fail with
    /// "menu store is closed" and subscribers end.
    pub async fn shutdown(&self, task: JoinHandle<()>) -> Result<()> {
        // Already-closed queues mean the task is finishing anyway.
        let _ = self.commands.send(MenuCommand::Shutdown).await;
        task.await.map_err(|err| anyhow!("menu store task failed: {err}"))
    }

    async fn send(&self, command: MenuCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("menu store is closed"))
    }
}

#[cfg(test)]
#[path = "tests/menu_store_tests.rs"]
mod tests;
