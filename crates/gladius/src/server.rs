//! `ArenaServer` builder and driver loop.
//!
//! The server owns the [`ArenaManager`] on a single task. Host events and
//! requests arrive as [`ServerEvent`]s over an mpsc channel; the
//! [`TickClock`] paces the task queue. Nothing else touches the arenas, so
//! no locking is needed.

use std::path::PathBuf;

use glam::DVec3;
use gladius_arena::{
    ArenaConfig, ArenaDefinition, ArenaManager, ArenaView, BlockEvent, ExtensionRegistry, Host,
    LoadIssue,
};
use gladius_protocol::{ActorId, Location, SpawnKey};
use gladius_region::{RegionFlag, RegionKind, RegionProtection};
use gladius_tick::{TickClock, TickConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, trace, warn};

use crate::GladiusError;
use crate::handler::{Reply, ServerEvent, handle_event};

/// Default capacity of the event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring an [`ArenaServer`].
///
/// # Example
///
/// ```rust,ignore
/// use gladius::prelude::*;
///
/// let (server, handle) = ArenaServer::builder()
///     .tick_rate(20)
///     .extension_dir("extensions")
///     .build(my_host)?;
/// tokio::spawn(server.run());
/// handle.join(ActorId(1), "pit").await?;
/// ```
pub struct ArenaServerBuilder {
    tick: TickConfig,
    registry: Option<ExtensionRegistry>,
    extension_dir: Option<PathBuf>,
    definitions: Vec<ArenaDefinition>,
    channel_capacity: usize,
}

impl ArenaServerBuilder {
    pub fn new() -> Self {
        Self {
            tick: TickConfig::default(),
            registry: None,
            extension_dir: None,
            definitions: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn tick_config(mut self, config: TickConfig) -> Self {
        self.tick = config;
        self
    }

    /// Ticks per second of the driver loop.
    pub fn tick_rate(mut self, hz: u32) -> Self {
        self.tick.tick_rate_hz = hz;
        self
    }

    /// Uses `registry` instead of a registry holding only the built-ins.
    pub fn registry(mut self, registry: ExtensionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Directory scanned for extension units at startup and on reload.
    pub fn extension_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extension_dir = Some(dir.into());
        self
    }

    /// An arena to restore at startup.
    pub fn arena(mut self, definition: ArenaDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Loads the extensions and arenas and returns the server with a handle
    /// to talk to it.
    ///
    /// Skipped parts of a definition are logged; a definition that cannot
    /// be loaded at all fails the build.
    pub fn build<H: Host>(self, host: H) -> Result<(ArenaServer<H>, ServerHandle), GladiusError> {
        let mut registry = self.registry.unwrap_or_default();
        if let Some(dir) = self.extension_dir {
            registry = registry.with_directory(dir);
        }

        let mut manager = ArenaManager::new(registry, host);
        for definition in self.definitions {
            let name = definition.name.clone();
            for issue in manager.load_arena(definition)? {
                warn!(arena = %name, %issue, "arena definition partly skipped");
            }
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let server = ArenaServer {
            manager,
            clock: TickClock::new(self.tick),
            events: rx,
        };
        Ok((server, ServerHandle { events: tx }))
    }
}

impl Default for ArenaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// The driver loop. Call [`run`](Self::run) on a task of its own.
pub struct ArenaServer<H: Host> {
    manager: ArenaManager<H>,
    clock: TickClock,
    events: mpsc::Receiver<ServerEvent>,
}

impl<H: Host> ArenaServer<H> {
    pub fn builder() -> ArenaServerBuilder {
        ArenaServerBuilder::new()
    }

    pub fn manager(&self) -> &ArenaManager<H> {
        &self.manager
    }

    /// Runs until [`ServerEvent::Shutdown`] arrives or every handle is
    /// dropped, then returns the manager.
    pub async fn run(mut self) -> ArenaManager<H> {
        info!(arenas = self.manager.arenas().count(), "arena server running");

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(ServerEvent::Shutdown) => {
                        handle_event(&mut self.manager, ServerEvent::Shutdown);
                        break;
                    }
                    Some(event) => handle_event(&mut self.manager, event),
                    None => {
                        info!("every handle dropped, stopping");
                        self.manager.reset_all();
                        break;
                    }
                },
                tick = self.clock.wait_for_tick() => {
                    let ran = self.manager.tick();
                    trace!(tick = tick.tick, tasks = ran, "tick processed");
                    self.clock.record_tick_end();
                }
            }
        }

        info!(
            ticks = self.clock.tick_count(),
            overruns = self.clock.overruns(),
            slow = self.clock.slow_ticks(),
            "arena server stopped"
        );
        self.manager
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A cloneable sender for talking to a running [`ArenaServer`].
#[derive(Debug, Clone)]
pub struct ServerHandle {
    events: mpsc::Sender<ServerEvent>,
}

impl ServerHandle {
    /// Sends a raw event.
    pub async fn send(&self, event: ServerEvent) -> Result<(), GladiusError> {
        self.events.send(event).await.map_err(|_| GladiusError::ServerClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> ServerEvent) -> Result<T, GladiusError> {
        let (reply, response) = oneshot::channel();
        self.send(make(reply)).await?;
        Ok(response.await.map_err(|_| GladiusError::ServerClosed)??)
    }

    // -- host events --------------------------------------------------------

    pub async fn moved(&self, actor: ActorId, to: Location) -> Result<(), GladiusError> {
        self.send(ServerEvent::Moved { actor, to }).await
    }

    pub async fn died(&self, victim: ActorId, killer: Option<ActorId>) -> Result<(), GladiusError> {
        self.send(ServerEvent::Died { victim, killer }).await
    }

    pub async fn disconnected(&self, actor: ActorId) -> Result<(), GladiusError> {
        self.send(ServerEvent::Disconnected { actor }).await
    }

    /// Asks the server to reset every arena and stop.
    pub async fn shutdown(&self) -> Result<(), GladiusError> {
        self.send(ServerEvent::Shutdown).await
    }

    // -- actor requests -----------------------------------------------------

    pub async fn join(&self, actor: ActorId, arena: &str) -> Result<(), GladiusError> {
        let arena = arena.to_string();
        self.request(|reply| ServerEvent::Join { actor, arena, reply }).await
    }

    pub async fn spectate(&self, actor: ActorId, arena: &str) -> Result<(), GladiusError> {
        let arena = arena.to_string();
        self.request(|reply| ServerEvent::Spectate { actor, arena, reply }).await
    }

    pub async fn ready(&self, actor: ActorId) -> Result<(), GladiusError> {
        self.request(|reply| ServerEvent::Ready { actor, reply }).await
    }

    pub async fn choose_class(&self, actor: ActorId, class: &str) -> Result<(), GladiusError> {
        let class = class.to_string();
        self.request(|reply| ServerEvent::ChooseClass { actor, class, reply }).await
    }

    pub async fn leave(&self, actor: ActorId) -> Result<(), GladiusError> {
        self.request(|reply| ServerEvent::Leave { actor, reply }).await
    }

    /// `Ok` when the interaction may go ahead.
    pub async fn interact(&self, actor: ActorId, event: BlockEvent) -> Result<(), GladiusError> {
        self.request(|reply| ServerEvent::Interact { actor, event, reply }).await
    }

    // -- administration -----------------------------------------------------

    pub async fn create_arena(&self, name: &str, config: ArenaConfig) -> Result<Vec<LoadIssue>, GladiusError> {
        let name = name.to_string();
        self.request(|reply| ServerEvent::CreateArena { name, config, reply }).await
    }

    pub async fn load_arena(&self, definition: ArenaDefinition) -> Result<Vec<LoadIssue>, GladiusError> {
        self.request(|reply| ServerEvent::LoadArena { definition, reply }).await
    }

    pub async fn save_arena(&self, arena: &str) -> Result<ArenaDefinition, GladiusError> {
        let arena = arena.to_string();
        self.request(|reply| ServerEvent::SaveArena { arena, reply }).await
    }

    pub async fn remove_arena(&self, arena: &str) -> Result<(), GladiusError> {
        let arena = arena.to_string();
        self.request(|reply| ServerEvent::RemoveArena { arena, reply }).await
    }

    pub async fn open(&self, arena: &str) -> Result<(), GladiusError> {
        let arena = arena.to_string();
        self.request(|reply| ServerEvent::Open { arena, reply }).await
    }

    pub async fn lock(&self, arena: &str, locked: bool) -> Result<(), GladiusError> {
        let arena = arena.to_string();
        self.request(|reply| ServerEvent::Lock { arena, locked, reply }).await
    }

    pub async fn force_end(&self, arena: &str) -> Result<(), GladiusError> {
        let arena = arena.to_string();
        self.request(|reply| ServerEvent::ForceEnd { arena, reply }).await
    }

    pub async fn kick(&self, actor: ActorId) -> Result<(), GladiusError> {
        self.request(|reply| ServerEvent::Kick { actor, reply }).await
    }

    pub async fn set_spawn(
        &self,
        arena: &str,
        key: &str,
        location: Location,
        offset: Option<f64>,
    ) -> Result<SpawnKey, GladiusError> {
        let (arena, key) = (arena.to_string(), key.to_string());
        self.request(|reply| ServerEvent::SetSpawn {
            arena,
            key,
            location,
            offset,
            reply,
        })
        .await
    }

    pub async fn add_region(
        &self,
        arena: &str,
        region: &str,
        kind: RegionKind,
        shape: &str,
        world: &str,
        corners: (DVec3, DVec3),
    ) -> Result<(), GladiusError> {
        let (arena, region, shape, world) = (
            arena.to_string(),
            region.to_string(),
            shape.to_string(),
            world.to_string(),
        );
        self.request(|reply| ServerEvent::AddRegion {
            arena,
            region,
            kind,
            shape,
            world,
            corners,
            reply,
        })
        .await
    }

    pub async fn set_region_flag(
        &self,
        arena: &str,
        region: &str,
        flag: RegionFlag,
        enabled: bool,
    ) -> Result<(), GladiusError> {
        let (arena, region) = (arena.to_string(), region.to_string());
        self.request(|reply| ServerEvent::SetRegionFlag {
            arena,
            region,
            flag,
            enabled,
            reply,
        })
        .await
    }

    pub async fn set_region_protection(
        &self,
        arena: &str,
        region: &str,
        protection: RegionProtection,
        enabled: bool,
    ) -> Result<(), GladiusError> {
        let (arena, region) = (arena.to_string(), region.to_string());
        self.request(|reply| ServerEvent::SetRegionProtection {
            arena,
            region,
            protection,
            enabled,
            reply,
        })
        .await
    }

    pub async fn view(&self, arena: &str) -> Result<ArenaView, GladiusError> {
        let arena = arena.to_string();
        self.request(|reply| ServerEvent::View { arena, reply }).await
    }

    pub async fn reload_extensions(&self) -> Result<(), GladiusError> {
        let (reply, done) = oneshot::channel();
        self.send(ServerEvent::ReloadExtensions { reply }).await?;
        done.await.map_err(|_| GladiusError::ServerClosed)
    }
}
