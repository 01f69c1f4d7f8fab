//! A scripted two-player free-for-all.
//!
//! Two actors join the `pit`, ready up, fight with three lives each and
//! one of them wanders into a death region. The host is the console: every
//! call Gladius makes is printed.

use std::collections::HashMap;
use std::time::Duration;

use glam::DVec3;
use gladius::prelude::*;
use indexmap::IndexMap;
use tracing::info;

// ---------------------------------------------------------------------------
// Console host
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ConsoleHost {
    locations: HashMap<ActorId, Location>,
}

impl Host for ConsoleHost {
    fn location(&self, actor: ActorId) -> Option<Location> {
        self.locations.get(&actor).cloned()
    }

    fn teleport(&mut self, actor: ActorId, to: &Location) -> bool {
        println!("  [host] teleport {actor} -> {to}");
        self.locations.insert(actor, to.clone());
        true
    }

    fn damage(&mut self, actor: ActorId, amount: f64, cause: DamageCause) {
        println!("  [host] damage {actor} by {amount} ({cause:?})");
    }

    fn kill(&mut self, actor: ActorId) {
        println!("  [host] kill {actor}");
    }

    fn backup(&mut self, actor: ActorId) -> SavedState {
        let location = self
            .locations
            .get(&actor)
            .cloned()
            .unwrap_or_else(|| Location::new("lobby", 0.0, 64.0, 0.0));
        SavedState {
            location,
            payload: Vec::new(),
        }
    }

    fn restore(&mut self, actor: ActorId, saved: SavedState) {
        println!("  [host] restore {actor} to {}", saved.location);
        self.locations.insert(actor, saved.location);
    }

    fn has_permission(&self, _actor: ActorId, _node: &str) -> bool {
        false
    }

    fn notify(&mut self, actor: ActorId, message: &str) {
        println!("  [{actor}] {message}");
    }
}

// ---------------------------------------------------------------------------
// Lives goal
// ---------------------------------------------------------------------------

/// Every fighter starts with `LIVES`; the last one with lives left wins.
#[derive(Default)]
struct LivesGoal {
    lives: IndexMap<ActorId, u32>,
}

impl LivesGoal {
    const LIVES: u32 = 3;
}

impl Hooks for LivesGoal {
    fn name(&self) -> &str {
        "lives"
    }

    fn on_start(&mut self, cx: &mut HookCx) {
        self.lives = cx.view.fighters().map(|m| (m.id, Self::LIVES)).collect();
        cx.broadcast(format!("{} lives each. Fight!", Self::LIVES));
    }

    fn on_end(&mut self, cx: &mut HookCx, winners: &[ActorId]) {
        for winner in winners {
            cx.notify(*winner, "You won the duel");
        }
    }

    fn reset(&mut self) {
        self.lives.clear();
    }
}

impl Goal for LivesGoal {
    fn check_death(&mut self, cx: &mut HookCx, victim: ActorId, _killer: Option<ActorId>) -> DeathVerdict {
        let Some(left) = self.lives.get_mut(&victim) else {
            return DeathVerdict::Unhandled;
        };
        *left = left.saturating_sub(1);
        if *left == 0 {
            return DeathVerdict::Eliminate;
        }
        cx.notify(victim, format!("{left} lives left"));
        DeathVerdict::Respawn
    }

    fn player_lives(&mut self) -> Option<&mut IndexMap<ActorId, u32>> {
        Some(&mut self.lives)
    }

    fn timed_scores(&self, _view: &ArenaView) -> IndexMap<ActorId, i64> {
        self.lives.iter().map(|(id, left)| (*id, i64::from(*left))).collect()
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

const WORLD: &str = "duel";
const ALICE: ActorId = ActorId(1);
const BOB: ActorId = ActorId(2);

async fn ticks(n: u64) {
    tokio::time::sleep(Duration::from_millis(50 * n + 10)).await;
}

#[tokio::main]
async fn main() -> Result<(), GladiusError> {
    init_tracing();

    let mut registry = ExtensionRegistry::new();
    registry.register(|r| {
        r.goal("lives", || Box::new(LivesGoal::default()));
    });

    let (server, handle) = ArenaServer::<ConsoleHost>::builder()
        .tick_rate(20)
        .registry(registry)
        .build(ConsoleHost::default())?;
    let server = tokio::spawn(server.run());

    let config = ArenaConfig {
        goal: "lives".into(),
        countdown_ticks: 20,
        end_delay_ticks: 20,
        ..ArenaConfig::default()
    };
    handle.create_arena("pit", config).await?;
    handle
        .add_region("pit", "ring", RegionKind::Battle, "cylinder", WORLD, (DVec3::ZERO, DVec3::new(20.0, 10.0, 20.0)))
        .await?;
    handle
        .add_region("pit", "lava", RegionKind::Custom, "cuboid", WORLD, (DVec3::new(9.0, 0.0, 9.0), DVec3::new(11.0, 1.0, 11.0)))
        .await?;
    handle
        .set_spawn("pit", "spawn", Location::new(WORLD, 3.0, 1.0, 10.0), None)
        .await?;
    handle
        .set_spawn("pit", "lounge", Location::new(WORLD, 10.0, 1.0, 40.0), None)
        .await?;
    handle.set_region_flag("pit", "lava", RegionFlag::Death, true).await?;
    handle.open("pit").await?;

    info!("alice and bob join");
    for actor in [ALICE, BOB] {
        handle.join(actor, "pit").await?;
        handle.ready(actor).await?;
    }
    ticks(20).await;
    info!(phase = %handle.view("pit").await?.phase, "countdown over");

    info!("alice steps into the lava");
    handle.moved(ALICE, Location::new(WORLD, 10.2, 0.5, 10.2)).await?;
    handle.died(ALICE, None).await?;

    info!("bob falls three times");
    for _ in 0..3 {
        handle.died(BOB, Some(ALICE)).await?;
    }
    info!(phase = %handle.view("pit").await?.phase, "fight decided");

    ticks(20).await;
    info!(phase = %handle.view("pit").await?.phase, "arena reset");

    handle.shutdown().await?;
    if server.await.is_err() {
        tracing::error!("server task failed");
    }
    Ok(())
}
