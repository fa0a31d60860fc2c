//! Latch Runtime
//!
//! Headless driver for the entity storage engine: spawns a particle field,
//! runs movement and lifetime systems for a fixed number of ticks, and
//! reports storage statistics.
//!
//! Usage: `latch [storage-config.json]`. The config path may also come from
//! `LATCH_STORAGE_CONFIG`.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use latch_ecs::ecs::{
    ComponentRegistry, DeferredCommandBuffer, EntityBuilder, EntityManager, QueryBuilder,
};
use latch_ecs::StorageConfig;
use tracing::info;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Position {
    x: f32,
    y: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Velocity {
    x: f32,
    y: f32,
}

/// Ticks left before the particle is recycled.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Lifetime(u32);

/// Gravity shared by every particle of an emitter.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Gravity(f32);

const PARTICLES: u32 = 10_000;
const TICKS: u32 = 240;
const TICK_SECONDS: f32 = 1.0 / 60.0;

fn load_config() -> Result<StorageConfig> {
    let path = env::args().nth(1).or_else(|| env::var("LATCH_STORAGE_CONFIG").ok());
    match path {
        Some(path) => StorageConfig::from_json_file(&path)
            .with_context(|| format!("loading storage config from {path}")),
        None => Ok(StorageConfig::default()),
    }
}

fn particle(registry: &ComponentRegistry, i: u32) -> Result<latch_ecs::ecs::EntityBlueprint> {
    let angle = (i as f32 / PARTICLES as f32) * std::f32::consts::TAU;
    let emitter = if i % 2 == 0 { -9.8 } else { -1.6 };
    EntityBuilder::new(registry)
        .with(Position::default())
        .with(Velocity {
            x: angle.cos() * 4.0,
            y: angle.sin() * 4.0 + 5.0,
        })
        .with(Lifetime(60 + i % 120))
        .with_shared(Gravity(emitter))
        .build()
        .context("building particle blueprint")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    info!("Latch v{}", latch_ecs::VERSION);

    let config = load_config()?;
    info!(?config, "storage config");

    let mut registry = ComponentRegistry::new();
    registry.register::<Position>()?;
    registry.register::<Velocity>()?;
    registry.register::<Lifetime>()?;
    registry.register_shared::<Gravity>()?;
    let registry = Arc::new(registry);

    let mut manager = EntityManager::with_config(Arc::clone(&registry), config)?;
    for i in 0..PARTICLES {
        manager.spawn(&particle(&registry, i)?)?;
    }
    info!(
        entities = manager.entity_count(),
        archetypes = manager.archetype_count(),
        allocations = manager.allocation_count(),
        "spawned particles"
    );

    let movement = QueryBuilder::new(&registry)
        .write::<Position>()
        .write::<Velocity>()
        .shared_const::<Gravity>()
        .build()?;
    let aging = QueryBuilder::new(&registry).write::<Lifetime>().build()?;

    let mut recycled = 0usize;
    for tick in 0..TICKS {
        let moved = movement.par_for_each_chunk(&mut manager, |ctx| {
            let gravity = ctx.shared_fragment::<Gravity>().map_or(0.0, |g| g.0);
            let velocities = ctx.fragment_mut::<Velocity>();
            for (p, v) in ctx.fragment_mut::<Position>().iter_mut().zip(velocities.iter_mut()) {
                v.y += gravity * TICK_SECONDS;
                p.x += v.x * TICK_SECONDS;
                p.y += v.y * TICK_SECONDS;
            }
        });
        debug_assert!(moved.is_empty());

        let mut commands = DeferredCommandBuffer::new();
        aging.for_each_chunk(&mut manager, &mut commands, |ctx| {
            for (entity, lifetime) in ctx.entities().iter().zip(ctx.fragment_mut::<Lifetime>()) {
                lifetime.0 = lifetime.0.saturating_sub(1);
                if lifetime.0 == 0 {
                    ctx.queue_destroy(*entity);
                }
            }
        });

        let expired = commands.len() as u32;
        for i in 0..expired {
            commands.spawn(particle(&registry, tick.wrapping_mul(31).wrapping_add(i))?);
        }
        let report = manager.flush_deferred(commands)?;
        recycled += report.created.len();
        for failure in &report.failures {
            tracing::warn!(index = failure.index, command = failure.command, error = %failure.error, "command failed");
        }
    }

    let released = manager.compact();
    let memory = manager.memory();
    info!(
        ticks = TICKS,
        recycled,
        released,
        entities = manager.entity_count(),
        allocations = manager.allocation_count(),
        reserved_bytes = memory.reserved_bytes(),
        peak_reserved_bytes = memory.peak_reserved_bytes(),
        "simulation finished"
    );

    latch_metrics::metrics! {
        for (name, value) in manager.counters().iter() {
            info!(counter = name, value, "storage counter");
        }
    }

    Ok(())
}
