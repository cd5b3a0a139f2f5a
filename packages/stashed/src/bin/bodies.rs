use std::collections::HashMap;
use std::io::Write;

use rayon::iter::ParallelIterator;
use tracing_subscriber::EnvFilter;

use stashed::{component, EntityID, Filter, FilterDescriptor, System, SystemGroup, World};

const G: f32 = 10.0;
const TIME_STEP: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Position(f32, f32);
component!(Position);

#[derive(Debug, Clone, Copy, Default)]
pub struct Velocity(f32, f32);
component!(Velocity);

#[derive(Debug, Clone, Copy, Default)]
pub struct Mass(f32);
component!(Mass);

/// Marks bodies which have collided and stopped attracting others.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collapsed;
component!(Collapsed);

#[derive(Default)]
struct ApplyAcceleration {
    bodies: Option<Filter>,
}

impl System for ApplyAcceleration {
    fn on_awake(&mut self, world: &mut World) {
        self.bodies = Some(world.create_filter(FilterDescriptor::new()
            .with::<Position>()
            .with::<Velocity>()
            .with::<Mass>()
            .without::<Collapsed>()));
    }

    fn on_update(&mut self, world: &mut World, _delta: f32) {
        let bodies = match self.bodies {
            Some(bodies) => bodies,
            None => return,
        };

        let snapshot: Vec<(EntityID, Position, Mass)> = world.entities(&bodies)
            .filter_map(|id| Some((id, *world.get::<Position>(id).ok()?, *world.get::<Mass>(id).ok()?)))
            .collect();

        let updates: Vec<(EntityID, Option<Velocity>)> = world.par_entities(&bodies)
            .map(|id_a| {
                let Position(x_a, y_a) = world.get::<Position>(id_a).copied().unwrap_or_default();
                let mut velocity = world.get::<Velocity>(id_a).copied().unwrap_or_default();

                for (id_b, Position(x_b, y_b), Mass(m_b)) in snapshot.iter().copied() {
                    if id_b == id_a || m_b < 0.00001 {
                        continue;
                    }

                    let dx = x_b - x_a;
                    let dy = y_b - y_a;
                    let r2 = dx * dx + dy * dy;

                    // Bodies are overlapped!
                    if r2 < 0.0005 {
                        return (id_a, None);
                    }

                    let a = (G * m_b) / r2;
                    let r = r2.sqrt();
                    velocity.0 += TIME_STEP * ((dx * a) / r);
                    velocity.1 += TIME_STEP * ((dy * a) / r);
                }

                (id_a, Some(velocity))
            })
            .collect();

        for (id, velocity) in updates {
            let result = match velocity {
                Some(velocity) => world.set(id, velocity),
                None => world.set(id, Collapsed),
            };

            if let Err(err) = result {
                tracing::warn!(%err, "failed to update body");
            }
        }
    }
}

#[derive(Default)]
struct ApplyVelocity {
    moving: Option<Filter>,
}

impl System for ApplyVelocity {
    fn on_awake(&mut self, world: &mut World) {
        self.moving = Some(world.create_filter(FilterDescriptor::new()
            .with::<Position>()
            .with::<Velocity>()));
    }

    fn on_update(&mut self, world: &mut World, delta: f32) {
        let moving = match self.moving {
            Some(moving) => moving,
            None => return,
        };

        let ids: Vec<_> = world.entities(&moving).collect();
        for id in ids {
            let Velocity(vx, vy) = match world.get::<Velocity>(id) {
                Ok(velocity) => *velocity,
                Err(_) => continue,
            };

            if let Ok(Position(x, y)) = world.get_mut::<Position>(id) {
                *x += delta * vx;
                *y += delta * vy;
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut world = World::new();

    // Populate world!
    {
        const SQRT_NUM_ENTITIES: usize = 8;
        const SCALE: f32 = 2.0 / ((SQRT_NUM_ENTITIES - 1) as f32);

        for x in 0..SQRT_NUM_ENTITIES {
            for y in 0..SQRT_NUM_ENTITIES {
                let x = ((x as f32) * SCALE) - 1.0;
                let y = ((y as f32) * SCALE) - 1.0;

                let vx = y * 0.003;
                let vy = -x * 0.003;

                let id = world.create();
                world.set(id, Mass(0.00001))?;
                world.set(id, Position(x, y))?;
                world.set(id, Velocity(vx, vy))?;
            }
        }

        world.commit();
    }

    let mut systems = SystemGroup::new()
        .with(ApplyAcceleration::default())
        .with(ApplyVelocity::default());

    const SIZE: (i32, i32) = (500, 500);
    const OFFSET: (f32, f32) = (250.0, 250.0);
    const SCALE: (f32, f32) = (200.0, 200.0);
    const NUM_ITER: usize = 100;

    let tracked = world.create_filter(FilterDescriptor::new().with::<Position>().with::<Velocity>());
    let mut dest = std::io::stdout();
    let mut last_positions = HashMap::new();

    writeln!(&mut dest, "<?xml version=\"1.0\" standalone=\"no\"?>")?;
    writeln!(&mut dest, "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.0//EN\" \"http://www.w3.org/TR/2001/REC-SVG-20010904/DTD/svg10.dtd\">")?;
    write!(&mut dest, "<svg xmlns=\"http://www.w3.org/2000/svg\" height=\"{}\" width=\"{}\">", SIZE.0, SIZE.1)?;
    write!(&mut dest, "<rect width=\"100%\" height=\"100%\" fill=\"black\"/>")?;

    for _ in 0..NUM_ITER {
        for _ in 0..10usize {
            systems.update(&mut world, TIME_STEP);
        }

        // Render result!
        for id in world.entities(&tracked) {
            let Position(x, y) = *world.get::<Position>(id)?;
            let Velocity(vx, vy) = *world.get::<Velocity>(id)?;
            let v2 = (vx * vx + vy * vy).sqrt();
            let a = 1.0 - (v2 / 0.03).max(0.0).min(0.7);

            if let Some((lx, ly)) = last_positions.get(&id) {
                let x1 = lx * SCALE.0 + OFFSET.0;
                let y1 = ly * SCALE.1 + OFFSET.1;
                let x2 = x * SCALE.0 + OFFSET.0;
                let y2 = y * SCALE.1 + OFFSET.1;

                write!(&mut dest,
                       "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" style=\"stroke:rgba(255,0,0,{});stroke-width:1\" />",
                       x1, y1, x2, y2, a)?;
            }

            last_positions.insert(id, (x, y));
        }
    }

    write!(&mut dest, "</svg>")?;
    systems.dispose(&mut world);
    Ok(())
}
