use stashed::{component, EntityID, FilterDescriptor, World};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default)]
pub struct MyComponent(i32);

component!(MyComponent);

#[derive(Debug, Clone, Copy, Default)]
pub struct Marked;

component!(Marked);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut world = World::new();
    let filter = world.create_filter(FilterDescriptor::new().with::<MyComponent>());
    let mut to_remove: Vec<EntityID> = Vec::new();
    let mut to_destroy: Vec<EntityID> = Vec::new();

    for _ in 0..8 {
        for id in to_remove.drain(..) {
            world.remove::<MyComponent>(id)?;
            world.set(id, Marked)?;
        }

        for id in to_destroy.drain(..) {
            world.destroy(id)?;
        }

        for idx in 0..512 {
            let id = world.create();
            world.set(id, MyComponent(32))?;

            if idx % 12 == 11 {
                to_remove.push(id);
            } else if idx % 7 == 6 {
                to_destroy.push(id);
            }
        }

        let stats = world.commit();
        println!("{:?}: {} matched", stats, world.filter_len(&filter));
    }

    println!("world: {:?}", world);
    Ok(())
}
