use stashed::{component, FilterDescriptor, World, WorldConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default)]
pub struct MyComponent(i32);

component!(MyComponent);

#[derive(Debug, Clone, Copy, Default)]
pub struct Hidden;

component!(Hidden);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut world = World::with_config(WorldConfig::new().with_name("example"));
    let visible = world.create_filter(FilterDescriptor::new()
        .with::<MyComponent>()
        .without::<Hidden>());

    let entity = world.create();
    world.set(entity, MyComponent(3))?;
    println!("before commit: {} visible", world.filter_len(&visible));

    let stats = world.commit();
    println!("commit: {:?}", stats);
    println!("entity: {:?} = {:?}", entity, world.get::<MyComponent>(entity)?);

    for component in world.component_types(entity)?.as_slice() {
        println!("component: {:?}", component);
    }

    world.set(entity, Hidden)?;
    world.commit();
    println!("after hiding: {} visible", world.filter_len(&visible));
    println!("world: {:?}", world);

    Ok(())
}
