use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use archetype_ecs::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Health(u32);

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn set_component_creates_singleton_archetype() {
    let world = create_world("lifecycle-s1");
    let position_id = type_id_of::<Position>();

    with_world(world, |w| {
        let entity = w.create_entity();
        w.set(entity, Position { x: 1.0, y: 2.0 });

        assert_eq!(w.entity_count(), 1);
        assert_eq!(w.get::<Position>(entity), Some(&Position { x: 1.0, y: 2.0 }));

        let archetype = w
            .try_get_archetype(&Signature::of(&[position_id]))
            .expect("archetype {Position} should exist");
        let archetype = w.archetype(archetype).unwrap();
        assert_eq!(archetype.entity_count(), 1);
        assert_eq!(archetype.entities()[0], entity);
        assert_eq!(archetype.signature().ids(), &[position_id]);
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn adding_component_moves_entity_to_extended_archetype() {
    let world = create_world("lifecycle-s2");
    let position_id = type_id_of::<Position>();
    let velocity_id = type_id_of::<Velocity>();

    with_world(world, |w| {
        let entity = w.create_entity();
        w.set(entity, Position { x: 1.0, y: 2.0 });
        w.set(entity, Velocity { dx: 3.0, dy: 4.0 });

        // The value written first must survive the migration.
        assert_eq!(w.get::<Position>(entity), Some(&Position { x: 1.0, y: 2.0 }));
        assert_eq!(w.get::<Velocity>(entity), Some(&Velocity { dx: 3.0, dy: 4.0 }));

        let extended = w
            .try_get_archetype(&Signature::of(&[velocity_id, position_id]))
            .expect("archetype {Position, Velocity} should exist");
        assert_eq!(w.archetype(extended).unwrap().entity_count(), 1);

        let narrow = w
            .try_get_archetype(&Signature::of(&[position_id]))
            .expect("archetype {Position} should still exist");
        assert_eq!(w.archetype(narrow).unwrap().entity_count(), 0);
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn destroy_fires_remove_callback_and_invalidates_handle() {
    let world = create_world("lifecycle-s3");
    let observed: Arc<Mutex<Vec<(Entity, Position)>>> = Arc::new(Mutex::new(Vec::new()));

    let entity = with_world(world, |w| {
        let sink = Arc::clone(&observed);
        w.on_remove::<Position, _>(move |_w, entity, removed| {
            sink.lock().unwrap().push((entity, *removed));
        });

        let entity = w.create_entity();
        w.set(entity, Position { x: 1.0, y: 2.0 });
        w.destroy_entity(entity);

        assert!(!w.is_alive(entity));
        assert_eq!(w.entity_count(), 0);
        entity
    })
    .unwrap();

    {
        let observed = observed.lock().unwrap();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0], (entity, Position { x: 1.0, y: 2.0 }));
    }

    // A later allocation may reuse the slot index, always with a greater
    // version; the stale handle never resolves again.
    with_world(world, |w| {
        for _ in 0..4096 {
            let fresh = w.create_entity();
            assert_ne!(fresh, entity);
            if fresh.index() == entity.index() {
                assert!(fresh.version() > entity.version());
                break;
            }
        }
        assert!(!w.is_alive(entity));
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn surviving_entities_keep_their_handles_across_swap_removes() {
    let world = create_world("lifecycle-handle-stability");

    with_world(world, |w| {
        let first = w.create_entity();
        let second = w.create_entity();
        let third = w.create_entity();
        w.set(first, Health(1));
        w.set(second, Health(2));
        w.set(third, Health(3));

        // Destroying the first entity swap-moves the last one into its row.
        w.destroy_entity(first);

        assert!(!w.is_alive(first));
        assert!(w.is_alive(second));
        assert!(w.is_alive(third));
        assert_eq!(w.get::<Health>(second), Some(&Health(2)));
        assert_eq!(w.get::<Health>(third), Some(&Health(3)));

        // Mutation through the surviving handles lands on the right rows.
        w.set(third, Health(30));
        assert_eq!(w.get::<Health>(third), Some(&Health(30)));
        assert_eq!(w.get::<Health>(second), Some(&Health(2)));
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn signatures_are_canonical_under_reordering() {
    let a = type_id_of::<Position>();
    let b = type_id_of::<Velocity>();
    let c = type_id_of::<Health>();

    let forward = Signature::of(&[a, b, c]);
    let shuffled = Signature::of(&[c, a, b]);

    assert_eq!(forward, shuffled);
    assert_eq!(hash_of(&forward), hash_of(&shuffled));

    let mut built = Signature::new();
    built.add(c);
    built.add(a);
    built.add(a); // duplicate insert is idempotent
    built.add(b);
    assert_eq!(built, forward);

    built.remove(b);
    built.remove(b); // duplicate remove is idempotent
    assert_eq!(built, Signature::of(&[a, c]));
}

#[test]
fn entity_count_matches_sum_of_archetype_counts() {
    let world = create_world("lifecycle-count-conservation");

    with_world(world, |w| {
        let check = |w: &World| {
            let total: usize = w.archetypes().map(|a| a.entity_count()).sum();
            assert_eq!(w.entity_count(), total);
            // Every handle stored in an archetype row must resolve back to
            // this world.
            for archetype in w.archetypes() {
                assert!(archetype.entity_count() <= archetype.capacity());
                for &entity in archetype.entities() {
                    assert!(w.is_alive(entity));
                }
            }
        };

        let mut entities = Vec::new();
        for i in 0..32 {
            let entity = w.create_entity();
            w.set(entity, Health(i));
            if i % 2 == 0 {
                w.set(entity, Position { x: i as f32, y: 0.0 });
            }
            entities.push(entity);
            check(w);
        }

        for entity in entities.iter().step_by(3) {
            w.destroy_entity(*entity);
            check(w);
        }

        for entity in entities.iter().filter(|e| w.is_alive(**e)) {
            assert!(w.get::<Health>(*entity).is_some());
        }
        check(w);
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn structure_update_count_tracks_archetype_creation_and_destruction() {
    let world = create_world("lifecycle-update-counter");

    with_world(world, |w| {
        let before = w.structure_update_count();

        let entity = w.create_entity(); // creates the empty archetype
        let after_empty = w.structure_update_count();
        assert_eq!(after_empty, before + 1);

        w.set(entity, Position::default()); // creates {Position}
        assert_eq!(w.structure_update_count(), after_empty + 1);

        w.set(entity, Position { x: 9.0, y: 9.0 }); // in-place, no new slot
        assert_eq!(w.structure_update_count(), after_empty + 1);

        w.destroy_entity(entity);
        let before_cleanup = w.structure_update_count();
        w.destroy_empty_archetypes();
        // Both the empty archetype and {Position} were empty.
        assert_eq!(w.structure_update_count(), before_cleanup + 2);
        assert_eq!(w.archetype_count(), 0);
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn destroyed_archetype_slots_are_reused_with_new_versions() {
    let world = create_world("lifecycle-archetype-reuse");
    let position_id = type_id_of::<Position>();

    with_world(world, |w| {
        let entity = w.create_entity();
        w.set(entity, Position::default());
        let first = w.try_get_archetype(&Signature::of(&[position_id])).unwrap();

        w.destroy_entity(entity);
        w.destroy_archetype(first);
        assert!(w.archetype(first).is_none());

        let entity = w.create_entity();
        w.set(entity, Position::default());
        let second = w.try_get_archetype(&Signature::of(&[position_id])).unwrap();
        assert!(w.archetype(second).is_some());
        if second.index == first.index {
            assert!(second.version > first.version);
        }
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn resize_backing_arrays_shrinks_to_power_of_two() {
    let world = create_world("lifecycle-resize");
    let health_id = type_id_of::<Health>();

    with_world(world, |w| {
        let mut entities = Vec::new();
        for i in 0..100 {
            let entity = w.create_entity();
            w.set(entity, Health(i));
            entities.push(entity);
        }

        let archetype = w.try_get_archetype(&Signature::of(&[health_id])).unwrap();
        assert_eq!(w.archetype(archetype).unwrap().capacity(), 128);

        for entity in entities.drain(..95) {
            w.destroy_entity(entity);
        }
        assert_eq!(w.archetype(archetype).unwrap().entity_count(), 5);
        assert_eq!(w.archetype(archetype).unwrap().capacity(), 128);

        w.resize_backing_arrays();
        assert_eq!(w.archetype(archetype).unwrap().capacity(), 8);
    })
    .unwrap();

    destroy_world(world);
}

#[test]
fn stale_world_handles_do_not_resolve() {
    let world = create_world("lifecycle-world-validity");
    assert!(is_world_valid(world));
    assert_eq!(world_name(world).as_deref(), Some("lifecycle-world-validity"));

    let counter = Arc::new(AtomicUsize::new(0));
    {
        let counter = Arc::clone(&counter);
        with_world(world, move |w| {
            w.create_entity();
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    assert!(destroy_world(world));
    assert!(!is_world_valid(world));
    assert!(with_world(world, |_| ()).is_none());
    assert!(try_with_world(world, |_| ()).is_err());
    assert!(world_name(world).is_none());
    assert!(!destroy_world(world));
}

#[test]
fn worlds_are_discoverable_by_name() {
    let world = get_or_create_world("lifecycle-named");
    assert_eq!(find_world("lifecycle-named"), Some(world));
    assert_eq!(get_or_create_world("lifecycle-named"), world);
    assert!(all_worlds().contains(&world));

    destroy_world(world);
    assert!(find_world("lifecycle-named").is_none());
}

#[test]
fn null_handles_never_resolve() {
    let world = create_world("lifecycle-null");
    with_world(world, |w| {
        assert!(!w.is_alive(Entity::NULL));
        assert!(w.get::<Position>(Entity::NULL).is_none());
        w.destroy_entity(Entity::NULL); // silent no-op
        w.set(Entity::NULL, Health(1)); // silent no-op
        assert_eq!(w.entity_count(), 0);
    })
    .unwrap();

    assert!(!is_world_valid(WorldId::NULL));
    assert!(with_world(WorldId::NULL, |_| ()).is_none());

    destroy_world(world);
}
