//! # Archetype Storage
//!
//! An archetype stores every entity that shares one exact component
//! signature, organized as struct-of-arrays: one type-erased column per
//! component type plus a parallel column of entity handles.
//!
//! ## Design
//! - Columns are ordered by the signature's canonical (ascending id) order,
//!   so a component's position in the signature is its local column index.
//! - Entities are densely packed using swap-remove semantics; removal
//!   reorders rows.
//! - All columns and the entity column share one backing capacity, grown in
//!   powers of two from a minimum of 8 and rewritten on demand by
//!   [`Archetype::resize_backing_arrays`].
//!
//! ## Invariants
//! - For every row `s` in `[0, entity_count)`, `entities[s]` is a live
//!   handle whose entity record points back to this archetype with slot
//!   index `s`.
//! - `entity_count <= capacity`; every column holds exactly `entity_count`
//!   rows.
//!
//! Row moves between archetypes are orchestrated by the world's
//! structure-event handler; this module only provides the aligned
//! per-column primitives.

use tracing::trace;

use crate::engine::component::make_column;
use crate::engine::storage::{ColumnStorage, ComponentBuffer, ErasedValue};
use crate::engine::types::{
    column_capacity_for, ArchetypeId, ComponentTypeId, Entity, Signature,
};

/// Stores entities that share an identical component signature.
pub struct Archetype {
    id: ArchetypeId,
    signature: Signature,
    entities: Vec<Entity>,
    columns: Vec<Box<dyn ComponentBuffer>>,
    capacity: usize,
}

impl Archetype {
    /// Creates a new empty archetype for `signature`.
    ///
    /// ## Behavior
    /// - Allocates one empty column per id in the signature, in canonical
    ///   order, using the registered storage factories.
    /// - No backing capacity is reserved until the first row is appended.
    pub(crate) fn new(id: ArchetypeId, signature: Signature) -> Self {
        let columns = signature.iter().map(make_column).collect();
        trace!(
            world = id.world.index(),
            archetype = id.index,
            components = signature.len(),
            "archetype created"
        );
        Self {
            id,
            signature,
            entities: Vec::new(),
            columns,
            capacity: 0,
        }
    }

    /// Returns the handle of this archetype.
    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Returns the canonical signature of this archetype.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns the number of live rows.
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the shared backing capacity of all columns.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the entity handle column.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Returns `true` if the signature contains `component_id`.
    #[inline]
    pub fn has(&self, component_id: ComponentTypeId) -> bool {
        self.signature.contains(component_id)
    }

    /// Returns the local column index of `component_id`, if present.
    #[inline]
    pub fn column_position(&self, component_id: ComponentTypeId) -> Option<usize> {
        self.signature.position_of(component_id)
    }

    /// Returns the number of component columns.
    #[inline]
    pub(crate) fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the component type id of the column at `position`.
    #[inline]
    pub(crate) fn column_type_id(&self, position: usize) -> ComponentTypeId {
        self.signature.ids()[position]
    }

    /// Returns the typed column for component `T`, if present.
    pub fn column_slice<T: Send + Sync + 'static>(&self) -> Option<&[T]> {
        let position = self.column_position(crate::engine::component::type_id_of::<T>())?;
        self.columns[position]
            .as_any()
            .downcast_ref::<ColumnStorage<T>>()
            .map(ColumnStorage::as_slice)
    }

    /// Returns the mutable typed column for component `T`, if present.
    pub fn column_slice_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut [T]> {
        let position = self.column_position(crate::engine::component::type_id_of::<T>())?;
        self.columns[position]
            .as_any_mut()
            .downcast_mut::<ColumnStorage<T>>()
            .map(ColumnStorage::as_mut_slice)
    }

    /// Returns the type-erased column at `position`.
    #[inline]
    pub(crate) fn column_mut_by_position(&mut self, position: usize) -> &mut dyn ComponentBuffer {
        self.columns[position].as_mut()
    }

    /// Grows every column (and the entity column) to hold at least
    /// `capacity` rows, rounded up to a power of two with a minimum of 8.
    /// Never shrinks.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let target = column_capacity_for(capacity);
        if target <= self.capacity {
            return;
        }
        self.entities.reserve_exact(target - self.entities.len());
        for column in &mut self.columns {
            column.ensure_capacity(target);
        }
        self.capacity = target;
    }

    /// Rewrites all backing arrays to the smallest power of two that holds
    /// the current rows, with a minimum of 8.
    pub fn resize_backing_arrays(&mut self) {
        let target = column_capacity_for(self.entities.len());
        if self.entities.capacity() > target {
            self.entities.shrink_to(target);
        }
        if self.entities.capacity() < target {
            self.entities.reserve_exact(target - self.entities.len());
        }
        for column in &mut self.columns {
            column.set_capacity(target);
        }
        self.capacity = target;
    }

    /// Makes room for one more row if the archetype is at capacity.
    #[inline]
    fn reserve_for_push(&mut self) {
        if self.entities.len() == self.capacity {
            self.ensure_capacity(self.entities.len() + 1);
        }
    }

    /// Appends `entity` to the handle column and returns its row slot.
    ///
    /// Component columns must be brought to the same length by the caller
    /// before the operation completes.
    pub(crate) fn append_entity(&mut self, entity: Entity) -> usize {
        self.reserve_for_push();
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Swap-removes the handle at `slot`, returning the entity that was
    /// moved into its place, if any. The caller must rewrite the moved
    /// entity's slot index in the entity table.
    pub(crate) fn swap_remove_entity(&mut self, slot: usize) -> Option<Entity> {
        self.entities.swap_remove(slot);
        if slot < self.entities.len() {
            Some(self.entities[slot])
        } else {
            None
        }
    }

    /// Moves the component values at `slot` into `destination`.
    ///
    /// ## Behavior
    /// - Columns whose type also exists in the destination transfer their
    ///   value with a cross-buffer move (append to destination, swap-remove
    ///   locally).
    /// - Columns absent from the destination are swap-removed and dropped.
    /// - `skip` names a column the caller has already compacted (the removed
    ///   component during a remove operation).
    ///
    /// All destination columns receive their value at the same row; the
    /// caller appends the entity handle there first.
    pub(crate) fn move_columns_to(
        &mut self,
        destination: &mut Archetype,
        slot: usize,
        skip: Option<ComponentTypeId>,
    ) {
        for position in 0..self.columns.len() {
            let component_id = self.signature.ids()[position];
            if Some(component_id) == skip {
                continue;
            }
            match destination.column_position(component_id) {
                Some(destination_position) => {
                    self.columns[position]
                        .move_to(slot, destination.columns[destination_position].as_mut());
                }
                None => self.columns[position].swap_remove(slot),
            }
        }
    }

    /// Takes all values of the column at `position` in row order.
    ///
    /// Used while tearing an archetype down to stage remove-callback
    /// payloads; leaves the column empty.
    pub(crate) fn drain_column(&mut self, position: usize) -> Vec<Box<ErasedValue>> {
        self.columns[position].drain_boxed()
    }
}
