//! Entity/component registry.
//!
//! Entities are generational handles; components are plain value structs
//! stored per-type and joined by capability set. The registry has no
//! internal locking: it is owned by exactly one consuming thread.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// A generational entity handle. The index is recycled through a FIFO free
/// list; the generation is bumped on despawn so stale handles never alias a
/// live entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    #[inline]
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

trait AnyStore {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn remove_index(&mut self, index: u32);
}

struct SparseStore<T: 'static> {
    data: HashMap<u32, T>,
}

impl<T: 'static> SparseStore<T> {
    fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }
}

impl<T: 'static> AnyStore for SparseStore<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove_index(&mut self, index: u32) {
        self.data.remove(&index);
    }
}

#[derive(Default)]
pub struct Registry {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
    stores: HashMap<TypeId, Box<dyn AnyStore>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_indices: VecDeque::new(),
            stores: HashMap::new(),
        }
    }

    pub fn spawn(&mut self) -> Entity {
        if let Some(index) = self.free_indices.pop_front() {
            self.alive[index as usize] = true;
            Entity::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            Entity::new(index, 0)
        }
    }

    /// Despawn an entity and drop every component attached to it. A stale
    /// or dead handle is a no-op.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        for store in self.stores.values_mut() {
            store.remove_index(entity.index);
        }
        self.alive[entity.index as usize] = false;
        self.generations[entity.index as usize] =
            self.generations[entity.index as usize].wrapping_add(1);
        self.free_indices.push_back(entity.index);
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        let index = entity.index as usize;
        index < self.generations.len()
            && self.alive[index]
            && self.generations[index] == entity.generation
    }

    pub fn len(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attach<T: 'static>(&mut self, entity: Entity, component: T) {
        if !self.is_alive(entity) {
            return;
        }
        let store = self
            .stores
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(SparseStore::<T>::new()));
        if let Some(store) = store.as_any_mut().downcast_mut::<SparseStore<T>>() {
            store.data.insert(entity.index, component);
        }
    }

    pub fn detach<T: 'static>(&mut self, entity: Entity) -> Option<T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.store_mut::<T>()?.data.remove(&entity.index)
    }

    pub fn get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.store::<T>()?.data.get(&entity.index)
    }

    pub fn get_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.store_mut::<T>()?.data.get_mut(&entity.index)
    }

    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Entities currently owning a component of type `T`.
    pub fn entities_with<T: 'static>(&self) -> Vec<Entity> {
        let Some(store) = self.store::<T>() else {
            return Vec::new();
        };
        store
            .data
            .keys()
            .map(|&index| Entity::new(index, self.generations[index as usize]))
            .collect()
    }

    /// Visit every live entity owning both `A` and `B`.
    pub fn join2_mut<A: 'static, B: 'static>(&mut self, mut f: impl FnMut(Entity, &mut A, &mut B)) {
        let ids = [&TypeId::of::<A>(), &TypeId::of::<B>()];
        if ids[0] == ids[1] {
            return;
        }
        let [sa, sb] = self.stores.get_disjoint_mut(ids);
        let (Some(sa), Some(sb)) = (sa, sb) else {
            return;
        };
        let Some(sa) = sa.as_any_mut().downcast_mut::<SparseStore<A>>() else {
            return;
        };
        let Some(sb) = sb.as_any_mut().downcast_mut::<SparseStore<B>>() else {
            return;
        };
        for (&index, a) in sa.data.iter_mut() {
            if let Some(b) = sb.data.get_mut(&index) {
                f(Entity::new(index, self.generations[index as usize]), a, b);
            }
        }
    }

    /// Visit every live entity owning `A`, `B` and `C`.
    pub fn join3_mut<A: 'static, B: 'static, C: 'static>(
        &mut self,
        mut f: impl FnMut(Entity, &mut A, &mut B, &mut C),
    ) {
        let ids = [&TypeId::of::<A>(), &TypeId::of::<B>(), &TypeId::of::<C>()];
        if ids[0] == ids[1] || ids[0] == ids[2] || ids[1] == ids[2] {
            return;
        }
        let [sa, sb, sc] = self.stores.get_disjoint_mut(ids);
        let (Some(sa), Some(sb), Some(sc)) = (sa, sb, sc) else {
            return;
        };
        let Some(sa) = sa.as_any_mut().downcast_mut::<SparseStore<A>>() else {
            return;
        };
        let Some(sb) = sb.as_any_mut().downcast_mut::<SparseStore<B>>() else {
            return;
        };
        let Some(sc) = sc.as_any_mut().downcast_mut::<SparseStore<C>>() else {
            return;
        };
        for (&index, a) in sa.data.iter_mut() {
            if let (Some(b), Some(c)) = (sb.data.get_mut(&index), sc.data.get_mut(&index)) {
                f(
                    Entity::new(index, self.generations[index as usize]),
                    a,
                    b,
                    c,
                );
            }
        }
    }

    fn store<T: 'static>(&self) -> Option<&SparseStore<T>> {
        self.stores
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<SparseStore<T>>()
    }

    fn store_mut<T: 'static>(&mut self) -> Option<&mut SparseStore<T>> {
        self.stores
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<SparseStore<T>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Label(&'static str);

    #[derive(Debug, PartialEq)]
    struct Score(i32);

    #[test]
    fn test_spawn_despawn_lifecycle() {
        let mut registry = Registry::new();
        let a = registry.spawn();
        let b = registry.spawn();
        assert_eq!(registry.len(), 2);
        assert!(registry.is_alive(a));

        assert!(registry.despawn(a));
        assert!(!registry.is_alive(a));
        assert!(registry.is_alive(b));
        assert_eq!(registry.len(), 1);

        // Double despawn is a no-op.
        assert!(!registry.despawn(a));
    }

    #[test]
    fn test_recycled_index_gets_new_generation() {
        let mut registry = Registry::new();
        let a = registry.spawn();
        registry.attach(a, Label("old"));
        registry.despawn(a);

        let b = registry.spawn();
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());

        // The stale handle must not reach the new entity's slot.
        assert!(!registry.is_alive(a));
        assert_eq!(registry.get::<Label>(a), None);
        assert_eq!(registry.get::<Label>(b), None);
    }

    #[test]
    fn test_attach_get_detach() {
        let mut registry = Registry::new();
        let e = registry.spawn();
        registry.attach(e, Label("hello"));
        registry.attach(e, Score(7));

        assert_eq!(registry.get::<Label>(e), Some(&Label("hello")));
        registry.get_mut::<Score>(e).unwrap().0 += 1;
        assert_eq!(registry.get::<Score>(e), Some(&Score(8)));

        assert_eq!(registry.detach::<Label>(e), Some(Label("hello")));
        assert_eq!(registry.get::<Label>(e), None);
        assert!(registry.has::<Score>(e));
    }

    #[test]
    fn test_despawn_drops_components() {
        let mut registry = Registry::new();
        let e = registry.spawn();
        registry.attach(e, Label("gone"));
        registry.despawn(e);
        assert_eq!(registry.get::<Label>(e), None);
        assert!(registry.entities_with::<Label>().is_empty());
    }

    #[test]
    fn test_join_visits_capability_set_only() {
        let mut registry = Registry::new();
        let both = registry.spawn();
        registry.attach(both, Label("both"));
        registry.attach(both, Score(1));
        let label_only = registry.spawn();
        registry.attach(label_only, Label("label"));

        let mut visited = Vec::new();
        registry.join2_mut(|entity, label: &mut Label, score: &mut Score| {
            visited.push(entity);
            score.0 += 1;
            assert_eq!(label.0, "both");
        });
        assert_eq!(visited, vec![both]);
        assert_eq!(registry.get::<Score>(both), Some(&Score(2)));
    }

    #[test]
    fn test_join3_requires_all_three() {
        let mut registry = Registry::new();
        let full = registry.spawn();
        registry.attach(full, Label("full"));
        registry.attach(full, Score(0));
        registry.attach(full, 1.5f32);
        let partial = registry.spawn();
        registry.attach(partial, Label("partial"));
        registry.attach(partial, Score(0));

        let mut count = 0;
        registry.join3_mut(|_, _: &mut Label, _: &mut Score, x: &mut f32| {
            count += 1;
            *x *= 2.0;
        });
        assert_eq!(count, 1);
        assert_eq!(registry.get::<f32>(full), Some(&3.0));
    }
}
