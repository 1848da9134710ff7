use crate::animation::state::AnimationState;
use crate::foundation::ids::{InstanceId, NativeId};
use crate::input::interactive::{InteractionState, Interactive};
use crate::scene::element::PropMap;
use crate::scene::props::{InstanceKind, InstanceProps};

/// A live node of the reconciled tree.
#[derive(Debug)]
pub struct Instance {
    pub(crate) kind: InstanceKind,
    pub(crate) key: Option<String>,
    /// Props as declared by the latest element, before any animation overlay.
    pub(crate) declared: PropMap,
    /// Last committed props (declared plus animation overlay), raw and typed.
    pub(crate) effective: PropMap,
    pub(crate) props: InstanceProps,
    pub(crate) native: Option<NativeId>,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) children: Vec<InstanceId>,
    pub(crate) animation: Option<AnimationState>,
    pub(crate) applied_animation: Option<u64>,
    pub(crate) interactive: Option<Interactive>,
    pub(crate) interaction: InteractionState,
}

impl Instance {
    pub(crate) fn new(kind: InstanceKind, declared: PropMap, props: InstanceProps) -> Self {
        Self {
            kind,
            key: None,
            effective: declared.clone(),
            declared,
            props,
            native: None,
            parent: None,
            children: Vec::new(),
            animation: None,
            applied_animation: None,
            interactive: None,
            interaction: InteractionState::default(),
        }
    }

    pub fn kind(&self) -> InstanceKind {
        self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn props(&self) -> &InstanceProps {
        &self.props
    }

    pub fn native(&self) -> Option<NativeId> {
        self.native
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn children(&self) -> &[InstanceId] {
        &self.children
    }

    pub fn animation(&self) -> Option<&AnimationState> {
        self.animation.as_ref()
    }

    pub fn interaction(&self) -> InteractionState {
        self.interaction
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    instance: Option<Instance>,
}

/// Generational slot storage for instances.
///
/// Freed slots are recycled through a free list; each reuse bumps the slot generation so stale
/// [`InstanceId`]s stop resolving.
#[derive(Debug, Default)]
pub struct InstanceArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl InstanceArena {
    pub fn insert(&mut self, instance: Instance) -> InstanceId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.instance = Some(instance);
            return InstanceId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            instance: Some(instance),
        });
        InstanceId {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, id: InstanceId) -> Option<Instance> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let instance = slot.instance.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(instance)
    }

    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.instance.as_ref()
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.instance.as_mut()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.instance.as_ref().map(|inst| {
                (
                    InstanceId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    inst,
                )
            })
        })
    }

    /// `true` when `ancestor == id` or `ancestor` is on `id`'s parent chain.
    pub fn is_self_or_ancestor(&self, ancestor: InstanceId, id: InstanceId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.get(c).and_then(|i| i.parent);
        }
        false
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reconcile/arena.rs"]
mod tests;
