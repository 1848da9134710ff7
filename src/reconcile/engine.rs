use std::collections::{HashMap, HashSet, VecDeque};

use crate::animation::state::AnimationState;
use crate::animation::values::{AnimValues, Lerp};
use crate::assets::manifest::TextureResolver;
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::{InstanceId, NativeId};
use crate::input::interactive::{self, InteractionState};
use crate::input::pointer::PointerPipeline;
use crate::reconcile::arena::{Instance, InstanceArena};
use crate::render::adapter::RenderAdapter;
use crate::scene::element::{Element, PropMap, PropValue};
use crate::scene::props::{InstanceKind, InstanceProps};

/// One change applied to the instance tree during a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Create { id: InstanceId, kind: InstanceKind },
    Update { id: InstanceId, kind: InstanceKind },
    Destroy { id: InstanceId, kind: InstanceKind },
    /// `child`'s native object was added to `parent`'s.
    Attach { parent: InstanceId, child: InstanceId },
    Detach { parent: InstanceId, child: InstanceId },
    /// `child` was moved within `parent` to match declaration order.
    Reorder { parent: InstanceId, child: InstanceId },
}

/// Everything a reconciliation pass did, in the order it was done.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommitLog {
    pub mutations: Vec<Mutation>,
}

impl CommitLog {
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn created(&self) -> usize {
        self.count(|m| matches!(m, Mutation::Create { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|m| matches!(m, Mutation::Update { .. }))
    }

    pub fn destroyed(&self) -> usize {
        self.count(|m| matches!(m, Mutation::Destroy { .. }))
    }

    /// Instances that no longer exist after this pass.
    pub fn removed(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Destroy { id, .. } => Some(*id),
            _ => None,
        })
    }

    fn count(&self, f: impl Fn(&Mutation) -> bool) -> usize {
        self.mutations.iter().filter(|m| f(m)).count()
    }
}

/// Owns the persistent instance tree and keeps it in sync with declared [`Element`] trees.
#[derive(Debug, Default)]
pub struct Reconciler {
    arena: InstanceArena,
    root: Option<InstanceId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<InstanceId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.arena.get(id)
    }

    pub fn animation_mut(&mut self, id: InstanceId) -> Option<&mut AnimationState> {
        self.arena.get_mut(id)?.animation.as_mut()
    }

    /// First instance carrying `key`, in depth-first document order.
    pub fn find_by_key(&self, key: &str) -> Option<InstanceId> {
        let mut stack: Vec<InstanceId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let inst = self.arena.get(id)?;
            if inst.key.as_deref() == Some(key) {
                return Some(id);
            }
            stack.extend(inst.children.iter().rev().copied());
        }
        None
    }

    /// Diff `element` against the live tree and apply the differences through `adapter`.
    ///
    /// The whole tree is validated before anything is touched, so a failing pass leaves both
    /// the instance tree and the backend unchanged.
    #[tracing::instrument(skip_all, fields(nodes = element.subtree_len()))]
    pub fn reconcile(
        &mut self,
        adapter: Option<&mut dyn RenderAdapter>,
        element: &Element,
        resolver: Option<&dyn TextureResolver>,
    ) -> StageResult<CommitLog> {
        let adapter = adapter.ok_or(StageError::NoActiveRenderAdapter)?;
        validate(element, None)?;

        let mut pass = Pass {
            arena: &mut self.arena,
            adapter,
            resolver,
            log: CommitLog::default(),
        };
        let root = match self.root {
            Some(id) if pass.arena.contains(id) => {
                pass.update(id, element)?;
                id
            }
            _ => pass.create(None, element)?,
        };
        self.root = Some(root);
        let log = pass.log;
        tracing::debug!(
            created = log.created(),
            updated = log.updated(),
            destroyed = log.destroyed(),
            "reconciled"
        );
        Ok(log)
    }

    /// Advance every animation by `dt` seconds and push changed values to the backend.
    ///
    /// Returns how many animations moved.
    pub fn advance_animations(
        &mut self,
        adapter: &mut dyn RenderAdapter,
        dt: f64,
        resolver: Option<&dyn TextureResolver>,
    ) -> StageResult<usize> {
        let ids: Vec<InstanceId> = self
            .arena
            .iter()
            .filter(|(_, inst)| inst.animation.is_some())
            .map(|(id, _)| id)
            .collect();

        let mut pass = Pass {
            arena: &mut self.arena,
            adapter,
            resolver,
            log: CommitLog::default(),
        };
        let mut advanced = 0;
        for id in ids {
            let Some(inst) = pass.arena.get_mut(id) else {
                continue;
            };
            let Some(state) = inst.animation.as_mut() else {
                continue;
            };
            if state.tick(dt).is_some() {
                advanced += 1;
            }
            let version = state.version();
            if inst.applied_animation != Some(version)
                && let Err(err) = pass.commit(id)
            {
                tracing::warn!(?id, error = %err, "skipping animation frame");
            }
        }
        Ok(advanced)
    }

    /// Run interactive callbacks for the current pointer frame.
    pub fn dispatch_pointer(&mut self, pointer: &PointerPipeline) -> usize {
        interactive::dispatch(&mut self.arena, pointer)
    }

    /// Tear down the whole tree.
    pub fn unmount(&mut self, adapter: &mut dyn RenderAdapter) -> CommitLog {
        let Some(root) = self.root.take() else {
            return CommitLog::default();
        };
        let mut pass = Pass {
            arena: &mut self.arena,
            adapter,
            resolver: None,
            log: CommitLog::default(),
        };
        pass.destroy_subtree(root);
        pass.log
    }
}

fn validate(el: &Element, parent: Option<InstanceKind>) -> StageResult<()> {
    let kind = InstanceKind::parse(&el.kind)?;
    match parent {
        None if kind != InstanceKind::Game => {
            return Err(StageError::validation(format!(
                "root element must be `game`, got `{kind}`"
            )));
        }
        Some(p) if !p.accepts(kind) => {
            return Err(StageError::validation(format!("`{p}` cannot contain `{kind}`")));
        }
        _ => {}
    }

    InstanceProps::from_props(kind, &el.props)?;
    if let Some(spec) = &el.animation {
        spec.validate()?;
        // Ticks interpolate from zero for names missing on the source side.
        let ends = [
            spec.from.clone(),
            AnimValues::lerp(&spec.from, &spec.to, 0.0),
            AnimValues::lerp(&spec.from, &spec.to, 1.0),
            AnimValues::lerp(&spec.to, &spec.from, 0.0),
            AnimValues::lerp(&spec.to, &spec.from, 1.0),
        ];
        for values in &ends {
            let mut props = el.props.clone();
            overlay(&mut props, values);
            InstanceProps::from_props(kind, &props)?;
        }
    }

    let mut keys = HashSet::new();
    for child in &el.children {
        if let Some(k) = &child.key
            && !keys.insert(k.as_str())
        {
            return Err(StageError::validation(format!(
                "duplicate key '{k}' under `{kind}`"
            )));
        }
        validate(child, Some(kind))?;
    }
    Ok(())
}

fn overlay(props: &mut PropMap, values: &AnimValues) {
    for (name, v) in values.iter() {
        props.insert(name.to_owned(), PropValue::Number(v));
    }
}

/// Declared props plus the animation overlay, with manifest keys resolved to paths.
fn effective_props(
    declared: &PropMap,
    animation: Option<&AnimationState>,
    resolver: Option<&dyn TextureResolver>,
) -> PropMap {
    let mut out = declared.clone();
    if let Some(a) = animation {
        overlay(&mut out, a.current_values());
    }
    if let Some(r) = resolver
        && let Some(PropValue::Text(t)) = out.get_mut("texture")
        && !t.is_empty()
        && !t.contains('/')
        && let Some(path) = r.resolve_texture_key(t)
    {
        *t = path;
    }
    out
}

/// Indices into `seq` of one longest strictly increasing subsequence.
fn longest_increasing_run(seq: &[usize]) -> Vec<usize> {
    // tails[k]: index of the smallest tail of an increasing run of length k + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &v) in seq.iter().enumerate() {
        let k = tails.partition_point(|&t| seq[t] < v);
        prev[i] = k.checked_sub(1).map(|j| tails[j]);
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }
    let mut out = Vec::with_capacity(tails.len());
    let mut cur = tails.last().copied();
    while let Some(i) = cur {
        out.push(i);
        cur = prev[i];
    }
    out.reverse();
    out
}

fn sort_key(arena: &InstanceArena, id: InstanceId) -> i32 {
    match arena.get(id).map(|i| &i.props) {
        Some(InstanceProps::Layer(l)) => l.z_index,
        _ => 0,
    }
}

struct Pass<'a, 'b> {
    arena: &'a mut InstanceArena,
    adapter: &'a mut (dyn RenderAdapter + 'b),
    resolver: Option<&'a dyn TextureResolver>,
    log: CommitLog,
}

impl Pass<'_, '_> {
    fn native(&self, id: InstanceId) -> Option<NativeId> {
        self.arena.get(id).and_then(|i| i.native)
    }

    fn create(&mut self, parent: Option<InstanceId>, el: &Element) -> StageResult<InstanceId> {
        let kind = InstanceKind::parse(&el.kind)?;
        let animation = el.animation.clone().map(AnimationState::new).transpose()?;
        let effective = effective_props(&el.props, animation.as_ref(), self.resolver);
        let props = InstanceProps::from_props(kind, &effective)?;

        let mut inst = Instance::new(kind, el.props.clone(), props.clone());
        inst.effective = effective;
        inst.key = el.key.clone();
        inst.parent = parent;
        inst.applied_animation = animation.as_ref().map(AnimationState::version);
        inst.animation = animation;
        inst.interactive = el.interactive.clone();
        let id = self.arena.insert(inst);

        let native = match &props {
            InstanceProps::Game(_) => None,
            InstanceProps::Layer(p) => Some(self.adapter.create_layer(id, p)),
            InstanceProps::Scene(p) => Some(self.adapter.create_scene(id, p)),
            InstanceProps::Sprite(p) => Some(self.adapter.create_sprite(id, p)),
        };
        if let Some(inst) = self.arena.get_mut(id) {
            inst.native = native;
        }
        self.log.mutations.push(Mutation::Create { id, kind });
        tracing::debug!(%id, %kind, ?native, "instance created");

        self.reconcile_children(id, &el.children)?;
        Ok(id)
    }

    fn update(&mut self, id: InstanceId, el: &Element) -> StageResult<()> {
        let Some(inst) = self.arena.get_mut(id) else {
            return Ok(());
        };
        inst.key = el.key.clone();
        inst.declared = el.props.clone();
        if el.interactive.is_none() {
            inst.interaction = InteractionState::default();
        }
        inst.interactive = el.interactive.clone();
        match (inst.animation.as_mut(), &el.animation) {
            (Some(state), Some(spec)) => state.update_spec(spec.clone())?,
            (None, Some(spec)) => inst.animation = Some(AnimationState::new(spec.clone())?),
            (Some(_), None) => {
                inst.animation = None;
                inst.applied_animation = None;
            }
            (None, None) => {}
        }

        self.commit(id)?;
        self.reconcile_children(id, &el.children)
    }

    /// Recompute effective props and forward them to the backend if they changed.
    fn commit(&mut self, id: InstanceId) -> StageResult<()> {
        let Some(inst) = self.arena.get(id) else {
            return Ok(());
        };
        let version = inst.animation.as_ref().map(AnimationState::version);
        let effective = effective_props(&inst.declared, inst.animation.as_ref(), self.resolver);
        if effective == inst.effective {
            if let Some(inst) = self.arena.get_mut(id) {
                inst.applied_animation = version;
            }
            return Ok(());
        }

        let kind = inst.kind;
        let props = InstanceProps::from_props(kind, &effective)?;
        let z_changed = match (&inst.props, &props) {
            (InstanceProps::Layer(a), InstanceProps::Layer(b)) => a.z_index != b.z_index,
            _ => false,
        };
        let (native, parent) = (inst.native, inst.parent);

        if let Some(inst) = self.arena.get_mut(id) {
            inst.effective = effective;
            inst.props = props.clone();
            inst.applied_animation = version;
        }
        if let Some(native) = native {
            match &props {
                InstanceProps::Game(_) => {}
                InstanceProps::Layer(p) => self.adapter.update_layer(native, p),
                InstanceProps::Scene(p) => self.adapter.update_scene(native, p),
                InstanceProps::Sprite(p) => self.adapter.update_sprite(native, p),
            }
        }
        if z_changed && let Some(parent) = parent {
            self.resort_by_z(parent);
        }
        self.log.mutations.push(Mutation::Update { id, kind });
        Ok(())
    }

    fn resort_by_z(&mut self, parent: InstanceId) {
        let Some(children) = self.arena.get(parent).map(|p| p.children.clone()) else {
            return;
        };
        let sorted = self.z_ordered(&children);
        if let Some(p) = self.arena.get_mut(parent) {
            p.children = sorted;
        }
    }

    /// Stable placement by z-index, one positional insert per child.
    fn z_ordered(&self, ids: &[InstanceId]) -> Vec<InstanceId> {
        let mut out: Vec<InstanceId> = Vec::with_capacity(ids.len());
        for &id in ids {
            let z = sort_key(&*self.arena, id);
            let pos = out.partition_point(|&c| sort_key(&*self.arena, c) <= z);
            out.insert(pos, id);
        }
        out
    }

    fn reconcile_children(&mut self, parent: InstanceId, elements: &[Element]) -> StageResult<()> {
        let Some((parent_kind, parent_native, old)) = self
            .arena
            .get(parent)
            .map(|p| (p.kind, p.native, p.children.clone()))
        else {
            return Ok(());
        };

        // Match by key first, then by kind and position among unkeyed siblings.
        let mut keyed: HashMap<String, InstanceId> = HashMap::new();
        let mut unkeyed: HashMap<InstanceKind, VecDeque<InstanceId>> = HashMap::new();
        for &id in &old {
            let Some(inst) = self.arena.get(id) else {
                continue;
            };
            match &inst.key {
                Some(k) => {
                    keyed.insert(k.clone(), id);
                }
                None => unkeyed.entry(inst.kind).or_default().push_back(id),
            }
        }
        let mut plan: Vec<Option<InstanceId>> = Vec::with_capacity(elements.len());
        for el in elements {
            let kind = InstanceKind::parse(&el.kind)?;
            let candidate = match &el.key {
                Some(k) => keyed.remove(k),
                None => unkeyed.get_mut(&kind).and_then(VecDeque::pop_front),
            };
            plan.push(candidate.filter(|&id| self.arena.get(id).is_some_and(|i| i.kind == kind)));
        }

        let kept: HashSet<InstanceId> = plan.iter().flatten().copied().collect();
        for &id in &old {
            if !kept.contains(&id) && self.arena.contains(id) {
                self.detach(parent, id);
                self.destroy_subtree(id);
            }
        }

        let mut next = Vec::with_capacity(elements.len());
        let mut created = HashSet::new();
        for (el, matched) in elements.iter().zip(plan) {
            let id = match matched {
                Some(id) => {
                    self.update(id, el)?;
                    id
                }
                None => {
                    let id = self.create(Some(parent), el)?;
                    created.insert(id);
                    id
                }
            };
            next.push(id);
        }

        if let Some(pn) = parent_native {
            let survivors: Vec<InstanceId> =
                old.iter().copied().filter(|id| kept.contains(id)).collect();
            self.place(parent, pn, &survivors, &next, &created);
        }
        let children = if parent_kind == InstanceKind::Game {
            self.z_ordered(&next)
        } else {
            next
        };
        if let Some(p) = self.arena.get_mut(parent) {
            p.children = children;
        }
        Ok(())
    }

    /// Attach new children and move surviving ones so the native order matches `desired`.
    ///
    /// Survivors whose old positions form the longest increasing run stay put; every other
    /// child is inserted before the next stationary sibling, or appended when none follows.
    fn place(
        &mut self,
        parent: InstanceId,
        pn: NativeId,
        survivors: &[InstanceId],
        desired: &[InstanceId],
        created: &HashSet<InstanceId>,
    ) {
        let old_pos: HashMap<InstanceId, usize> =
            survivors.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let kept_order: Vec<(usize, usize)> = desired
            .iter()
            .enumerate()
            .filter_map(|(i, id)| old_pos.get(id).map(|&p| (i, p)))
            .collect();
        let run =
            longest_increasing_run(&kept_order.iter().map(|&(_, p)| p).collect::<Vec<_>>());
        let mut stationary = vec![false; desired.len()];
        for k in run {
            stationary[kept_order[k].0] = true;
        }

        let mut anchor: Option<NativeId> = None;
        let mut anchors = vec![None; desired.len()];
        for i in (0..desired.len()).rev() {
            anchors[i] = anchor;
            if stationary[i] {
                anchor = self.native(desired[i]).or(anchor);
            }
        }

        for (i, &child) in desired.iter().enumerate() {
            if stationary[i] {
                continue;
            }
            let Some(cn) = self.native(child) else {
                continue;
            };
            let is_new = created.contains(&child);
            match anchors[i] {
                Some(bn) => self.adapter.insert_child_before(pn, cn, bn),
                None if is_new => self.adapter.add_child(pn, cn),
                None => {
                    self.adapter.remove_child(pn, cn);
                    self.adapter.add_child(pn, cn);
                }
            }
            self.log.mutations.push(if is_new {
                Mutation::Attach { parent, child }
            } else {
                Mutation::Reorder { parent, child }
            });
        }
    }

    fn detach(&mut self, parent: InstanceId, child: InstanceId) {
        if let (Some(pn), Some(cn)) = (self.native(parent), self.native(child)) {
            self.adapter.remove_child(pn, cn);
            self.log.mutations.push(Mutation::Detach { parent, child });
        }
    }

    /// Children first, then the node itself. Dropping the instance drops its animation and
    /// interactive handlers with it.
    fn destroy_subtree(&mut self, id: InstanceId) {
        let children = self.arena.get(id).map(|i| i.children.clone()).unwrap_or_default();
        for child in children {
            self.detach(id, child);
            self.destroy_subtree(child);
        }
        let Some(inst) = self.arena.remove(id) else {
            return;
        };
        if let Some(native) = inst.native {
            match inst.kind {
                InstanceKind::Game => {}
                InstanceKind::Layer => self.adapter.destroy_layer(native),
                InstanceKind::Scene => self.adapter.destroy_scene(native),
                InstanceKind::Sprite => self.adapter.destroy_sprite(native),
            }
        }
        tracing::debug!(%id, kind = %inst.kind, "instance destroyed");
        self.log.mutations.push(Mutation::Destroy {
            id,
            kind: inst.kind,
        });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reconcile/engine.rs"]
mod tests;
