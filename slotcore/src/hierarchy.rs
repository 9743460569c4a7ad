//! Hierarchy resolver
//!
//! Holds every finalized type definition together with the ancestor graph
//! (edges point from a type to each of its direct ancestors) and answers the
//! questions that depend on more than a single type: whether a chain already
//! carries a dynamic store, which attributes an instance of a type may hold,
//! and whether several ancestors can share one instance layout.
//!
//! A type whose constructor overrides its parent's without calling it does
//! not compose its ancestors' slots: nothing would ever fill them, so the
//! inherited names are not part of its instances' layout.
//!
//! Ancestors must be registered before their descendants, so the graph is
//! acyclic by construction and every traversal terminates.
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use petgraph::{
    algo::has_path_connecting,
    graph::{DiGraph, NodeIndex},
    visit::{Dfs, EdgeFiltered, EdgeRef},
};

use crate::{
    registry::{TypeDefinition, TypeRef},
    utils::error::{SlotError, SlotResult},
};

#[derive(Debug, Default)]
pub struct Hierarchy {
    graph: DiGraph<TypeRef, ()>,
    types: BTreeMap<TypeRef, Arc<TypeDefinition>>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, typeref: TypeRef) -> Option<&Arc<TypeDefinition>> {
        self.types.get(&typeref)
    }

    pub fn contains(&self, typeref: TypeRef) -> bool {
        self.types.contains_key(&typeref)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Register a finalized definition. Its direct ancestors must already be
    /// present; unknown ancestors are skipped when wiring edges.
    pub fn insert(&mut self, mut definition: TypeDefinition) -> Arc<TypeDefinition> {
        let node = self.graph.add_node(definition.id);
        definition.node = node;

        for ancestor in &definition.ancestors {
            if let Some(parent) = self.types.get(ancestor) {
                self.graph.add_edge(node, parent.node, ());
            }
        }

        let definition = Arc::new(definition);
        self.types.insert(definition.id, definition.clone());
        definition
    }

    /// Every transitive ancestor reachable from `direct`, each listed once,
    /// in depth-first discovery order. The starting types are included.
    pub fn transitive_ancestors(&self, direct: &[TypeRef]) -> Vec<TypeRef> {
        let mut dfs = Dfs::empty(&self.graph);
        let mut visited = Vec::new();

        for start in direct.iter().filter_map(|t| self.types.get(t)) {
            dfs.move_to(start.node);
            while let Some(node) = dfs.next(&self.graph) {
                visited.push(self.graph[node]);
            }
        }

        visited
    }

    /// Transitive ancestors of a registered type, excluding the type itself.
    pub fn ancestors(&self, typeref: TypeRef) -> Vec<TypeRef> {
        match self.types.get(&typeref) {
            Some(definition) => self.transitive_ancestors(&definition.ancestors),
            None => Vec::new(),
        }
    }

    fn node_of(&self, typeref: TypeRef) -> Option<NodeIndex> {
        self.types.get(&typeref).map(|definition| definition.node)
    }

    /// Whether `descendant` is `ancestor` or inherits from it.
    pub fn descends_from(&self, descendant: TypeRef, ancestor: TypeRef) -> bool {
        if descendant == ancestor {
            return true;
        }
        match (self.node_of(descendant), self.node_of(ancestor)) {
            (Some(from), Some(to)) => has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }

    /// Method resolution order of a type about to be registered: the type,
    /// then the order of each direct ancestor in turn, keeping the first
    /// occurrence of every type.
    pub fn linearize(&self, typeref: TypeRef, direct: &[TypeRef]) -> Vec<TypeRef> {
        let mut order = vec![typeref];
        for ancestor in direct.iter().filter_map(|t| self.types.get(t)) {
            for &t in &ancestor.linearization {
                if !order.contains(&t) {
                    order.push(t);
                }
            }
        }
        order
    }

    /// First type reachable from `direct` whose own layout carries the
    /// dynamic store, if any.
    pub fn dynamic_store_owner(&self, direct: &[TypeRef]) -> Option<TypeRef> {
        self.transitive_ancestors(direct)
            .into_iter()
            .find(|t| self.types[t].layout.dynamic_store)
    }

    /// Solid base of a type about to be registered: the type itself when it
    /// adds slots, otherwise the most derived solid base among its direct
    /// ancestors. Ancestors whose solid bases are unrelated cannot share an
    /// instance layout.
    pub fn solid_base(
        &self,
        type_name: &str,
        typeref: TypeRef,
        direct: &[TypeRef],
        adds_slots: bool,
    ) -> SlotResult<TypeRef> {
        let mut best: Option<TypeRef> = None;

        for ancestor in direct.iter().filter_map(|t| self.types.get(t)) {
            let candidate = ancestor.solid_base;
            best = match best {
                None => Some(candidate),
                Some(current) if self.descends_from(current, candidate) => Some(current),
                Some(current) if self.descends_from(candidate, current) => Some(candidate),
                Some(current) => {
                    return Err(SlotError::LayoutConflict {
                        type_name: type_name.to_string(),
                        first: self.types[&current].name.clone(),
                        second: self.types[&candidate].name.clone(),
                    });
                }
            };
        }

        Ok(match best {
            Some(base) if !adds_slots => base,
            _ => typeref,
        })
    }

    /// Every slot an instance of `typeref` may hold: its own plus those of
    /// the ancestors it composes. The walk only crosses the edges of types
    /// that inherit their ancestors' layout.
    pub fn effective_slots(&self, typeref: TypeRef) -> Option<BTreeSet<String>> {
        let start = self.node_of(typeref)?;
        let composed = EdgeFiltered::from_fn(&self.graph, |edge| {
            self.types[&self.graph[edge.source()]].inherits_layout
        });

        let mut dfs = Dfs::new(&composed, start);
        let mut slots = BTreeSet::new();
        while let Some(node) = dfs.next(&composed) {
            slots.extend(self.types[&self.graph[node]].layout.slots.iter().cloned());
        }
        Some(slots)
    }

    /// Whether instances of `typeref` get a dynamic store, provided by the
    /// type itself or by any ancestor.
    pub fn has_dynamic_store(&self, typeref: TypeRef) -> bool {
        self.contains(typeref) && self.dynamic_store_owner(&[typeref]).is_some()
    }
}
