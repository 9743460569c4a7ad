//! Type registry
//!
//! The registry is the construction hook: every type is created through
//! [`TypeRegistry::define_type`], which computes and attaches its fixed
//! layout before the type becomes visible. A type opts into inference by
//! listing one of the built-in base markers ([`TypeRegistry::fixed_base`] or
//! [`TypeRegistry::dual_base`]) among its ancestors, directly or through any
//! ancestor that did.
//!
//! ```rust
//! # use slotcore::{namespace::Namespace, registry::{TypeCreateInfo, TypeRegistry}};
//! # use slotinstr::parser::parse_routine;
//! let registry = TypeRegistry::default();
//! let init = parse_routine(r#"
//!     routine __init__(self, a) {
//!         load.local a
//!         load.local self
//!         store.attr x
//!         load.const none
//!         return
//!     }
//! "#).unwrap();
//!
//! let point = registry
//!     .define_type(TypeCreateInfo {
//!         name: "Point",
//!         ancestors: &[registry.fixed_base()],
//!         namespace: Namespace::new().with_constructor(init),
//!     })
//!     .unwrap();
//!
//! let mut instance = registry.instantiate::<i64>(point).unwrap();
//! instance.set_attr("x", 1).unwrap();
//! assert!(instance.set_attr("y", 2).is_err());
//! ```
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use log::{debug, info};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use petgraph::graph::NodeIndex;
use smallvec::{SmallVec, smallvec};
use uuid::Uuid;

use crate::{
    hierarchy::Hierarchy,
    instance::Instance,
    layout::{FixedLayout, LayoutBuilder},
    namespace::Namespace,
    scanner::delegates_to_parent,
    utils::{
        conf::{LayoutMode, RegistryConfig},
        error::{SlotError, SlotResult},
    },
};

/// A stable reference to a type stored inside a [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeRef(Uuid);

impl TypeRef {
    fn fresh() -> Self {
        TypeRef(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered type with its attached layout. Immutable once registered.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub id: TypeRef,
    pub name: String,

    /// Direct ancestors, in declaration order.
    pub ancestors: SmallVec<TypeRef, 2>,
    pub namespace: Namespace,

    /// Layout variant inherited from the base markers, `None` for types that
    /// did not opt in.
    pub mode: Option<LayoutMode>,

    /// Own contribution to the instance layout.
    pub layout: FixedLayout,

    /// The type followed by its ancestors in lookup order.
    pub linearization: Vec<TypeRef>,

    /// Closest type in the linearization that adds slots (the root when none
    /// does). Direct ancestors must agree on it up to inheritance.
    pub solid_base: TypeRef,

    /// Whether instances also hold the slots of the ancestors. False when
    /// the type overrides the constructor without calling its parent's.
    pub inherits_layout: bool,

    pub(crate) node: NodeIndex,
}

/// Arguments of [`TypeRegistry::define_type`].
#[derive(Debug, Clone)]
pub struct TypeCreateInfo<'a> {
    pub name: &'a str,

    /// Direct ancestors. An empty list stands for the root type alone.
    pub ancestors: &'a [TypeRef],
    pub namespace: Namespace,
}

#[derive(Debug, Default)]
struct RegistryState {
    hierarchy: Hierarchy,
    by_name: BTreeMap<String, SmallVec<TypeRef, 1>>,
}

/// Registry of every defined type.
///
/// # A note on concurrency
/// Definitions may run from several threads. Each one holds an upgradable
/// read lock while its layout is computed from the (immutable) ancestors and
/// upgrades to a write lock only to insert, so two definitions never observe
/// each other half-done. Do not hold the guard returned by
/// [`Self::hierarchy`] while defining a type.
#[derive(Debug)]
pub struct TypeRegistry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
    root: TypeRef,
    fixed: TypeRef,
    dual: TypeRef,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl TypeRegistry {
    /// Create a registry holding the root type and both base markers.
    pub fn new(config: RegistryConfig) -> Self {
        let mut state = RegistryState::default();

        let root = Self::insert_builtin(&mut state, &config.root_name, &[], None);
        let fixed = Self::insert_builtin(
            &mut state,
            &config.fixed_base_name,
            &[root],
            Some(LayoutMode::Fixed),
        );
        let dual = Self::insert_builtin(
            &mut state,
            &config.dual_base_name,
            &[root],
            Some(LayoutMode::Dual),
        );

        info!(
            "Type registry created with root '{}' and base markers '{}' ({}), '{}' ({})",
            config.root_name,
            config.fixed_base_name,
            LayoutMode::Fixed,
            config.dual_base_name,
            LayoutMode::Dual
        );

        Self {
            config,
            state: RwLock::new(state),
            root,
            fixed,
            dual,
        }
    }

    /// Built-in types add nothing to the layout, not even a dynamic store.
    fn insert_builtin(
        state: &mut RegistryState,
        name: &str,
        ancestors: &[TypeRef],
        mode: Option<LayoutMode>,
    ) -> TypeRef {
        let id = TypeRef::fresh();
        let solid_base = ancestors
            .first()
            .and_then(|a| state.hierarchy.get(*a))
            .map_or(id, |a| a.solid_base);
        let definition = TypeDefinition {
            id,
            name: name.to_string(),
            ancestors: ancestors.iter().copied().collect(),
            namespace: Namespace::new().with_declared_slots(Vec::<String>::new()),
            mode,
            layout: FixedLayout::default(),
            linearization: state.hierarchy.linearize(id, ancestors),
            solid_base,
            inherits_layout: true,
            node: NodeIndex::end(),
        };
        state.hierarchy.insert(definition);
        state.by_name.insert(name.to_string(), smallvec![id]);
        id
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The host root type. Carries neither slots nor a dynamic store.
    pub fn object(&self) -> TypeRef {
        self.root
    }

    /// Base marker opting descendants into [`LayoutMode::Fixed`].
    pub fn fixed_base(&self) -> TypeRef {
        self.fixed
    }

    /// Base marker opting descendants into [`LayoutMode::Dual`].
    pub fn dual_base(&self) -> TypeRef {
        self.dual
    }

    /// Marker for `mode`.
    pub fn base_for(&self, mode: LayoutMode) -> TypeRef {
        match mode {
            LayoutMode::Fixed => self.fixed,
            LayoutMode::Dual => self.dual,
        }
    }

    /// Define a new type, computing its fixed layout from the namespace.
    ///
    /// Nothing is registered when an error is returned.
    pub fn define_type(&self, info: TypeCreateInfo<'_>) -> SlotResult<TypeRef> {
        let TypeCreateInfo {
            name,
            ancestors,
            namespace,
        } = info;
        let ancestors: SmallVec<TypeRef, 2> = if ancestors.is_empty() {
            smallvec![self.root]
        } else {
            ancestors.iter().copied().collect()
        };

        let mut state = self.state.upgradable_read();

        let mut modes = Vec::with_capacity(ancestors.len());
        for (i, ancestor) in ancestors.iter().enumerate() {
            let definition = state
                .hierarchy
                .get(*ancestor)
                .ok_or(SlotError::UnknownType(*ancestor))?;
            if ancestors[..i].contains(ancestor) {
                return Err(SlotError::DuplicateAncestor {
                    type_name: name.to_string(),
                    ancestor: definition.name.clone(),
                });
            }
            modes.push(definition.mode);
        }
        let mode = modes.into_iter().max().flatten();

        let mut layout =
            LayoutBuilder::new(&self.config).build(name, &namespace, mode.is_some())?;
        self.resolve_dynamic_store(
            &state.hierarchy,
            name,
            &ancestors,
            &namespace,
            mode,
            &mut layout,
        )?;

        if let Some(slot) = layout.slots.iter().find(|slot| namespace.binds(slot)) {
            return Err(SlotError::SlotConflictsWithClassAttribute {
                type_name: name.to_string(),
                slot: slot.clone(),
            });
        }

        let id = TypeRef::fresh();
        let solid_base = state
            .hierarchy
            .solid_base(name, id, &ancestors, !layout.slots.is_empty())?;
        let linearization = state.hierarchy.linearize(id, &ancestors);
        let inherits_layout = mode.is_none()
            || namespace
                .constructor
                .as_ref()
                .is_none_or(delegates_to_parent);

        debug!(
            "Computed layout of '{}' ({}): slots {:?}, dynamic store: {}, inherits: {}",
            name,
            mode.map_or_else(|| "plain".to_string(), |m| m.to_string()),
            layout.slots,
            layout.dynamic_store,
            inherits_layout
        );

        let definition = TypeDefinition {
            id,
            name: name.to_string(),
            ancestors,
            namespace,
            mode,
            layout,
            linearization,
            solid_base,
            inherits_layout,
            node: NodeIndex::end(),
        };

        state.with_upgraded(|state| {
            state.hierarchy.insert(definition);
            let entries = state.by_name.entry(name.to_string()).or_default();
            if !entries.is_empty() {
                debug!(
                    "Type name '{}' now refers to {} (shadowing {} older definitions)",
                    name,
                    id,
                    entries.len()
                );
            }
            entries.push(id);
        });

        Ok(id)
    }

    /// Decide whether the new type carries the dynamic store itself.
    ///
    /// At most one type per chain carries it. Dual-mode types get it when no
    /// ancestor has one; plain types get it unless they pre-declared their
    /// layout; fixed-mode types only when `__dict__` was requested
    /// explicitly.
    fn resolve_dynamic_store(
        &self,
        hierarchy: &Hierarchy,
        name: &str,
        ancestors: &[TypeRef],
        namespace: &Namespace,
        mode: Option<LayoutMode>,
        layout: &mut FixedLayout,
    ) -> SlotResult<()> {
        let owner = hierarchy.dynamic_store_owner(ancestors);

        if let Some(owner) = owner {
            let requested = namespace
                .declared_slots
                .iter()
                .flatten()
                .any(|slot| *slot == self.config.dynamic_store_name);
            if requested {
                let ancestor = hierarchy
                    .get(owner)
                    .map(|definition| definition.name.clone())
                    .unwrap_or_default();
                return Err(SlotError::DuplicateDynamicStore {
                    type_name: name.to_string(),
                    ancestor,
                });
            }
            layout.dynamic_store = false;
            return Ok(());
        }

        match mode {
            Some(LayoutMode::Dual) => layout.dynamic_store = true,
            Some(LayoutMode::Fixed) => {}
            None => layout.dynamic_store |= namespace.declared_slots.is_none(),
        }
        Ok(())
    }

    /// Look up a registered type.
    pub fn get(&self, typeref: TypeRef) -> Option<Arc<TypeDefinition>> {
        self.state.read().hierarchy.get(typeref).cloned()
    }

    /// Most recent type registered under `name`.
    pub fn find(&self, name: &str) -> Option<TypeRef> {
        self.state
            .read()
            .by_name
            .get(name)
            .and_then(|entries| entries.last().copied())
    }

    /// Read access to the ancestor graph.
    pub fn hierarchy(&self) -> MappedRwLockReadGuard<'_, Hierarchy> {
        RwLockReadGuard::map(self.state.read_recursive(), |state| &state.hierarchy)
    }

    /// Every transitive ancestor of `typeref`, each once.
    pub fn ancestors(&self, typeref: TypeRef) -> SlotResult<Vec<TypeRef>> {
        let state = self.state.read();
        if !state.hierarchy.contains(typeref) {
            return Err(SlotError::UnknownType(typeref));
        }
        Ok(state.hierarchy.ancestors(typeref))
    }

    /// Slots an instance of `typeref` holds, inherited ones included.
    pub fn effective_slots(&self, typeref: TypeRef) -> SlotResult<BTreeSet<String>> {
        self.state
            .read()
            .hierarchy
            .effective_slots(typeref)
            .ok_or(SlotError::UnknownType(typeref))
    }

    /// Whether instances of `typeref` accept names outside their slots.
    pub fn has_dynamic_store(&self, typeref: TypeRef) -> SlotResult<bool> {
        let state = self.state.read();
        if !state.hierarchy.contains(typeref) {
            return Err(SlotError::UnknownType(typeref));
        }
        Ok(state.hierarchy.has_dynamic_store(typeref))
    }

    /// Create an empty instance of `typeref`.
    pub fn instantiate<V>(&self, typeref: TypeRef) -> SlotResult<Instance<V>> {
        let state = self.state.read();
        let definition = state
            .hierarchy
            .get(typeref)
            .ok_or(SlotError::UnknownType(typeref))?;
        let slots = state
            .hierarchy
            .effective_slots(typeref)
            .ok_or(SlotError::UnknownType(typeref))?;
        Ok(Instance::new(
            definition.clone(),
            slots,
            state.hierarchy.has_dynamic_store(typeref),
        ))
    }
}
