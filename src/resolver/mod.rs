//! Dependency tree construction and version-conflict resolution.
//!
//! The tree is built by recursive descent from a synthetic root: each
//! declared child is fetched through the importer (memoized, so every exact
//! [`Dep`] is fetched at most once per invocation), its manifest is read, and
//! its own children are visited in turn. The same library may appear at
//! several versions in different branches; the same exact `Dep` gets one
//! canonical node recorded in `original_nodes`, even though its subtree is
//! replicated wherever it occurs.
//!
//! Conflict resolution (`disconnect_outdated_versions`) prunes the tree
//! until exactly one version per library name remains, preferring the newest
//! requested version of each library provided no live branch demands a
//! semver-incompatible older one. Each round:
//!
//! 1. Build the *undecided* table: every dep with a strictly greater version
//!    of the same name present gets an entry listing its eliminators, the
//!    *critical* (caret-incompatible) subset, an `alive` flag, and the set
//!    of critical eliminators actually observed.
//! 2. Walk the tree from the root, skipping the subtree of every undecided
//!    node (that branch only lives if the undecided lives); every eliminator
//!    encountered marks its undecideds dead.
//! 3. Repeat the walk from the canonical node of every undecided still
//!    alive, propagating marks through subtrees skipped in step 2.
//! 4. Slash: remove dead children (and their subtrees). A dead child removed
//!    directly from a live parent while holding an observed critical
//!    eliminator means a live branch required an incompatible older version;
//!    that fails with `IncompatibleVersions`. Dead subtrees dragged along
//!    indirectly are suppressed.
//!
//! The loop repeats until the tree is slashed, because slashing one
//! undecided can expose new undecideds or make a previous one's fate
//! computable.
//!
//! Nodes live in an arena (`Vec<Node>` addressed by [`NodeId`]), which keeps
//! the mark-and-slash passes plain index manipulation.

use crate::core::dep::Dep;
use crate::core::error::ComboError;
use crate::importer::Importer;
use crate::manifest::{Expected, Manifest};
use crate::source::SourceLocator;
use crate::version::Version;
use anyhow::Result;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::collections::{HashMap, HashSet};

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

#[derive(Debug, Clone)]
enum NodeValue {
    Root,
    Dep(Dep),
}

#[derive(Debug)]
struct Node {
    value: NodeValue,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Undecided {
    eliminators: Vec<Dep>,
    criticals: Vec<Dep>,
    alive: bool,
    incompatible_eliminated: Vec<Dep>,
}

type UndecidedTable = HashMap<Dep, Undecided>;

/// The recursive dependency graph of a resolution, plus the registries built
/// alongside it.
#[derive(Debug)]
pub struct DependencyTree {
    nodes: Vec<Node>,
    original_nodes: HashMap<Dep, NodeId>,
    manifests: HashMap<Dep, Manifest>,
    dependencies: HashSet<Dep>,
    ready: bool,
}

impl Default for DependencyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyTree {
    /// Creates an empty tree holding only the synthetic root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node { value: NodeValue::Root, children: Vec::new() }],
            original_nodes: HashMap::new(),
            manifests: HashMap::new(),
            dependencies: HashSet::new(),
            ready: false,
        }
    }

    /// True once [`build`](Self::build) has completed.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// The set of distinct deps currently reachable from the root.
    #[must_use]
    pub fn dependencies(&self) -> &HashSet<Dep> {
        &self.dependencies
    }

    /// Manifests read while building, one per distinct dep.
    #[must_use]
    pub fn manifests(&self) -> &HashMap<Dep, Manifest> {
        &self.manifests
    }

    /// Builds the tree from the root manifest, fetching every referenced
    /// dependency into the cache.
    pub async fn build<L: SourceLocator>(
        &mut self,
        root_manifest: &Manifest,
        importer: &mut Importer<L>,
    ) -> Result<()> {
        let sons = root_manifest.sons();
        self.build_children(importer, ROOT, sons, Vec::new()).await?;
        self.dependencies = self.extract_values();
        self.ready = true;
        Ok(())
    }

    fn build_children<'a, L: SourceLocator>(
        &'a mut self,
        importer: &'a mut Importer<L>,
        parent: NodeId,
        sons: Vec<Dep>,
        ancestry: Vec<Dep>,
    ) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            for dep in sons {
                if ancestry.iter().any(|ancestor| ancestor.name == dep.name) {
                    let mut labels = vec!["Root".to_string()];
                    labels.extend(ancestry.iter().map(ToString::to_string));
                    labels.push(dep.to_string());
                    return Err(ComboError::CircularDependency { path: labels.join(" -> ") }
                        .into());
                }

                let first_visit = !self.original_nodes.contains_key(&dep);
                let clone_dir = if first_visit {
                    importer.fetch(&dep).await?
                } else {
                    importer.cache().dep_path(&dep)
                };

                let child = self.add_node(parent, dep.clone());
                if first_visit {
                    self.original_nodes.insert(dep.clone(), child);
                }

                let manifest = Manifest::load(&clone_dir, Expected::Dep(&dep))?;
                if !manifest.valid_as_lib() {
                    return Err(ComboError::NotAllowedDependency {
                        dep: dep.to_string(),
                        reason: "its manifest is not valid as a library".to_string(),
                    }
                    .into());
                }
                let next_sons = manifest.sons();
                self.register_manifest(&dep, manifest)?;

                let mut next_ancestry = ancestry.clone();
                next_ancestry.push(dep);
                self.build_children(importer, child, next_sons, next_ancestry).await?;
            }
            Ok(())
        }
        .boxed_local()
    }

    fn add_node(&mut self, parent: NodeId, dep: Dep) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { value: NodeValue::Dep(dep), children: Vec::new() });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn register_manifest(&mut self, dep: &Dep, manifest: Manifest) -> Result<()> {
        match self.manifests.get(dep) {
            None => {
                self.manifests.insert(dep.clone(), manifest);
                Ok(())
            }
            Some(existing) if *existing == manifest => Ok(()),
            Some(_) => Err(ComboError::UnhandledCombo {
                message: format!("different manifests found for dependency {dep}"),
            }
            .into()),
        }
    }

    fn extract_values(&self) -> HashSet<Dep> {
        let mut values = HashSet::new();
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            for &child in &self.nodes[id.0].children {
                if let NodeValue::Dep(dep) = &self.nodes[child.0].value {
                    values.insert(dep.clone());
                }
                stack.push(child);
            }
        }
        values
    }

    fn is_slashed(&self) -> bool {
        let mut versions_per_name: HashMap<&str, HashSet<&Version>> = HashMap::new();
        for dep in &self.dependencies {
            versions_per_name.entry(&dep.name).or_default().insert(&dep.version);
        }
        versions_per_name.values().all(|versions| versions.len() == 1)
    }

    /// Prunes the tree until exactly one version of every library survives.
    ///
    /// # Errors
    ///
    /// Fails with [`ComboError::IncompatibleVersions`] when a live branch
    /// requires a version superseded by a caret-incompatible newer one.
    pub fn disconnect_outdated_versions(&mut self) -> Result<()> {
        while !self.is_slashed() {
            let mut table = self.create_undecided_table()?;
            self.mark_deads(&mut table, ROOT);
            self.step_in_alive(&mut table);
            self.slash(&table)?;

            let remaining = self.extract_values();
            if remaining == self.dependencies {
                return Err(ComboError::UnhandledCombo {
                    message: "version resolution did not converge".to_string(),
                }
                .into());
            }
            self.dependencies = remaining;
        }

        tracing::debug!(
            "Resolved dependency set: {:?}",
            self.dependencies.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
        Ok(())
    }

    fn create_undecided_table(&self) -> Result<UndecidedTable> {
        let mut table = UndecidedTable::new();

        for dep in &self.dependencies {
            let eliminators: Vec<Dep> = self
                .dependencies
                .iter()
                .filter(|other| other.name == dep.name && other.version > dep.version)
                .cloned()
                .collect();
            if eliminators.is_empty() {
                continue;
            }

            let mut criticals = Vec::new();
            for eliminator in &eliminators {
                if !Version::compatible([&dep.version, &eliminator.version])? {
                    criticals.push(eliminator.clone());
                }
            }

            table.insert(
                dep.clone(),
                Undecided {
                    eliminators,
                    criticals,
                    alive: true,
                    incompatible_eliminated: Vec::new(),
                },
            );
        }

        Ok(table)
    }

    /// In-order walk marking eliminated undecideds dead. The subtree of an
    /// undecided node is skipped: it only lives if the undecided lives.
    fn mark_deads(&self, table: &mut UndecidedTable, node: NodeId) {
        if let NodeValue::Dep(dep) = &self.nodes[node.0].value {
            if table.contains_key(dep) {
                return;
            }

            for undecided in table.values_mut() {
                if undecided.eliminators.contains(dep) {
                    undecided.alive = false;
                    if undecided.criticals.contains(dep)
                        && !undecided.incompatible_eliminated.contains(dep)
                    {
                        undecided.incompatible_eliminated.push(dep.clone());
                    }
                }
            }
        }

        for &child in &self.nodes[node.0].children {
            self.mark_deads(table, child);
        }
    }

    /// Walks the subtree of every undecided still alive, propagating marks
    /// through the branches step 2 skipped.
    fn step_in_alive(&self, table: &mut UndecidedTable) {
        let keys: Vec<Dep> = table.keys().cloned().collect();

        for key in keys {
            if !table.get(&key).is_some_and(|undecided| undecided.alive) {
                continue;
            }
            if let Some(&canonical) = self.original_nodes.get(&key) {
                let children = self.nodes[canonical.0].children.clone();
                for child in children {
                    self.mark_deads(table, child);
                }
            }
        }
    }

    fn slash(&mut self, table: &UndecidedTable) -> Result<()> {
        self.recursive_slash(table, ROOT)
    }

    /// Removes dead children. Only alive subtrees are entered, so every
    /// removal seen here is direct (the parent survives); a directly removed
    /// node with an observed critical eliminator is an error, while dead
    /// subtrees dragged along are suppressed.
    fn recursive_slash(&mut self, table: &UndecidedTable, node: NodeId) -> Result<()> {
        let children = self.nodes[node.0].children.clone();
        let mut kept = Vec::with_capacity(children.len());

        for child in children {
            let NodeValue::Dep(dep) = self.nodes[child.0].value.clone() else {
                continue;
            };

            let alive = table.get(&dep).is_none_or(|undecided| undecided.alive);
            if alive {
                kept.push(child);
                self.recursive_slash(table, child)?;
            } else if let Some(undecided) = table.get(&dep)
                && let Some(newer) = undecided.incompatible_eliminated.first()
            {
                return Err(ComboError::IncompatibleVersions {
                    older: dep.to_string(),
                    newer: newer.to_string(),
                }
                .into());
            }
        }

        self.nodes[node.0].children = kept;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(name: &str, version: &str) -> Dep {
        Dep::new(name, version.parse().unwrap())
    }

    /// Builds arena trees by hand, bypassing the importer.
    struct TreeBuilder {
        tree: DependencyTree,
    }

    impl TreeBuilder {
        fn new() -> Self {
            Self { tree: DependencyTree::new() }
        }

        fn child(&mut self, parent: NodeId, d: Dep) -> NodeId {
            let id = self.tree.add_node(parent, d.clone());
            self.tree.original_nodes.entry(d).or_insert(id);
            id
        }

        fn root_child(&mut self, d: Dep) -> NodeId {
            self.child(ROOT, d)
        }

        fn finish(mut self) -> DependencyTree {
            self.tree.dependencies = self.tree.extract_values();
            self.tree.ready = true;
            self.tree
        }
    }

    fn names_and_versions(tree: &DependencyTree) -> Vec<String> {
        let mut survivors: Vec<String> =
            tree.dependencies().iter().map(ToString::to_string).collect();
        survivors.sort();
        survivors
    }

    #[test]
    fn diamond_prefers_the_newest_compatible_version() {
        let mut builder = TreeBuilder::new();
        let a = builder.root_child(dep("A", "1.0"));
        builder.child(a, dep("C", "1.1"));
        let b = builder.root_child(dep("B", "1.0"));
        builder.child(b, dep("C", "1.2"));

        let mut tree = builder.finish();
        tree.disconnect_outdated_versions().unwrap();

        assert_eq!(
            names_and_versions(&tree),
            vec!["(A, v1.0)", "(B, v1.0)", "(C, v1.2)"]
        );
    }

    #[test]
    fn superseded_chain_keeps_only_the_newest() {
        let mut builder = TreeBuilder::new();
        builder.root_child(dep("X", "1.0"));
        builder.root_child(dep("X", "1.1"));

        let mut tree = builder.finish();
        tree.disconnect_outdated_versions().unwrap();

        assert_eq!(names_and_versions(&tree), vec!["(X, v1.1)"]);
    }

    #[test]
    fn incompatible_major_fails() {
        let mut builder = TreeBuilder::new();
        let a = builder.root_child(dep("A", "1.0"));
        builder.child(a, dep("C", "1.5"));
        let d = builder.root_child(dep("D", "1.0"));
        builder.child(d, dep("C", "2.0"));

        let mut tree = builder.finish();
        let err = tree.disconnect_outdated_versions().unwrap_err();

        match err.downcast_ref::<ComboError>() {
            Some(ComboError::IncompatibleVersions { older, newer }) => {
                assert_eq!(older, "(C, v1.5)");
                assert_eq!(newer, "(C, v2.0)");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn indirect_removal_suppresses_the_incompatibility() {
        // The old C is only required by the old D; once the old D dies, the
        // incompatible C goes with it without ever being a live requirement.
        let mut builder = TreeBuilder::new();
        let d_old = builder.root_child(dep("D", "1.0"));
        builder.child(d_old, dep("C", "1.0"));
        builder.root_child(dep("D", "1.1"));
        builder.root_child(dep("C", "2.0"));

        let mut tree = builder.finish();
        tree.disconnect_outdated_versions().unwrap();

        assert_eq!(names_and_versions(&tree), vec!["(C, v2.0)", "(D, v1.1)"]);
    }

    #[test]
    fn step_in_propagates_marks_through_alive_undecided_subtrees() {
        // A 1.1 hides under the dead D 1.0, so A 1.0 stays alive after the
        // root walk; its subtree must still eliminate C 1.0.
        let mut builder = TreeBuilder::new();
        let d_old = builder.root_child(dep("D", "1.0"));
        builder.child(d_old, dep("A", "1.1"));
        builder.root_child(dep("D", "1.1"));
        let a_old = builder.root_child(dep("A", "1.0"));
        builder.child(a_old, dep("C", "1.5"));
        builder.root_child(dep("C", "1.0"));

        let mut tree = builder.finish();
        tree.disconnect_outdated_versions().unwrap();

        assert_eq!(
            names_and_versions(&tree),
            vec!["(A, v1.0)", "(C, v1.5)", "(D, v1.1)"]
        );
    }

    #[test]
    fn already_slashed_tree_is_untouched() {
        let mut builder = TreeBuilder::new();
        let a = builder.root_child(dep("A", "1.0"));
        builder.child(a, dep("B", "2.3"));

        let mut tree = builder.finish();
        tree.disconnect_outdated_versions().unwrap();

        assert_eq!(names_and_versions(&tree), vec!["(A, v1.0)", "(B, v2.3)"]);
    }
}
