//! The trellis: a graph-structured parse stack in an index arena.
//!
//! Every node is one stack entry. Its links point down to the entries below
//! it, each carrying the token that was pushed on top of that entry; a node
//! with several links is where parse branches joined. Nodes are reference
//! counted by the links pointing at them plus explicit holds, and reclaimed by
//! [`Trellis::sweep`] once the count drops to zero.
//!
//! A node's links may change only until it is sealed. After that only its
//! reference count moves.

use crate::backend::lr::StateId;
use smallvec::SmallVec;

/// Handle of a node in a [`Trellis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A link from a node down to the node below it.
#[derive(Debug, Clone)]
pub struct StackLink<T> {
    /// Token pushed on top of `target`
    pub token: T,
    pub target: NodeId,
}

/// One stack entry.
#[derive(Debug, Clone)]
pub struct StackNode<T> {
    pub state: StateId,
    /// Number of input tokens consumed when the entry was pushed
    pub position: usize,
    ref_count: u32,
    sealed: bool,
    /// Primary link first, then alternatives
    links: SmallVec<[StackLink<T>; 1]>,
}

impl<T> StackNode<T> {
    #[must_use]
    pub fn links(&self) -> &[StackLink<T>] {
        &self.links
    }

    /// Token of the primary link; `None` for a root
    #[must_use]
    pub fn token(&self) -> Option<&T> {
        self.links.first().map(|link| &link.token)
    }

    /// Target of the primary link; `None` for a root
    #[must_use]
    pub fn target(&self) -> Option<NodeId> {
        self.links.first().map(|link| link.target)
    }

    /// Links beyond the primary one
    #[must_use]
    pub fn alternatives(&self) -> &[StackLink<T>] {
        self.links.get(1..).unwrap_or(&[])
    }

    #[must_use]
    pub const fn ref_count(&self) -> u32 {
        self.ref_count
    }

    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }
}

/// A path of links below a node: the tokens bottom to top and the node the
/// path ends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackPath<T> {
    pub base: NodeId,
    pub tokens: Vec<T>,
}

/// Arena of [`StackNode`]s with a free list.
#[derive(Debug, Clone)]
pub struct Trellis<T> {
    nodes: Vec<Option<StackNode<T>>>,
    free: Vec<u32>,
    /// Nodes whose count reached zero since the last sweep
    unreferenced: Vec<NodeId>,
    live: usize,
    created: usize,
}

impl<T> Default for Trellis<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            unreferenced: Vec::new(),
            live: 0,
            created: 0,
        }
    }
}

impl<T> Trellis<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, node: StackNode<T>) -> NodeId {
        self.live += 1;
        self.created += 1;
        if let Some(index) = self.free.pop() {
            self.nodes[index as usize] = Some(node);
            return NodeId(index);
        }
        #[allow(clippy::cast_possible_truncation)]
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    /// Create a sealed bottom-of-stack node held once by the caller
    pub fn push_root(&mut self, state: StateId) -> NodeId {
        self.alloc(StackNode {
            state,
            position: 0,
            ref_count: 1,
            sealed: true,
            links: SmallVec::new(),
        })
    }

    /// Create an unsealed node on top of `target`, held once by the caller
    pub fn push(&mut self, state: StateId, position: usize, token: T, target: NodeId) -> NodeId {
        self.retain(target);
        let mut links = SmallVec::new();
        links.push(StackLink { token, target });
        self.alloc(StackNode {
            state,
            position,
            ref_count: 1,
            sealed: false,
            links,
        })
    }

    /// Add an alternative link to an unsealed node.
    ///
    /// Returns the index of the new link, or `None` if `node` is sealed or
    /// unknown.
    pub fn add_alternative(&mut self, node: NodeId, token: T, target: NodeId) -> Option<usize> {
        let open = self.get(node).is_some_and(|n| !n.sealed);
        if !open {
            return None;
        }
        self.retain(target);
        let entry = self.nodes.get_mut(node.index())?.as_mut()?;
        entry.links.push(StackLink { token, target });
        Some(entry.links.len() - 1)
    }

    pub fn seal(&mut self, node: NodeId) {
        if let Some(entry) = self.nodes.get_mut(node.index()).and_then(Option::as_mut) {
            entry.sealed = true;
        }
    }

    pub fn retain(&mut self, node: NodeId) {
        if let Some(entry) = self.nodes.get_mut(node.index()).and_then(Option::as_mut) {
            entry.ref_count += 1;
        }
    }

    /// Drop one reference. The node is reclaimed by the next sweep if
    /// nothing retains it before then.
    pub fn release(&mut self, node: NodeId) {
        if let Some(entry) = self.nodes.get_mut(node.index()).and_then(Option::as_mut) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
            if entry.ref_count == 0 {
                self.unreferenced.push(node);
            }
        }
    }

    /// Reclaim every unreferenced node, cascading down through their links.
    ///
    /// Returns the number of nodes reclaimed.
    pub fn sweep(&mut self) -> usize {
        let mut reclaimed = 0;
        while let Some(node) = self.unreferenced.pop() {
            let index = node.index();
            let dead = self
                .nodes
                .get(index)
                .and_then(Option::as_ref)
                .is_some_and(|entry| entry.ref_count == 0);
            if !dead {
                continue;
            }
            let Some(entry) = self.nodes[index].take() else {
                continue;
            };
            #[allow(clippy::cast_possible_truncation)]
            self.free.push(index as u32);
            self.live -= 1;
            reclaimed += 1;
            for link in entry.links {
                self.release(link.target);
            }
        }
        if reclaimed > 0 {
            tracing::trace!(reclaimed, live = self.live, "swept trellis");
        }
        reclaimed
    }

    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&StackNode<T>> {
        self.nodes.get(node.index())?.as_ref()
    }

    /// Nodes currently allocated
    #[must_use]
    pub const fn live(&self) -> usize {
        self.live
    }

    /// Nodes allocated since creation or the last [`clear`](Self::clear)
    #[must_use]
    pub const fn created(&self) -> usize {
        self.created
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.unreferenced.clear();
        self.live = 0;
        self.created = 0;
    }
}

impl<T: Clone> Trellis<T> {
    /// Every path of exactly `depth` links below `node`.
    ///
    /// Follows primary and alternative links depth first and yields one path
    /// per distinct combination of links, with tokens bottom to top. `filter`
    /// sees `(step, link index, token)` for each link before it is followed,
    /// step 0 being the link leaving `node`; returning `false` prunes every
    /// path through that link.
    pub fn find_paths_of_depth(
        &self,
        node: NodeId,
        depth: usize,
        mut filter: impl FnMut(usize, usize, &T) -> bool,
    ) -> Vec<StackPath<T>> {
        let mut paths = Vec::new();
        let mut tokens = Vec::with_capacity(depth);
        self.walk(node, depth, None, &mut tokens, &mut filter, &mut paths);
        paths
    }

    /// Like [`find_paths_of_depth`](Self::find_paths_of_depth), keeping only
    /// the paths that follow link `link` of node `via`.
    pub fn find_paths_through(
        &self,
        node: NodeId,
        depth: usize,
        via: NodeId,
        link: usize,
        mut filter: impl FnMut(usize, usize, &T) -> bool,
    ) -> Vec<StackPath<T>> {
        let mut paths = Vec::new();
        let mut tokens = Vec::with_capacity(depth);
        self.walk(node, depth, Some((via, link)), &mut tokens, &mut filter, &mut paths);
        paths
    }

    /// `via` is the link still to be crossed, `None` once crossed or when
    /// any path will do.
    fn walk(
        &self,
        node: NodeId,
        remaining: usize,
        via: Option<(NodeId, usize)>,
        tokens: &mut Vec<T>,
        filter: &mut impl FnMut(usize, usize, &T) -> bool,
        paths: &mut Vec<StackPath<T>>,
    ) {
        if remaining == 0 {
            if via.is_none() {
                paths.push(StackPath {
                    base: node,
                    tokens: tokens.iter().rev().cloned().collect(),
                });
            }
            return;
        }
        let Some(entry) = self.get(node) else {
            return;
        };
        let step = tokens.len();
        for (index, link) in entry.links.iter().enumerate() {
            let rest = match via {
                Some((target, required)) if target == node => {
                    if index != required {
                        continue;
                    }
                    None
                }
                other => other,
            };
            if !filter(step, index, &link.token) {
                continue;
            }
            tokens.push(link.token.clone());
            self.walk(link.target, remaining - 1, rest, tokens, filter, paths);
            tokens.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// r <- x <- {y1, y2} <- m (joins both) <- n
    struct Fixture {
        trellis: Trellis<&'static str>,
        root: NodeId,
        x: NodeId,
        m: NodeId,
        n: NodeId,
    }

    fn fixture() -> Fixture {
        let mut trellis = Trellis::new();
        let root = trellis.push_root(StateId(0));
        let x = trellis.push(StateId(1), 1, "x", root);
        let y1 = trellis.push(StateId(2), 2, "y1", x);
        let y2 = trellis.push(StateId(3), 2, "y2", x);
        let m = trellis.push(StateId(4), 3, "z1", y1);
        assert_eq!(trellis.add_alternative(m, "z2", y2), Some(1));
        let n = trellis.push(StateId(5), 4, "w", m);
        for node in [x, y1, y2, m, n] {
            trellis.seal(node);
        }
        // only the top stays held
        for node in [x, y1, y2, m] {
            trellis.release(node);
        }
        Fixture {
            trellis,
            root,
            x,
            m,
            n,
        }
    }

    #[test]
    fn test_paths_through_merge_point() {
        let fx = fixture();
        let paths = fx.trellis.find_paths_of_depth(fx.n, 3, |_, _, _| true);
        assert_eq!(
            paths,
            vec![
                StackPath {
                    base: fx.x,
                    tokens: vec!["y1", "z1", "w"],
                },
                StackPath {
                    base: fx.x,
                    tokens: vec!["y2", "z2", "w"],
                },
            ]
        );
    }

    #[test]
    fn test_path_counts_by_depth() {
        let fx = fixture();
        let count = |depth| fx.trellis.find_paths_of_depth(fx.n, depth, |_, _, _| true).len();
        assert_eq!(count(0), 1);
        assert_eq!(count(1), 1);
        assert_eq!(count(2), 2);
        assert_eq!(count(3), 2);
        assert_eq!(count(4), 2);
        // deeper than the stack
        assert_eq!(count(5), 0);

        let full = fx.trellis.find_paths_of_depth(fx.n, 4, |_, _, _| true);
        assert!(full.iter().all(|path| path.base == fx.root));
        assert_eq!(full[1].tokens, vec!["x", "y2", "z2", "w"]);
    }

    #[test]
    fn test_filter_prunes_links() {
        let fx = fixture();
        let paths = fx
            .trellis
            .find_paths_of_depth(fx.n, 3, |_, _, token| *token != "z2");
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].tokens, vec!["y1", "z1", "w"]);

        let alternatives_only = fx
            .trellis
            .find_paths_of_depth(fx.n, 2, |step, index, _| step != 1 || index == 1);
        assert_eq!(alternatives_only.len(), 1);
        assert_eq!(alternatives_only[0].tokens, vec!["z2", "w"]);
    }

    #[test]
    fn test_primary_and_alternative_links() {
        let fx = fixture();
        let m = fx.trellis.get(fx.m).unwrap();
        assert_eq!(m.token(), Some(&"z1"));
        assert_eq!(m.alternatives().len(), 1);
        assert_eq!(m.alternatives()[0].token, "z2");
        assert!(fx.trellis.get(fx.root).unwrap().target().is_none());
    }

    #[test]
    fn test_sealed_nodes_reject_links() {
        let mut fx = fixture();
        assert_eq!(fx.trellis.add_alternative(fx.m, "late", fx.x), None);
        assert_eq!(fx.trellis.get(fx.m).unwrap().links().len(), 2);
    }

    #[test]
    fn test_sweep_cascades() {
        let mut fx = fixture();
        assert_eq!(fx.trellis.live(), 6);
        assert_eq!(fx.trellis.sweep(), 0);
        fx.trellis.release(fx.n);
        assert_eq!(fx.trellis.sweep(), 5);
        assert_eq!(fx.trellis.live(), 1);
        assert!(fx.trellis.get(fx.root).is_some());
        fx.trellis.release(fx.root);
        assert_eq!(fx.trellis.sweep(), 1);
        assert_eq!(fx.trellis.live(), 0);
    }

    #[test]
    fn test_retained_node_survives_sweep() {
        let mut fx = fixture();
        fx.trellis.retain(fx.m);
        fx.trellis.release(fx.n);
        assert_eq!(fx.trellis.sweep(), 1);
        assert_eq!(fx.trellis.get(fx.m).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_paths_through_one_link() {
        let fx = fixture();
        let all = |_: usize, _: usize, _: &&str| true;
        let through = |via, link, depth| fx.trellis.find_paths_through(fx.n, depth, via, link, all);

        let paths = through(fx.m, 1, 3);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].tokens, vec!["y2", "z2", "w"]);
        assert_eq!(through(fx.n, 0, 3).len(), 2);
        // too short to cross the link below `m`
        assert!(through(fx.m, 0, 1).is_empty());
        assert!(through(fx.x, 0, 4).iter().all(|path| path.base == fx.root));
        assert_eq!(through(fx.x, 0, 4).len(), 2);
    }

    #[test]
    fn test_free_list_reuses_slots() {
        let mut trellis: Trellis<&'static str> = Trellis::new();
        let root = trellis.push_root(StateId(0));
        let a = trellis.push(StateId(1), 1, "a", root);
        trellis.release(a);
        trellis.sweep();
        let b = trellis.push(StateId(1), 1, "b", root);
        assert_eq!(a, b);
        assert_eq!(trellis.created(), 3);
        assert_eq!(trellis.live(), 2);
    }
}
