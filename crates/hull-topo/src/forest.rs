//! Disjoint-set forest with per-root payloads.
//!
//! Shared by the zone engine (payload = air amount) and the wiring engine
//! (no payload). Removal does not exist at this layer; owning engines model
//! it by retiring nodes behind fresh ones, or by rebuilding the forest.

/// Index of one node in a [`Forest`].
pub type NodeId = u32;

/// Per-root payload carried by a forest. Merged into the surviving root on
/// every union; the strategy is supplied by the use site, not inherited.
pub trait RootPayload: Sized {
    fn merge(self, other: Self) -> Self;
}

impl RootPayload for () {
    #[inline]
    fn merge(self, _other: ()) -> Self {}
}

struct Node {
    parent: NodeId,
    rank: u8,
    // Number of nodes in the component; meaningful only at roots.
    size: u32,
}

pub struct Forest<P> {
    nodes: Vec<Node>,
    // One slot per node; Some only at roots that carry a payload.
    payloads: Vec<Option<P>>,
}

impl<P: RootPayload> Forest<P> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            payloads: Vec::new(),
        }
    }

    pub fn with_len(n: usize) -> Self {
        let mut f = Self::new();
        f.alloc_n(n);
        f
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append one singleton node and return its id.
    pub fn alloc(&mut self) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node {
            parent: id,
            rank: 0,
            size: 1,
        });
        self.payloads.push(None);
        id
    }

    /// Append `n` singleton nodes, returning the id of the first.
    pub fn alloc_n(&mut self, n: usize) -> NodeId {
        let base = self.nodes.len() as NodeId;
        for _ in 0..n {
            self.alloc();
        }
        base
    }

    /// Root of `n`'s component, with full path compression: every node on
    /// the walk is repointed directly at the root.
    pub fn find(&mut self, n: NodeId) -> NodeId {
        let mut root = n;
        while self.nodes[root as usize].parent != root {
            root = self.nodes[root as usize].parent;
        }
        let mut cur = n;
        while cur != root {
            let next = self.nodes[cur as usize].parent;
            self.nodes[cur as usize].parent = root;
            cur = next;
        }
        root
    }

    /// Union the components of `a` and `b`; returns the surviving root.
    /// Rank-based: the lower-rank root is attached under the higher, sizes
    /// are summed, payloads merged via [`RootPayload::merge`].
    pub fn union(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        let (winner, loser) = if self.nodes[ra as usize].rank >= self.nodes[rb as usize].rank {
            (ra, rb)
        } else {
            (rb, ra)
        };
        if self.nodes[winner as usize].rank == self.nodes[loser as usize].rank {
            self.nodes[winner as usize].rank += 1;
        }
        self.nodes[loser as usize].parent = winner;
        self.nodes[winner as usize].size += self.nodes[loser as usize].size;
        if let Some(from) = self.payloads[loser as usize].take() {
            self.payloads[winner as usize] = Some(match self.payloads[winner as usize].take() {
                Some(into) => into.merge(from),
                None => from,
            });
        }
        winner
    }

    /// Component size; resolves `n` to its root first.
    #[inline]
    pub fn size_of(&mut self, n: NodeId) -> u32 {
        let r = self.find(n);
        self.nodes[r as usize].size
    }

    /// Overwrite the size recorded at `n`'s root. The zone engine uses this
    /// after a fast no-split shrinks a component by one cell.
    pub fn set_size(&mut self, n: NodeId, size: u32) {
        let r = self.find(n);
        self.nodes[r as usize].size = size;
    }

    /// Hand root identity of `old_root`'s component to `heir`, which must be
    /// a member of the same component. Rank, size, and payload move to the
    /// heir; the old root becomes an interior node. Needed when a root node
    /// leaves service (its cell turned solid) while its component survives.
    pub fn reroot(&mut self, old_root: NodeId, heir: NodeId) {
        debug_assert_eq!(self.find(heir), old_root);
        let r = self.find(heir);
        if r == heir {
            return;
        }
        let rank = self.nodes[r as usize].rank;
        let size = self.nodes[r as usize].size;
        self.nodes[heir as usize].parent = heir;
        // Strictly above the old root so future unions keep the tree shallow.
        self.nodes[heir as usize].rank = rank.saturating_add(1);
        self.nodes[heir as usize].size = size;
        self.nodes[r as usize].parent = heir;
        if let Some(p) = self.payloads[r as usize].take() {
            self.payloads[heir as usize] = Some(p);
        }
    }

    /// Payload at `n`'s root, if any.
    pub fn payload(&mut self, n: NodeId) -> Option<&P> {
        let r = self.find(n);
        self.payloads[r as usize].as_ref()
    }

    /// Install or replace the payload at `n`'s root.
    pub fn set_payload(&mut self, n: NodeId, p: P) {
        let r = self.find(n);
        self.payloads[r as usize] = Some(p);
    }

    /// Remove and return the payload at `n`'s root.
    pub fn take_payload(&mut self, n: NodeId) -> Option<P> {
        let r = self.find(n);
        self.payloads[r as usize].take()
    }

    /// Merge `p` into the payload at `n`'s root (installing it if absent).
    pub fn merge_payload(&mut self, n: NodeId, p: P) {
        let r = self.find(n) as usize;
        self.payloads[r] = Some(match self.payloads[r].take() {
            Some(into) => into.merge(p),
            None => p,
        });
    }

    /// Visit every root that carries a payload.
    pub fn for_each_payload(&self, mut f: impl FnMut(NodeId, &P)) {
        for (i, p) in self.payloads.iter().enumerate() {
            if let Some(p) = p {
                debug_assert_eq!(self.nodes[i].parent, i as NodeId);
                f(i as NodeId, p);
            }
        }
    }
}

impl<P: RootPayload> Default for Forest<P> {
    fn default() -> Self {
        Self::new()
    }
}
