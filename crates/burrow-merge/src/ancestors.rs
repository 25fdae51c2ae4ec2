use burrow_store::{ChunkIo, CommitBox, StoreResult};
use burrow_types::BoxPointer;

use crate::error::{MergeError, MergeResult};

/// How many commits to load per chain per round.
///
/// Both sides advance in lockstep batches so neither history is walked
/// much deeper than necessary before an intersection shows up.
const LOAD_BATCH: usize = 3;

/// A commit loaded from storage together with its own pointer.
///
/// Commits are identified by content hash, so pointer equality is commit
/// equality; the pointer is carried alongside because a decoded
/// [`CommitBox`] does not know its own address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitNode {
    pub pointer: BoxPointer,
    pub commit: CommitBox,
}

impl CommitNode {
    /// Read the commit a pointer references.
    pub fn read_from(io: &dyn ChunkIo, pointer: &BoxPointer) -> StoreResult<Self> {
        Ok(Self {
            pointer: *pointer,
            commit: CommitBox::read_from(io, pointer)?,
        })
    }

    fn same_commit(&self, other: &CommitNode) -> bool {
        self.pointer.data_hash == other.pointer.data_hash
    }
}

/// One chain of commits from a head down to -- and including -- a shared
/// ancestor. At a merge commit only one parent is followed per chain;
/// the other parents fork new chains.
#[derive(Clone, Debug)]
pub struct SingleCommitChain {
    /// Commits in walk order: the head first, the oldest loaded last.
    pub commits: Vec<CommitNode>,
    reached_root: bool,
}

impl SingleCommitChain {
    fn new(head: CommitNode) -> Self {
        Self {
            commits: vec![head],
            reached_root: false,
        }
    }

    /// Number of commits in the chain.
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Returns `true` if the chain holds only its head (identical heads).
    pub fn is_head_only(&self) -> bool {
        self.commits.len() <= 1
    }

    /// The oldest commit loaded so far; after truncation, the shared
    /// ancestor itself.
    pub fn ancestor(&self) -> &CommitNode {
        self.commits.last().expect("chain always holds its head")
    }

    fn contains(&self, node: &CommitNode) -> bool {
        self.commits.iter().any(|c| c.same_commit(node))
    }

    /// Drop everything older than the given ancestor, making it the tail.
    fn truncate_at(&mut self, ancestor: &CommitNode) {
        if let Some(index) = self.commits.iter().position(|c| c.same_commit(ancestor)) {
            self.commits.truncate(index + 1);
        }
    }

    /// Load up to `batch` more commits, following first parents; other
    /// parents of merge commits fork clones of this chain into `forks`.
    fn extend(
        &mut self,
        io: &dyn ChunkIo,
        batch: usize,
        forks: &mut Vec<SingleCommitChain>,
    ) -> MergeResult<()> {
        for _ in 0..batch {
            if self.reached_root {
                return Ok(());
            }
            let parents = self.ancestor().commit.parents.clone();
            if parents.is_empty() {
                self.reached_root = true;
                return Ok(());
            }
            for parent in &parents[1..] {
                let mut fork = self.clone();
                fork.commits.push(CommitNode::read_from(io, parent)?);
                forks.push(fork);
            }
            self.commits.push(CommitNode::read_from(io, &parents[0])?);
        }
        Ok(())
    }
}

/// The result of merge-base discovery: every maximal chain from the
/// "theirs" head down to a commit shared with the "ours" history.
#[derive(Debug, Default)]
pub struct Chains {
    pub chains: Vec<SingleCommitChain>,
}

impl Chains {
    /// The shortest chain, i.e. the one ending at the nearest common
    /// ancestor. Length ties break on the lowest ancestor commit hash so
    /// the choice is reproducible across replicas.
    pub fn shortest_chain(&self) -> Option<&SingleCommitChain> {
        self.chains.iter().min_by(|a, b| {
            a.len()
                .cmp(&b.len())
                .then_with(|| a.ancestor().pointer.data_hash.cmp(&b.ancestor().pointer.data_hash))
        })
    }

    fn all_finished(&self) -> bool {
        self.chains.iter().all(|c| c.reached_root)
    }

    fn extend_all(&mut self, io: &dyn ChunkIo) -> MergeResult<()> {
        let mut forks = Vec::new();
        for chain in &mut self.chains {
            chain.extend(io, LOAD_BATCH, &mut forks)?;
        }
        // Forked chains catch up in later rounds.
        self.chains.append(&mut forks);
        Ok(())
    }
}

/// Walks two commit graphs backward from their heads to find every chain
/// ending in a shared ancestor (merge-base computation).
pub struct CommonAncestorsFinder;

impl CommonAncestorsFinder {
    /// Find all common-ancestor chains between two heads.
    ///
    /// The two heads may live in physically separate stores; each side is
    /// read through its own [`ChunkIo`]. Identical heads yield a single
    /// head-only chain. Two histories without any shared commit fail with
    /// [`MergeError::NoCommonAncestor`].
    pub fn find(
        local_io: &dyn ChunkIo,
        local_head: CommitNode,
        others_io: &dyn ChunkIo,
        others_head: CommitNode,
    ) -> MergeResult<Chains> {
        let mut local_chains = Chains {
            chains: vec![SingleCommitChain::new(local_head)],
        };
        let mut ongoing: Vec<SingleCommitChain> = vec![SingleCommitChain::new(others_head)];
        let mut results = Chains::default();

        while !ongoing.is_empty() {
            // Match before loading so identical heads terminate without I/O.
            let mut still_ongoing = Vec::new();
            for mut other_chain in ongoing {
                match find_common(&local_chains, &other_chain) {
                    Some(ancestor) => {
                        other_chain.truncate_at(&ancestor);
                        results.chains.push(other_chain);
                    }
                    None => still_ongoing.push(other_chain),
                }
            }
            ongoing = still_ongoing;
            if ongoing.is_empty() {
                break;
            }

            if local_chains.all_finished() && ongoing.iter().all(|c| c.reached_root) {
                return Err(MergeError::NoCommonAncestor);
            }

            local_chains.extend_all(local_io)?;
            let mut forks = Vec::new();
            for chain in &mut ongoing {
                chain.extend(others_io, LOAD_BATCH, &mut forks)?;
            }
            ongoing.append(&mut forks);
        }

        Ok(results)
    }
}

/// The most recent commit of `other_chain` that appears anywhere in the
/// local chains.
fn find_common(local_chains: &Chains, other_chain: &SingleCommitChain) -> Option<CommitNode> {
    for other in &other_chain.commits {
        for local_chain in &local_chains.chains {
            if local_chain.contains(other) {
                return Some(other.clone());
            }
        }
    }
    None
}
