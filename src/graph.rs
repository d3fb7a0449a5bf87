use crate::error::{TransformError, TransformResult};
use crate::link::Link;
use crate::transform::StampedTransform;
use crate::FrameIdString;
use cu29::clock::CuDuration;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use std::collections::HashMap;

/// Undirected graph of coordinate frames connected by transformation links.
///
/// Frames and links are created lazily on first write and never removed,
/// so petgraph's node and edge indices stay stable for the lifetime of the
/// memory. Between any two frames at most one link exists; the frame named
/// as the source on the creating write becomes its parent.
#[derive(Debug)]
pub struct FrameGraph {
    graph: UnGraph<FrameIdString, Link>,
    frame_indices: HashMap<FrameIdString, NodeIndex>,
    horizon: CuDuration,
}

impl FrameGraph {
    pub fn new(horizon: CuDuration) -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            frame_indices: HashMap::new(),
            horizon,
        }
    }

    pub fn storage_horizon(&self) -> CuDuration {
        self.horizon
    }

    /// Idempotently registers a frame and returns its stable handle.
    pub fn ensure_frame(&mut self, id: &str) -> NodeIndex {
        let key = FrameIdString::from(id).expect("frame name too long (max 64 chars)");
        *self
            .frame_indices
            .entry(key)
            .or_insert_with(|| self.graph.add_node(key))
    }

    pub fn frame(&self, id: &str) -> Option<NodeIndex> {
        self.frame_indices.get(id).copied()
    }

    pub fn frame_id(&self, idx: NodeIndex) -> &FrameIdString {
        &self.graph[idx]
    }

    /// Records a sample on the link between `src` and `dst`, creating both
    /// frames and the link as needed.
    ///
    /// Returns whether the link accepted the sample; a false return means
    /// the stamp fell behind the storage horizon and the caller should
    /// report it. Self-connections are rejected outright.
    pub fn connect(
        &mut self,
        src: &str,
        dst: &str,
        sample: StampedTransform,
    ) -> TransformResult<bool> {
        if src == dst {
            return Err(TransformError::SelfLoop(src.to_string()));
        }

        let s = self.ensure_frame(src);
        let d = self.ensure_frame(dst);

        let edge = match self.graph.find_edge(s, d) {
            Some(e) => e,
            None => {
                let link = Link::new(self.graph[s], self.graph[d], self.horizon);
                self.graph.add_edge(s, d, link)
            }
        };

        Ok(self.graph[edge].insert(src, sample))
    }

    /// The link between two frames, in either orientation.
    pub fn link_between(&self, a: &str, b: &str) -> Option<&Link> {
        let (a, b) = (self.frame(a)?, self.frame(b)?);
        let edge = self.graph.find_edge(a, b)?;
        Some(&self.graph[edge])
    }

    pub fn link_between_mut(&mut self, a: &str, b: &str) -> Option<&mut Link> {
        let (a, b) = (self.frame(a)?, self.frame(b)?);
        let edge = self.graph.find_edge(a, b)?;
        Some(&mut self.graph[edge])
    }

    /// Iterates the frames directly linked to `id`.
    pub fn neighbors(&self, id: &str) -> impl Iterator<Item = &FrameIdString> + '_ {
        self.frame(id)
            .into_iter()
            .flat_map(|idx| self.graph.neighbors(idx))
            .map(|n| &self.graph[n])
    }

    pub fn frame_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn link(&self, edge: EdgeIndex) -> &Link {
        &self.graph[edge]
    }

    pub(crate) fn topology(&self) -> &UnGraph<FrameIdString, Link> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::RigidTransform;
    use cu29::clock::CuDuration;
    use glam::{DQuat, DVec3};

    fn sample(stamp: u64, x: f64) -> StampedTransform {
        StampedTransform::new(
            CuDuration(stamp),
            RigidTransform::new(DQuat::IDENTITY, DVec3::new(x, 0.0, 0.0)),
        )
    }

    fn graph() -> FrameGraph {
        FrameGraph::new(CuDuration(u64::MAX))
    }

    #[test]
    fn test_ensure_frame_idempotent() {
        let mut g = graph();
        let a = g.ensure_frame("world");
        let b = g.ensure_frame("world");
        assert_eq!(a, b);
        assert_eq!(g.frame_count(), 1);
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut g = graph();
        let err = g.connect("world", "world", sample(1_000, 1.0)).unwrap_err();
        assert!(matches!(err, TransformError::SelfLoop(_)));
        assert_eq!(g.frame_count(), 0);
    }

    #[test]
    fn test_single_link_per_unordered_pair() {
        let mut g = graph();

        assert!(g.connect("world", "robot", sample(1_000, 1.0)).unwrap());
        // The reverse orientation lands on the same link.
        assert!(g.connect("robot", "world", sample(2_000, 2.0)).unwrap());

        assert_eq!(g.link_count(), 1);
        let link = g.link_between("robot", "world").unwrap();
        assert_eq!(link.parent().as_str(), "world");
        assert_eq!(link.len(), 2);
    }

    #[test]
    fn test_link_between_absent() {
        let mut g = graph();
        g.connect("world", "robot", sample(1_000, 1.0)).unwrap();
        assert!(g.link_between("world", "camera").is_none());
        assert!(g.link_between("camera", "lidar").is_none());
    }

    #[test]
    fn test_neighbors() {
        let mut g = graph();
        g.connect("world", "robot", sample(1_000, 1.0)).unwrap();
        g.connect("robot", "camera", sample(1_000, 0.5)).unwrap();

        let mut around_robot: Vec<&str> =
            g.neighbors("robot").map(|id| id.as_str()).collect();
        around_robot.sort_unstable();
        assert_eq!(around_robot, vec!["camera", "world"]);

        assert_eq!(g.neighbors("nowhere").count(), 0);
    }
}
