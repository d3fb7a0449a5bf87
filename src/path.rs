use crate::error::{LinkFailure, TransformError, TransformResult};
use crate::graph::FrameGraph;
use crate::transform::RigidTransform;
use crate::FrameIdString;
use cu29::clock::{CuDuration, CuTime};
use petgraph::algo::dijkstra;
use petgraph::graph::EdgeIndex;
use petgraph::visit::EdgeRef;

/// Fixed scan step of the best-common-timestamp search: 5 ms.
pub const BEST_TIME_STEP: CuDuration = CuDuration(5_000_000);

/// An ordered chain of links from a source frame to a destination frame,
/// remembering which end the query started from.
#[derive(Clone, Debug)]
pub struct ResolvedPath {
    pub(crate) src: FrameIdString,
    pub(crate) edges: Vec<EdgeIndex>,
}

impl ResolvedPath {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

fn no_such_link(src: &str, dst: &str, reason: LinkFailure) -> TransformError {
    TransformError::NoSuchLink {
        from: src.to_string(),
        to: dst.to_string(),
        reason,
    }
}

/// Shortest weighted chain of links from `src` to `dst`.
///
/// Dijkstra runs from `dst` with `src` as the goal, so the cost map holds
/// each settled frame's distance to the destination; the reconstruction
/// walk then starts at `src` and at every frame takes the incident link
/// minimizing `cost(other end) + weight(link)`. The walk never mutates the
/// graph, and link iteration order is fixed for an unchanged graph, which
/// keeps equal-cost tie-breaking stable across identical queries.
pub(crate) fn shortest_path(
    graph: &FrameGraph,
    src: &str,
    dst: &str,
) -> TransformResult<ResolvedPath> {
    if src == dst {
        return Err(TransformError::InvalidQuery(src.to_string()));
    }

    let (Some(s), Some(d)) = (graph.frame(src), graph.frame(dst)) else {
        return Err(no_such_link(src, dst, LinkFailure::UnknownFrame));
    };

    let topology = graph.topology();
    let costs = dijkstra(topology, d, Some(s), |e| e.weight().weight());
    if !costs.contains_key(&s) {
        return Err(no_such_link(src, dst, LinkFailure::Disconnected));
    }

    let mut edges = Vec::new();
    let mut current = s;
    while current != d {
        let mut next: Option<(f64, EdgeIndex, petgraph::graph::NodeIndex)> = None;
        for edge in topology.edges(current) {
            let other = if edge.source() == current {
                edge.target()
            } else {
                edge.source()
            };
            let Some(&cost) = costs.get(&other) else {
                continue;
            };
            let total = cost + edge.weight().weight();
            if next.map_or(true, |(best, _, _)| total < best) {
                next = Some((total, edge.id(), other));
            }
        }

        let Some((_, edge, other)) = next else {
            return Err(no_such_link(src, dst, LinkFailure::Disconnected));
        };
        edges.push(edge);
        current = other;

        if edges.len() > topology.node_count() {
            return Err(no_such_link(src, dst, LinkFailure::Disconnected));
        }
    }

    Ok(ResolvedPath {
        src: *graph.frame_id(s),
        edges,
    })
}

/// Composes the per-link transforms along `path` at `time` into the single
/// transform mapping coordinates in the path's source frame to its
/// destination frame.
pub(crate) fn compose_along(
    graph: &FrameGraph,
    path: &ResolvedPath,
    time: CuTime,
) -> TransformResult<RigidTransform> {
    let mut current = path.src;
    let mut accum = RigidTransform::IDENTITY;

    for &edge in &path.edges {
        let link = graph.link(edge);
        let other = *link
            .other_end(current.as_str())
            .expect("path walk left the link chain");

        let Some(step) = link.transform_at(current.as_str(), time) else {
            return Err(TransformError::NoSuchLink {
                from: current.to_string(),
                to: other.to_string(),
                reason: LinkFailure::EmptyHistory,
            });
        };

        accum = step.transform.compose(&accum);
        current = other;
    }

    Ok(accum)
}

/// The instant at which all links on `path` have the least-stale data.
///
/// Scans from the newest stamp on the path down to the oldest in fixed
/// [`BEST_TIME_STEP`] decrements, scoring each candidate by the sum over
/// the links of the squared millisecond distance to their nearest sample.
/// Squaring penalizes large gaps more than a plain sum, so the chosen
/// instant sits near the densest mutual sample region.
pub(crate) fn best_common_time(
    graph: &FrameGraph,
    path: &ResolvedPath,
) -> TransformResult<CuTime> {
    let mut t_max = u64::MIN;
    let mut t_min = u64::MAX;

    let mut current = path.src;
    for &edge in &path.edges {
        let link = graph.link(edge);
        let other = *link
            .other_end(current.as_str())
            .expect("path walk left the link chain");
        let Some(range) = link.time_range() else {
            return Err(TransformError::NoSuchLink {
                from: current.to_string(),
                to: other.to_string(),
                reason: LinkFailure::EmptyHistory,
            });
        };
        t_max = t_max.max(range.end.as_nanos());
        t_min = t_min.min(range.start.as_nanos());
        current = other;
    }

    let cost_at = |t: CuTime| -> f64 {
        path.edges
            .iter()
            .map(|&edge| {
                let distance = graph
                    .link(edge)
                    .distance_to_nearest(t)
                    .expect("scored link has history");
                let ms = distance.as_nanos() as f64 / 1e6;
                ms * ms
            })
            .sum()
    };

    let mut best_t = t_max;
    let mut best_cost = f64::INFINITY;
    let mut t = t_max;
    loop {
        let cost = cost_at(CuDuration(t));
        if cost < best_cost {
            best_cost = cost;
            best_t = t;
        }
        if t <= t_min {
            break;
        }
        t = t.saturating_sub(BEST_TIME_STEP.as_nanos()).max(t_min);
    }

    Ok(CuDuration(best_t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::StampedTransform;
    use approx::assert_relative_eq;
    use glam::{DQuat, DVec3};

    fn sample(stamp: u64, translation: DVec3) -> StampedTransform {
        StampedTransform::new(
            CuDuration(stamp),
            RigidTransform::new(DQuat::IDENTITY, translation),
        )
    }

    fn graph() -> FrameGraph {
        FrameGraph::new(CuDuration(u64::MAX))
    }

    #[test]
    fn test_invalid_query_before_graph_lookup() {
        let g = graph();
        let err = shortest_path(&g, "ghost", "ghost").unwrap_err();
        assert!(matches!(err, TransformError::InvalidQuery(_)));
    }

    #[test]
    fn test_unknown_frame() {
        let mut g = graph();
        g.connect("a", "b", sample(1_000, DVec3::X)).unwrap();

        let err = shortest_path(&g, "a", "ghost").unwrap_err();
        assert!(matches!(
            err,
            TransformError::NoSuchLink {
                reason: LinkFailure::UnknownFrame,
                ..
            }
        ));
    }

    #[test]
    fn test_disconnected_components() {
        let mut g = graph();
        g.connect("a", "b", sample(1_000, DVec3::X)).unwrap();
        g.connect("c", "d", sample(1_000, DVec3::Y)).unwrap();

        let err = shortest_path(&g, "a", "d").unwrap_err();
        assert!(matches!(
            err,
            TransformError::NoSuchLink {
                reason: LinkFailure::Disconnected,
                ..
            }
        ));
    }

    #[test]
    fn test_chain_path_and_composition() {
        let mut g = graph();
        g.connect("a", "b", sample(1_000_000_000, DVec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        g.connect("b", "c", sample(1_000_000_000, DVec3::new(0.0, 1.0, 0.0)))
            .unwrap();

        let path = shortest_path(&g, "a", "c").unwrap();
        assert_eq!(path.len(), 2);

        let t = compose_along(&g, &path, CuDuration(1_000_000_000)).unwrap();
        assert!(t.rotation.abs_diff_eq(DQuat::IDENTITY, 1e-12));
        assert_relative_eq!(t.translation.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.translation.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.translation.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reverse_composition_is_inverse() {
        let mut g = graph();
        g.connect("a", "b", sample(1_000, DVec3::new(1.0, 2.0, 3.0)))
            .unwrap();

        let forward = compose_along(
            &g,
            &shortest_path(&g, "a", "b").unwrap(),
            CuDuration(1_000),
        )
        .unwrap();
        let backward = compose_along(
            &g,
            &shortest_path(&g, "b", "a").unwrap(),
            CuDuration(1_000),
        )
        .unwrap();

        let round_trip = forward.compose(&backward);
        assert!(round_trip.rotation.abs_diff_eq(DQuat::IDENTITY, 1e-10));
        assert!(round_trip.translation.abs_diff_eq(DVec3::ZERO, 1e-10));
    }

    #[test]
    fn test_weighted_route_preferred() {
        let mut g = graph();
        // Direct a-c link exists but is heavily weighted; the two-hop route
        // through b costs 2.
        g.connect("a", "c", sample(1_000, DVec3::X)).unwrap();
        g.connect("a", "b", sample(1_000, DVec3::Y)).unwrap();
        g.connect("b", "c", sample(1_000, DVec3::Z)).unwrap();
        g.link_between_mut("a", "c").unwrap().set_weight(10.0);

        let path = shortest_path(&g, "a", "c").unwrap();
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_best_common_time_prefers_dense_region() {
        // Link a-b sampled at 0, 10 and 20 ms; link b-c only at 12 ms. The
        // scan grid hits 20, 15, 10, 5 and 0 ms; 10 ms scores (0² + 2²) and
        // wins over the initial 20 ms guess of (0² + 8²).
        let mut g = graph();
        for (stamp_ms, x) in [(0u64, 0.0), (10, 1.0), (20, 2.0)] {
            g.connect(
                "a",
                "b",
                sample(stamp_ms * 1_000_000, DVec3::new(x, 0.0, 0.0)),
            )
            .unwrap();
        }
        g.connect("b", "c", sample(12_000_000, DVec3::Y)).unwrap();

        let path = shortest_path(&g, "a", "c").unwrap();
        let best = best_common_time(&g, &path).unwrap();
        assert_eq!(best, CuDuration(10_000_000));
    }

    #[test]
    fn test_best_common_time_single_link() {
        let mut g = graph();
        g.connect("a", "b", sample(7_000_000, DVec3::X)).unwrap();
        g.connect("a", "b", sample(9_000_000, DVec3::X)).unwrap();

        let path = shortest_path(&g, "a", "b").unwrap();
        let best = best_common_time(&g, &path).unwrap();
        assert_eq!(best, CuDuration(9_000_000));
    }
}
