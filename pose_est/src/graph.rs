//! # Part Graph
//!
//! Represents the population of one frame as a weighted directed acyclic graph. Nodes are the
//! population indices; an edge runs from node `i` to node `j` only when the label of `j` is the
//! immediate successor of the label of `i`, so the graph is layered by part type and the
//! ascending index order is a valid topological order.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::distance;

use trial_if::frame::Frame;
use trial_if::parts::LabelAdjacency;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A weighted DAG over the candidate points of one frame.
///
/// Stored as an index-keyed adjacency list: `adj[i]` holds the `(target, weight)` pairs of all
/// edges out of node `i`, and every node has an entry even when it has no outgoing edges.
#[derive(Debug, Clone, Default)]
pub struct PartGraph {
    adj: Vec<Vec<(usize, f64)>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised by graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("No unbroken predecessor chain from a source node to node {0}")]
    PathBroken(usize),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The canonical edge cost: squared difference of measured and expected distance.
pub fn sq_diff_cost(measured: f64, expected: f64) -> f64 {
    (measured - expected).powi(2)
}

/// Build the weighted part graph of a frame.
///
/// An edge `(i, j)` is emitted iff the label of `j` is exactly one greater than the label of
/// `i` and the pair is present in `consecutive`. The edge weight is
/// `cost(measured, expected)`, which must be non-negative for the shortest path relaxation to
/// be meaningful.
pub fn build_graph<F>(frame: &Frame, consecutive: &LabelAdjacency, cost: F) -> PartGraph
where
    F: Fn(f64, f64) -> f64,
{
    let n = frame.len();
    let labels = frame.labels();
    let points = frame.population();

    let mut adj = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            if labels[j] != labels[i] + 1 {
                continue;
            }

            if let Some(expected) = consecutive.expected(labels[i], labels[j]) {
                let measured = distance(&points[i], &points[j]);
                adj[i].push((j, cost(measured, expected)));
            }
        }
    }

    PartGraph { adj }
}

/// Single-source shortest paths over a topologically ordered DAG.
///
/// Source nodes start at distance zero, all others at infinity. Nodes are relaxed in ascending
/// index order, which the label sort guarantees to be a valid topological order. On equal
/// distances the existing predecessor is kept, so ties break towards the first writer.
///
/// Returns the predecessor of each node on its shortest path (`None` for sources and
/// unreachable nodes) and the total distance to each node.
pub fn dag_shortest_paths(
    graph: &PartGraph,
    sources: &[usize],
) -> (Vec<Option<usize>>, Vec<f64>) {
    let n = graph.num_nodes();

    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut dist = vec![f64::INFINITY; n];

    for &s in sources {
        dist[s] = 0.0;
    }

    for v in 0..n {
        if !dist[v].is_finite() {
            continue;
        }

        for &(u, weight) in graph.edges(v) {
            if dist[v] + weight < dist[u] {
                dist[u] = dist[v] + weight;
                prev[u] = Some(v);
            }
        }
    }

    (prev, dist)
}

/// Build the part graph of a frame and run shortest paths from all head candidates.
pub fn pop_shortest_paths<F>(
    frame: &Frame,
    consecutive: &LabelAdjacency,
    cost: F,
) -> (Vec<Option<usize>>, Vec<f64>)
where
    F: Fn(f64, f64) -> f64,
{
    let graph = build_graph(frame, consecutive, cost);
    let sources: Vec<usize> = frame.nodes_with_label(0).collect();

    dag_shortest_paths(&graph, &sources)
}

/// Recover the node sequence from a source to `target` by walking the predecessor chain.
///
/// Fails with [`GraphError::PathBroken`] when the chain stops on a node which is not a source
/// (label zero), i.e. the target was never reached by the relaxation.
pub fn trace_path(
    prev: &[Option<usize>],
    labels: &[usize],
    target: usize,
) -> Result<Vec<usize>, GraphError> {
    let mut path = vec![target];
    let mut node = target;

    while let Some(p) = prev[node] {
        node = p;
        path.push(node);
    }

    if labels[node] != 0 {
        return Err(GraphError::PathBroken(target));
    }

    path.reverse();

    Ok(path)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PartGraph {
    /// Number of nodes in the graph.
    pub fn num_nodes(&self) -> usize {
        self.adj.len()
    }

    /// The outgoing edges of node `i` as `(target, weight)` pairs.
    pub fn edges(&self, i: usize) -> &[(usize, f64)] {
        &self.adj[i]
    }

    /// Iterate over all edges of the graph as `(from, to, weight)`.
    pub fn iter_edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.adj
            .iter()
            .enumerate()
            .flat_map(|(i, edges)| edges.iter().map(move |&(j, w)| (i, j, w)))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Point3;
    use trial_if::parts::LabelAdjacency;

    /// A population with one head, two hips and two feet, on a three label table.
    fn test_frame() -> Frame {
        Frame::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 10.0),
                Point3::new(0.0, 0.0, 11.0),
                Point3::new(0.0, 0.0, 20.0),
                Point3::new(0.0, 0.0, 25.0),
            ],
            vec![0, 1, 1, 2, 2],
        )
        .unwrap()
    }

    fn consecutive() -> LabelAdjacency {
        LabelAdjacency::from_lengths(&[(0, 1), (1, 2)], &[10.0, 10.0]).unwrap()
    }

    #[test]
    fn test_edges_connect_consecutive_labels_only() {
        let frame = test_frame();
        let graph = build_graph(&frame, &consecutive(), sq_diff_cost);

        for (i, j, weight) in graph.iter_edges() {
            assert_eq!(frame.labels()[j], frame.labels()[i] + 1);
            assert!(weight >= 0.0);
        }

        // Head connects to both hips, hips to both feet, feet to nothing
        assert_eq!(graph.edges(0).len(), 2);
        assert_eq!(graph.edges(1).len(), 2);
        assert_eq!(graph.edges(2).len(), 2);
        assert!(graph.edges(3).is_empty());
        assert!(graph.edges(4).is_empty());
    }

    #[test]
    fn test_shortest_path_consistency() {
        let frame = test_frame();
        let graph = build_graph(&frame, &consecutive(), sq_diff_cost);
        let (prev, dist) = dag_shortest_paths(&graph, &[0]);

        assert_eq!(dist[0], 0.0);
        assert_eq!(prev[0], None);

        // dist[v] == dist[u] + w(u, v) whenever prev[v] == u
        for (u, v, weight) in graph.iter_edges() {
            if prev[v] == Some(u) {
                assert!((dist[v] - (dist[u] + weight)).abs() < 1e-12);
            }
        }

        // The hip at z=10 is an exact match for the expected length of 10
        assert_eq!(prev[1], Some(0));
        assert_eq!(dist[1], 0.0);
    }

    #[test]
    fn test_tie_break_keeps_first_writer() {
        // Two heads equidistant from one hip: the lower-indexed head must win
        let frame = Frame::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 20.0),
                Point3::new(0.0, 0.0, 10.0),
            ],
            vec![0, 0, 1],
        )
        .unwrap();

        let cons = LabelAdjacency::from_lengths(&[(0, 1)], &[10.0]).unwrap();
        let graph = build_graph(&frame, &cons, sq_diff_cost);
        let (prev, dist) = dag_shortest_paths(&graph, &[0, 1]);

        assert_eq!(dist[2], 0.0);
        assert_eq!(prev[2], Some(0));
    }

    #[test]
    fn test_trace_path() {
        let frame = test_frame();
        let graph = build_graph(&frame, &consecutive(), sq_diff_cost);
        let (prev, _) = dag_shortest_paths(&graph, &[0]);

        let path = trace_path(&prev, frame.labels(), 3).unwrap();

        assert_eq!(path.len(), 3);
        assert_eq!(path[0], 0);
        assert_eq!(path[2], 3);

        // Labels along the path strictly increase by one
        for w in path.windows(2) {
            assert_eq!(frame.labels()[w[1]], frame.labels()[w[0]] + 1);
        }
    }

    #[test]
    fn test_trace_path_broken() {
        // The hip is unreachable: no head source was given
        let frame = test_frame();
        let graph = build_graph(&frame, &consecutive(), sq_diff_cost);
        let (prev, _) = dag_shortest_paths(&graph, &[]);

        assert!(matches!(
            trace_path(&prev, frame.labels(), 3),
            Err(GraphError::PathBroken(3))
        ));
    }
}
