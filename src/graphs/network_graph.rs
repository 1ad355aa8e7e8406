use std::slice::Iter;

use serde_derive::{Deserialize, Serialize};

use super::{
    edge::{HeadlessEdge, NetworkEdge, TaillessEdge},
    PointIndex,
};

/// Adjacency of the network point graph, kept in both directions. Edge lists
/// are sorted by the opposite endpoint so lookups are binary searches.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct NetworkGraph {
    out_edges: Vec<Vec<TaillessEdge>>,
    in_edges: Vec<Vec<HeadlessEdge>>,
}

pub struct OutEdgeIterator<'a> {
    tail: PointIndex,
    edges: Iter<'a, TaillessEdge>,
}

impl<'a> Iterator for OutEdgeIterator<'a> {
    type Item = NetworkEdge;

    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.edges.next()?;
        Some(edge.set_tail(self.tail))
    }
}

impl<'a> ExactSizeIterator for OutEdgeIterator<'a> {
    fn len(&self) -> usize {
        self.edges.len()
    }
}

pub struct InEdgeIterator<'a> {
    head: PointIndex,
    edges: Iter<'a, HeadlessEdge>,
}

impl<'a> Iterator for InEdgeIterator<'a> {
    type Item = NetworkEdge;

    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.edges.next()?;
        Some(edge.set_head(self.head))
    }
}

impl<'a> ExactSizeIterator for InEdgeIterator<'a> {
    fn len(&self) -> usize {
        self.edges.len()
    }
}

impl NetworkGraph {
    pub fn new(number_of_points: usize) -> Self {
        NetworkGraph {
            out_edges: vec![Vec::new(); number_of_points],
            in_edges: vec![Vec::new(); number_of_points],
        }
    }

    /// Builds the graph keeping the cheapest edge of parallel duplicates.
    pub fn from_edges(number_of_points: usize, edges: &[NetworkEdge]) -> NetworkGraph {
        let mut graph = NetworkGraph::new(number_of_points);
        for edge in edges {
            match graph.get_edge(edge.tail(), edge.head()) {
                Some(existing) if existing.distance() <= edge.distance() => {}
                _ => graph.set_edge(edge),
            }
        }
        graph
    }

    pub fn number_of_points(&self) -> usize {
        self.out_edges.len()
    }

    pub fn number_of_edges(&self) -> usize {
        self.out_edges.iter().map(Vec::len).sum()
    }

    pub fn out_edges(&self, tail: PointIndex) -> OutEdgeIterator<'_> {
        let edges = match self.out_edges.get(tail as usize) {
            Some(edges) => edges.iter(),
            None => [].iter(),
        };
        OutEdgeIterator { tail, edges }
    }

    pub fn in_edges(&self, head: PointIndex) -> InEdgeIterator<'_> {
        let edges = match self.in_edges.get(head as usize) {
            Some(edges) => edges.iter(),
            None => [].iter(),
        };
        InEdgeIterator { head, edges }
    }

    pub fn get_edge(&self, tail: PointIndex, head: PointIndex) -> Option<NetworkEdge> {
        let edges = self.out_edges.get(tail as usize)?;
        let idx = edges
            .binary_search_by_key(&head, |edge| edge.head())
            .ok()?;
        Some(edges[idx].set_tail(tail))
    }

    /// Inserts the edge, overwriting an existing edge between the same points.
    pub fn set_edge(&mut self, edge: &NetworkEdge) {
        self.ensure_point(edge.tail().max(edge.head()));

        let out_edges = &mut self.out_edges[edge.tail() as usize];
        match out_edges.binary_search_by_key(&edge.head(), |out_edge| out_edge.head()) {
            Ok(idx) => out_edges[idx] = edge.tailless(),
            Err(idx) => out_edges.insert(idx, edge.tailless()),
        }

        let in_edges = &mut self.in_edges[edge.head() as usize];
        match in_edges.binary_search_by_key(&edge.tail(), |in_edge| in_edge.tail()) {
            Ok(idx) => in_edges[idx] = edge.headless(),
            Err(idx) => in_edges.insert(idx, edge.headless()),
        }
    }

    pub fn remove_edge(&mut self, tail: PointIndex, head: PointIndex) -> Option<NetworkEdge> {
        let out_edges = self.out_edges.get_mut(tail as usize)?;
        let idx = out_edges
            .binary_search_by_key(&head, |out_edge| out_edge.head())
            .ok()?;
        let removed = out_edges.remove(idx).set_tail(tail);

        if let Some(in_edges) = self.in_edges.get_mut(head as usize) {
            if let Ok(idx) = in_edges.binary_search_by_key(&tail, |in_edge| in_edge.tail()) {
                in_edges.remove(idx);
            }
        }
        Some(removed)
    }

    fn ensure_point(&mut self, point: PointIndex) {
        let len = point as usize + 1;
        if self.out_edges.len() < len {
            self.out_edges.resize(len, Vec::new());
            self.in_edges.resize(len, Vec::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(tail: PointIndex, head: PointIndex, distance: f64) -> NetworkEdge {
        NetworkEdge::new(tail, head, distance, false).unwrap()
    }

    #[test]
    fn keeps_both_directions_in_sync() {
        let mut graph = NetworkGraph::from_edges(3, &[edge(0, 2, 4.0), edge(0, 1, 2.0), edge(0, 1, 1.0)]);
        assert_eq!(graph.number_of_edges(), 2);
        assert_eq!(graph.get_edge(0, 1).unwrap().distance(), 1.0);
        assert_eq!(graph.in_edges(2).next().unwrap().tail(), 0);

        graph.remove_edge(0, 2);
        assert!(graph.get_edge(0, 2).is_none());
        assert_eq!(graph.in_edges(2).len(), 0);
    }
}
