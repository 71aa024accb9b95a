//! Fixed path topology units walk along.

use glam::Vec3;

/// Ordered path nodes with cached segment lengths.
#[derive(Clone, Debug, PartialEq)]
pub struct PathGraph {
    positions: Vec<[f32; 3]>,
    distances: Vec<f32>,
    cumulative: Vec<f32>,
}

impl PathGraph {
    /// Builds a path from ordered node positions.
    #[must_use]
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        let distances: Vec<f32> = positions
            .windows(2)
            .map(|pair| Vec3::from(pair[0]).distance(Vec3::from(pair[1])))
            .collect();
        let mut cumulative = Vec::with_capacity(positions.len());
        let mut travelled = 0.0;
        if !positions.is_empty() {
            cumulative.push(0.0);
        }
        for distance in &distances {
            travelled += distance;
            cumulative.push(travelled);
        }
        Self {
            positions,
            distances,
            cumulative,
        }
    }

    /// Node positions in walking order.
    #[must_use]
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    /// Lengths of the segments between consecutive nodes.
    #[must_use]
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Total walking length of the path.
    #[must_use]
    pub fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Index of the furthest node passed after walking `distance`.
    #[must_use]
    pub fn node_at_distance(&self, distance: f32) -> u32 {
        let passed = self
            .cumulative
            .partition_point(|reached| *reached <= distance)
            .saturating_sub(1);
        u32::try_from(passed).unwrap_or(u32::MAX)
    }
}

impl Default for PathGraph {
    /// Twelve-node serpentine used by headless simulation.
    fn default() -> Self {
        Self::new(vec![
            [0.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
            [4.0, 0.0, 4.0],
            [0.0, 0.0, 4.0],
            [0.0, 0.0, 8.0],
            [4.0, 0.0, 8.0],
            [8.0, 0.0, 8.0],
            [8.0, 0.0, 4.0],
            [12.0, 0.0, 4.0],
            [12.0, 0.0, 8.0],
            [12.0, 0.0, 12.0],
            [16.0, 0.0, 12.0],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_lookup_follows_cumulative_length() {
        let path = PathGraph::new(vec![[0.0, 0.0, 0.0], [3.0, 0.0, 0.0], [3.0, 0.0, 4.0]]);
        assert_eq!(path.distances(), &[3.0, 4.0]);
        assert!((path.length() - 7.0).abs() < f32::EPSILON);
        assert_eq!(path.node_at_distance(0.0), 0);
        assert_eq!(path.node_at_distance(2.9), 0);
        assert_eq!(path.node_at_distance(3.0), 1);
        assert_eq!(path.node_at_distance(100.0), 2);
    }

    #[test]
    fn empty_path_has_zero_length() {
        let path = PathGraph::new(Vec::new());
        assert_eq!(path.length(), 0.0);
        assert_eq!(path.node_at_distance(1.0), 0);
    }
}
