//! Human-readable snapshots of a node's routing state.

use serde::Deserialize;
use serde::Serialize;

use crate::node::NodeHandle;
use crate::node::NodePool;

/// Snapshot of the local node's tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInspect {
    pub id: String,
    pub address: String,
    pub successors: Vec<String>,
    #[serde(default)]
    pub predecessor: Option<String>,
    /// Finger rows with equal targets folded into `(node, first, last)`
    /// row ranges; `node` is None for runs of unresolved rows.
    pub finger_table: Vec<(Option<String>, usize, usize)>,
}

impl NodeInspect {
    pub fn capture(pool: &NodePool) -> Self {
        let local = pool.local();
        let (successors, predecessor, rows) = match local.state() {
            Ok(state) => (
                state.successors.list().iter().map(|p| p.to_string()).collect(),
                state.predecessor.as_ref().map(|p| p.to_string()),
                state
                    .finger
                    .rows()
                    .iter()
                    .map(|row| row.as_ref().map(|p| p.to_string()))
                    .collect::<Vec<_>>(),
            ),
            Err(_) => (vec![], None, vec![]),
        };

        Self {
            id: local.id().to_string(),
            address: local.addr().to_string(),
            successors,
            predecessor,
            finger_table: compress_rows(rows),
        }
    }
}

fn compress_rows(rows: Vec<Option<String>>) -> Vec<(Option<String>, usize, usize)> {
    let mut folded: Vec<(Option<String>, usize, usize)> = vec![];
    for (slot, row) in rows.into_iter().enumerate() {
        let index = slot + 1;
        match folded.last_mut() {
            Some((node, _, last)) if *node == row && *last == index - 1 => *last = index,
            _ => folded.push((row, index, index)),
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_rows_folds_runs() {
        let a = Some("a".to_string());
        let b = Some("b".to_string());
        let rows = vec![a.clone(), a.clone(), None, b.clone(), b.clone(), b.clone()];
        assert_eq!(compress_rows(rows), vec![
            (a, 1, 2),
            (None, 3, 3),
            (b, 4, 6),
        ]);
    }
}
