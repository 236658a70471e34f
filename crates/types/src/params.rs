//! Byzantine fault-tolerance parameters.

use crate::ReplicaId;

/// Errors when deriving quorum parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    #[error("replica count must be at least 1")]
    NoReplicas,
}

/// Thresholds derived once from the replica count `n`.
///
/// - `f = ⌊(n−1)/3⌋`: maximum number of Byzantine replicas tolerated
/// - `one_correct = f + 1`: any set this large contains a correct replica
/// - `quorum = n − f`: any two quorums intersect in a correct replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumParams {
    n: usize,
    f: usize,
    one_correct: usize,
    quorum: usize,
}

impl QuorumParams {
    pub fn new(n: usize) -> Result<Self, ParamsError> {
        if n == 0 {
            return Err(ParamsError::NoReplicas);
        }
        let f = (n - 1) / 3;
        Ok(Self {
            n,
            f,
            one_correct: f + 1,
            quorum: n - f,
        })
    }

    /// Number of replicas.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Maximum number of faulty replicas.
    pub fn fault(&self) -> usize {
        self.f
    }

    /// Size of a set guaranteed to include one correct replica.
    pub fn one_correct(&self) -> usize {
        self.one_correct
    }

    /// Quorum size.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Whether `replica` is a member of the cluster.
    pub fn contains(&self, replica: ReplicaId) -> bool {
        replica.0 >= 1 && replica.0 <= self.n as u64
    }

    /// All replica identifiers in ascending order.
    pub fn replicas(&self) -> impl Iterator<Item = ReplicaId> {
        (1..=self.n as u64).map(ReplicaId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_for_common_sizes() {
        let p = QuorumParams::new(4).unwrap();
        assert_eq!((p.fault(), p.one_correct(), p.quorum()), (1, 2, 3));

        let p = QuorumParams::new(7).unwrap();
        assert_eq!((p.fault(), p.one_correct(), p.quorum()), (2, 3, 5));

        let p = QuorumParams::new(1).unwrap();
        assert_eq!((p.fault(), p.one_correct(), p.quorum()), (0, 1, 1));

        // Non 3f+1 sizes round the fault bound down.
        let p = QuorumParams::new(6).unwrap();
        assert_eq!((p.fault(), p.one_correct(), p.quorum()), (1, 2, 5));
    }

    #[test]
    fn test_zero_replicas_rejected() {
        assert_eq!(QuorumParams::new(0), Err(ParamsError::NoReplicas));
    }

    #[test]
    fn test_membership() {
        let p = QuorumParams::new(4).unwrap();
        assert!(!p.contains(ReplicaId(0)));
        assert!(p.contains(ReplicaId(1)));
        assert!(p.contains(ReplicaId(4)));
        assert!(!p.contains(ReplicaId(5)));
        assert_eq!(p.replicas().count(), 4);
    }
}
