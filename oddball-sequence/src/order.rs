use crate::error::SequenceError;

/// Counterbalanced block orders, selected by participant id.
pub static BLOCK_ORDERS: [[usize; 4]; 4] = [
    [0, 1, 2, 3],
    [1, 0, 3, 2],
    [2, 3, 0, 1],
    [3, 2, 1, 0],
];

/// Returns the presentation order (indices into the block list) for a participant.
///
/// The table only covers four blocks; any other count is an error.
pub fn block_order(
    participant: u32,
    block_count: usize,
) -> Result<&'static [usize], SequenceError> {
    if block_count != BLOCK_ORDERS.len() {
        return Err(SequenceError::BlockCountMismatch {
            expected: BLOCK_ORDERS.len(),
            found: block_count,
        });
    }
    Ok(BLOCK_ORDERS[participant as usize % block_count].as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_order_is_a_permutation() {
        for order in BLOCK_ORDERS {
            let mut sorted = order;
            sorted.sort_unstable();
            assert_eq!(sorted, [0, 1, 2, 3]);
        }
    }

    #[test]
    fn participant_five_gets_second_order() {
        assert_eq!(block_order(5, 4).unwrap(), &[1, 0, 3, 2]);
    }

    #[test]
    fn order_cycles_with_period_four() {
        for id in 0..64u32 {
            assert_eq!(block_order(id, 4).unwrap(), block_order(id + 4, 4).unwrap());
        }
        assert_eq!(block_order(0, 4).unwrap(), &[0, 1, 2, 3]);
        assert_eq!(block_order(2, 4).unwrap(), &[2, 3, 0, 1]);
        assert_eq!(block_order(3, 4).unwrap(), &[3, 2, 1, 0]);
    }

    #[test]
    fn other_block_counts_are_rejected() {
        assert_eq!(
            block_order(1, 3),
            Err(SequenceError::BlockCountMismatch {
                expected: 4,
                found: 3
            })
        );
        assert!(block_order(1, 0).is_err());
    }
}
