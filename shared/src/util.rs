//! Time and identifier helpers

/// Current UTC time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Milliseconds between the Unix epoch and 2024-01-01 00:00:00 UTC
const ID_EPOCH_MS: i64 = 1_704_067_200_000;

/// Roughly time-sortable order/movement identifier: 41 bits of milliseconds
/// since [`ID_EPOCH_MS`] followed by 12 random bits. 53 bits total, so an id
/// survives a round trip through a JSON number.
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    let elapsed = (now_millis() - ID_EPOCH_MS) & ((1 << 41) - 1);
    let noise: i64 = rand::thread_rng().gen_range(0..(1 << 12));
    (elapsed << 12) | noise
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_ids_are_positive_and_mostly_unique() {
        let ids: Vec<i64> = (0..64).map(|_| snowflake_id()).collect();
        assert!(ids.iter().all(|id| *id > 0));
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        // 12 random bits per millisecond; a birthday collision in 64 draws is
        // possible but should leave the set nearly full
        assert!(unique.len() >= 60);
    }
}
