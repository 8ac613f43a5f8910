///
/// Bucket
///
/// The typed read-side view of one persisted bucket row: the combined
/// aggregate value plus the count and key bounds folded into it. Returned by
/// `read_point_at` and `read_points_over_range`; `read_aggregate_at` and
/// `read_aggregate_range` project just `value` out of this.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Bucket<A, K> {
    pub value: A,
    pub count: i64,
    pub lower_bound: K,
    pub upper_bound: K,
}
