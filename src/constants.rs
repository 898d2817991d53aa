/// Weights and impurities below this value are treated as zero.
pub const EPSILON: f64 = 1e-10;
/// Nominal columns with at most this many present values are split by full enumeration.
pub const MAX_FULL_ENUMERATION_VALUES: usize = 10;
/// Number of random partitions tried for larger multi-class nominal columns.
pub const MAX_RANDOM_PARTITIONS: usize = 1 << (MAX_FULL_ENUMERATION_VALUES - 2);
/// Largest number of children a node signature can address.
pub const MAX_CHILDREN: usize = u8::MAX as usize + 1;
/// Nodes with fewer rows are never split into parallel subtasks.
pub const PARALLEL_NODE_MIN_ROWS: usize = 64;
/// Factor applied to the number of cores to bound the number of trees in flight.
pub const ADMISSION_FACTOR: f64 = 1.5;
/// Relative tolerance for the line search.
pub const LINE_SEARCH_TOLERANCE: f64 = 1e-8;
/// Iteration limit for the line search.
pub const LINE_SEARCH_ITERATIONS: usize = 100;
