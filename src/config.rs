//! Optimizer configuration.

/// The default size of a data page in bytes.
pub const DEFAULT_PAGE_SIZE: u64 = 8192;

/// The default memory budget available to a query (256 MiB).
pub const DEFAULT_AVAILABLE_MEMORY: u64 = 256 * 1024 * 1024;

/// Settings shared by the cost model and implementation rules.
///
/// The memory budget is an explicit parameter: two runs with the same catalog and the same configuration
/// always produce the same plan.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    available_memory: u64,
    hash_build_fraction: f64,
    work_memory_fraction: f64,
    partition_memory_factor: f64,
    max_partition_depth: usize,
    merge_memory_overhead: f64,
    page_size: u64,
    top_plans: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            available_memory: DEFAULT_AVAILABLE_MEMORY,
            hash_build_fraction: 0.4,
            work_memory_fraction: 0.7,
            partition_memory_factor: 6.0,
            max_partition_depth: 5,
            merge_memory_overhead: 1.2,
            page_size: DEFAULT_PAGE_SIZE,
            top_plans: 3,
        }
    }
}

impl OptimizerConfig {
    /// Creates a configuration with default settings and the given memory budget in bytes.
    pub fn with_memory(available_memory: u64) -> Self {
        OptimizerConfig::default().with_available_memory(available_memory)
    }

    /// Sets the memory budget in bytes.
    pub fn with_available_memory(mut self, bytes: u64) -> Self {
        self.available_memory = bytes;
        self
    }

    /// Sets the fraction of the memory budget a hash table build side may occupy.
    pub fn with_hash_build_fraction(mut self, fraction: f64) -> Self {
        self.hash_build_fraction = fraction;
        self
    }

    /// Sets the fraction of the memory budget used as working memory by hash tables and sorts.
    pub fn with_work_memory_fraction(mut self, fraction: f64) -> Self {
        self.work_memory_fraction = fraction;
        self
    }

    /// Sets the multiplier applied to the build side before a partitioned hash join falls back to an in-memory one.
    pub fn with_partition_memory_factor(mut self, factor: f64) -> Self {
        self.partition_memory_factor = factor;
        self
    }

    /// Sets the recursion limit of partitioned hash join costing.
    pub fn with_max_partition_depth(mut self, depth: usize) -> Self {
        self.max_partition_depth = depth;
        self
    }

    /// Sets the overhead factor applied to the inputs of a merge join.
    pub fn with_merge_memory_overhead(mut self, overhead: f64) -> Self {
        self.merge_memory_overhead = overhead;
        self
    }

    /// Sets the page size in bytes.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the number of alternative plans returned by the optimizer.
    pub fn with_top_plans(mut self, n: usize) -> Self {
        self.top_plans = n;
        self
    }

    /// The memory budget in bytes.
    pub fn available_memory(&self) -> f64 {
        self.available_memory as f64
    }

    pub fn partition_memory_factor(&self) -> f64 {
        self.partition_memory_factor
    }

    pub fn max_partition_depth(&self) -> usize {
        self.max_partition_depth
    }

    pub fn merge_memory_overhead(&self) -> f64 {
        self.merge_memory_overhead
    }

    /// The page size in bytes.
    pub fn page_size(&self) -> f64 {
        self.page_size as f64
    }

    pub fn top_plans(&self) -> usize {
        self.top_plans
    }

    /// The number of bytes a hash table build side may occupy to be built in memory.
    pub fn hash_build_threshold(&self) -> f64 {
        self.available_memory() * self.hash_build_fraction
    }

    /// Working memory in bytes.
    pub fn work_memory_bytes(&self) -> f64 {
        self.available_memory() * self.work_memory_fraction
    }

    /// Working memory in pages.
    pub fn work_memory_pages(&self) -> f64 {
        self.work_memory_bytes() / self.page_size()
    }

    /// Returns `true` if `bytes` fit into the memory budget once the merge overhead is accounted for.
    pub fn fits_merge_memory(&self, bytes: f64) -> bool {
        self.available_memory() > bytes * self.merge_memory_overhead
    }
}
