use rayon::ThreadPool;

/// Worker pool for per-file detection, or inline execution.
pub(crate) enum DetectPool {
    Rayon(ThreadPool),
    Inline,
}

impl DetectPool {
    pub(crate) fn new(threads: usize) -> Self {
        if threads <= 1 {
            return DetectPool::Inline;
        }
        build_rayon_pool("vintage-detect", threads)
    }
}

fn build_rayon_pool(prefix: &'static str, threads: usize) -> DetectPool {
    // Thread creation can fail under tight process limits; shrink and retry.
    let mut threads = threads.max(1);
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()
        {
            Ok(pool) => return DetectPool::Rayon(pool),
            Err(err) if threads > 1 => {
                tracing::debug!(
                    target: "vintage.detect",
                    threads,
                    error = %err,
                    "failed to build worker pool; retrying smaller"
                );
                threads = (threads / 2).max(1);
            }
            Err(err) => {
                tracing::warn!(
                    target: "vintage.detect",
                    error = %err,
                    "no worker threads available; detecting inline"
                );
                return DetectPool::Inline;
            }
        }
    }
}

/// The default worker count: available hardware parallelism.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
