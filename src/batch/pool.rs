//! Fixed-size worker pool over channels.

use crossbeam_channel::unbounded;

/// Run `work` over `items` on `workers` threads.
///
/// Each item is handed to exactly one worker. Results come back in
/// submission order regardless of completion order.
pub fn run_ordered<T, R, F>(items: Vec<T>, workers: usize, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> R + Sync,
{
    let count = items.len();
    if count == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, count);

    let (job_tx, job_rx) = unbounded::<(usize, T)>();
    let (result_tx, result_rx) = unbounded::<(usize, R)>();
    for job in items.into_iter().enumerate() {
        if job_tx.send(job).is_err() {
            break;
        }
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let work = &work;
            scope.spawn(move || {
                for (index, item) in jobs.iter() {
                    log::trace!("Worker {} takes job {}", worker, index);
                    if results.send((index, work(index, item))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<R>> = (0..count).map(|_| None).collect();
    for (index, result) in result_rx.try_iter() {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}
