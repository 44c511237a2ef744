//! Job queue behaviour under concurrent callers.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use firmscrape::{Job, JobQueue};

#[test]
fn concurrent_enqueue_keeps_modules_unique() {
    let queue = Arc::new(JobQueue::new());
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut added = 0;
                for i in 0..50 {
                    // every worker races for the same 50 module names, in
                    // varying case
                    let module = if worker % 2 == 0 {
                        format!("site{}", i)
                    } else {
                        format!("SITE{}", i)
                    };
                    if queue.enqueue(module, "ForumScraper") {
                        added += 1;
                    }
                }
                added
            })
        })
        .collect();

    let added: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(added, 50);
    assert_eq!(queue.len(), 50);

    let folded: HashSet<String> = queue
        .snapshot()
        .iter()
        .map(|job| job.module.to_lowercase())
        .collect();
    assert_eq!(folded.len(), 50);
}

#[test]
fn concurrent_dequeue_hands_out_each_job_once() {
    let queue = Arc::new(JobQueue::from_jobs(
        (0..200).map(|i| Job::new(format!("site{}", i), "ForumScraper")),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut taken = Vec::new();
                while let Some(job) = queue.dequeue() {
                    taken.push(job.module);
                }
                taken
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        let taken = handle.join().unwrap();
        // each worker sees its share in queue order
        let mut indices: Vec<usize> = taken
            .iter()
            .map(|m| m.trim_start_matches("site").parse().unwrap())
            .collect();
        let sorted = {
            let mut s = indices.clone();
            s.sort_unstable();
            s
        };
        assert_eq!(indices, sorted);
        all.append(&mut indices);
    }

    all.sort_unstable();
    assert_eq!(all, (0..200).collect::<Vec<_>>());
    assert!(queue.is_empty());
    assert_eq!(queue.dequeue(), None);
}

#[test]
fn delete_during_enqueue_never_duplicates() {
    let queue = Arc::new(JobQueue::new());
    let writer = {
        let queue = queue.clone();
        thread::spawn(move || {
            for _ in 0..500 {
                queue.enqueue("SiteA", "X");
            }
        })
    };
    let deleter = {
        let queue = queue.clone();
        thread::spawn(move || {
            for _ in 0..500 {
                queue.delete("sitea");
            }
        })
    };
    writer.join().unwrap();
    deleter.join().unwrap();

    assert!(queue.len() <= 1);
    queue.enqueue("sitea", "Y");
    assert_eq!(queue.len(), 1);
}
