//! Append-only reconciliation of new thread records into the archive
//!
//! Deduplication is by `post_id` set membership within each thread, never
//! by timestamp, so reprocessing the same batch is always a no-op.

use crate::archive::{Archive, PostRecord, ThreadRecord};
use std::collections::{HashMap, HashSet};

/// Counters describing what a merge changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Threads that were not in the archive before
    pub threads_added: usize,

    /// Existing threads that received at least one new post
    pub threads_extended: usize,

    /// Posts appended across all threads
    pub posts_appended: usize,

    /// Incoming posts dropped because their id was already archived
    pub posts_duplicate: usize,
}

impl MergeStats {
    pub fn changed(&self) -> bool {
        self.threads_added > 0 || self.posts_appended > 0
    }
}

impl Archive {
    /// Merges incoming thread records into this archive in place
    ///
    /// New threads are appended whole. For known threads the title is
    /// refreshed and only posts with unseen ids are appended; existing
    /// posts are never removed, reordered or rewritten.
    pub fn merge_threads<I>(&mut self, incoming: I) -> MergeStats
    where
        I: IntoIterator<Item = ThreadRecord>,
    {
        let mut stats = MergeStats::default();
        let mut index: HashMap<String, usize> = self
            .threads
            .iter()
            .enumerate()
            .map(|(pos, t)| (t.thread_id.clone(), pos))
            .collect();

        for mut record in incoming {
            match index.get(&record.thread_id).copied() {
                Some(pos) => {
                    let existing = &mut self.threads[pos];
                    existing.thread_title = record.thread_title;

                    let appended = append_unseen(&mut existing.posts, record.posts, &mut stats);
                    if appended > 0 {
                        stats.threads_extended += 1;
                    }
                }
                None => {
                    let posts = std::mem::take(&mut record.posts);
                    append_unseen(&mut record.posts, posts, &mut stats);

                    index.insert(record.thread_id.clone(), self.threads.len());
                    self.threads.push(record);
                    stats.threads_added += 1;
                }
            }
        }

        stats
    }
}

/// Merges `incoming` into `archive` and returns the updated archive
pub fn merge(mut archive: Archive, incoming: Vec<ThreadRecord>) -> Archive {
    archive.merge_threads(incoming);
    archive
}

fn append_unseen(
    posts: &mut Vec<PostRecord>,
    incoming: Vec<PostRecord>,
    stats: &mut MergeStats,
) -> usize {
    let mut seen: HashSet<String> = posts.iter().map(|p| p.post_id.clone()).collect();
    let before = posts.len();

    for post in incoming {
        if seen.insert(post.post_id.clone()) {
            posts.push(post);
        } else {
            stats.posts_duplicate += 1;
        }
    }

    let appended = posts.len() - before;
    stats.posts_appended += appended;
    appended
}
