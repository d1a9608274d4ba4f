//! RawTable - ロックストライプ付きハッシュテーブルの共通実装
//!
//! - 読み取りはロックを取らず、epoch でピンしたまま連鎖をたどる
//! - 書き込みはバケットを担当するストライプロックだけを取る
//! - リサイズ・クリア・全件走査は全ストライプを（0番から順に）取る
//!
//! ストライプ 0 はテーブルの世代をまたいで同じ `Arc` を使い続けるので、
//! 0 番を握っていればテーブルの差し替えは起きません。

use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use parking_lot::Mutex;
use parking_lot::lock_api::ArcMutexGuard;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::config::{DEFAULT_CAPACITY, MAX_STRIPES};

/// Largest bucket count a table grows to; beyond this the budget is pinned.
const MAX_BUCKETS: usize = 0x7FEF_FFFF;

type Stripe = Arc<Mutex<()>>;
type StripeGuard = ArcMutexGuard<parking_lot::RawMutex, ()>;

struct Node<T> {
    hash: u64,
    item: T,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn new(hash: u64, item: T, next: Shared<'_, Node<T>>) -> Owned<Self> {
        Owned::new(Self {
            hash,
            item,
            next: Atomic::from(next),
        })
    }
}

/// One generation of the table. Replaced wholesale on resize and clear.
struct Tables<T> {
    buckets: Box<[Atomic<Node<T>>]>,
    stripes: Box<[Stripe]>,
    /// Items per stripe, written only under the owning stripe lock.
    counts: Box<[AtomicUsize]>,
}

impl<T> Tables<T> {
    fn new(bucket_count: usize, stripes: Box<[Stripe]>) -> Self {
        let counts = (0..stripes.len()).map(|_| AtomicUsize::new(0)).collect();
        Self {
            buckets: (0..bucket_count).map(|_| Atomic::null()).collect(),
            stripes,
            counts,
        }
    }

    /// `(bucket, stripe)` for a hash.
    fn locate(&self, hash: u64) -> (usize, usize) {
        let bucket = (hash % self.buckets.len() as u64) as usize;
        (bucket, bucket % self.stripes.len())
    }

    fn total(&self) -> usize {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}

impl<T> Drop for Tables<T> {
    fn drop(&mut self) {
        // SAFETY: a generation is dropped only once it is unreachable, either through the
        // owner's drop or a deferred destroy after every pinned reader has moved on.
        unsafe {
            let guard = epoch::unprotected();
            for bucket in self.buckets.iter() {
                let mut current = bucket.load(Ordering::Relaxed, guard);
                while !current.is_null() {
                    let next = current.deref().next.load(Ordering::Relaxed, guard);
                    drop(current.into_owned());
                    current = next;
                }
            }
        }
    }
}

/// Striped-lock hash table over items of type `T`. Hashing and equality are supplied by the
/// caller so sets and maps share one implementation.
pub(crate) struct RawTable<T> {
    tables: Atomic<Tables<T>>,
    /// Max items per stripe before a resize is attempted.
    budget: AtomicUsize,
    grow_stripes: bool,
}

impl<T> RawTable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(stripes: NonZeroUsize, capacity: usize, grow_stripes: bool) -> Self {
        let stripe_count = stripes.get();
        let capacity = capacity.max(stripe_count);
        let stripes = (0..stripe_count).map(|_| Arc::new(Mutex::new(()))).collect();
        Self {
            tables: Atomic::new(Tables::new(capacity, stripes)),
            budget: AtomicUsize::new(capacity / stripe_count),
            grow_stripes,
        }
    }

    fn current<'g>(&self, guard: &'g Guard) -> &'g Tables<T> {
        // SAFETY: the pointer is never null after construction, and a replaced generation
        // is only reclaimed through `defer_destroy`, so it outlives `guard`.
        unsafe { self.tables.load(Ordering::Acquire, guard).deref() }
    }

    /// Takes the stripe lock for `hash`, retrying if the table was swapped while waiting.
    fn lock_bucket<'g>(&self, hash: u64, guard: &'g Guard) -> (StripeGuard, &'g Tables<T>, usize, usize) {
        loop {
            let tables = self.current(guard);
            let (bucket, stripe) = tables.locate(hash);
            let lock = tables.stripes[stripe].lock_arc();
            if std::ptr::eq(tables, self.current(guard)) {
                return (lock, tables, bucket, stripe);
            }
        }
    }

    /// Takes every stripe lock, stripe 0 first.
    fn lock_all<'g>(&self, guard: &'g Guard) -> (Vec<StripeGuard>, &'g Tables<T>) {
        let first = self.current(guard).stripes[0].lock_arc();
        let tables = self.current(guard);
        let mut held = Vec::with_capacity(tables.stripes.len());
        held.push(first);
        held.extend(tables.stripes[1..].iter().map(|stripe| stripe.lock_arc()));
        (held, tables)
    }

    /// Lock-free lookup.
    pub(crate) fn find<R>(
        &self,
        hash: u64,
        eq: impl Fn(&T) -> bool,
        read: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        let guard = epoch::pin();
        let tables = self.current(&guard);
        let (bucket, _) = tables.locate(hash);
        let mut current = tables.buckets[bucket].load(Ordering::Acquire, &guard);
        // SAFETY: nodes reachable from a pinned generation are only reclaimed after unpin.
        while let Some(node) = unsafe { current.as_ref() } {
            if node.hash == hash && eq(&node.item) {
                return Some(read(&node.item));
            }
            current = node.next.load(Ordering::Acquire, &guard);
        }
        None
    }

    /// Inserts or replaces under the owning stripe lock.
    ///
    /// `on_present` sees the existing item and may return a replacement; `on_absent` builds
    /// a new one. Exactly one of the two runs, at most once, and an error leaves the table
    /// untouched.
    pub(crate) fn upsert<R, E>(
        &self,
        hash: u64,
        eq: impl Fn(&T) -> bool,
        on_present: impl FnOnce(&T) -> Result<(Option<T>, R), E>,
        on_absent: impl FnOnce() -> Result<(T, R), E>,
    ) -> Result<R, E> {
        let guard = epoch::pin();
        let (lock, tables, bucket, stripe) = self.lock_bucket(hash, &guard);
        let head = &tables.buckets[bucket];

        let mut link = head;
        let mut current = link.load(Ordering::Acquire, &guard);
        // SAFETY: see `find`; mutation happens under the stripe lock.
        while let Some(node) = unsafe { current.as_ref() } {
            if node.hash == hash && eq(&node.item) {
                let (replacement, out) = on_present(&node.item)?;
                if let Some(item) = replacement {
                    let next = node.next.load(Ordering::Acquire, &guard);
                    link.store(Node::new(hash, item, next), Ordering::Release);
                    // SAFETY: the old node is unlinked and no longer reachable from the table.
                    unsafe { guard.defer_destroy(current) };
                }
                return Ok(out);
            }
            link = &node.next;
            current = link.load(Ordering::Acquire, &guard);
        }

        let (item, out) = on_absent()?;
        let first = head.load(Ordering::Acquire, &guard);
        head.store(Node::new(hash, item, first), Ordering::Release);
        let count = tables.counts[stripe].fetch_add(1, Ordering::Relaxed) + 1;
        let over_budget = count > self.budget.load(Ordering::Relaxed);
        drop(lock);

        if over_budget {
            self.grow(tables, &guard);
        }
        Ok(out)
    }

    /// Removes the first item matching `eq`, handing it to `read` before unlinking.
    pub(crate) fn remove<R>(
        &self,
        hash: u64,
        eq: impl Fn(&T) -> bool,
        read: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        let guard = epoch::pin();
        let (_lock, tables, bucket, stripe) = self.lock_bucket(hash, &guard);

        let mut link = &tables.buckets[bucket];
        let mut current = link.load(Ordering::Acquire, &guard);
        // SAFETY: see `upsert`.
        while let Some(node) = unsafe { current.as_ref() } {
            if node.hash == hash && eq(&node.item) {
                let out = read(&node.item);
                let next = node.next.load(Ordering::Acquire, &guard);
                link.store(next, Ordering::Release);
                tables.counts[stripe].fetch_sub(1, Ordering::Relaxed);
                // SAFETY: unlinked above; pinned readers keep it alive until they unpin.
                unsafe { guard.defer_destroy(current) };
                return Some(out);
            }
            link = &node.next;
            current = link.load(Ordering::Acquire, &guard);
        }
        None
    }

    pub(crate) fn len(&self) -> usize {
        let guard = epoch::pin();
        let (held, tables) = self.lock_all(&guard);
        let total = tables.total();
        release(held);
        total
    }

    pub(crate) fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        if self.current(&guard).total() > 0 {
            return false;
        }
        let (held, tables) = self.lock_all(&guard);
        let empty = tables.total() == 0;
        release(held);
        empty
    }

    /// Clones every item while all stripes are held.
    pub(crate) fn snapshot(&self) -> Vec<T> {
        let guard = epoch::pin();
        let (held, tables) = self.lock_all(&guard);
        let mut items = Vec::with_capacity(tables.total());
        for bucket in tables.buckets.iter() {
            let mut current = bucket.load(Ordering::Acquire, &guard);
            // SAFETY: every stripe is held, so the chains cannot change underneath us.
            while let Some(node) = unsafe { current.as_ref() } {
                items.push(node.item.clone());
                current = node.next.load(Ordering::Acquire, &guard);
            }
        }
        release(held);
        items
    }

    pub(crate) fn clear(&self) {
        let guard = epoch::pin();
        let (held, tables) = self.lock_all(&guard);
        if tables.total() > 0 {
            let fresh = Tables::new(DEFAULT_CAPACITY.max(tables.stripes.len()), tables.stripes.clone());
            let budget = (fresh.buckets.len() / fresh.stripes.len()).max(1);
            let old = self.tables.swap(Owned::new(fresh), Ordering::AcqRel, &guard);
            // SAFETY: the old generation is unreachable once swapped out.
            unsafe { guard.defer_destroy(old) };
            self.budget.store(budget, Ordering::Relaxed);
        }
        release(held);
    }

    /// Doubles the table (and possibly the stripes) unless `observed` is already stale.
    fn grow(&self, observed: &Tables<T>, guard: &Guard) {
        let first = observed.stripes[0].lock_arc();
        let tables = self.current(guard);
        if !std::ptr::eq(tables, observed) {
            // another writer already resized
            return;
        }

        let budget = self.budget.load(Ordering::Relaxed);
        if tables.total() < tables.buckets.len() / 4 {
            // a few crowded stripes in a sparse table: hashes are skewed, widen the budget
            self.budget.store(budget.saturating_mul(2), Ordering::Relaxed);
            debug!(budget = budget.saturating_mul(2), "registry budget widened");
            return;
        }

        let (bucket_count, pinned) = next_table_len(tables.buckets.len());

        let mut held = Vec::with_capacity(tables.stripes.len());
        held.push(first);
        held.extend(tables.stripes[1..].iter().map(|stripe| stripe.lock_arc()));

        let mut stripes: Vec<Stripe> = tables.stripes.to_vec();
        if self.grow_stripes && stripes.len() < MAX_STRIPES {
            let extra = stripes.len().min(MAX_STRIPES - stripes.len());
            stripes.extend((0..extra).map(|_| Arc::new(Mutex::new(()))));
        }

        let fresh = Tables::new(bucket_count, stripes.into_boxed_slice());
        for bucket in tables.buckets.iter() {
            let mut current = bucket.load(Ordering::Acquire, guard);
            // SAFETY: all stripes are held; old chains are stable.
            while let Some(node) = unsafe { current.as_ref() } {
                let (target, stripe) = fresh.locate(node.hash);
                let slot = &fresh.buckets[target];
                let first = slot.load(Ordering::Relaxed, guard);
                slot.store(Node::new(node.hash, node.item.clone(), first), Ordering::Relaxed);
                fresh.counts[stripe].fetch_add(1, Ordering::Relaxed);
                current = node.next.load(Ordering::Acquire, guard);
            }
        }

        let next_budget = if pinned {
            usize::MAX
        } else {
            (fresh.buckets.len() / fresh.stripes.len()).max(1)
        };
        debug!(
            buckets = fresh.buckets.len(),
            stripes = fresh.stripes.len(),
            "registry table resized"
        );

        let old = self.tables.swap(Owned::new(fresh), Ordering::AcqRel, guard);
        // SAFETY: readers still pinned on the old generation keep it alive until they unpin.
        unsafe { guard.defer_destroy(old) };
        self.budget.store(next_budget, Ordering::Relaxed);
        release(held);
    }

    #[cfg(test)]
    fn shape(&self) -> (usize, usize) {
        let guard = epoch::pin();
        let tables = self.current(&guard);
        (tables.buckets.len(), tables.stripes.len())
    }
}

impl<T> Drop for RawTable<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no reader or writer can reach the current generation.
        unsafe {
            let guard = epoch::unprotected();
            let tables = self.tables.load(Ordering::Relaxed, guard);
            if !tables.is_null() {
                drop(tables.into_owned());
            }
        }
    }
}

/// Drops stripe guards in reverse acquisition order.
fn release(mut held: Vec<StripeGuard>) {
    while let Some(lock) = held.pop() {
        drop(lock);
    }
}

/// Next bucket count: at least `2n + 1`, not divisible by 3, 5 or 7. The flag is set when
/// the result hit `MAX_BUCKETS`.
fn next_table_len(current: usize) -> (usize, bool) {
    let mut len = current.saturating_mul(2).saturating_add(1);
    while len % 3 == 0 || len % 5 == 0 || len % 7 == 0 {
        len = len.saturating_add(2);
    }
    if len >= MAX_BUCKETS {
        (MAX_BUCKETS, true)
    } else {
        (len, false)
    }
}
