/// Sentinel for "no neighbor" in the linked arena.
const NIL: u32 = u32::MAX;

/// Total order over all cell indices by most-recent-touch.
///
/// Implemented as an index-addressed doubly linked arena: `prev`/`next`
/// are dense vectors keyed by cell index, so `touch` is O(1) — no linear
/// search, no mid-array splice. Each touch also assigns a monotonically
/// increasing stamp; stamps order cells exactly like their list position
/// and give hot paths an O(1) recency key without walking the list.
#[derive(Clone)]
pub struct RecencyOrder {
    prev: Vec<u32>,
    next: Vec<u32>,
    head: u32,
    tail: u32,
    stamp: Vec<u64>,
    clock: u64,
}

impl RecencyOrder {
    /// Fresh order over `len` cells: index 0 at the front, `len - 1` at
    /// the back.
    pub fn new(len: u32) -> Self {
        assert!(len > 0, "order must cover at least one cell");
        let n = len as usize;
        let mut prev = vec![NIL; n];
        let mut next = vec![NIL; n];
        let mut stamp = vec![0u64; n];
        for i in 0..n {
            if i > 0 {
                prev[i] = (i - 1) as u32;
            }
            if i + 1 < n {
                next[i] = (i + 1) as u32;
            }
            stamp[i] = (n - i) as u64;
        }
        Self {
            prev,
            next,
            head: 0,
            tail: len - 1,
            stamp,
            clock: n as u64 + 1,
        }
    }

    /// Rebuild an order from a persisted front-to-back snapshot. The
    /// snapshot must be a full permutation of `0..len`.
    pub fn from_snapshot(snapshot: &[u32]) -> Result<Self, String> {
        let n = snapshot.len();
        if n == 0 {
            return Err("empty order snapshot".to_string());
        }
        let mut seen = vec![false; n];
        for &i in snapshot {
            if i as usize >= n || seen[i as usize] {
                return Err(format!(
                    "order snapshot is not a permutation of 0..{} (bad entry {})",
                    n, i
                ));
            }
            seen[i as usize] = true;
        }
        let mut prev = vec![NIL; n];
        let mut next = vec![NIL; n];
        let mut stamp = vec![0u64; n];
        for (pos, &i) in snapshot.iter().enumerate() {
            if pos > 0 {
                prev[i as usize] = snapshot[pos - 1];
            }
            if pos + 1 < n {
                next[i as usize] = snapshot[pos + 1];
            }
            stamp[i as usize] = (n - pos) as u64;
        }
        Ok(Self {
            prev,
            next,
            head: snapshot[0],
            tail: snapshot[n - 1],
            stamp,
            clock: n as u64 + 1,
        })
    }

    pub fn len(&self) -> u32 {
        self.prev.len() as u32
    }

    /// Move `index` to the front. O(1). Relative order of all other
    /// cells is preserved.
    pub fn touch(&mut self, index: u32) {
        let i = index as usize;
        self.stamp[i] = self.clock;
        self.clock += 1;
        if self.head == index {
            return;
        }
        // Unlink.
        let p = self.prev[i];
        let n = self.next[i];
        if p != NIL {
            self.next[p as usize] = n;
        }
        if n != NIL {
            self.prev[n as usize] = p;
        } else {
            self.tail = p;
        }
        // Relink at the front.
        self.prev[i] = NIL;
        self.next[i] = self.head;
        self.prev[self.head as usize] = index;
        self.head = index;
    }

    /// O(1) recency key: strictly greater for more recently touched cells.
    #[inline]
    pub fn last_touch(&self, index: u32) -> u64 {
        self.stamp[index as usize]
    }

    /// Rank from the front (0 = most recent). Walks the list — meant for
    /// tests and diagnostics, not per-cell hot-path queries.
    pub fn rank_of(&self, index: u32) -> usize {
        let mut cur = self.head;
        let mut rank = 0;
        while cur != NIL {
            if cur == index {
                return rank;
            }
            cur = self.next[cur as usize];
            rank += 1;
        }
        unreachable!("index {} not linked", index);
    }

    /// Front-to-back sequence of all cell indices.
    pub fn snapshot(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.prev.len());
        let mut cur = self.head;
        while cur != NIL {
            out.push(cur);
            cur = self.next[cur as usize];
        }
        out
    }
}
