use core::fmt;
use thiserror::Error;
use tracing::debug;
use crate::interval_tree::{Interval, Iter, NodeRef};

/// Set of integers kept as maximally coalesced half-open intervals.
///
/// After every public operation the stored intervals, read in order, are
/// pairwise disjoint and non-adjacent: for consecutive `[s1, e1)` and
/// `[s2, e2)` it holds that `e1 < s2`. The representation of a given point
/// set is therefore unique.
#[derive(Clone)]
pub struct IntervalSet<B> {
    root: NodeRef<B>,
}

/// Broken ordering of the stored intervals, as found by
/// [`IntervalSet::check_invariants`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvariantViolation<B: fmt::Debug> {
    #[error("interval #{index} {interval:?} is empty")]
    Empty { index: usize, interval: Interval<B> },
    #[error("interval #{index} {next:?} overlaps or precedes {prev:?}")]
    Overlapping { index: usize, prev: Interval<B>, next: Interval<B> },
    #[error("interval #{index} {next:?} is adjacent to {prev:?} but not merged")]
    Adjacent { index: usize, prev: Interval<B>, next: Interval<B> },
}

impl<B> IntervalSet<B> {
    /// Construct empty.
    pub fn new() -> Self {
        Self{root: NodeRef::new()}
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Number of stored intervals, not covered points.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Iterate stored intervals by ascending start.
    pub fn iter(&self) -> Iter<'_, B> {
        self.root.iter()
    }

    pub fn first(&self) -> Option<&Interval<B>> {
        self.root.first()
    }

    pub fn last(&self) -> Option<&Interval<B>> {
        self.root.last()
    }

    /// Release all stored intervals.
    pub fn clear(&mut self) {
        self.root = NodeRef::new();
        debug!("cleared interval set");
    }
}

impl<B: Ord + Copy + fmt::Debug> IntervalSet<B> {
    /// Union `[start, end)` into the set. Does nothing if `start >= end`.
    pub fn add(&mut self, start: B, end: B) {
        self.root.add(start, end);
        debug!(?start, ?end, intervals = self.len(), "added range");
        debug_assert!(self.check_invariants().is_ok(), "invariant broken: {:?}", self.check_invariants());
    }

    /// Subtract `[start, end)` from the set, splitting or shrinking stored
    /// intervals as needed. Does nothing if `start >= end`.
    pub fn remove(&mut self, start: B, end: B) {
        self.root.remove(start, end);
        debug!(?start, ?end, intervals = self.len(), "removed range");
        debug_assert!(self.check_invariants().is_ok(), "invariant broken: {:?}", self.check_invariants());
    }

    pub fn contains(&self, point: B) -> bool {
        self.root.contains(&point)
    }

    /// Snapshot of the stored intervals in ascending order.
    pub fn to_ordered_list(&self) -> Vec<Interval<B>> {
        self.iter().copied().collect()
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation<B>> {
        let mut prev: Option<&Interval<B>> = None;
        for (index, interval) in self.iter().enumerate() {
            if interval.is_empty() {
                return Err(InvariantViolation::Empty{index, interval: *interval});
            }
            if let Some(prev) = prev {
                if prev.end > interval.start {
                    return Err(InvariantViolation::Overlapping{index, prev: *prev, next: *interval});
                }
                if prev.end == interval.start {
                    return Err(InvariantViolation::Adjacent{index, prev: *prev, next: *interval});
                }
            }
            prev = Some(interval);
        }
        Ok(())
    }
}

impl<B> Default for IntervalSet<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, B> IntoIterator for &'a IntervalSet<B> {
    type Item = &'a Interval<B>;
    type IntoIter = Iter<'a, B>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<B: Ord + Copy + fmt::Debug> Extend<Interval<B>> for IntervalSet<B> {
    fn extend<I: IntoIterator<Item = Interval<B>>>(&mut self, iter: I) {
        for interval in iter {
            self.add(interval.start, interval.end);
        }
    }
}

impl<B: Ord + Copy + fmt::Debug> FromIterator<Interval<B>> for IntervalSet<B> {
    fn from_iter<I: IntoIterator<Item = Interval<B>>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

// [[1,3][5,9]], or [] when empty.
impl<B: fmt::Display> fmt::Display for IntervalSet<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for interval in self.iter() {
            write!(f, "{}", interval)?;
        }
        f.write_str("]")
    }
}

impl<B: fmt::Debug> fmt::Debug for IntervalSet<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|i| &i.start..&i.end)).finish()
    }
}

#[cfg(test)]
fn test_pairs(set: &IntervalSet<i32>) -> Vec<(i32, i32)> {
    set.iter().map(|i| (i.start, i.end)).collect()
}

#[test]
fn test_scenarios() {
    let mut s = IntervalSet::new();
    s.add(1, 5);
    assert_eq!(test_pairs(&s), vec![(1, 5)]);

    let mut s = IntervalSet::new();
    s.add(1, 5);
    s.add(5, 8);
    assert_eq!(test_pairs(&s), vec![(1, 8)]);

    let mut s = IntervalSet::new();
    s.add(1, 5);
    s.add(7, 9);
    assert_eq!(test_pairs(&s), vec![(1, 5), (7, 9)]);

    let mut s = IntervalSet::new();
    s.add(1, 10);
    s.remove(4, 6);
    assert_eq!(test_pairs(&s), vec![(1, 4), (6, 10)]);

    let mut s = IntervalSet::new();
    s.add(1, 5);
    s.add(10, 15);
    s.add(3, 12);
    assert_eq!(test_pairs(&s), vec![(1, 15)]);
}

#[test]
fn test_split_then_bridge() {
    let mut s = IntervalSet::new();

    s.add(1, 5);
    assert_eq!(s.to_string(), "[[1,5]]");
    s.remove(2, 3);
    assert_eq!(s.to_string(), "[[1,2][3,5]]");
    s.add(6, 8);
    assert_eq!(s.to_string(), "[[1,2][3,5][6,8]]");
    s.remove(4, 7);
    assert_eq!(s.to_string(), "[[1,2][3,4][7,8]]");
    s.add(2, 7);
    assert_eq!(s.to_string(), "[[1,8]]");
    assert_eq!(s.to_ordered_list(), vec![Interval::new(1, 8)]);
}

#[test]
fn test_render() {
    let mut s: IntervalSet<i32> = IntervalSet::new();
    assert_eq!(s.to_string(), "[]");
    assert_eq!(format!("{:?}", s), "{}");

    s.add(5, 9);
    s.add(1, 3);
    assert_eq!(s.to_string(), "[[1,3][5,9]]");
    assert_eq!(format!("{:?}", s), "{1..3, 5..9}");

    s.add(-4, -2);
    assert_eq!(s.to_string(), "[[-4,-2][1,3][5,9]]");
    assert_eq!(format!("{:?}", s), "{-4..-2, 1..3, 5..9}");

    // Debug must not need the bound type to be Copy.
    let named: IntervalSet<String> = IntervalSet::new();
    assert_eq!(format!("{:?}", named), "{}");
}

#[test]
fn test_degenerate_noop() {
    let mut s = IntervalSet::new();
    s.add(0, 10);
    s.add(20, 30);
    let before = test_pairs(&s);

    for x in [-5, 0, 5, 10, 15, 20, 25, 30] {
        s.add(x, x);
        s.add(x, x - 1);
        s.remove(x, x);
        s.remove(x + 1, x);
        assert_eq!(test_pairs(&s), before);
    }

    let mut e: IntervalSet<i32> = IntervalSet::new();
    e.add(4, 4);
    e.add(5, 2);
    e.remove(3, 5);
    assert!(e.is_empty());
}

#[test]
fn test_queries() {
    let s: IntervalSet<i32> = [Interval::new(10, 20), Interval::new(0, 5), Interval::new(5, 7), Interval::new(30, 31)]
        .into_iter()
        .collect();

    assert_eq!(test_pairs(&s), vec![(0, 7), (10, 20), (30, 31)]);
    assert_eq!(s.len(), 3);
    assert_eq!(s.first(), Some(&Interval::new(0, 7)));
    assert_eq!(s.last(), Some(&Interval::new(30, 31)));

    assert!(s.contains(0));
    assert!(s.contains(6));
    assert!(!s.contains(7));
    assert!(!s.contains(-1));
    assert!(s.contains(19));
    assert!(!s.contains(20));
    assert!(s.contains(30));
    assert!(!s.contains(31));

    assert_eq!((&s).into_iter().count(), 3);
}

#[test]
fn test_clear_and_independent_instances() {
    let mut a = IntervalSet::new();
    let mut b = IntervalSet::new();

    a.add(1, 5);
    b.add(100, 200);
    assert_eq!(test_pairs(&a), vec![(1, 5)]);
    assert_eq!(test_pairs(&b), vec![(100, 200)]);

    a.clear();
    assert!(a.is_empty());
    assert_eq!(a.len(), 0);
    assert_eq!(a.first(), None);
    assert_eq!(test_pairs(&b), vec![(100, 200)]);

    a.add(3, 4);
    assert_eq!(test_pairs(&a), vec![(3, 4)]);
}

#[test]
fn test_full_clearance() {
    let mut s = IntervalSet::new();
    for i in [15, 7, 3, 11, 9, 13, 1, 21, 27, 5] {
        s.add(i, i + 1);
    }
    assert_eq!(s.len(), 10);
    s.remove(1, 28);
    assert!(s.is_empty());

    for i in [15, 7, 3, 11, 9, 13, 1, 21, 27, 5] {
        s.add(i, i + 1);
    }
    s.remove(i32::MIN, i32::MAX);
    assert!(s.is_empty());
}

#[test]
fn test_check_invariants_reports() {
    let mut s = IntervalSet::new();
    s.add(1, 2);
    s.add(3, 4);
    assert_eq!(s.check_invariants(), Ok(()));

    let err: InvariantViolation<i32> = InvariantViolation::Adjacent{
        index: 1,
        prev: Interval::new(1, 2),
        next: Interval::new(2, 4),
    };
    assert_eq!(err.to_string(),
               "interval #1 Interval { start: 2, end: 4 } is adjacent to Interval { start: 1, end: 2 } but not merged");
}

// Cascading absorption across many small neighbours, then trimming back down.
#[test]
fn test_driver_cases() {
    let mut s = IntervalSet::new();
    for (a, b) in [(15, 16), (7, 8), (3, 4), (11, 12), (9, 10), (13, 14), (1, 2), (21, 22), (27, 28), (5, 6)] {
        s.add(a, b);
    }
    s.add(3, 10);
    assert_eq!(s.to_string(), "[[1,2][3,10][11,12][13,14][15,16][21,22][27,28]]");
    s.add(11, 22);
    assert_eq!(s.to_string(), "[[1,2][3,10][11,22][27,28]]");
    s.add(0, 26);
    assert_eq!(s.to_string(), "[[0,26][27,28]]");
    s.add(29, 45);
    assert_eq!(s.to_string(), "[[0,26][27,28][29,45]]");
    s.add(26, 55);
    assert_eq!(s.to_string(), "[[0,55]]");

    s.remove(2, 7);
    assert_eq!(s.to_string(), "[[0,2][7,55]]");
    s.remove(20, 30);
    assert_eq!(s.to_string(), "[[0,2][7,20][30,55]]");
    s.remove(40, 70);
    assert_eq!(s.to_string(), "[[0,2][7,20][30,40]]");
    s.remove(0, 100);
    assert_eq!(s.to_string(), "[]");
}

#[cfg(test)]
mod randomized {
    use super::*;
    use rand::prelude::*;
    use rand_pcg::Pcg32;

    const DOMAIN: i32 = 64;

    fn new_rng() -> impl Rng {
        Pcg32::from_seed(0xdeadbeefdeadbeefdeadbeefdeadbeefu128.to_le_bytes())
    }

    fn random_range(rng: &mut impl Rng) -> (i32, i32) {
        // occasionally empty or inverted
        (rng.gen_range(-DOMAIN..DOMAIN), rng.gen_range(-DOMAIN..DOMAIN))
    }

    // Maximal runs of covered points, which is the only valid representation.
    fn model_pairs(points: &[bool]) -> Vec<(i32, i32)> {
        let mut pairs = Vec::new();
        let mut run_start = None;
        for (i, &covered) in points.iter().enumerate() {
            let p = i as i32 - DOMAIN;
            match (covered, run_start) {
                (true, None) => run_start = Some(p),
                (false, Some(s)) => {
                    pairs.push((s, p));
                    run_start = None;
                },
                _ => (),
            }
        }
        if let Some(s) = run_start {
            pairs.push((s, DOMAIN));
        }
        pairs
    }

    fn model_apply(points: &mut [bool], start: i32, end: i32, value: bool) {
        for p in start.max(-DOMAIN)..end.min(DOMAIN) {
            points[(p + DOMAIN) as usize] = value;
        }
    }

    #[test]
    fn matches_point_model() {
        let mut rng = new_rng();

        for _ in 0..50 {
            let mut set = IntervalSet::new();
            let mut points = vec![false; 2 * DOMAIN as usize];
            for _ in 0..200 {
                let (start, end) = random_range(&mut rng);
                if rng.gen_ratio(55, 100) {
                    set.add(start, end);
                    model_apply(&mut points, start, end, true);
                } else {
                    set.remove(start, end);
                    model_apply(&mut points, start, end, false);
                }
                assert_eq!(set.check_invariants(), Ok(()));
                assert_eq!(test_pairs(&set), model_pairs(&points));
            }
        }
    }

    #[test]
    fn add_is_idempotent_and_commutative() {
        let mut rng = new_rng();

        for _ in 0..200 {
            let mut base = IntervalSet::new();
            for _ in 0..rng.gen_range(0..20) {
                let (start, end) = random_range(&mut rng);
                base.add(start, end);
            }
            let (a, b) = random_range(&mut rng);
            let (c, d) = random_range(&mut rng);

            let mut once = base.clone();
            once.add(a, b);
            let mut twice = once.clone();
            twice.add(a, b);
            assert_eq!(test_pairs(&once), test_pairs(&twice));

            let mut ab = base.clone();
            ab.add(a, b);
            ab.add(c, d);
            let mut cd = base.clone();
            cd.add(c, d);
            cd.add(a, b);
            assert_eq!(test_pairs(&ab), test_pairs(&cd));
        }
    }

    #[test]
    fn remove_then_add_restores() {
        let mut rng = new_rng();

        for _ in 0..200 {
            let mut set = IntervalSet::new();
            for _ in 0..rng.gen_range(1..20) {
                let (start, end) = random_range(&mut rng);
                set.add(start, end);
            }
            let stored = set.to_ordered_list();
            if stored.is_empty() {
                continue;
            }

            // any sub-range of a stored interval is fully covered
            let whole = stored[rng.gen_range(0..stored.len())];
            let start = rng.gen_range(whole.start..whole.end);
            let end = rng.gen_range(start + 1..=whole.end);

            let before = test_pairs(&set);
            set.remove(start, end);
            assert!(!set.contains(start));
            set.add(start, end);
            assert_eq!(test_pairs(&set), before);

            set.remove(stored[0].start, stored[stored.len() - 1].end);
            assert!(set.is_empty());
        }
    }
}
