use core::fmt;
use core::mem;
use core::ops::Range;
use tracing::trace;

/// Half-open range `[start, end)`.
///
/// Only ranges with `start < end` are ever stored. Anything else is
/// considered empty and is ignored by the tree operations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Interval<B> {
    pub start: B,
    pub end: B,
}

impl<B: Ord> Interval<B> {
    pub fn new(start: B, end: B) -> Self {
        Self{start, end}
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, point: &B) -> bool {
        self.start <= *point && *point < self.end
    }

    /// Whether `other` lies entirely within `self`.
    pub fn covers(&self, other: &Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}

impl<B> From<Range<B>> for Interval<B> {
    fn from(r: Range<B>) -> Self {
        Self{start: r.start, end: r.end}
    }
}

impl<B> From<Interval<B>> for Range<B> {
    fn from(i: Interval<B>) -> Self {
        i.start..i.end
    }
}

impl<B: fmt::Display> fmt::Display for Interval<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

// Unbalanced binary search tree of disjoint intervals. Everything in a node's
// left subtree ends at or before the node's start, everything in its right
// subtree starts at or after the node's end.
// Clone and Drop recurse, so very deep (list shaped) trees can overflow the stack.
#[derive(Clone)]
pub(crate) struct NodeRef<B> {
    node: Option<Box<Node<B>>>,
}

#[derive(Clone)]
struct Node<B> {
    interval: Interval<B>,

    left: NodeRef<B>,
    right: NodeRef<B>,
}

enum NodeIterVal<'a, B> {
    Value(&'a Interval<B>),
    Child(&'a Node<B>),
}

struct NodeIter<'a, B> {
    interval: Option<&'a Interval<B>>,
    left: Option<&'a Node<B>>,
    right: Option<&'a Node<B>>,
}

/// In-order iterator over the intervals of a tree.
pub struct Iter<'a, B> {
    stack: Vec<NodeIter<'a, B>>,
}

impl<B> Node<B> {
    fn new(interval: Interval<B>) -> Self {
        Node{interval, left: NodeRef::new(), right: NodeRef::new()}
    }

    fn iter(&self) -> NodeIter<'_, B> {
        NodeIter{
            interval: Some(&self.interval),
            left: self.left.node.as_deref(),
            right: self.right.node.as_deref(),
        }
    }
}

impl<B: Ord + Copy + fmt::Debug> Node<B> {
    // Grow this node to cover [start, end), which overlaps or touches it, and
    // swallow every neighbour that becomes contiguous with the result.
    fn absorb(&mut self, start: B, end: B) {
        if start < self.interval.start {
            while let Some(pred) = self.left.isolate_last_node_if(&|p: &Interval<B>| p.end >= start) {
                self.interval.start = pred.interval.start;
                trace!(absorbed = ?pred.interval, merged = ?self.interval, "absorbed predecessor");
            }
            if self.interval.start > start {
                self.interval.start = start;
            }
        }

        if end > self.interval.end {
            while let Some(succ) = self.right.isolate_first_node_if(&|s: &Interval<B>| s.start <= end) {
                self.interval.end = succ.interval.end;
                trace!(absorbed = ?succ.interval, merged = ?self.interval, "absorbed successor");
            }
            if self.interval.end < end {
                self.interval.end = end;
            }
        }
    }
}

impl<B> NodeRef<B> {
    pub(crate) fn new() -> Self {
        Self{node: None}
    }

    fn new_node(interval: Interval<B>) -> Self {
        Self{node: Some(Box::new(Node::new(interval)))}
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    pub(crate) fn first(&self) -> Option<&Interval<B>> {
        let mut n = self.node.as_deref()?;
        while let Some(ln) = n.left.node.as_deref() {
            n = ln;
        }
        Some(&n.interval)
    }

    pub(crate) fn last(&self) -> Option<&Interval<B>> {
        let mut n = self.node.as_deref()?;
        while let Some(rn) = n.right.node.as_deref() {
            n = rn;
        }
        Some(&n.interval)
    }

    pub(crate) fn iter(&self) -> Iter<'_, B> {
        let mut stack = Vec::new();
        if let Some(rn) = &self.node {
            stack.push(rn.iter());
        }
        Iter{stack}
    }

    // Unlink the leftmost node of this subtree if `accept` holds for its
    // interval. The node's right child takes over its slot.
    fn isolate_first_node_if<Accept>(&mut self, accept: &Accept) -> Option<Box<Node<B>>>
    where for<'a> Accept: Fn(&'a Interval<B>) -> bool
    {
        match &mut self.node {
            None => None,
            Some(n) => {
                if n.left.node.is_some() {
                    return n.left.isolate_first_node_if(accept);
                }
                if !accept(&n.interval) {
                    return None;
                }
                let r = mem::replace(&mut n.right.node, None);
                mem::replace(&mut self.node, r)
            }
        }
    }

    // Mirror image of isolate_first_node_if(), the node's left child takes
    // over its slot.
    fn isolate_last_node_if<Accept>(&mut self, accept: &Accept) -> Option<Box<Node<B>>>
    where for<'a> Accept: Fn(&'a Interval<B>) -> bool
    {
        match &mut self.node {
            None => None,
            Some(n) => {
                if n.right.node.is_some() {
                    return n.right.isolate_last_node_if(accept);
                }
                if !accept(&n.interval) {
                    return None;
                }
                let l = mem::replace(&mut n.left.node, None);
                mem::replace(&mut self.node, l)
            }
        }
    }
}

impl<B: Ord + Copy + fmt::Debug> NodeRef<B> {
    pub(crate) fn contains(&self, point: &B) -> bool {
        let mut cur = self;
        while let Some(n) = &cur.node {
            if n.interval.contains(point) {
                return true;
            }
            cur = if *point < n.interval.start { &n.left } else { &n.right };
        }
        false
    }

    pub(crate) fn add(&mut self, start: B, end: B) {
        if start >= end {
            return;
        }

        let n = match &mut self.node {
            None => {
                *self = Self::new_node(Interval::new(start, end));
                trace!(?start, ?end, "allocated node");
                return;
            },
            Some(n) => n,
        };

        if n.interval.covers(&Interval::new(start, end)) {
            return;
        }

        // Touching ranges (start == node end, end == node start) are merged
        // below, only strictly disjoint ones descend.
        if start > n.interval.end {
            n.right.add(start, end);
            return;
        }
        if end < n.interval.start {
            n.left.add(start, end);
            return;
        }

        n.absorb(start, end);
    }

    pub(crate) fn remove(&mut self, start: B, end: B) {
        if start >= end {
            return;
        }

        let n = match &mut self.node {
            None => return,
            Some(n) => n,
        };

        if start > n.interval.end {
            n.right.remove(start, end);
            return;
        }
        if end < n.interval.start {
            n.left.remove(start, end);
            return;
        }

        // Hand whatever sticks out of this node down to the subtrees first.
        let Interval{start: node_start, end: node_end} = n.interval;
        let mut start = start;
        let mut end = end;
        if start < node_start {
            n.left.remove(start, node_start);
            start = node_start;
        }
        if end > node_end {
            n.right.remove(node_end, end);
            end = node_end;
        }

        let lower = Interval::new(node_start, start);
        let upper = Interval::new(end, node_end);

        if start < end {
            match n.right.isolate_first_node_if(&|_: &Interval<B>| true) {
                Some(succ) => {
                    trace!(released = ?n.interval, promoted = ?succ.interval, "replaced node by successor");
                    n.interval = succ.interval;
                },
                None => {
                    trace!(released = ?n.interval, "replaced node by left child");
                    let l = mem::replace(&mut n.left.node, None);
                    self.node = l;
                },
            }
        }

        // Put back what survives on either side of the excised range.
        self.add(lower.start, lower.end);
        self.add(upper.start, upper.end);
    }
}

impl<'a, B> NodeIter<'a, B> {
    fn next(&mut self) -> Option<NodeIterVal<'a, B>> {
        match self.left.take() {
            Some(ln) => Some(NodeIterVal::Child(ln)),
            None => {
                match self.interval.take() {
                    Some(v) => Some(NodeIterVal::Value(v)),
                    None => {
                        match self.right.take() {
                            Some(rn) => Some(NodeIterVal::Child(rn)),
                            None => None
                        }
                    }
                }
            }
        }
    }
}

impl<'a, B> Iterator for Iter<'a, B> {
    type Item = &'a Interval<B>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(top) = self.stack.last_mut() {
            match top.next() {
                Some(NodeIterVal::Child(cn)) => {
                    self.stack.push(cn.iter());
                },
                Some(NodeIterVal::Value(v)) => {
                    return Some(v);
                },
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

#[cfg(test)]
fn test_check_node(n: &NodeRef<i32>) -> Option<Interval<i32>> {
    match &n.node {
        None => None,
        Some(n) => {
            assert!(n.interval.start < n.interval.end, "degenerate node {:?}", n.interval);
            let mut span = n.interval;
            if let Some(lspan) = test_check_node(&n.left) {
                assert!(lspan.end < n.interval.start, "{:?} touches left subtree {:?}", n.interval, lspan);
                span.start = lspan.start;
            }
            if let Some(rspan) = test_check_node(&n.right) {
                assert!(n.interval.end < rspan.start, "{:?} touches right subtree {:?}", n.interval, rspan);
                span.end = rspan.end;
            }
            Some(span)
        }
    }
}

#[cfg(test)]
fn test_collect(t: &NodeRef<i32>) -> Vec<(i32, i32)> {
    t.iter().map(|i| (i.start, i.end)).collect()
}

#[cfg(test)]
fn test_root(t: &NodeRef<i32>) -> Option<(i32, i32)> {
    t.node.as_ref().map(|n| (n.interval.start, n.interval.end))
}

#[test]
fn test_add_strided() {
    let mut t: NodeRef<i32> = NodeRef::new();

    for i in (0..256).step_by(8) {
        for j in [0, 4, 6, 2] {
            t.add(i + j, i + j + 1);
            test_check_node(&t);
            assert!(t.contains(&(i + j)));
            assert!(!t.contains(&(i + j + 1)));
        }
    }
    assert_eq!(t.iter().count(), 128);
    assert_eq!(t.first(), Some(&Interval::new(0, 1)));
    assert_eq!(t.last(), Some(&Interval::new(254, 255)));

    // Fill every other gap; each fill bridges two stored intervals.
    for i in (0..256).step_by(4) {
        t.add(i + 1, i + 2);
        test_check_node(&t);
    }
    assert_eq!(t.iter().count(), 64);
    assert!(t.iter().all(|i| i.end - i.start == 3));

    for i in (0..256).step_by(4) {
        t.add(i + 3, i + 4);
        test_check_node(&t);
    }
    assert_eq!(test_collect(&t), vec![(0, 256)]);
}

#[test]
fn test_add_contained_and_degenerate() {
    let mut t: NodeRef<i32> = NodeRef::new();

    t.add(4, 4);
    t.add(5, 2);
    assert!(t.is_empty());

    t.add(10, 20);
    t.add(12, 15);
    t.add(10, 20);
    t.add(20, 20);
    assert_eq!(test_collect(&t), vec![(10, 20)]);
}

#[test]
fn test_add_touching_merges() {
    let mut t: NodeRef<i32> = NodeRef::new();

    t.add(10, 20);
    t.add(20, 25);
    t.add(5, 10);
    test_check_node(&t);
    assert_eq!(test_collect(&t), vec![(5, 25)]);
    assert_eq!(test_root(&t), Some((5, 25)));
}

#[test]
fn test_add_unlinks_predecessor_with_left_child() {
    let mut t: NodeRef<i32> = NodeRef::new();

    // 20 at the root, 10 on its left, 14 right of 10 and 12 left of 14.
    t.add(20, 21);
    t.add(10, 11);
    t.add(14, 15);
    t.add(12, 13);
    test_check_node(&t);

    t.add(13, 20);
    test_check_node(&t);
    assert_eq!(test_collect(&t), vec![(10, 11), (12, 21)]);
    assert_eq!(test_root(&t), Some((12, 21)));
}

#[test]
fn test_add_unlinks_successor_with_right_child() {
    let mut t: NodeRef<i32> = NodeRef::new();

    t.add(0, 1);
    t.add(10, 11);
    t.add(4, 5);
    t.add(6, 7);
    test_check_node(&t);

    t.add(1, 5);
    test_check_node(&t);
    assert_eq!(test_collect(&t), vec![(0, 5), (6, 7), (10, 11)]);
    assert_eq!(test_root(&t), Some((0, 5)));

    t.add(2, 6);
    test_check_node(&t);
    assert_eq!(test_collect(&t), vec![(0, 7), (10, 11)]);
}

#[test]
fn test_remove_promotes_successor() {
    let mut t: NodeRef<i32> = NodeRef::new();

    t.add(10, 20);
    t.add(30, 31);
    t.add(25, 26);
    t.add(40, 41);

    t.remove(10, 20);
    test_check_node(&t);
    assert_eq!(test_collect(&t), vec![(25, 26), (30, 31), (40, 41)]);
    assert_eq!(test_root(&t), Some((25, 26)));
}

#[test]
fn test_remove_without_successor() {
    let mut t: NodeRef<i32> = NodeRef::new();

    t.add(10, 20);
    t.add(1, 2);
    t.add(5, 6);

    t.remove(12, 20);
    test_check_node(&t);
    assert_eq!(test_collect(&t), vec![(1, 2), (5, 6), (10, 12)]);
    assert_eq!(test_root(&t), Some((1, 2)));
}

#[test]
fn test_remove_splits() {
    let mut t: NodeRef<i32> = NodeRef::new();

    t.add(1, 10);
    t.remove(4, 6);
    test_check_node(&t);
    assert_eq!(test_collect(&t), vec![(1, 4), (6, 10)]);

    t.remove(1, 2);
    t.remove(9, 10);
    test_check_node(&t);
    assert_eq!(test_collect(&t), vec![(2, 4), (6, 9)]);
}

#[test]
fn test_remove_spanning() {
    let mut t: NodeRef<i32> = NodeRef::new();

    for i in (1..16).step_by(4) {
        t.add(i, i + 2);
    }
    assert_eq!(test_collect(&t), vec![(1, 3), (5, 7), (9, 11), (13, 15)]);

    t.remove(2, 14);
    test_check_node(&t);
    assert_eq!(test_collect(&t), vec![(1, 2), (14, 15)]);

    t.remove(-100, 100);
    assert!(t.is_empty());
}

#[test]
fn test_remove_touching_is_noop() {
    let mut t: NodeRef<i32> = NodeRef::new();

    t.add(10, 20);
    t.remove(20, 30);
    t.remove(0, 10);
    t.remove(15, 15);
    t.remove(18, 12);
    assert_eq!(test_collect(&t), vec![(10, 20)]);

    let mut e: NodeRef<i32> = NodeRef::new();
    e.remove(0, 10);
    assert!(e.is_empty());
}

#[test]
fn test_interval_helpers() {
    let i = Interval::from(3..7);
    assert_eq!(i, Interval::new(3, 7));
    assert_eq!(Range::from(i), 3..7);
    assert_eq!(Interval::from(Range::from(i)), i);

    assert!(i.contains(&3));
    assert!(i.contains(&6));
    assert!(!i.contains(&7));
    assert!(!i.contains(&2));

    assert!(i.covers(&Interval::new(3, 7)));
    assert!(i.covers(&Interval::new(4, 5)));
    assert!(!i.covers(&Interval::new(2, 5)));
    assert!(!i.covers(&Interval::new(6, 8)));

    assert!(Interval::new(5, 5).is_empty());
    assert!(Interval::new(5, 4).is_empty());
    assert_eq!(Interval::new(-1, 2).to_string(), "[-1,2]");
}

#[test]
fn test_iter_restartable() {
    let mut t: NodeRef<i32> = NodeRef::new();

    for i in [50, 10, 70, 30, 90, 0, 40] {
        t.add(i, i + 5);
    }
    let expected = vec![(0, 5), (10, 15), (30, 35), (40, 45), (50, 55), (70, 75), (90, 95)];
    assert_eq!(test_collect(&t), expected);
    assert_eq!(test_collect(&t), expected);
    assert_eq!(t.iter().count(), 7);
}
