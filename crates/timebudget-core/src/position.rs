//! Integer ordering keys for ordered plan items.
//!
//! New items are spaced [`POSITION_GAP`] apart. Moving an item takes the
//! midpoint between its new neighbours; only when two neighbours are adjacent
//! integers is the whole list renumbered to `100, 200, 300, ...`.

/// Spacing used for appends and renumbering.
pub const POSITION_GAP: i64 = 100;

/// An ordered element: some key plus its current position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot<K> {
    pub key: K,
    pub position: i64,
}

impl<K> Slot<K> {
    pub fn new(key: K, position: i64) -> Self {
        Self { key, position }
    }
}

/// Outcome of [`place_after`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement<K> {
    /// Position for the moved item.
    pub position: i64,
    /// Every sibling's new position when a renumber was required, else empty.
    pub renumbered: Vec<Slot<K>>,
}

impl<K> Placement<K> {
    pub fn needed_renumber(&self) -> bool {
        !self.renumbered.is_empty()
    }
}

enum Fit {
    At(i64),
    NoRoom,
}

/// Position for a new item appended after all of `ordered`.
pub fn append_position<K>(ordered: &[Slot<K>]) -> i64 {
    ordered
        .iter()
        .map(|s| s.position)
        .max()
        .map_or(POSITION_GAP, |last| last + POSITION_GAP)
}

/// Reassign `100, 200, ...` keeping the current relative order.
pub fn renumber<K: Clone>(ordered: &[Slot<K>]) -> Vec<Slot<K>> {
    let mut sorted = ordered.to_vec();
    sorted.sort_by_key(|s| s.position);
    sorted
        .into_iter()
        .zip(1i64..)
        .map(|(slot, n)| Slot::new(slot.key, n * POSITION_GAP))
        .collect()
}

fn fit<K: PartialEq>(ordered: &[Slot<K>], after: Option<&K>) -> Option<Fit> {
    let (anchor, next) = match after {
        None => (0, ordered.first()),
        Some(key) => {
            let idx = ordered.iter().position(|s| &s.key == key)?;
            (ordered[idx].position, ordered.get(idx + 1))
        }
    };
    Some(match next {
        None => Fit::At(anchor + POSITION_GAP),
        Some(next) if next.position - anchor > 1 => {
            Fit::At(anchor + (next.position - anchor) / 2)
        }
        Some(_) => Fit::NoRoom,
    })
}

/// Place `moving` immediately after `after` (or first, when `after` is
/// `None`) among `siblings`.
///
/// `moving` itself is ignored if it appears in `siblings`. Returns `None`
/// when `after` is not among the remaining siblings.
pub fn place_after<K: PartialEq + Clone>(
    siblings: &[Slot<K>],
    moving: &K,
    after: Option<&K>,
) -> Option<Placement<K>> {
    let mut ordered: Vec<Slot<K>> = siblings
        .iter()
        .filter(|s| &s.key != moving)
        .cloned()
        .collect();
    ordered.sort_by_key(|s| s.position);

    match fit(&ordered, after)? {
        Fit::At(position) => Some(Placement {
            position,
            renumbered: Vec::new(),
        }),
        Fit::NoRoom => {
            let renumbered = renumber(&ordered);
            let position = match fit(&renumbered, after)? {
                Fit::At(position) => position,
                Fit::NoRoom => unreachable!("renumbered slots are POSITION_GAP apart"),
            };
            Some(Placement {
                position,
                renumbered,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn slots(positions: &[(&'static str, i64)]) -> Vec<Slot<&'static str>> {
        positions.iter().map(|&(k, p)| Slot::new(k, p)).collect()
    }

    #[test]
    fn midpoint_between_spaced_neighbours() {
        let list = slots(&[("a", 100), ("b", 200), ("x", 300)]);
        let placed = place_after(&list, &"x", Some(&"a")).unwrap();
        assert_eq!(placed.position, 150);
        assert!(!placed.needed_renumber());
    }

    #[test]
    fn after_last_adds_gap() {
        let list = slots(&[("a", 100), ("b", 200), ("x", 50)]);
        let placed = place_after(&list, &"x", Some(&"b")).unwrap();
        assert_eq!(placed.position, 300);
    }

    #[test]
    fn first_uses_virtual_zero_anchor() {
        let list = slots(&[("a", 100), ("b", 200), ("x", 300)]);
        assert_eq!(place_after(&list, &"x", None).unwrap().position, 50);

        let empty: Vec<Slot<&str>> = Vec::new();
        assert_eq!(place_after(&empty, &"x", None).unwrap().position, 100);
    }

    #[test]
    fn adjacent_neighbours_force_full_renumber() {
        let list = slots(&[("a", 100), ("b", 101), ("c", 102), ("x", 500)]);
        let placed = place_after(&list, &"x", Some(&"a")).unwrap();
        assert!(placed.needed_renumber());
        assert_eq!(
            placed.renumbered,
            slots(&[("a", 100), ("b", 200), ("c", 300)])
        );
        assert_eq!(placed.position, 150);
    }

    #[test]
    fn first_with_no_room_renumbers() {
        let list = slots(&[("a", 1), ("b", 2)]);
        let placed = place_after(&list, &"x", None).unwrap();
        assert_eq!(placed.position, 50);
        assert_eq!(placed.renumbered.len(), 2);
    }

    #[test]
    fn unknown_anchor_is_rejected() {
        let list = slots(&[("a", 100)]);
        assert!(place_after(&list, &"x", Some(&"zzz")).is_none());
        // The moving item cannot anchor itself.
        assert!(place_after(&list, &"a", Some(&"a")).is_none());
    }

    #[test]
    fn renumber_keeps_relative_order() {
        let list = slots(&[("c", 7), ("a", -3), ("b", 7)]);
        assert_eq!(
            renumber(&list),
            slots(&[("a", 100), ("c", 200), ("b", 300)])
        );
    }

    #[test]
    fn append_position_follows_the_maximum() {
        assert_eq!(append_position::<&str>(&[]), 100);
        assert_eq!(append_position(&slots(&[("a", 100), ("b", 340)])), 440);
    }

    proptest! {
        #[test]
        fn placement_lands_between_neighbours(
            raw in proptest::collection::vec(-50i64..500, 0..12),
            anchor_pick in proptest::option::of(0usize..12),
        ) {
            let list: Vec<Slot<usize>> = raw.iter().enumerate().map(|(i, &p)| Slot::new(i, p)).collect();
            let moving = usize::MAX;
            let anchor = anchor_pick.filter(|&i| i < list.len());

            let placed = place_after(&list, &moving, anchor.as_ref()).unwrap();
            let mut ordered = if placed.needed_renumber() { placed.renumbered.clone() } else { list.clone() };
            ordered.sort_by_key(|s| s.position);

            let (low, high) = match anchor {
                None => (0, ordered.first().map(|s| s.position)),
                Some(key) => {
                    let idx = ordered.iter().position(|s| s.key == key).unwrap();
                    (ordered[idx].position, ordered.get(idx + 1).map(|s| s.position))
                }
            };
            if anchor.is_some() {
                prop_assert!(placed.position > low);
            }
            if let Some(high) = high {
                prop_assert!(placed.position < high);
            }
        }
    }
}
