use std::collections::HashMap;

use trendwire_common::{RankDirection, TrendItem};

/// Annotate each current item with its movement relative to `previous`.
///
/// Matching is by normalized key; a lower index is a better rank.
pub fn classify(mut current: Vec<TrendItem>, previous: &[TrendItem]) -> Vec<TrendItem> {
    let mut previous_rank: HashMap<&str, usize> = HashMap::with_capacity(previous.len());
    for (idx, item) in previous.iter().enumerate() {
        previous_rank.entry(item.normalized_key.as_str()).or_insert(idx);
    }

    for (idx, item) in current.iter_mut().enumerate() {
        item.rank_direction = match previous_rank.get(item.normalized_key.as_str()) {
            None => RankDirection::New,
            Some(&p) if idx < p => RankDirection::Up,
            Some(&p) if idx > p => RankDirection::Down,
            Some(_) => RankDirection::Steady,
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendwire_common::{OriginTag, RawTrendEntry};

    fn items(titles: &[&str]) -> Vec<TrendItem> {
        titles
            .iter()
            .map(|t| TrendItem::from_raw(RawTrendEntry::new(*t, OriginTag::PrimaryFeed)))
            .collect()
    }

    fn directions(items: &[TrendItem]) -> Vec<RankDirection> {
        items.iter().map(|i| i.rank_direction).collect()
    }

    #[test]
    fn classifies_every_movement() {
        let previous = items(&["a", "b", "c", "d"]);
        let current = items(&["b", "a", "c", "e", "d"]);
        let classified = classify(current, &previous);
        assert_eq!(
            directions(&classified),
            vec![
                RankDirection::Up,
                RankDirection::Down,
                RankDirection::Steady,
                RankDirection::New,
                RankDirection::Down,
            ]
        );
    }

    #[test]
    fn empty_previous_makes_everything_new() {
        let classified = classify(items(&["a", "b"]), &[]);
        assert!(classified.iter().all(|i| i.rank_direction == RankDirection::New));
    }

    #[test]
    fn matches_on_normalized_key_not_raw_title() {
        let previous = items(&["Apple Event"]);
        let classified = classify(items(&["apple  event"]), &previous);
        assert_eq!(classified[0].rank_direction, RankDirection::Steady);
    }

    #[test]
    fn order_is_preserved() {
        let classified = classify(items(&["z", "y", "x"]), &items(&["x"]));
        let titles: Vec<&str> = classified.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["z", "y", "x"]);
    }

    #[test]
    fn stale_direction_is_recomputed() {
        let mut current = items(&["a"]);
        current[0].rank_direction = RankDirection::Up;
        let classified = classify(current, &items(&["a"]));
        assert_eq!(classified[0].rank_direction, RankDirection::Steady);
    }
}
