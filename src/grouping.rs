use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::item::ItemRecord;

/// Which file becomes the leader of a same-basename group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaderPolicy {
    #[default]
    SmallestFile,
    LargestFile,
    FirstByName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingMode {
    Time,
    Filename,
    Timelapse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Max distance from the anchor timestamp for group-by-time.
    pub time_window_secs: i64,
    /// Allowed deviation from the predicted next timelapse frame.
    pub timelapse_tolerance_secs: i64,
    pub min_timelapse_items: usize,
    pub filename_leader: LeaderPolicy,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            time_window_secs: 2,
            timelapse_tolerance_secs: 1,
            min_timelapse_items: 3,
            filename_leader: LeaderPolicy::SmallestFile,
        }
    }
}

/// A leader and its followers, borrowed from the caller's collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    pub leader: &'a ItemRecord,
    pub followers: Vec<&'a ItemRecord>,
}

impl<'a> Group<'a> {
    fn from_run(mut run: Vec<&'a ItemRecord>) -> Self {
        let leader = run.remove(0);
        Self { leader, followers: run }
    }

    pub fn len(&self) -> usize {
        self.followers.len() + 1
    }

    pub fn ids(&self) -> Vec<i64> {
        std::iter::once(self.leader.id).chain(self.followers.iter().map(|f| f.id)).collect()
    }
}

/// Persists a detected group. Implemented by whatever owns grouping state.
pub trait GroupAssigner {
    fn add_to_group(&mut self, leader: &ItemRecord, followers: &[&ItemRecord]);
}

impl<F> GroupAssigner for F
where
    F: FnMut(&ItemRecord, &[&ItemRecord]),
{
    fn add_to_group(&mut self, leader: &ItemRecord, followers: &[&ItemRecord]) {
        self(leader, followers)
    }
}

/// Records groups as (leader id, follower ids).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCollector {
    pub groups: Vec<(i64, Vec<i64>)>,
}

impl GroupAssigner for GroupCollector {
    fn add_to_group(&mut self, leader: &ItemRecord, followers: &[&ItemRecord]) {
        self.groups.push((leader.id, followers.iter().map(|f| f.id).collect()));
    }
}

/// A filename split around its first run of ASCII digits, e.g.
/// "seq_0042.jpg" -> ("seq_", 42, ".jpg"). `value` is `None` when the name
/// has no digits or the run does not fit a u64.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberInFilename<'a> {
    pub prefix: &'a str,
    pub value: Option<u64>,
    pub suffix: &'a str,
}

impl<'a> NumberInFilename<'a> {
    pub fn parse(filename: &'a str) -> Self {
        let Some(start) = filename.find(|c: char| c.is_ascii_digit()) else {
            return Self { prefix: filename, value: None, suffix: "" };
        };
        let rest = &filename[start..];
        let len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());

        Self {
            prefix: &filename[..start],
            value: rest[..len].parse::<u64>().ok(),
            suffix: &rest[len..],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    /// True when `other` is the next number in the same naming pattern.
    pub fn directly_precedes(&self, other: &NumberInFilename<'_>) -> bool {
        match (self.value, other.value) {
            (Some(a), Some(b)) => {
                self.prefix == other.prefix
                    && self.suffix == other.suffix
                    && a.checked_add(1) == Some(b)
            }
            _ => false,
        }
    }
}

/// Name without its last `.`-extension.
pub fn base_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Whether `candidate` lands where the accepted group predicts the next
/// frame: last timestamp plus the average gap, within `tolerance_secs`.
fn matches_timelapse_interval(
    group: &[&ItemRecord],
    candidate: &ItemRecord,
    tolerance_secs: i64,
) -> bool {
    if group.len() < 2 {
        return true;
    }

    let (Some(first), Some(last), Some(actual)) =
        (group[0].taken, group[group.len() - 1].taken, candidate.taken)
    else {
        return false;
    };

    let average_gap = (last - first).num_seconds().abs() / (group.len() as i64 - 1);
    let predicted = last + Duration::seconds(average_gap);
    (actual - predicted).num_seconds().abs() <= tolerance_secs
}

pub struct GroupingEngine {
    config: GroupingConfig,
}

impl Default for GroupingEngine {
    fn default() -> Self {
        Self::new(GroupingConfig::default())
    }
}

impl GroupingEngine {
    pub fn new(config: GroupingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    /// Bursts: items within `time_window_secs` of the first item of the run.
    pub fn group_by_time<'a>(&self, items: &'a [ItemRecord]) -> Vec<Group<'a>> {
        let mut list: Vec<&ItemRecord> = items.iter().collect();
        list.sort_by(|a, b| a.taken.cmp(&b.taken));

        let window_ms = self.config.time_window_secs.saturating_mul(1000);
        let mut groups = Vec::new();
        let mut i = 0;

        while i < list.len() {
            let Some(anchor) = list[i].taken else {
                i += 1;
                continue;
            };

            let mut run = vec![list[i]];
            let mut j = i + 1;
            while j < list.len() {
                match list[j].taken {
                    Some(t) if (t - anchor).num_milliseconds().abs() <= window_ms => {
                        run.push(list[j]);
                    }
                    Some(_) => break,
                    None => {}
                }
                j += 1;
            }
            i = j;

            if run.len() >= 2 {
                groups.push(Group::from_run(run));
            }
        }

        debug!("group_by_time: {} items -> {} groups", items.len(), groups.len());
        groups
    }

    /// Same basename, different extension (RAW + JPEG pairs and the like).
    pub fn group_by_filename<'a>(&self, items: &'a [ItemRecord]) -> Vec<Group<'a>> {
        // Base name first so "a.m.jpg" cannot split the "a.jpg" / "a.raw" run.
        let mut list: Vec<&ItemRecord> = items.iter().collect();
        list.sort_by(|a, b| (base_name(&a.name), &a.name).cmp(&(base_name(&b.name), &b.name)));

        let mut groups = Vec::new();
        let mut i = 0;

        while i < list.len() {
            let base = base_name(&list[i].name);
            let mut j = i + 1;
            while j < list.len() && base_name(&list[j].name) == base {
                j += 1;
            }

            if j - i > 1 {
                let mut run = list[i..j].to_vec();
                match self.config.filename_leader {
                    LeaderPolicy::SmallestFile => run.sort_by_key(|item| item.file_size),
                    LeaderPolicy::LargestFile => run.sort_by(|a, b| b.file_size.cmp(&a.file_size)),
                    LeaderPolicy::FirstByName => {}
                }
                groups.push(Group::from_run(run));
            }
            i = j;
        }

        debug!("group_by_filename: {} items -> {} groups", items.len(), groups.len());
        groups
    }

    /// Consecutively numbered files shot at a steady interval.
    pub fn group_by_timelapse<'a>(&self, items: &'a [ItemRecord]) -> Vec<Group<'a>> {
        let min_items = self.config.min_timelapse_items.max(1);
        if items.len() < min_items {
            return Vec::new();
        }

        let mut list: Vec<&ItemRecord> = items.iter().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));

        let mut groups = Vec::new();
        let mut group: Vec<&ItemRecord> = Vec::new();
        let mut previous = NumberInFilename::default();

        for item in list {
            let current = NumberInFilename::parse(&item.name);

            if !previous.directly_precedes(&current)
                || !matches_timelapse_interval(&group, item, self.config.timelapse_tolerance_secs)
            {
                if group.len() >= min_items {
                    groups.push(Group::from_run(std::mem::take(&mut group)));
                }
                group.clear();
            }

            group.push(item);
            previous = current;
        }

        if group.len() >= min_items {
            groups.push(Group::from_run(group));
        }

        debug!("group_by_timelapse: {} items -> {} groups", items.len(), groups.len());
        groups
    }

    pub fn group<'a>(&self, mode: GroupingMode, items: &'a [ItemRecord]) -> Vec<Group<'a>> {
        match mode {
            GroupingMode::Time => self.group_by_time(items),
            GroupingMode::Filename => self.group_by_filename(items),
            GroupingMode::Timelapse => self.group_by_timelapse(items),
        }
    }

    /// Runs `mode` and hands every group to `assigner`. Returns the number of
    /// groups created.
    pub fn apply(
        &self,
        mode: GroupingMode,
        items: &[ItemRecord],
        assigner: &mut dyn GroupAssigner,
    ) -> usize {
        let groups = self.group(mode, items);
        for group in &groups {
            assigner.add_to_group(group.leader, &group.followers);
        }
        groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 14).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn at(secs: i64) -> NaiveDateTime {
        t0() + Duration::seconds(secs)
    }

    fn names(items: &[&ItemRecord]) -> Vec<String> {
        items.iter().map(|i| i.name.clone()).collect()
    }

    #[test]
    fn test_time_uses_anchor_not_sliding_window() {
        let items = vec![
            ItemRecord::new(1, "a.jpg").with_taken(at(0)),
            ItemRecord::new(2, "b.jpg").with_taken(at(1)),
            ItemRecord::new(3, "c.jpg").with_taken(at(2)),
            ItemRecord::new(4, "d.jpg").with_taken(at(10)),
        ];
        let groups = GroupingEngine::default().group_by_time(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].leader.name, "a.jpg");
        assert_eq!(names(&groups[0].followers), vec!["b.jpg", "c.jpg"]);
    }

    #[test]
    fn test_time_chain_beyond_anchor_splits() {
        // Each step is 1.5s, but the third is 3s from the anchor.
        let items = vec![
            ItemRecord::new(1, "a.jpg").with_taken(at(0)),
            ItemRecord::new(2, "b.jpg").with_taken(at(0) + Duration::milliseconds(1500)),
            ItemRecord::new(3, "c.jpg").with_taken(at(3)),
            ItemRecord::new(4, "d.jpg").with_taken(at(4)),
        ];
        let groups = GroupingEngine::default().group_by_time(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].ids(), vec![1, 2]);
        assert_eq!(groups[1].ids(), vec![3, 4]);
    }

    #[test]
    fn test_time_skips_undated_and_unsorted_input() {
        let items = vec![
            ItemRecord::new(1, "late.jpg").with_taken(at(1)),
            ItemRecord::new(2, "nodate.jpg"),
            ItemRecord::new(3, "early.jpg").with_taken(at(0)),
            ItemRecord::new(4, "nodate2.jpg"),
        ];
        let groups = GroupingEngine::default().group_by_time(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].leader.name, "early.jpg");
        assert_eq!(names(&groups[0].followers), vec!["late.jpg"]);
    }

    #[test]
    fn test_time_empty_and_single() {
        let engine = GroupingEngine::default();
        assert!(engine.group_by_time(&[]).is_empty());
        let one = vec![ItemRecord::new(1, "a.jpg").with_taken(at(0))];
        assert!(engine.group_by_time(&one).is_empty());
    }

    #[test]
    fn test_filename_smallest_is_leader() {
        let items = vec![
            ItemRecord::new(1, "img001.raw").with_size(10_000_000),
            ItemRecord::new(2, "img001.jpg").with_size(2_000_000),
            ItemRecord::new(3, "img002.jpg").with_size(2_000_000),
        ];
        let groups = GroupingEngine::default().group_by_filename(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].leader.name, "img001.jpg");
        assert_eq!(names(&groups[0].followers), vec!["img001.raw"]);
    }

    #[test]
    fn test_filename_leader_policies() {
        let items = vec![
            ItemRecord::new(1, "img001.raw").with_size(10),
            ItemRecord::new(2, "img001.jpg").with_size(2),
            ItemRecord::new(3, "img001.xmp").with_size(1),
        ];
        let largest = GroupingEngine::new(GroupingConfig {
            filename_leader: LeaderPolicy::LargestFile,
            ..Default::default()
        });
        let groups = largest.group_by_filename(&items);
        assert_eq!(groups[0].leader.name, "img001.raw");

        let first = GroupingEngine::new(GroupingConfig {
            filename_leader: LeaderPolicy::FirstByName,
            ..Default::default()
        });
        let groups = first.group_by_filename(&items);
        assert_eq!(groups[0].leader.name, "img001.jpg");
        assert_eq!(names(&groups[0].followers), vec!["img001.raw", "img001.xmp"]);
    }

    #[test]
    fn test_time_huge_window_saturates() {
        let engine = GroupingEngine::new(GroupingConfig {
            time_window_secs: i64::MAX / 10,
            ..Default::default()
        });
        let items = vec![
            ItemRecord::new(1, "a.jpg").with_taken(at(0)),
            ItemRecord::new(2, "b.jpg").with_taken(at(0)),
            ItemRecord::new(3, "c.jpg").with_taken(at(86_400)),
        ];
        let groups = engine.group_by_time(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_filename_dotted_sibling_does_not_split_run() {
        let items = vec![
            ItemRecord::new(1, "a.jpg").with_size(2),
            ItemRecord::new(2, "a.raw").with_size(10),
            ItemRecord::new(3, "a.m.jpg").with_size(1),
        ];
        let groups = GroupingEngine::default().group_by_filename(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].leader.name, "a.jpg");
        assert_eq!(names(&groups[0].followers), vec!["a.raw"]);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a.b.jpg"), "a.b");
        assert_eq!(base_name("noext"), "noext");
        assert_eq!(base_name(".hidden"), "");
    }

    #[test]
    fn test_number_in_filename() {
        let m = NumberInFilename::parse("seq_0042.jpg");
        assert_eq!(m.prefix, "seq_");
        assert_eq!(m.value, Some(42));
        assert_eq!(m.suffix, ".jpg");

        let none = NumberInFilename::parse("cover.jpg");
        assert!(!none.is_valid());
        assert_eq!(none.prefix, "cover.jpg");

        let overflow = NumberInFilename::parse("x99999999999999999999999.jpg");
        assert!(!overflow.is_valid());

        let a = NumberInFilename::parse("seq_009.jpg");
        let b = NumberInFilename::parse("seq_010.jpg");
        assert!(a.directly_precedes(&b));
        assert!(!b.directly_precedes(&a));
        assert!(!a.directly_precedes(&NumberInFilename::parse("seq_010.png")));
        assert!(!NumberInFilename::default().directly_precedes(&a));
    }

    #[test]
    fn test_timelapse_sequence() {
        let mut items = vec![
            ItemRecord::new(1, "seq_001.jpg").with_taken(at(0)),
            ItemRecord::new(2, "seq_002.jpg").with_taken(at(5)),
            ItemRecord::new(3, "seq_003.jpg").with_taken(at(10)),
        ];
        let engine = GroupingEngine::default();
        let groups = engine.group_by_timelapse(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].leader.name, "seq_001.jpg");
        assert_eq!(names(&groups[0].followers), vec!["seq_002.jpg", "seq_003.jpg"]);

        // Timestamp fits the interval, number does not.
        items.push(ItemRecord::new(4, "seq_010.jpg").with_taken(at(15)));
        let groups = engine.group_by_timelapse(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn test_timelapse_interval_break() {
        let items = vec![
            ItemRecord::new(1, "tl_1.jpg").with_taken(at(0)),
            ItemRecord::new(2, "tl_2.jpg").with_taken(at(10)),
            ItemRecord::new(3, "tl_3.jpg").with_taken(at(20)),
            ItemRecord::new(4, "tl_4.jpg").with_taken(at(60)),
            ItemRecord::new(5, "tl_5.jpg").with_taken(at(61)),
        ];
        let groups = GroupingEngine::default().group_by_timelapse(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_timelapse_tolerance() {
        let items = vec![
            ItemRecord::new(1, "f1.jpg").with_taken(at(0)),
            ItemRecord::new(2, "f2.jpg").with_taken(at(30)),
            ItemRecord::new(3, "f3.jpg").with_taken(at(61)),
            ItemRecord::new(4, "f4.jpg").with_taken(at(90)),
        ];
        let groups = GroupingEngine::default().group_by_timelapse(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 4);
    }

    #[test]
    fn test_timelapse_too_few_items() {
        let items = vec![
            ItemRecord::new(1, "s1.jpg").with_taken(at(0)),
            ItemRecord::new(2, "s2.jpg").with_taken(at(5)),
        ];
        assert!(GroupingEngine::default().group_by_timelapse(&items).is_empty());
    }

    #[test]
    fn test_apply_calls_assigner_per_group() {
        let items = vec![
            ItemRecord::new(1, "a.jpg").with_taken(at(0)),
            ItemRecord::new(2, "b.jpg").with_taken(at(1)),
            ItemRecord::new(3, "c.jpg").with_taken(at(100)),
            ItemRecord::new(4, "d.jpg").with_taken(at(101)),
        ];
        let engine = GroupingEngine::default();
        let mut collector = GroupCollector::default();
        let count = engine.apply(GroupingMode::Time, &items, &mut collector);
        assert_eq!(count, 2);
        assert_eq!(collector.groups, vec![(1, vec![2]), (3, vec![4])]);

        let mut calls = 0;
        let mut counter = |_: &ItemRecord, followers: &[&ItemRecord]| calls += followers.len();
        engine.apply(GroupingMode::Time, &items, &mut counter);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_input_not_mutated() {
        let items = vec![
            ItemRecord::new(2, "b.jpg").with_taken(at(1)),
            ItemRecord::new(1, "a.jpg").with_taken(at(0)),
        ];
        let before = items.clone();
        let _ = GroupingEngine::default().group_by_time(&items);
        assert_eq!(items, before);
    }
}
