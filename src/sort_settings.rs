use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::item::ItemRecord;
use crate::natural::{CaseSensitivity, natural_compare};
use crate::sort_value::{SortValue, less_than_values};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CategorizationMode {
    #[default]
    NoCategories,
    ByFolder,
    ByFormat,
    ByDate,
}

impl CategorizationMode {
    pub const ALL: [CategorizationMode; 4] = [
        CategorizationMode::NoCategories,
        CategorizationMode::ByFolder,
        CategorizationMode::ByFormat,
        CategorizationMode::ByDate,
    ];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn index(self) -> i32 {
        Self::ALL.iter().position(|m| *m == self).unwrap_or(0) as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortRole {
    #[default]
    ByName,
    ByPath,
    ByCreationDate,
    ByModificationDate,
    ByFileSize,
    ByRating,
    ByImageSize,
    ByAspectRatio,
    ByFaces,
    BySimilarity,
    ByManualOrderAndName,
    ByManualOrderAndDate,
    ByDownloadState,
}

impl SortRole {
    pub const ALL: [SortRole; 13] = [
        SortRole::ByName,
        SortRole::ByPath,
        SortRole::ByCreationDate,
        SortRole::ByModificationDate,
        SortRole::ByFileSize,
        SortRole::ByRating,
        SortRole::ByImageSize,
        SortRole::ByAspectRatio,
        SortRole::ByFaces,
        SortRole::BySimilarity,
        SortRole::ByManualOrderAndName,
        SortRole::ByManualOrderAndDate,
        SortRole::ByDownloadState,
    ];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn index(self) -> i32 {
        Self::ALL.iter().position(|r| *r == self).unwrap_or(0) as i32
    }
}

/// Order as selected by the user; `Default` defers to the role or mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
    #[default]
    Default,
}

impl SortOrder {
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(SortOrder::Ascending),
            1 => Some(SortOrder::Descending),
            2 => Some(SortOrder::Default),
            _ => None,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            SortOrder::Ascending => 0,
            SortOrder::Descending => 1,
            SortOrder::Default => 2,
        }
    }
}

/// Effective order after resolving `SortOrder::Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

pub fn default_sort_order_for_role(role: SortRole) -> Direction {
    match role {
        SortRole::ByFileSize | SortRole::ByRating => Direction::Descending,
        SortRole::ByName
        | SortRole::ByPath
        | SortRole::ByCreationDate
        | SortRole::ByDownloadState => Direction::Ascending,
        _ => Direction::Ascending,
    }
}

pub fn default_sort_order_for_categorization_mode(_mode: CategorizationMode) -> Direction {
    Direction::Ascending
}

fn resolve(order: SortOrder, default: Direction) -> Direction {
    match order {
        SortOrder::Ascending => Direction::Ascending,
        SortOrder::Descending => Direction::Descending,
        SortOrder::Default => default,
    }
}

/// Roles consulted, in order, when the active role cannot tell two distinct
/// records apart. Always compared ascending.
const TIE_BREAK_CHAIN: [SortRole; 6] = [
    SortRole::ByName,
    SortRole::ByCreationDate,
    SortRole::ByPath,
    SortRole::ByFileSize,
    SortRole::ByRating,
    SortRole::ByDownloadState,
];

/// Category an item falls into under the active categorization mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryKey {
    All,
    Folder(String),
    Format(String),
    Date(Option<NaiveDate>),
}

#[derive(Debug, Clone)]
pub struct Category<'a> {
    pub key: CategoryKey,
    pub items: Vec<&'a ItemRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSettings {
    categorization_mode: CategorizationMode,
    categorization_sort_order: SortOrder,
    categorization_case: CaseSensitivity,
    sort_role: SortRole,
    sort_order: SortOrder,
    sort_case: CaseSensitivity,
    natural: bool,
}

impl Default for SortSettings {
    fn default() -> Self {
        Self {
            categorization_mode: CategorizationMode::NoCategories,
            categorization_sort_order: SortOrder::Default,
            categorization_case: CaseSensitivity::Sensitive,
            sort_role: SortRole::ByName,
            sort_order: SortOrder::Default,
            sort_case: CaseSensitivity::Sensitive,
            natural: true,
        }
    }
}

impl SortSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: SortRole) -> Self {
        self.set_sort_role(role);
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.set_sort_order(order);
        self
    }

    pub fn with_categorization(mut self, mode: CategorizationMode) -> Self {
        self.set_categorization_mode(mode);
        self
    }

    pub fn with_categorization_order(mut self, order: SortOrder) -> Self {
        self.set_categorization_sort_order(order);
        self
    }

    pub fn with_natural(mut self, natural: bool) -> Self {
        self.set_string_type_natural(natural);
        self
    }

    pub fn with_case(mut self, case: CaseSensitivity) -> Self {
        self.set_sort_case_sensitivity(case);
        self.set_categorization_case_sensitivity(case);
        self
    }

    pub fn set_sort_role(&mut self, role: SortRole) {
        self.sort_role = role;
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort_order = order;
    }

    pub fn set_categorization_mode(&mut self, mode: CategorizationMode) {
        self.categorization_mode = mode;
    }

    pub fn set_categorization_sort_order(&mut self, order: SortOrder) {
        self.categorization_sort_order = order;
    }

    pub fn set_string_type_natural(&mut self, natural: bool) {
        self.natural = natural;
    }

    pub fn set_sort_case_sensitivity(&mut self, case: CaseSensitivity) {
        self.sort_case = case;
    }

    pub fn set_categorization_case_sensitivity(&mut self, case: CaseSensitivity) {
        self.categorization_case = case;
    }

    pub fn sort_role(&self) -> SortRole {
        self.sort_role
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn categorization_mode(&self) -> CategorizationMode {
        self.categorization_mode
    }

    pub fn categorization_sort_order(&self) -> SortOrder {
        self.categorization_sort_order
    }

    pub fn is_natural(&self) -> bool {
        self.natural
    }

    pub fn sort_case_sensitivity(&self) -> CaseSensitivity {
        self.sort_case
    }

    /// Effective item order, always derived from the current role and order.
    pub fn current_sort_order(&self) -> Direction {
        resolve(self.sort_order, default_sort_order_for_role(self.sort_role))
    }

    pub fn current_categorization_sort_order(&self) -> Direction {
        resolve(
            self.categorization_sort_order,
            default_sort_order_for_categorization_mode(self.categorization_mode),
        )
    }

    fn compare_names(&self, a: &str, b: &str, direction: Direction) -> Ordering {
        direction.apply(natural_compare(a, b, self.sort_case, self.natural))
    }

    /// Compares two items on the active sort role.
    pub fn compare(&self, left: &ItemRecord, right: &ItemRecord) -> Ordering {
        self.compare_by(left, right, self.sort_role)
    }

    /// Compares two items on `role` under the effective sort order. Missing
    /// dates sort before every present date, then the order is applied.
    pub fn compare_by(&self, left: &ItemRecord, right: &ItemRecord, role: SortRole) -> Ordering {
        self.compare_directed(left, right, role, self.current_sort_order())
    }

    fn compare_directed(
        &self,
        left: &ItemRecord,
        right: &ItemRecord,
        role: SortRole,
        direction: Direction,
    ) -> Ordering {
        let ordering = match role {
            SortRole::ByName => return self.compare_names(&left.name, &right.name, direction),
            SortRole::ByPath => {
                return self.compare_names(&left.file_path(), &right.file_path(), direction);
            }
            SortRole::ByFileSize => left.file_size.cmp(&right.file_size),
            SortRole::ByCreationDate => left.taken.cmp(&right.taken),
            SortRole::ByModificationDate => left.modified.cmp(&right.modified),
            SortRole::ByRating => left.rating.cmp(&right.rating),
            SortRole::ByDownloadState => left.download_state.cmp(&right.download_state),
            SortRole::ByImageSize => left.pixel_count().cmp(&right.pixel_count()),
            SortRole::ByAspectRatio => left.aspect_ratio().total_cmp(&right.aspect_ratio()),
            // Items with more unconfirmed faces come first.
            SortRole::ByFaces => right.unconfirmed_faces.cmp(&left.unconfirmed_faces),
            SortRole::BySimilarity => {
                left.effective_similarity().total_cmp(&right.effective_similarity())
            }
            SortRole::ByManualOrderAndName | SortRole::ByManualOrderAndDate => {
                let result = direction.apply(left.manual_order.cmp(&right.manual_order));
                if result != Ordering::Equal {
                    return result;
                }
                if role == SortRole::ByManualOrderAndDate {
                    left.taken.cmp(&right.taken)
                } else {
                    return self.compare_names(&left.name, &right.name, direction);
                }
            }
        };
        direction.apply(ordering)
    }

    /// Strict total-order predicate used for sorting.
    pub fn less_than(&self, left: &ItemRecord, right: &ItemRecord) -> bool {
        let result = self.compare(left, right);
        if result != Ordering::Equal {
            return result == Ordering::Less;
        }

        if left == right {
            return false;
        }

        for role in TIE_BREAK_CHAIN {
            let result = self.compare_directed(left, right, role, Direction::Ascending);
            if result != Ordering::Equal {
                return result == Ordering::Less;
            }
        }

        false
    }

    /// `less_than` folded into an `Ordering` for `sort_by`.
    pub fn ordering(&self, left: &ItemRecord, right: &ItemRecord) -> Ordering {
        if self.less_than(left, right) {
            Ordering::Less
        } else if self.less_than(right, left) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    pub fn compare_categories(&self, left: &ItemRecord, right: &ItemRecord) -> Ordering {
        let direction = self.current_categorization_sort_order();
        match self.categorization_mode {
            CategorizationMode::NoCategories => Ordering::Equal,
            CategorizationMode::ByFolder => direction.apply(natural_compare(
                &left.folder_path,
                &right.folder_path,
                self.categorization_case,
                self.natural,
            )),
            CategorizationMode::ByFormat => direction.apply(natural_compare(
                &left.mime_type,
                &right.mime_type,
                self.categorization_case,
                self.natural,
            )),
            CategorizationMode::ByDate => {
                direction.apply(left.taken.map(|t| t.date()).cmp(&right.taken.map(|t| t.date())))
            }
        }
    }

    pub fn category_key(&self, item: &ItemRecord) -> CategoryKey {
        match self.categorization_mode {
            CategorizationMode::NoCategories => CategoryKey::All,
            CategorizationMode::ByFolder => CategoryKey::Folder(item.folder_path.clone()),
            CategorizationMode::ByFormat => CategoryKey::Format(item.mime_type.clone()),
            CategorizationMode::ByDate => CategoryKey::Date(item.taken.map(|t| t.date())),
        }
    }

    /// Sorts by category first, then by `less_than` within a category.
    pub fn sort_items(&self, items: &mut [&ItemRecord]) {
        items.sort_by(|a, b| self.compare_categories(a, b).then_with(|| self.ordering(a, b)));
    }

    /// Sorts `items` and partitions them into contiguous categories.
    pub fn categorize<'a>(&self, items: &'a [ItemRecord]) -> Vec<Category<'a>> {
        let mut sorted: Vec<&ItemRecord> = items.iter().collect();
        self.sort_items(&mut sorted);

        let mut categories: Vec<Category<'a>> = Vec::new();
        for item in sorted {
            match categories.last_mut() {
                Some(current)
                    if self.compare_categories(current.items[0], item) == Ordering::Equal =>
                {
                    current.items.push(item);
                }
                _ => categories.push(Category { key: self.category_key(item), items: vec![item] }),
            }
        }
        categories
    }

    /// Less-than on derived values (similarity scores, face regions, ...).
    pub fn less_than_values(&self, left: &SortValue, right: &SortValue) -> bool {
        less_than_values(left, right, self.current_sort_order(), self.sort_case, self.natural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn names(items: &[&ItemRecord]) -> Vec<String> {
        items.iter().map(|i| i.name.clone()).collect()
    }

    #[test]
    fn test_default_order_derivation() {
        let mut s = SortSettings::new();
        s.set_sort_role(SortRole::ByFileSize);
        s.set_sort_order(SortOrder::Default);
        assert_eq!(s.current_sort_order(), Direction::Descending);

        s.set_sort_role(SortRole::ByName);
        assert_eq!(s.current_sort_order(), Direction::Ascending);

        s.set_sort_role(SortRole::ByRating);
        assert_eq!(s.current_sort_order(), Direction::Descending);

        s.set_sort_order(SortOrder::Ascending);
        assert_eq!(s.current_sort_order(), Direction::Ascending);

        // Changing the role with an explicit order keeps the explicit order.
        s.set_sort_role(SortRole::ByFileSize);
        assert_eq!(s.current_sort_order(), Direction::Ascending);

        s.set_sort_order(SortOrder::Default);
        assert_eq!(s.current_sort_order(), Direction::Descending);

        for mode in CategorizationMode::ALL {
            s.set_categorization_mode(mode);
            assert_eq!(s.current_categorization_sort_order(), Direction::Ascending);
        }
        s.set_categorization_sort_order(SortOrder::Descending);
        assert_eq!(s.current_categorization_sort_order(), Direction::Descending);
    }

    #[test]
    fn test_index_mapping() {
        for role in SortRole::ALL {
            assert_eq!(SortRole::from_index(role.index()), Some(role));
        }
        assert_eq!(SortRole::from_index(12), Some(SortRole::ByDownloadState));
        assert_eq!(SortRole::from_index(13), None);
        assert_eq!(SortRole::from_index(-1), None);
        assert_eq!(CategorizationMode::from_index(3), Some(CategorizationMode::ByDate));
        assert_eq!(SortOrder::from_index(2), Some(SortOrder::Default));
    }

    #[test]
    fn test_name_sort_is_natural() {
        let items = vec![
            ItemRecord::new(1, "img10.jpg"),
            ItemRecord::new(2, "img2.jpg"),
            ItemRecord::new(3, "img1.jpg"),
        ];
        let s = SortSettings::new();
        let mut refs: Vec<&ItemRecord> = items.iter().collect();
        s.sort_items(&mut refs);
        assert_eq!(names(&refs), vec!["img1.jpg", "img2.jpg", "img10.jpg"]);

        let lexical = SortSettings::new().with_natural(false);
        lexical.sort_items(&mut refs);
        assert_eq!(names(&refs), vec!["img1.jpg", "img10.jpg", "img2.jpg"]);
    }

    #[test]
    fn test_rating_tie_falls_back_to_name() {
        let items = vec![
            ItemRecord::new(1, "b.jpg").with_rating(3),
            ItemRecord::new(2, "a.jpg").with_rating(3),
        ];
        let s = SortSettings::new().with_role(SortRole::ByRating);
        let mut refs: Vec<&ItemRecord> = items.iter().collect();
        s.sort_items(&mut refs);
        assert_eq!(names(&refs), vec!["a.jpg", "b.jpg"]);

        // Sorting the already name-sorted list again keeps the order.
        s.sort_items(&mut refs);
        assert_eq!(names(&refs), vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_file_size_default_descending() {
        let items = vec![
            ItemRecord::new(1, "small.jpg").with_size(10),
            ItemRecord::new(2, "big.jpg").with_size(1000),
            ItemRecord::new(3, "mid.jpg").with_size(100),
        ];
        let s = SortSettings::new().with_role(SortRole::ByFileSize);
        let mut refs: Vec<&ItemRecord> = items.iter().collect();
        s.sort_items(&mut refs);
        assert_eq!(names(&refs), vec!["big.jpg", "mid.jpg", "small.jpg"]);
    }

    #[test]
    fn test_null_dates_sort_first_ascending() {
        let items = vec![
            ItemRecord::new(1, "late.jpg").with_taken(at(12, 0, 0)),
            ItemRecord::new(2, "undated.jpg"),
            ItemRecord::new(3, "early.jpg").with_taken(at(8, 0, 0)),
        ];
        let s = SortSettings::new().with_role(SortRole::ByCreationDate);
        let mut refs: Vec<&ItemRecord> = items.iter().collect();
        s.sort_items(&mut refs);
        assert_eq!(names(&refs), vec!["undated.jpg", "early.jpg", "late.jpg"]);

        let desc = s.clone().with_order(SortOrder::Descending);
        desc.sort_items(&mut refs);
        assert_eq!(names(&refs), vec!["late.jpg", "early.jpg", "undated.jpg"]);
    }

    #[test]
    fn test_less_than_is_strict_weak_order() {
        let items = vec![
            ItemRecord::new(1, "a.jpg").with_rating(2).with_size(5),
            ItemRecord::new(2, "a.jpg").with_rating(2).with_size(7).with_folder("/x"),
            ItemRecord::new(3, "b.jpg").with_rating(2),
            ItemRecord::new(4, "c.jpg").with_rating(5).with_taken(at(1, 0, 0)),
            ItemRecord::new(5, "c.jpg").with_rating(5),
        ];

        for role in SortRole::ALL {
            let s = SortSettings::new().with_role(role);
            for a in &items {
                assert!(!s.less_than(a, a), "irreflexive failed for {:?}", role);
                for b in &items {
                    if s.less_than(a, b) {
                        assert!(!s.less_than(b, a), "asymmetry failed for {:?}", role);
                    }
                    for c in &items {
                        if s.less_than(a, b) && s.less_than(b, c) {
                            assert!(s.less_than(a, c), "transitivity failed for {:?}", role);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_identical_records_not_less() {
        let a = ItemRecord::new(1, "same.jpg").with_size(3);
        let b = a.clone();
        let s = SortSettings::new().with_role(SortRole::ByRating);
        assert!(!s.less_than(&a, &b));
        assert!(!s.less_than(&b, &a));
        assert_eq!(s.ordering(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_similarity_reference_first() {
        let mut reference = ItemRecord::new(7, "ref.jpg");
        reference.reference_image_id = Some(7);
        reference.similarity = 0.2;
        let mut close = ItemRecord::new(8, "close.jpg");
        close.reference_image_id = Some(7);
        close.similarity = 0.95;
        let mut far = ItemRecord::new(9, "far.jpg");
        far.reference_image_id = Some(7);
        far.similarity = 0.5;

        let items = vec![far, close, reference];
        let s = SortSettings::new().with_role(SortRole::BySimilarity).with_order(SortOrder::Descending);
        let mut refs: Vec<&ItemRecord> = items.iter().collect();
        s.sort_items(&mut refs);
        assert_eq!(names(&refs), vec!["ref.jpg", "close.jpg", "far.jpg"]);
    }

    #[test]
    fn test_manual_order_then_name() {
        let mut a = ItemRecord::new(1, "z.jpg");
        a.manual_order = 1;
        let mut b = ItemRecord::new(2, "b.jpg");
        b.manual_order = 2;
        let mut c = ItemRecord::new(3, "a.jpg");
        c.manual_order = 2;
        let items = vec![b, c, a];
        let s = SortSettings::new().with_role(SortRole::ByManualOrderAndName);
        let mut refs: Vec<&ItemRecord> = items.iter().collect();
        s.sort_items(&mut refs);
        assert_eq!(names(&refs), vec!["z.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_categories_by_folder_and_date() {
        let items = vec![
            ItemRecord::new(1, "b.jpg").with_folder("/photos/2024"),
            ItemRecord::new(2, "a.jpg").with_folder("/photos/2023"),
            ItemRecord::new(3, "c.jpg").with_folder("/photos/2024"),
        ];
        let s = SortSettings::new().with_categorization(CategorizationMode::ByFolder);
        let cats = s.categorize(&items);
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[0].key, CategoryKey::Folder("/photos/2023".into()));
        assert_eq!(names(&cats[1].items), vec!["b.jpg", "c.jpg"]);

        let day1 = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(23, 0, 0).unwrap();
        let day1_early = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(1, 0, 0).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap().and_hms_opt(0, 30, 0).unwrap();
        let dated = vec![
            ItemRecord::new(1, "x.jpg").with_taken(day2),
            ItemRecord::new(2, "y.jpg").with_taken(day1),
            ItemRecord::new(3, "z.jpg").with_taken(day1_early),
        ];
        let s = SortSettings::new().with_categorization(CategorizationMode::ByDate);
        assert_eq!(s.compare_categories(&dated[1], &dated[2]), Ordering::Equal);
        let cats = s.categorize(&dated);
        assert_eq!(cats.len(), 2);
        assert_eq!(names(&cats[0].items), vec!["y.jpg", "z.jpg"]);
        assert_eq!(names(&cats[1].items), vec!["x.jpg"]);
    }

    #[test]
    fn test_no_categories_single_group() {
        let items = vec![
            ItemRecord::new(1, "a.jpg").with_mime("image/jpeg"),
            ItemRecord::new(2, "b.png").with_mime("image/png"),
        ];
        let s = SortSettings::new();
        assert_eq!(s.compare_categories(&items[0], &items[1]), Ordering::Equal);
        let cats = s.categorize(&items);
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].key, CategoryKey::All);

        let by_format = SortSettings::new().with_categorization(CategorizationMode::ByFormat);
        assert_eq!(by_format.categorize(&items).len(), 2);
    }

    #[test]
    fn test_value_compare_uses_direction() {
        let s = SortSettings::new().with_role(SortRole::BySimilarity);
        assert!(s.less_than_values(&SortValue::Double(0.1), &SortValue::Double(0.2)));
        let desc = s.with_order(SortOrder::Descending);
        assert!(desc.less_than_values(&SortValue::Double(0.2), &SortValue::Double(0.1)));
        assert!(!desc.less_than_values(&SortValue::Int(1), &SortValue::Double(0.1)));
    }
}
