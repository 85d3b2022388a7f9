//! On-demand catalog hierarchy over the flat stamp collection
//!
//! Two browsing paths share one collection:
//!
//! - country → series → type → stamp group → stamps
//! - country → year → release → category → paper type → stamps
//!
//! Nothing here is persisted. Each query filters by its ancestor keys and
//! groups the survivors; blank categorical fields land in the
//! [`GroupKey::Unassigned`] bucket so no stamp drops out of the tree.
//! Buckets keep first-seen source order, except years which sort ascending.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;

use crate::types::{
    CategoryData, CountryData, GroupKey, Level, NormalizedStamp, PaperTypeData, ReleaseData,
    SeriesData, StampGroupData, StampWithInstances, TypeData, YearData,
};

pub struct HierarchyAggregator<'a> {
    stamps: &'a [NormalizedStamp],
    /// First position of each id
    by_id: HashMap<&'a str, usize>,
    /// Parent id → positions of its direct instances
    children: HashMap<&'a str, Vec<usize>>,
}

/// Members of one bucket, as positions into the collection
type Buckets = IndexMap<GroupKey, Vec<usize>>;

fn year_range<'s>(members: impl Iterator<Item = &'s NormalizedStamp>) -> (Option<i32>, Option<i32>) {
    members
        .filter_map(NormalizedStamp::known_year)
        .fold((None, None), |(lo, hi), year| {
            (
                Some(lo.map_or(year, |l: i32| l.min(year))),
                Some(hi.map_or(year, |h: i32| h.max(year))),
            )
        })
}

impl<'a> HierarchyAggregator<'a> {
    /// Index the collection once. Instance lookups are O(1) afterwards.
    pub fn new(stamps: &'a [NormalizedStamp]) -> Self {
        let mut by_id = HashMap::with_capacity(stamps.len());
        let mut children: HashMap<&'a str, Vec<usize>> = HashMap::new();
        for (pos, stamp) in stamps.iter().enumerate() {
            if !stamp.id.is_empty() {
                by_id.entry(stamp.id.as_str()).or_insert(pos);
            }
            if stamp.has_parent() && stamp.parent_stamp_id != stamp.id {
                children.entry(stamp.parent_stamp_id.as_str()).or_default().push(pos);
            }
        }
        Self {
            stamps,
            by_id,
            children,
        }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn stamp_by_id(&self, id: &str) -> Option<&'a NormalizedStamp> {
        self.by_id.get(id).map(|&pos| &self.stamps[pos])
    }

    /// Direct instances (varieties) of a stamp, one level deep
    pub fn instances_of(&self, id: &str) -> Vec<&'a NormalizedStamp> {
        self.children
            .get(id)
            .map(|positions| positions.iter().map(|&pos| &self.stamps[pos]).collect())
            .unwrap_or_default()
    }

    fn select<F>(&self, filter: F) -> Vec<usize>
    where
        F: Fn(&NormalizedStamp) -> bool,
    {
        self.stamps
            .iter()
            .enumerate()
            .filter(|(_, stamp)| filter(stamp))
            .map(|(pos, _)| pos)
            .collect()
    }

    fn bucket<K>(&self, positions: &[usize], key: K) -> Buckets
    where
        K: Fn(&NormalizedStamp) -> &str,
    {
        let mut buckets = Buckets::new();
        for &pos in positions {
            let group = GroupKey::from_field(key(&self.stamps[pos]));
            buckets.entry(group).or_default().push(pos);
        }
        buckets
    }

    fn first(&self, members: &[usize]) -> &'a NormalizedStamp {
        // buckets are never empty
        &self.stamps[members[0]]
    }

    fn members<'m>(&'m self, positions: &'m [usize]) -> impl Iterator<Item = &'a NormalizedStamp> + 'm {
        positions.iter().map(move |&pos| &self.stamps[pos])
    }

    pub fn group_by_country(&self) -> Vec<CountryData> {
        let all: Vec<usize> = (0..self.stamps.len()).collect();
        self.bucket(&all, |s| &s.country_code)
            .into_iter()
            .map(|(id, members)| {
                let first = self.first(&members);
                let (year_start, year_end) = year_range(self.members(&members));
                CountryData {
                    code: first.country_code.clone(),
                    name: if first.country_name.is_empty() {
                        id.display_name(Level::Country).to_string()
                    } else {
                        first.country_name.clone()
                    },
                    description: first.country_description.clone(),
                    total_years: members.len(),
                    year_start,
                    year_end,
                    id,
                }
            })
            .collect()
    }

    pub fn group_by_series(&self, country: &GroupKey) -> Vec<SeriesData> {
        let selected = self.select(|s| country.matches(&s.country_code));
        self.bucket(&selected, |s| &s.series_name)
            .into_iter()
            .map(|(id, members)| {
                let first = self.first(&members);
                let (period_start, period_end) = year_range(self.members(&members));
                SeriesData {
                    name: id.display_name(Level::Series).to_string(),
                    description: first.series_description.clone(),
                    country_code: first.country_code.clone(),
                    total_types: members.len(),
                    period_start,
                    period_end,
                    id,
                }
            })
            .collect()
    }

    pub fn get_types_for_series(&self, series: &GroupKey) -> Vec<TypeData> {
        let selected = self.select(|s| series.matches(&s.series_name));
        self.bucket(&selected, |s| &s.item_type_name)
            .into_iter()
            .map(|(id, members)| TypeData {
                name: id.display_name(Level::Type).to_string(),
                description: self.first(&members).item_type_description.clone(),
                total_stamps: members.len(),
                id,
            })
            .collect()
    }

    /// Groups carry the watermark, perforation and printer of their first
    /// member as representative values.
    pub fn get_stamp_groups_for_type(
        &self,
        series: &GroupKey,
        item_type: &GroupKey,
    ) -> Vec<StampGroupData> {
        let selected =
            self.select(|s| series.matches(&s.series_name) && item_type.matches(&s.item_type_name));
        self.bucket(&selected, |s| &s.stamp_group_name)
            .into_iter()
            .map(|(id, members)| {
                let first = self.first(&members);
                StampGroupData {
                    name: id.display_name(Level::StampGroup).to_string(),
                    description: first.stamp_group_description.clone(),
                    total_stamps: members.len(),
                    watermark: first.watermark.clone(),
                    perforation: first.perforation.clone(),
                    printer: first.printer.clone(),
                    id,
                }
            })
            .collect()
    }

    /// Issue years of a country, ascending. Stamps without a year are not
    /// listed at this level.
    pub fn get_years_for_country(&self, country: &GroupKey) -> Vec<YearData> {
        let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
        for stamp in self.stamps.iter().filter(|s| country.matches(&s.country_code)) {
            if let Some(year) = stamp.known_year() {
                *counts.entry(year).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(year, total_stamps)| YearData { year, total_stamps })
            .collect()
    }

    pub fn get_releases_for_year(&self, country: &GroupKey, year: i32) -> Vec<ReleaseData> {
        let selected = self.select(|s| country.matches(&s.country_code) && s.issue_year == year);
        self.bucket(&selected, |s| &s.release_name)
            .into_iter()
            .map(|(id, members)| {
                let first = self.first(&members);
                ReleaseData {
                    name: id.display_name(Level::Release).to_string(),
                    description: first.release_description.clone(),
                    release_date: first.release_date.clone(),
                    total_stamps: members.len(),
                    id,
                }
            })
            .collect()
    }

    pub fn get_categories_for_release(
        &self,
        country: &GroupKey,
        year: i32,
        release: &GroupKey,
    ) -> Vec<CategoryData> {
        let selected = self.select(|s| {
            country.matches(&s.country_code)
                && s.issue_year == year
                && release.matches(&s.release_name)
        });
        self.bucket(&selected, |s| &s.category_name)
            .into_iter()
            .map(|(id, members)| CategoryData {
                name: id.display_name(Level::Category).to_string(),
                description: self.first(&members).category_description.clone(),
                total_stamps: members.len(),
                id,
            })
            .collect()
    }

    pub fn get_paper_types_for_category(
        &self,
        country: &GroupKey,
        year: i32,
        release: &GroupKey,
        category: &GroupKey,
    ) -> Vec<PaperTypeData> {
        let selected = self.select(|s| {
            country.matches(&s.country_code)
                && s.issue_year == year
                && release.matches(&s.release_name)
                && category.matches(&s.category_name)
        });
        self.bucket(&selected, |s| &s.paper_type_name)
            .into_iter()
            .map(|(id, members)| PaperTypeData {
                name: id.display_name(Level::PaperType).to_string(),
                description: self.first(&members).paper_type_description.clone(),
                total_stamps: members.len(),
                id,
            })
            .collect()
    }

    pub fn get_stamps_for_paper_type(
        &self,
        country: &GroupKey,
        year: i32,
        release: &GroupKey,
        category: &GroupKey,
        paper_type: &GroupKey,
    ) -> Vec<StampWithInstances> {
        let selected = self.select(|s| {
            country.matches(&s.country_code)
                && s.issue_year == year
                && release.matches(&s.release_name)
                && category.matches(&s.category_name)
                && paper_type.matches(&s.paper_type_name)
        });
        self.with_instances(&selected)
    }

    pub fn get_stamps_for_stamp_group(
        &self,
        series: &GroupKey,
        item_type: &GroupKey,
        group: &GroupKey,
    ) -> Vec<StampWithInstances> {
        let selected = self.select(|s| {
            series.matches(&s.series_name)
                && item_type.matches(&s.item_type_name)
                && group.matches(&s.stamp_group_name)
        });
        self.with_instances(&selected)
    }

    /// Attach direct instances from the whole collection. When ids repeat,
    /// only the first record with that id receives the instances.
    fn with_instances(&self, selected: &[usize]) -> Vec<StampWithInstances> {
        selected
            .iter()
            .map(|&pos| {
                let stamp = &self.stamps[pos];
                let owns_id = self.by_id.get(stamp.id.as_str()) == Some(&pos);
                let instances = if owns_id {
                    self.instances_of(&stamp.id).into_iter().cloned().collect()
                } else {
                    Vec::new()
                };
                StampWithInstances {
                    stamp: stamp.clone(),
                    instances,
                }
            })
            .collect()
    }
}
