use std::collections::HashMap;

use crate::table::Record;

/// Column positions in the `SRA_Run_Members` reference table.
pub mod run_members {
    pub const RUN: usize = 0;
    pub const SUBMISSION: usize = 1;
    pub const SAMPLE: usize = 2;
    pub const EXPERIMENT: usize = 3;
    pub const STUDY: usize = 4;
    pub const MEMBER_NAME: usize = 5;
    pub const SPOTS: usize = 6;
    pub const STATUS: usize = 7;
    pub const BIOSAMPLE: usize = 8;
}

/// Parent id -> ordered set of child ids, plus the reverse lookup the
/// grouping passes need. Parents keep first-seen order; children are
/// deduplicated within a parent.
#[derive(Debug, Default)]
pub struct MembershipMap {
    parent_of: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
    order: Vec<String>,
}

impl MembershipMap {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = Self::default();
        for (parent, child) in pairs {
            if parent.is_empty() || parent == "-" || child.is_empty() {
                continue;
            }
            let children = map.children.entry(parent.clone()).or_insert_with(|| {
                map.order.push(parent.clone());
                Vec::new()
            });
            if !children.contains(&child) {
                children.push(child.clone());
            }
            map.parent_of.insert(child, parent);
        }
        map
    }

    pub fn parent_of(&self, child: &str) -> Option<&str> {
        self.parent_of.get(child).map(String::as_str)
    }

    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn children_of(&self, parent: &str) -> &[String] {
        self.children
            .get(parent)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct HierarchyIndex;

impl HierarchyIndex {
    /// Stable grouping: parents appear in the order their first record
    /// arrived, records keep their input order within a group. Records
    /// whose parent cannot be derived come back separately.
    pub fn group_by_parent<F>(
        records: Vec<Record>,
        parent_key: F,
    ) -> (Vec<(String, Vec<Record>)>, Vec<Record>)
    where
        F: Fn(&Record) -> Option<String>,
    {
        let mut groups: Vec<(String, Vec<Record>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut orphans = Vec::new();

        for record in records {
            let Some(parent) = parent_key(&record) else {
                orphans.push(record);
                continue;
            };
            match index.get(&parent) {
                Some(&slot) => groups[slot].1.push(record),
                None => {
                    index.insert(parent.clone(), groups.len());
                    groups.push((parent, vec![record]));
                }
            }
        }
        (groups, orphans)
    }

    /// Keep only membership rows whose status is `live`.
    pub fn live_members(records: &[Record]) -> Vec<&Record> {
        records
            .iter()
            .filter(|record| record.get(run_members::STATUS).map(String::as_str) == Some("live"))
            .collect()
    }

    pub fn experiment_to_runs(members: &[&Record]) -> MembershipMap {
        MembershipMap::from_pairs(members.iter().filter_map(|record| {
            Some((
                record.get(run_members::EXPERIMENT)?.clone(),
                record.get(run_members::RUN)?.clone(),
            ))
        }))
    }

    pub fn sample_to_experiments(members: &[&Record]) -> MembershipMap {
        MembershipMap::from_pairs(members.iter().filter_map(|record| {
            Some((
                record.get(run_members::SAMPLE)?.clone(),
                record.get(run_members::EXPERIMENT)?.clone(),
            ))
        }))
    }

    /// Sample id -> biosample accession field, as recorded in the
    /// membership table. The field keeps whatever shape the archive put
    /// there (full accession, bare number, or the `-` placeholder);
    /// resolution happens at annotation time.
    pub fn sample_biosamples(members: &[&Record]) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for record in members {
            let (Some(sample), Some(biosample)) = (
                record.get(run_members::SAMPLE),
                record.get(run_members::BIOSAMPLE),
            ) else {
                continue;
            };
            if sample.is_empty() || sample == "-" {
                continue;
            }
            map.insert(sample.clone(), biosample.clone());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(run: &str, sample: &str, experiment: &str, status: &str, biosample: &str) -> Record {
        vec![
            run.to_string(),
            "SUB001".to_string(),
            sample.to_string(),
            experiment.to_string(),
            "STU001".to_string(),
            "default".to_string(),
            "1000".to_string(),
            status.to_string(),
            biosample.to_string(),
        ]
    }

    #[test]
    fn grouping_is_stable() {
        let records = vec![
            vec!["DRR1_1".to_string()],
            vec!["DRR2_1".to_string()],
            vec!["DRR1_2".to_string()],
        ];
        let (groups, orphans) = HierarchyIndex::group_by_parent(records, |record| {
            record
                .first()
                .map(|id| crate::domain::run_id_of_file_id(id).to_string())
        });
        assert!(orphans.is_empty());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "DRR1");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[0][0], "DRR1_1");
        assert_eq!(groups[0].1[1][0], "DRR1_2");
        assert_eq!(groups[1].0, "DRR2");
    }

    #[test]
    fn orphans_are_separated() {
        let records = vec![vec!["known".to_string()], vec!["unknown".to_string()]];
        let (groups, orphans) = HierarchyIndex::group_by_parent(records, |record| {
            (record[0] == "known").then(|| "P1".to_string())
        });
        assert_eq!(groups.len(), 1);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0][0], "unknown");
    }

    #[test]
    fn live_filter_and_memberships() {
        let records = vec![
            member("DRR1", "DRS1", "DRX1", "live", "SAMD001"),
            member("DRR2", "DRS1", "DRX1", "live", "SAMD001"),
            member("DRR3", "DRS2", "DRX2", "suppressed", "SAMD002"),
        ];
        let live = HierarchyIndex::live_members(&records);
        assert_eq!(live.len(), 2);

        let exp_runs = HierarchyIndex::experiment_to_runs(&live);
        assert_eq!(exp_runs.children_of("DRX1"), ["DRR1", "DRR2"]);
        assert_eq!(exp_runs.parent_of("DRR2"), Some("DRX1"));
        assert_eq!(exp_runs.parent_of("DRR3"), None);

        let sample_exps = HierarchyIndex::sample_to_experiments(&live);
        assert_eq!(sample_exps.children_of("DRS1"), ["DRX1"]);

        let biosamples = HierarchyIndex::sample_biosamples(&live);
        assert_eq!(biosamples.get("DRS1").map(String::as_str), Some("SAMD001"));
    }

    #[test]
    fn membership_skips_placeholder_parents() {
        let map = MembershipMap::from_pairs(vec![
            ("-".to_string(), "DRR1".to_string()),
            ("DRX1".to_string(), "DRR2".to_string()),
            ("DRX1".to_string(), "DRR2".to_string()),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.children_of("DRX1"), ["DRR2"]);
    }
}
