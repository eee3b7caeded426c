use std::collections::{BTreeMap, BTreeSet};

use super::key::Catalog;

/// For every known id, the downloadable formats the converted store does not
/// yet hold. Pure set difference: an id with no canonical entries is missing
/// the entire downloadable set. The BTreeMap fixes the order the driver
/// iterates in, so runs are reproducible.
pub fn missing_formats(
    ids: &[String],
    catalog: &Catalog,
    downloadable: &BTreeSet<String>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut missing = BTreeMap::new();
    for id in ids {
        let present = catalog.formats.get(id);
        let absent: BTreeSet<String> = downloadable
            .iter()
            .filter(|format| present.map_or(true, |have| !have.contains(*format)))
            .cloned()
            .collect();
        missing.insert(id.clone(), absent);
    }
    missing
}
