use crate::domain::QueryResult;
use std::collections::HashMap;

/// The last known firmware version per IMEI.
pub type Snapshot = HashMap<String, String>;

#[derive(Clone, PartialEq, Debug)]
pub struct VersionChange {
    pub imei: String,
    pub previous: String,
    pub current: String,
}

/// Updates `previous` with the results that carry data.
///
/// Devices that came back as a marker, or not at all, keep their last known version.
pub fn next_snapshot(previous: &Snapshot, results: &[QueryResult]) -> Snapshot {
    let mut snapshot = previous.clone();
    snapshot.extend(
        results
            .iter()
            .filter(|result| result.has_data())
            .map(|result| (result.imei.clone(), result.version.clone())),
    );
    snapshot
}

/// Returns every device whose version differs from the one in `previous`, in result order.
///
/// Devices absent from `previous` are new rather than changed, and marker results never count.
pub fn detect_changes(previous: &Snapshot, results: &[QueryResult]) -> Vec<VersionChange> {
    results
        .iter()
        .filter(|result| result.has_data())
        .filter_map(|result| {
            let previous = previous.get(&result.imei)?;
            (*previous != result.version).then(|| VersionChange {
                imei: result.imei.clone(),
                previous: previous.clone(),
                current: result.version.clone(),
            })
        })
        .collect()
}
