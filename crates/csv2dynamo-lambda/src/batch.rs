// Grouping of records into batch write requests

use csv2dynamo_config::MAX_BATCH_SIZE;
use csv2dynamo_core::Record;
use std::collections::HashMap;

/// Split records into batches of at most `batch_size` (capped at 25).
///
/// When `partition_key` is given, a record whose key already appears in the
/// batch being filled replaces the earlier one, because one BatchWriteItem
/// request may not name the same key twice. Later rows win, matching what
/// sequential upserts would leave in the table. Order is otherwise kept.
pub fn plan_batches(
    records: Vec<Record>,
    batch_size: usize,
    partition_key: Option<&str>,
) -> Vec<Vec<Record>> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let mut batches = Vec::new();
    let mut current: Vec<Record> = Vec::with_capacity(batch_size);
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = partition_key.and_then(|name| record.get(name)).cloned();

        if let Some(&pos) = key.as_ref().and_then(|k| positions.get(k)) {
            current[pos] = record;
            continue;
        }

        if let Some(key) = key {
            positions.insert(key, current.len());
        }
        current.push(record);

        if current.len() == batch_size {
            batches.push(std::mem::replace(
                &mut current,
                Vec::with_capacity(batch_size),
            ));
            positions.clear();
        }
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, name: &str) -> Record {
        Record::from([
            ("id".to_string(), id.to_string()),
            ("name".to_string(), name.to_string()),
        ])
    }

    #[test]
    fn test_splits_at_batch_size() {
        let records: Vec<Record> = (0..60).map(|i| row(&i.to_string(), "x")).collect();
        let batches = plan_batches(records, 25, Some("id"));

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![25, 25, 10]);
    }

    #[test]
    fn test_batch_size_is_capped() {
        let records: Vec<Record> = (0..30).map(|i| row(&i.to_string(), "x")).collect();
        assert_eq!(plan_batches(records.clone(), 100, None)[0].len(), 25);
        assert_eq!(plan_batches(records, 0, None).len(), 30);
    }

    #[test]
    fn test_duplicate_keys_collapse_last_wins() {
        let records = vec![row("1", "Alice"), row("2", "Bob"), row("1", "Alicia")];
        let batches = plan_batches(records, 25, Some("id"));

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0]["name"], "Alicia");
        assert_eq!(batches[0][1]["name"], "Bob");
    }

    #[test]
    fn test_duplicates_kept_without_partition_key() {
        let records = vec![row("1", "Alice"), row("1", "Alicia")];
        let batches = plan_batches(records, 25, None);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_empty_input_has_no_batches() {
        assert!(plan_batches(Vec::new(), 25, Some("id")).is_empty());
    }
}
