/// Batch and range reads through the data source agree with slicing the full frame
use proptest::prelude::*;
use vigil_data::{DataSource, Storage};
use vigil_test::{numeric_frame, TestEnvironment};

fn ids(df: &vigil_core::Dataframe) -> Vec<String> {
    df.row_ids().into_iter().map(str::to_string).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn batch_is_suffix_of_full_read(rows in 0usize..40, appended in 0usize..10, n in 0usize..60) {
        let ds = DataSource::new(Storage::memory());
        ds.save_dataframe(&numeric_frame(rows, "a"), "m", true).unwrap();
        if appended > 0 {
            ds.save_dataframe(&numeric_frame(appended, "b"), "m", false).unwrap();
        }

        let full = ids(&ds.get_dataframe("m").unwrap());
        let batch = ids(&ds.get_dataframe_batch("m", n).unwrap());
        let expected = full[full.len().saturating_sub(n)..].to_vec();
        prop_assert_eq!(batch, expected);
        prop_assert_eq!(ds.get_num_observations("m").unwrap(), (rows + appended) as u64);
    }

    #[test]
    fn local_range_matches_slice(rows in 1usize..40, start in 0usize..45, len in 1usize..20) {
        let env = TestEnvironment::new().unwrap();
        let ds = DataSource::new(Storage::local(env.data_dir()));
        ds.save_dataframe(&numeric_frame(rows, "r"), "m", true).unwrap();

        let full = ids(&ds.get_dataframe("m").unwrap());
        let range = ids(&ds.get_dataframe_range("m", start, start + len).unwrap());
        let lo = start.min(full.len());
        let hi = (start + len).min(full.len());
        prop_assert_eq!(range, full[lo..hi].to_vec());
    }
}
