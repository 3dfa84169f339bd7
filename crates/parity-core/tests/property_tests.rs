//! Property-based tests for the collection policy and merge protocol
//!
//! Whatever the configuration, a disabled handler never makes it into the
//! collection, and merging worker partials gives the same totals as one
//! collection processing every event.

mod common;

#[cfg(test)]
mod property_tests {
    use super::common::{factory, tally, Tally};
    use parity_core::prelude::*;
    use parity_core::{reduce_into, MemorySource};
    use proptest::prelude::*;

    fn handler_entry() -> impl Strategy<Value = (bool, usize)> {
        // (is a tally, name index)
        (any::<bool>(), 0usize..8)
    }

    proptest! {
        // Property: disabled types and names never load, everything else loads once
        #[test]
        fn prop_disabled_never_loaded(
            entries in prop::collection::vec(handler_entry(), 0..20),
            disable_gauges in any::<bool>(),
            disabled_names in prop::collection::btree_set(0usize..8, 0..4),
        ) {
            let sections: Vec<ConfigSection> = entries
                .iter()
                .map(|&(is_tally, i)| {
                    let type_tag = if is_tally { "Tally" } else { "Gauge" };
                    ConfigSection::new(type_tag).with("name", format!("h{i}"))
                })
                .collect();

            let mut array = HandlerArray::new();
            if disable_gauges {
                array.disable_type("Gauge");
            }
            for i in &disabled_names {
                array.disable_name(format!("h{i}"));
            }

            let streams = SharedStreams::new(MeasurementStreams::new());
            let report = array.load_from_configuration(
                &mut MemorySource::new(sections.clone()),
                &factory(),
                streams,
                "prop",
            );

            for handler in array.iter() {
                prop_assert!(!array.is_disabled(handler.type_tag(), handler.name()));
                prop_assert!(!(disable_gauges && handler.type_tag() == "Gauge"));
            }

            let mut names = array.names();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            prop_assert_eq!(names.len(), total);

            // every section is accounted for exactly once
            prop_assert_eq!(
                report.loaded.len() + report.disabled.len() + report.skipped.len(),
                sections.len()
            );
        }

        // Property: splitting events across workers does not change the totals
        #[test]
        fn prop_split_merge_matches_single_pass(
            flags in prop::collection::vec(prop_oneof![3 => Just(0u32), 1 => 1u32..16], 0..60),
            workers in 1usize..5,
        ) {
            let mut template = HandlerArray::new();
            template.push(Tally::create("a")).unwrap();
            template.push(Tally::create("b")).unwrap();

            let single_streams = SharedStreams::new(MeasurementStreams::new());
            let mut single = template.clone();
            single.bind_streams(single_streams.clone()).unwrap();
            for &flag in &flags {
                single_streams.write().unwrap().set_error_flag(flag);
                single.process_entry().unwrap();
            }

            let mut partials = Vec::new();
            for chunk in flags.chunks(flags.len().div_ceil(workers).max(1)) {
                let streams = SharedStreams::new(MeasurementStreams::new());
                let mut worker = template.clone();
                worker.bind_streams(streams.clone()).unwrap();
                for &flag in chunk {
                    streams.write().unwrap().set_error_flag(flag);
                    worker.process_entry().unwrap();
                }
                partials.push(worker);
            }

            let mut aggregate = template.clone();
            let summary = reduce_into(&mut aggregate, &partials);
            prop_assert!(summary.is_complete());

            let good = flags.iter().filter(|&&f| f == 0).count() as u64;
            prop_assert_eq!(tally(&single, "a").count, good);
            prop_assert_eq!(tally(&aggregate, "a").count, good);
            prop_assert_eq!(tally(&aggregate, "b").count, good);
        }
    }
}
