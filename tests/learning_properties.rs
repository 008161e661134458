//! End-to-end learning properties of the spatial pooler, temporal memory and
//! homeostatic plasticity controller.
//!
//! Run with: `cargo test --test learning_properties`
//! Run with verbose output: `cargo test --test learning_properties -- --nocapture`

use neocortex::algorithms::{CellState, Column};
use neocortex::prelude::*;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

/// Helper to create an SDR from unsorted, possibly duplicated indices.
fn make_sdr(size: u32, indices: &[u32]) -> Sdr {
    let mut sorted: Vec<u32> = indices.iter().copied().filter(|&i| i < size).collect();
    sorted.sort_unstable();
    sorted.dedup();
    Sdr::from_sparse(&[size], &sorted).unwrap()
}

/// `count` disjoint blocks of `width` bits.
fn orthogonal_inputs(size: u32, count: u32, width: u32) -> Vec<Sdr> {
    (0..count)
        .map(|i| {
            let bits: Vec<u32> = (i * width..(i + 1) * width).collect();
            make_sdr(size, &bits)
        })
        .collect()
}

fn sp_config() -> HtmConfig {
    HtmConfig {
        input_dimensions: vec![100],
        column_dimensions: vec![512],
        cells_per_column: 4,
        potential_radius: 50,
        local_area_density: 0.04,
        ..Default::default()
    }
}

// =============================================================================
// SPATIAL POOLER PROPERTIES
// =============================================================================

mod spatial_pooler {
    use super::*;

    fn build(config: HtmConfig) -> (Connections, SpatialPooler) {
        let mut conn = Connections::new(config).unwrap();
        let sp = SpatialPooler::new(&mut conn).unwrap();
        (conn, sp)
    }

    fn assert_permanences_in_bounds(columns: &[Column]) {
        for column in columns {
            for &p in column.permanences() {
                assert!((0.0..=1.0).contains(&p), "permanence {p} out of [0, 1]");
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        #[test]
        fn prop_global_inhibition_hits_target_sparsity(
            indices in proptest::collection::vec(0u32..100, 0..40),
            learn in any::<bool>()
        ) {
            let (mut conn, mut sp) = build(sp_config());
            let input = make_sdr(100, &indices);
            let mut output = Sdr::new(&[512]);

            sp.compute(&mut conn, &input, learn, &mut output).unwrap();

            // round(0.04 * 512) = 20
            prop_assert_eq!(output.get_sum(), 20);
        }

        #[test]
        fn prop_permanences_stay_in_bounds(
            seed in 0u64..1000,
            steps in 1usize..40
        ) {
            let (mut conn, mut sp) = build(HtmConfig {
                seed,
                boost_strength: 3.0,
                ..sp_config()
            });
            let mut rng = Random::new(seed);
            let mut input = Sdr::new(&[100]);
            let mut output = Sdr::new(&[512]);

            for _ in 0..steps {
                input.randomize(0.1, &mut rng);
                sp.compute(&mut conn, &input, true, &mut output).unwrap();
            }

            assert_permanences_in_bounds(conn.columns());
            prop_assert!(conn.boost_factors().iter().all(|&b| (1.0..=10.0).contains(&b)));
        }

        #[test]
        fn prop_output_is_sorted_and_unique(
            indices in proptest::collection::vec(0u32..100, 1..30)
        ) {
            let (mut conn, mut sp) = build(HtmConfig {
                global_inhibition: false,
                wrap_around: false,
                ..sp_config()
            });
            let input = make_sdr(100, &indices);
            let mut output = Sdr::new(&[512]);

            sp.compute(&mut conn, &input, true, &mut output).unwrap();

            let active = output.get_sparse();
            prop_assert!(active.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(active.iter().all(|&c| c < 512));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_local_inhibition_hits_target_density(
            start in 0u32..100,
            learn in any::<bool>()
        ) {
            let (mut conn, mut sp) = build(HtmConfig {
                global_inhibition: false,
                ..sp_config()
            });
            let mut output = Sdr::new(&[512]);

            // A 20-bit block sliding over the input, wrapping at the end.
            for shift in 0..10 {
                let bits: Vec<u32> = (0..20).map(|j| (start + shift * 3 + j) % 100).collect();
                let input = make_sdr(100, &bits);

                sp.compute(&mut conn, &input, learn, &mut output).unwrap();

                // 0.04 * 512 = 20.48
                let active = output.get_sum();
                prop_assert!(
                    (16..=25).contains(&active),
                    "{} active columns at shift {}", active, shift
                );
            }
        }
    }

    #[test]
    fn test_same_seed_same_columns() {
        let (conn_a, _) = build(sp_config());
        let (conn_b, _) = build(sp_config());
        let (conn_c, _) = build(HtmConfig {
            seed: 7,
            ..sp_config()
        });

        assert_eq!(conn_a.columns(), conn_b.columns());
        assert_ne!(conn_a.columns(), conn_c.columns());
    }

    /// Mean permanence from `columns` to the `bits` in their potential pools.
    fn mean_permanence_to(conn: &Connections, columns: &[u32], bits: &[u32]) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for &c in columns {
            let column = &conn.columns()[c as usize];
            for (i, &perm) in column.potential_pool().iter().zip(column.permanences()) {
                if bits.binary_search(i).is_ok() {
                    total += f64::from(perm);
                    count += 1;
                }
            }
        }
        total / count as f64
    }

    #[test]
    fn test_winner_permanences_rise_until_saturated() {
        let (mut conn, mut sp) = build(sp_config());
        let bits = [2, 4, 8, 16, 32, 64, 65, 66, 67, 68];
        let input = make_sdr(100, &bits);
        let mut output = Sdr::new(&[512]);

        sp.compute(&mut conn, &input, true, &mut output).unwrap();
        let winners = output.get_sparse().to_vec();
        let mut previous = mean_permanence_to(&conn, &winners, &bits);

        for cycle in 1..40 {
            sp.compute(&mut conn, &input, true, &mut output).unwrap();
            let mean = mean_permanence_to(&conn, &winners, &bits);
            if previous < 1.0 {
                assert!(
                    mean > previous,
                    "mean permanence fell from {previous} to {mean} at cycle {cycle}"
                );
            } else {
                assert!((mean - 1.0).abs() < 1e-9);
            }
            previous = mean;
        }

        assert!((previous - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonal_inputs_stay_orthogonal() {
        let (mut conn, mut sp) = build(HtmConfig {
            column_dimensions: vec![2048],
            local_area_density: 0.02,
            ..sp_config()
        });
        let inputs = orthogonal_inputs(100, 5, 20);
        let mut output = Sdr::new(&[2048]);
        let mut last: Vec<Sdr> = vec![Sdr::new(&[2048]); inputs.len()];

        for cycle in 0..200 {
            for (i, input) in inputs.iter().enumerate() {
                sp.compute(&mut conn, input, true, &mut output).unwrap();
                // round(0.02 * 2048) = 41
                assert_eq!(output.get_sum(), 41);
                if cycle >= 190 {
                    assert!(
                        output.similarity(&last[i]) >= 0.97,
                        "input {i} unstable at cycle {cycle}"
                    );
                }
                last[i] = output.clone();
            }
        }

        for a in 0..last.len() {
            for b in a + 1..last.len() {
                let shared = last[a].get_overlap(&last[b]);
                assert!(
                    (shared as f64) < 0.1 * 41.0,
                    "inputs {a} and {b} share {shared} columns"
                );
            }
        }
    }

    #[test]
    fn test_multithreaded_matches_single_threaded() {
        for global in [true, false] {
            let base = HtmConfig {
                global_inhibition: global,
                boost_strength: 2.0,
                update_period: 10,
                ..sp_config()
            };
            let (mut st_conn, mut st) = build(base.clone());
            let (mut mt_conn, mut mt) = build(HtmConfig {
                execution: ExecutionMode::MultiThreaded { num_threads: 4 },
                ..base
            });

            let mut rng = Random::new(99);
            let mut input = Sdr::new(&[100]);
            let mut st_out = Sdr::new(&[512]);
            let mut mt_out = Sdr::new(&[512]);

            for step in 0..60 {
                input.randomize(0.08, &mut rng);
                let learn = step % 5 != 4;
                st.compute(&mut st_conn, &input, learn, &mut st_out).unwrap();
                mt.compute(&mut mt_conn, &input, learn, &mut mt_out).unwrap();

                assert_eq!(st_out, mt_out, "diverged at step {step} (global: {global})");
            }

            assert_eq!(st_conn.columns(), mt_conn.columns());
            assert_eq!(st_conn.active_duty_cycles(), mt_conn.active_duty_cycles());
            assert_eq!(st_conn.boost_factors(), mt_conn.boost_factors());
            assert_eq!(st_conn.inhibition_radius(), mt_conn.inhibition_radius());
        }
    }
}

// =============================================================================
// HOMEOSTATIC PLASTICITY
// =============================================================================

mod homeostasis {
    use super::*;

    #[test]
    fn test_stable_reported_exactly_once() {
        let mut conn = Connections::new(HtmConfig {
            column_dimensions: vec![1024],
            ..sp_config()
        })
        .unwrap();
        let mut sp = SpatialPooler::new(&mut conn).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        sp.attach_homeostatic(
            HomeostaticPlasticityController::new(HomeostaticParams {
                min_cycles: 60,
                num_of_cycles_to_wait_on_change: 20,
                ..Default::default()
            })
            .with_observer(move |event: &StabilityEvent| {
                sink.lock().unwrap().push(event.clone());
            }),
        );

        let inputs = orthogonal_inputs(100, 3, 15);
        let mut output = Sdr::new(&[1024]);
        for _ in 0..300 {
            for input in &inputs {
                sp.compute(&mut conn, input, true, &mut output).unwrap();
            }
        }

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1, "events: {events:?}");
        assert!(events[0].is_stable);
        assert_eq!(events[0].num_patterns, 3);
        assert!(events[0].inputs_seen > 60);
        assert!(sp.homeostatic().unwrap().is_stable());
    }

    #[test]
    fn test_freeze_resets_boosting() {
        let mut conn = Connections::new(HtmConfig {
            boost_strength: 5.0,
            ..sp_config()
        })
        .unwrap();
        let mut sp = SpatialPooler::new(&mut conn).unwrap();
        sp.attach_homeostatic(HomeostaticPlasticityController::new(HomeostaticParams {
            min_cycles: 30,
            ..Default::default()
        }));

        let mut rng = Random::new(3);
        let mut input = Sdr::new(&[100]);
        let mut output = Sdr::new(&[512]);

        for _ in 0..30 {
            input.randomize(0.1, &mut rng);
            sp.compute(&mut conn, &input, true, &mut output).unwrap();
        }
        assert!(conn.boost_factors().iter().any(|&b| b > 1.0));
        assert!(!conn.is_boosting_frozen());

        for _ in 0..10 {
            input.randomize(0.1, &mut rng);
            sp.compute(&mut conn, &input, true, &mut output).unwrap();
        }
        assert!(conn.is_boosting_frozen());
        assert!(conn.boost_factors().iter().all(|&b| b == 1.0));
        assert!(sp.homeostatic().unwrap().is_frozen());
    }
}

// =============================================================================
// TEMPORAL MEMORY / LAYER
// =============================================================================

mod sequences {
    use super::*;

    fn layer_config() -> HtmConfig {
        HtmConfig {
            input_dimensions: vec![100],
            column_dimensions: vec![1024],
            cells_per_column: 8,
            potential_radius: 50,
            local_area_density: 0.02,
            ..Default::default()
        }
    }

    #[test]
    fn test_layer_is_deterministic() {
        let mut a = Layer::new(layer_config()).unwrap();
        let mut b = Layer::new(layer_config()).unwrap();
        let mut rng = Random::new(11);
        let mut input = Sdr::new(&[100]);

        for _ in 0..40 {
            input.randomize(0.1, &mut rng);
            assert_eq!(a.compute(&input, true).unwrap(), b.compute(&input, true).unwrap());
        }
        assert_eq!(a.connections().cell_state(), b.connections().cell_state());
    }

    #[test]
    fn test_sequence_is_recalled() {
        let mut layer = Layer::new(layer_config()).unwrap();
        let sequence = orthogonal_inputs(100, 3, 20);

        for _ in 0..25 {
            for input in &sequence {
                layer.compute(input, true).unwrap();
            }
            layer.reset();
        }

        let after_first = layer.compute(&sequence[0], false).unwrap();
        let second = layer.compute(&sequence[1], false).unwrap();
        let third = layer.compute(&sequence[2], false).unwrap();

        let predicted = after_first.predicted_columns(8);
        for column in &second.active_columns {
            assert!(predicted.binary_search(column).is_ok(), "column {column} not predicted");
        }
        assert!(second.bursting_columns(8).is_empty());
        assert!(third.bursting_columns(8).is_empty());
        assert!(third.active_cells.len() < third.active_columns.len() * 8);
    }

    #[test]
    fn test_reset_forgets_context_only() {
        let mut layer = Layer::new(layer_config()).unwrap();
        let sequence = orthogonal_inputs(100, 2, 20);

        for _ in 0..10 {
            for input in &sequence {
                layer.compute(input, true).unwrap();
            }
            layer.reset();
        }
        let segments = layer.connections().distal().num_segments();

        layer.reset();
        assert_eq!(layer.connections().cell_state(), &CellState::default());
        assert_eq!(layer.connections().distal().num_segments(), segments);

        // The first element of a sequence always bursts after a reset.
        let cycle = layer.compute(&sequence[0], false).unwrap();
        assert_eq!(cycle.bursting_columns(8), cycle.active_columns);
    }

    #[test]
    fn test_distal_permanences_stay_in_bounds() {
        let mut layer = Layer::new(HtmConfig {
            predicted_segment_decrement: 0.01,
            ..layer_config()
        })
        .unwrap();
        let mut rng = Random::new(5);
        let mut input = Sdr::new(&[100]);

        for _ in 0..50 {
            input.randomize(0.1, &mut rng);
            layer.compute(&input, true).unwrap();
        }

        let distal = layer.connections().distal();
        assert!(distal.num_synapses() > 0);
        for synapse in distal.live_synapses() {
            assert!((0.0..=1.0).contains(&synapse.permanence));
        }
        for cell in 0..layer.connections().num_cells() as u32 {
            assert!(distal.num_segments_on_cell(cell) <= 255);
        }
    }

    #[test]
    fn test_stale_columns_rejected() {
        let mut conn = Connections::new(layer_config()).unwrap();
        let mut sp = SpatialPooler::new(&mut conn).unwrap();
        let mut tm = TemporalMemory::new(&conn).unwrap();

        let mut columns = Sdr::new(&[1024]);
        sp.compute(&mut conn, &make_sdr(100, &[1, 2, 3]), true, &mut columns)
            .unwrap();

        let outsider = (0..1024)
            .find(|c| columns.get_sparse().binary_search(c).is_err())
            .unwrap();
        let stale = make_sdr(1024, &[outsider]);

        assert!(matches!(
            tm.compute(&mut conn, &stale, true),
            Err(HtmError::StaleActiveColumns { column }) if column == outsider
        ));
        assert!(tm.compute(&mut conn, &columns, true).is_ok());
    }
}
