mod common;

use common::random_fixture;
use flipflop_core::flipflop::{check_transitions, flip_flop_code};
use proptest::prelude::*;

fn arb_nbase() -> impl Strategy<Value = usize> {
    prop::sample::select(vec![1usize, 2, 4, 5])
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 24, .. ProptestConfig::default() })]

    #[test]
    fn prop_forward_matches_backward(
        seed in any::<u64>(),
        nbase in arb_nbase(),
        nblk in 1usize..16,
        raw_lens in prop::collection::vec(any::<u8>(), 1..6),
        sharp in prop::sample::select(vec![0.5f32, 1.0, 3.0]),
    ) {
        let lens: Vec<usize> = raw_lens.iter().map(|&l| l as usize % (nblk + 1)).collect();
        let mut fixture = random_fixture(seed, nbase, nblk, &lens);
        fixture.params.sharpness = sharp;
        let batch = fixture.batch();
        let fwd = batch.scores_fwd();
        let bwd = batch.scores_bwd();
        for (b, (f, r)) in fwd.iter().zip(&bwd).enumerate() {
            let tol = 1e-3 * f.abs().max(1.0);
            prop_assert!((f - r).abs() <= tol, "element {}: forward {} vs backward {}", b, f, r);
            if lens[b] == 0 {
                prop_assert_eq!(*f, 0.0);
            }
        }
    }

    #[test]
    fn prop_gradient_is_finite_and_non_negative(
        seed in any::<u64>(),
        nblk in 1usize..10,
        raw_lens in prop::collection::vec(any::<u8>(), 1..4),
    ) {
        let lens: Vec<usize> = raw_lens.iter().map(|&l| l as usize % (nblk + 1)).collect();
        let fixture = random_fixture(seed, 4, nblk, &lens);
        let grad = fixture.batch().gradient();
        // 重みは事後確率 × 正の係数なので非負
        prop_assert!(grad.as_slice().iter().all(|g| g.is_finite() && *g >= 0.0));
    }

    #[test]
    fn prop_flip_flop_code_is_valid(
        nbase in arb_nbase(),
        raw in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let bases: Vec<u8> = raw.iter().map(|&b| b % nbase as u8).collect();
        let states = flip_flop_code(&bases, nbase);
        prop_assert_eq!(states.len(), bases.len());
        for (s, b) in states.iter().zip(&bases) {
            prop_assert_eq!(*s as usize % nbase, *b as usize);
        }

        let nmod = nbase;
        let offsets: Vec<u32> = (0..=nbase as u32).collect();
        let layout = flipflop_core::ScoreLayout::new(flipflop_core::state_count(nbase, nmod), &offsets).unwrap();
        let cats = vec![0u32; states.len()];
        prop_assert!(check_transitions(&layout, &states, &cats).is_ok());
    }
}
