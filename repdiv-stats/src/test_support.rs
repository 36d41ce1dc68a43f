//! Shared helpers for unit tests.

use rand::Rng;

/// Tabulate `cells` cells drawn with replacement from a clonotype
/// population with the given abundances. Clonotypes that were never drawn
/// are left out, as a per-sample count table would.
pub(crate) fn sample_population<R: Rng + ?Sized>(
    abundances: &[usize],
    cells: usize,
    rng: &mut R,
) -> Vec<usize> {
    let total: usize = abundances.iter().sum();
    let mut counts = vec![0; abundances.len()];
    for _ in 0..cells {
        let mut pick = rng.random_range(0..total);
        for (k, &a) in abundances.iter().enumerate() {
            if pick < a {
                counts[k] += 1;
                break;
            }
            pick -= a;
        }
    }
    counts.retain(|&c| c > 0);
    counts
}

#[test]
fn sample_population_drops_unseen_clonotypes() {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let mut rng = StdRng::seed_from_u64(1);
    let counts = sample_population(&[0, 5, 0, 5], 40, &mut rng);
    assert_eq!(counts.iter().sum::<usize>(), 40);
    assert!(counts.len() <= 2);
    assert!(counts.iter().all(|&c| c > 0));
}
