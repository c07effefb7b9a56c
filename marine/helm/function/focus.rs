//! Focused refinement: re-tile one box of a partition map at a finer cell
//! size while keeping every other region.

use tracing::debug;

use super::{
    queue::RefineQueue,
    region::{tile, Region},
    regressor::Regressor,
    PartitionMap,
};
use crate::error::HelmError;

/// Re-tiles `target` at `piece` indices per axis.
///
/// Regions clear of the target keep their order at the front of the new
/// list, the clipped remainders of overlapping regions follow, then the
/// new cells, each fitted by `regressor`. When a queue is supplied its keys
/// are relabelled to the new indices (entries of clipped regions are
/// dropped) and every new cell is queued with its fit error.
///
/// Nothing is modified on failure.
pub fn refine(
    map: &mut PartitionMap,
    target: &Region,
    piece: &[usize],
    regressor: &Regressor<'_>,
    queue: Option<&mut RefineQueue>,
) -> Result<usize, HelmError> {
    let dims = map.domain().size();
    if target.dims() != dims || piece.len() != dims || regressor.domain().size() != dims {
        return Err(HelmError::DimensionMismatch(format!(
            "domain has {dims} axes, region {}, cell {}, regressor {}",
            target.dims(),
            piece.len(),
            regressor.domain().size()
        )));
    }
    let inside = target
        .bounds()
        .iter()
        .enumerate()
        .all(|(axis, interval)| interval.hi < map.domain().points(axis));
    if !inside {
        return Err(HelmError::DimensionMismatch(
            "refine region extends past the domain".into(),
        ));
    }
    if let Some(axis) = target
        .bounds()
        .iter()
        .zip(piece)
        .position(|(interval, &step)| step == 0 || step > interval.width())
    {
        return Err(HelmError::invalid(
            "refine_piece",
            format!("{} on axis {axis}", piece[axis]),
        ));
    }

    let mut remap = vec![None; map.len()];
    let mut kept = Vec::with_capacity(map.len());
    let mut clipped = Vec::new();
    for (old, region) in map.regions().iter().enumerate() {
        if region.intersects(target) {
            clipped.extend(region.subtract(target));
        } else {
            remap[old] = Some(kept.len());
            kept.push(region.clone());
        }
    }
    let mut regions = kept;
    regions.append(&mut clipped);
    let first_cell = regions.len();

    let mut scores = Vec::new();
    for mut cell in tile(target.bounds(), piece) {
        scores.push(regressor.fit(&mut cell));
        regions.push(cell);
    }

    let candidate = PartitionMap::new(map.domain().clone(), regions, map.degree())?;
    let created = scores.len();
    map.replace_regions(candidate.regions);
    if let Some(queue) = queue {
        queue.reindex(&remap);
        for (offset, score) in scores.into_iter().enumerate() {
            queue.push(first_cell + offset, score);
        }
    }
    debug!(created, regions = map.len(), "focus refinement applied");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DecisionDomain;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    fn setup() -> (DecisionDomain, impl Fn(&[f64]) -> f64) {
        let domain = DecisionDomain::parse(&["course:0:359:360", "speed:0:5:51"]).unwrap();
        let objective = |p: &[f64]| 100.0 - (p[0] - 120.0).abs() + 4.0 * p[1];
        (domain, objective)
    }

    #[test]
    fn refinement_keeps_coverage_and_orders_regions() {
        let (domain, objective) = setup();
        let regressor = Regressor::new(&domain, &objective, 1).unwrap();
        let mut map = PartitionMap::uniform(domain.clone(), &[60, 51], 1).unwrap();
        let target = Region::from_pairs(&[(100, 139), (0, 50)]);
        let created = refine(&mut map, &target, &[5, 51], &regressor, None).unwrap();

        assert_eq!(created, 8);
        assert_eq!(map.covered_volume(), domain.volume());
        // Regions 0, 3, 4, 5 are untouched and stay in front.
        assert_eq!(map.region(0).unwrap().bounds()[0].lo, 0);
        assert_eq!(map.region(1).unwrap().bounds()[0].lo, 180);
        let cells = &map.regions()[map.len() - 8..];
        assert!(cells.iter().all(|cell| target.contains(cell)));
    }

    #[test]
    fn queue_is_relabelled_and_receives_new_cells() {
        let (domain, objective) = setup();
        let regressor = Regressor::new(&domain, &objective, 0).unwrap();
        let mut map = PartitionMap::uniform(domain.clone(), &[90, 51], 0).unwrap();
        let mut queue = RefineQueue::new();
        for index in 0..map.len() {
            #[allow(clippy::cast_precision_loss)]
            queue.push(index, index as f64);
        }
        // Hits region 1 only.
        let target = Region::from_pairs(&[(100, 109), (0, 50)]);
        refine(&mut map, &target, &[10, 51], &regressor, Some(&mut queue)).unwrap();

        // Old 0, 2, 3 become 0, 1, 2; region 1 is gone; one new cell.
        assert_eq!(queue.len(), 4);
        let mut keys = queue.keys();
        keys.sort_unstable();
        assert_eq!(keys, vec![0, 1, 2, map.len() - 1]);
        assert_eq!(queue.peek().map(|(key, _)| key), Some(map.len() - 1));
    }

    #[test]
    fn bad_requests_leave_map_untouched() {
        let (domain, objective) = setup();
        let regressor = Regressor::new(&domain, &objective, 0).unwrap();
        let mut map = PartitionMap::uniform(domain.clone(), &[60, 51], 0).unwrap();
        let before = map.clone();

        let flat = Region::from_pairs(&[(0, 10)]);
        assert!(matches!(
            refine(&mut map, &flat, &[2, 2], &regressor, None),
            Err(HelmError::DimensionMismatch(_))
        ));
        let target = Region::from_pairs(&[(0, 10), (0, 4)]);
        assert!(refine(&mut map, &target, &[2, 6], &regressor, None).is_err());
        assert!(refine(&mut map, &target, &[2], &regressor, None).is_err());
        let outside = Region::from_pairs(&[(300, 400), (0, 4)]);
        assert!(refine(&mut map, &outside, &[2, 2], &regressor, None).is_err());
        assert_eq!(map, before);
    }

    #[test]
    fn random_refinements_preserve_coverage() {
        let (domain, objective) = setup();
        let regressor = Regressor::new(&domain, &objective, 1).unwrap();
        let mut map = PartitionMap::uniform(domain.clone(), &[45, 17], 1).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..40 {
            let c0 = rng.gen_range(0..360);
            let c1 = rng.gen_range(c0..360);
            let s0 = rng.gen_range(0..51);
            let s1 = rng.gen_range(s0..51);
            let target = Region::from_pairs(&[(c0, c1), (s0, s1)]);
            let piece = [
                rng.gen_range(1..=c1 - c0 + 1),
                rng.gen_range(1..=s1 - s0 + 1),
            ];
            refine(&mut map, &target, &piece, &regressor, None).unwrap();
            assert_eq!(map.covered_volume(), domain.volume());
            for (i, a) in map.regions().iter().enumerate().take(50) {
                for b in &map.regions()[i + 1..] {
                    assert!(!a.intersects(b));
                }
            }
        }
    }
}
