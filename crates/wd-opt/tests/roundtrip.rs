//! apply_dv followed by reset_dv leaves the model as it was, for every layout.

mod common;

use common::{Snapshot, problem_with, wds};
use proptest::prelude::*;
use wd_opt::*;

fn layouts() -> Vec<FormulationSwitches> {
    let mut out = Vec::new();
    for existing_pipes in [ExistingPipesLayout::Paired, ExistingPipesLayout::Combined] {
        for tanks in [
            TanksLayout::None,
            TanksLayout::Simple,
            TanksLayout::Sized,
            TanksLayout::Proportioned,
        ] {
            out.push(FormulationSwitches {
                existing_pipes,
                new_pipes: true,
                pumps: true,
                tanks,
            });
        }
    }
    out
}

/// Operating band that proportioned tanks on J2 can reach.
fn problem(switches: &FormulationSwitches) -> Problem {
    let mut tables = OptionTables::default();
    tables.tank_min_operating_head_ft = 112.0 / options::M_PER_FT;
    tables.tank_max_operating_head_ft = 116.0 / options::M_PER_FT;
    problem_with(switches, &tables, ObjectiveSettings::default())
}

/// Map unit samples onto a formulation-layout vector inside the bounds.
fn within_bounds(p: &Problem, unit: &[f64]) -> Vec<f64> {
    let f = p.formulation();
    let (lower, upper) = f.bounds(p.wds()).unwrap();
    let mask = f.continuous_mask(p.wds()).unwrap();
    (0..lower.len())
        .map(|i| {
            let u = unit[i % unit.len()];
            if mask[i] {
                lower[i] + u * (upper[i] - lower[i])
            } else {
                (lower[i] + (u * (upper[i] - lower[i] + 1.0)).floor()).min(upper[i])
            }
        })
        .collect()
}

#[test]
fn all_no_action_changes_nothing() {
    let switches = FormulationSwitches {
        existing_pipes: ExistingPipesLayout::Paired,
        new_pipes: false,
        pumps: true,
        tanks: TanksLayout::Simple,
    };
    let mut p = problem(&switches);
    let before = Snapshot::take(&mut wds());
    let dv = vec![0.0; p.dv_len()];

    p.apply_dv(&dv).unwrap();
    assert!(p.wds().temp_elements().is_empty());
    let mut applied = p.into_wds();
    Snapshot::take(&mut applied).assert_same(&before);
}

#[test]
fn boundary_vectors_round_trip() {
    for switches in layouts() {
        for edge in [0.0, 1.0] {
            let mut p = problem(&switches);
            let before = Snapshot::take(&mut wds());
            let dv = within_bounds(&p, &[edge]);
            p.apply_dv(&dv).unwrap();
            p.reset_dv(&dv).unwrap();
            assert!(p.state().is_clean());
            Snapshot::take(&mut p.into_wds()).assert_same(&before);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_vectors_round_trip(
        layout in 0usize..8,
        unit in prop::collection::vec(0.0f64..1.0, 1..64),
        evaluate in any::<bool>(),
    ) {
        let switches = &layouts()[layout];
        let mut p = problem(switches);
        let before = Snapshot::take(&mut wds());
        let dv = within_bounds(&p, &unit);

        if evaluate {
            let (lower, _) = p.get_bounds();
            prop_assert_eq!(lower.len(), dv.len());
            let opt = DvAdapter::new(&p.formulation().continuous_mask(p.wds()).unwrap())
                .to_optimizer_layout(&dv)
                .unwrap();
            let fitness = p.fitness(&opt).unwrap();
            prop_assert_eq!(fitness.len(), N_OBJECTIVES);
        } else {
            p.apply_dv(&dv).unwrap();
            p.reset_dv(&dv).unwrap();
        }
        prop_assert!(p.state().is_clean());
        prop_assert!(p.wds().temp_elements().is_empty());
        Snapshot::take(&mut p.into_wds()).assert_same(&before);
    }
}
