use indexmap::IndexMap;

use super::goal::{Goal, Target};
use super::{GoalError, GoalProgrammingOptions, GoalResult};

/// Target arrays of one goal, element `step · size + component`. Non-finite means untargeted.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TargetArrays {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub steps: usize,
    pub size: usize,
}

impl TargetArrays {
    pub fn new(goal: &Goal, times: &[f64], path: bool) -> Self {
        let steps = if path { times.len() } else { 1 };
        let size = goal.size();
        Self {
            min: goal.target_min().expand(times, steps, size, f64::NEG_INFINITY),
            max: goal.target_max().expand(times, steps, size, f64::INFINITY),
            steps,
            size,
        }
    }

    pub fn len(&self) -> usize {
        self.steps * self.size
    }

    /// True when step `step` has a finite target on either side for any component.
    pub fn step_targeted(&self, step: usize) -> bool {
        let range = step * self.size..(step + 1) * self.size;
        self.min[range.clone()].iter().any(|v| v.is_finite())
            || self.max[range].iter().any(|v| v.is_finite())
    }
}

/// Checks goal definitions and, when enabled, monotonicity of targets per function key.
///
/// `keys` holds the resolved function key of each goal. Empty goals are skipped.
pub(crate) fn validate_goals(
    goals: &[Goal],
    keys: &[String],
    times: &[f64],
    path: bool,
    options: &GoalProgrammingOptions,
) -> GoalResult<()> {
    let mut order: Vec<usize> = (0..goals.len()).filter(|&i| !goals[i].is_empty()).collect();
    order.sort_by_key(|&i| goals[i].priority());

    for &i in &order {
        validate_definition(&goals[i], path, options)?;
    }

    let arrays: Vec<Option<TargetArrays>> = (0..goals.len())
        .map(|i| (!goals[i].is_empty()).then(|| TargetArrays::new(&goals[i], times, path)))
        .collect();

    if options.check_monotonicity {
        let mut previous: IndexMap<&str, usize> = IndexMap::new();
        for &i in &order {
            if let Some(prev) = previous.insert(keys[i].as_str(), i) {
                check_monotonic(&goals[i], &goals[prev], &arrays[i], &arrays[prev])?;
            }
        }
    }

    for &i in &order {
        if let Some(arrays) = &arrays[i] {
            check_targets(&goals[i], arrays)?;
        }
    }
    Ok(())
}

fn validate_definition(goal: &Goal, path: bool, options: &GoalProgrammingOptions) -> GoalResult<()> {
    let describe = || goal.to_string();

    if !(goal.nominal().is_finite() && goal.nominal() > 0.0) {
        return Err(GoalError::NonPositiveNominal { goal: describe() });
    }
    if goal.size() == 0 {
        return Err(GoalError::SizeMismatch {
            goal: describe(),
            what: "function value",
            expected: 1,
            actual: 0,
        });
    }
    if goal.order() < 1 {
        return Err(GoalError::InvalidOrder { goal: describe() });
    }
    if goal.critical() && !goal.has_target_bounds() {
        return Err(GoalError::CriticalMinimization { goal: describe() });
    }

    if goal.has_target_bounds() {
        let range = goal
            .function_range()
            .ok_or_else(|| GoalError::MissingFunctionRange { goal: describe() })?;
        let (nlo, nhi) = range.lengths();
        for n in [nlo, nhi] {
            if n != 1 && n != goal.size() {
                return Err(GoalError::SizeMismatch {
                    goal: describe(),
                    what: "function range",
                    expected: goal.size(),
                    actual: n,
                });
            }
        }
        for c in 0..goal.size() {
            let (lo, hi) = (range.lower(c), range.upper(c));
            if !lo.is_finite() || !hi.is_finite() {
                return Err(GoalError::MissingFunctionRange { goal: describe() });
            }
            if lo >= hi {
                return Err(GoalError::InvalidFunctionRange { goal: describe() });
            }
        }
        if !(goal.weight().is_finite() && goal.weight() > 0.0) {
            return Err(GoalError::InvalidWeight { goal: describe() });
        }
    } else {
        if goal.function_range().is_some() {
            return Err(GoalError::UnexpectedFunctionRange { goal: describe() });
        }
        if options.linear_obj_eps && goal.order() != 1 {
            return Err(GoalError::Options(
                "minimization goals must have order 1 when linear_obj_eps is set",
            ));
        }
    }

    if !(goal.relaxation() >= 0.0) {
        return Err(GoalError::NegativeRelaxation { goal: describe() });
    }

    for target in [goal.target_min(), goal.target_max()] {
        match target {
            Target::Series(_) if !path => {
                return Err(GoalError::SeriesOnPointGoal { goal: describe() })
            }
            Target::Components(values) if values.len() != goal.size() => {
                return Err(GoalError::SizeMismatch {
                    goal: describe(),
                    what: "target",
                    expected: goal.size(),
                    actual: values.len(),
                })
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_monotonic(
    goal: &Goal,
    previous: &Goal,
    arrays: &Option<TargetArrays>,
    previous_arrays: &Option<TargetArrays>,
) -> GoalResult<()> {
    let (Some(a), Some(b)) = (arrays, previous_arrays) else {
        return Ok(());
    };
    if a.len() != b.len() {
        return Err(GoalError::SizeMismatch {
            goal: goal.to_string(),
            what: "target",
            expected: b.len(),
            actual: a.len(),
        });
    }
    let both_finite = |x: f64, y: f64| x.is_finite() && y.is_finite();

    if goal.has_target_min()
        && a.min
            .iter()
            .zip(&b.min)
            .any(|(&m, &p)| both_finite(m, p) && m < p)
    {
        return Err(GoalError::NonMonotonicMin {
            goal: goal.to_string(),
            previous: previous.to_string(),
        });
    }
    if goal.has_target_max()
        && a.max
            .iter()
            .zip(&b.max)
            .any(|(&m, &p)| both_finite(m, p) && m > p)
    {
        return Err(GoalError::NonMonotonicMax {
            goal: goal.to_string(),
            previous: previous.to_string(),
        });
    }
    Ok(())
}

fn check_targets(goal: &Goal, arrays: &TargetArrays) -> GoalResult<()> {
    let Some(range) = goal.function_range() else {
        return Ok(());
    };
    for k in 0..arrays.len() {
        let c = k % arrays.size;
        let (m, big_m) = (arrays.min[k], arrays.max[k]);
        if m.is_finite() && big_m.is_finite() && m > big_m {
            return Err(GoalError::TargetMinExceedsMax {
                goal: goal.to_string(),
            });
        }
        if m.is_finite() && m <= range.lower(c) {
            return Err(GoalError::TargetMinOutsideRange {
                goal: goal.to_string(),
            });
        }
        if big_m.is_finite() && big_m >= range.upper(c) {
            return Err(GoalError::TargetMaxOutsideRange {
                goal: goal.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal_programming::goal::FunctionContext;
    use goalprog_model::{LinearExpr, Timeseries};

    fn goal(name: &str) -> Goal {
        Goal::new(name, |_cx: &FunctionContext<'_>| Ok(LinearExpr::zero().into()))
    }

    fn check(goals: &[Goal], path: bool) -> GoalResult<()> {
        let keys: Vec<String> = goals.iter().map(|g| g.function_key().unwrap_or("f").to_string()).collect();
        validate_goals(goals, &keys, &[0.0, 1.0, 2.0], path, &GoalProgrammingOptions::default())
    }

    #[test]
    fn definition_errors() {
        let bounded = goal("g").with_function_range(0.0, 10.0).with_target_min(1.0);
        assert_eq!(check(&[bounded.clone()], false), Ok(()));

        assert!(matches!(
            check(&[bounded.clone().with_nominal(0.0)], false),
            Err(GoalError::NonPositiveNominal { .. })
        ));
        assert!(matches!(
            check(&[goal("g").with_critical(true)], false),
            Err(GoalError::CriticalMinimization { .. })
        ));
        assert!(matches!(
            check(&[goal("g").with_target_min(1.0)], false),
            Err(GoalError::MissingFunctionRange { .. })
        ));
        assert!(matches!(
            check(&[goal("g").with_function_range(2.0, 2.0).with_target_min(1.0)], false),
            Err(GoalError::InvalidFunctionRange { .. })
        ));
        assert!(matches!(
            check(&[goal("g").with_function_range(0.0, 1.0)], false),
            Err(GoalError::UnexpectedFunctionRange { .. })
        ));
        assert!(matches!(
            check(&[bounded.clone().with_relaxation(-1.0)], false),
            Err(GoalError::NegativeRelaxation { .. })
        ));
        assert!(matches!(
            check(&[bounded.with_order(0)], false),
            Err(GoalError::InvalidOrder { .. })
        ));
    }

    #[test]
    fn targets_must_lie_strictly_inside_range() {
        let base = goal("g").with_function_range(0.0, 10.0);
        assert!(matches!(
            check(&[base.clone().with_target_min(0.0)], false),
            Err(GoalError::TargetMinOutsideRange { .. })
        ));
        assert!(matches!(
            check(&[base.clone().with_target_max(10.0)], false),
            Err(GoalError::TargetMaxOutsideRange { .. })
        ));
        assert!(matches!(
            check(&[base.with_target_min(5.0).with_target_max(4.0)], false),
            Err(GoalError::TargetMinExceedsMax { .. })
        ));
    }

    #[test]
    fn series_targets_need_path_goals() {
        let series = Timeseries::new(vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]).unwrap();
        let g = goal("g").with_function_range(0.0, 10.0).with_target_min(series);
        assert!(matches!(check(&[g.clone()], false), Err(GoalError::SeriesOnPointGoal { .. })));
        assert_eq!(check(&[g], true), Ok(()));
    }

    #[test]
    fn monotonicity_compares_goals_in_priority_order() {
        let loose = goal("loose")
            .with_function_range(0.0, 10.0)
            .with_target_min(2.0)
            .with_priority(2);
        let strict = goal("strict")
            .with_function_range(0.0, 10.0)
            .with_target_min(3.0)
            .with_priority(1);
        assert!(matches!(
            check(&[loose.clone(), strict.clone()], false),
            Err(GoalError::NonMonotonicMin { .. })
        ));

        let options = GoalProgrammingOptions {
            check_monotonicity: false,
            ..GoalProgrammingOptions::default()
        };
        let keys = vec!["f".to_string(), "f".to_string()];
        assert_eq!(
            validate_goals(&[loose, strict], &keys, &[0.0], false, &options),
            Ok(())
        );
    }

    #[test]
    fn monotonicity_skips_untargeted_entries() {
        let series = Timeseries::new(vec![0.0, 1.0, 2.0], vec![f64::NAN, 4.0, 5.0]).unwrap();
        let first = goal("first")
            .with_function_range(0.0, 10.0)
            .with_target_min(series);
        let second = goal("second")
            .with_function_range(0.0, 10.0)
            .with_target_min(4.0)
            .with_priority(2);
        assert!(matches!(
            check(&[first.clone(), second.clone().with_target_min(4.5)], true),
            Err(GoalError::NonMonotonicMin { .. })
        ));
        let relaxed = Timeseries::new(vec![0.0, 1.0, 2.0], vec![1.0, 4.0, 5.0]).unwrap();
        assert_eq!(check(&[first, second.with_target_min(relaxed).with_target_max(9.0)], true), Ok(()));
    }

    #[test]
    fn series_arrays_are_open_outside_their_domain() {
        let series = Timeseries::new(vec![1.0, 2.0], vec![4.0, 5.0]).unwrap();
        let g = goal("g")
            .with_function_range(0.0, 10.0)
            .with_target_min(series.clone())
            .with_target_max(series);
        let arrays = TargetArrays::new(&g, &[0.0, 1.0, 2.0], true);
        assert_eq!(arrays.min, vec![f64::NEG_INFINITY, 4.0, 5.0]);
        assert_eq!(arrays.max, vec![f64::INFINITY, 4.0, 5.0]);
        assert!(!arrays.step_targeted(0));
        assert_eq!(check(&[g], true), Ok(()));
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn on_key(name: &str, target_min: f64, priority: i64) -> Goal {
            goal(name)
                .with_function_range(-10.0, 10.0)
                .with_target_min(target_min)
                .with_function_key("k")
                .with_priority(priority)
        }

        proptest! {
            #[test]
            fn target_min_may_only_tighten(first in -5.0f64..5.0, step in 1e-3f64..4.0) {
                let loosened = check(&[on_key("a", first, 1), on_key("b", first - step, 2)], false);
                prop_assert!(matches!(loosened, Err(GoalError::NonMonotonicMin { .. })), "expected NonMonotonicMin, got {:?}", loosened);

                let tightened = check(&[on_key("a", first - step, 1), on_key("b", first, 2)], false);
                prop_assert_eq!(tightened, Ok(()));
            }
        }
    }
}
