use indexmap::IndexMap;

use super::goal::Goal;
use super::validate::TargetArrays;
use super::GoalProgrammingOptions;

/// Named per-member series written after each priority: goal function values and active
/// violations. Vector goals write one channel per component, suffixed `_{component}`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagnosticChannels {
    series: IndexMap<(String, usize), Vec<f64>>,
}

impl DiagnosticChannels {
    pub fn set_timeseries(&mut self, id: impl Into<String>, member: usize, values: Vec<f64>) {
        self.series.insert((id.into(), member), values);
    }

    pub fn get(&self, id: &str, member: usize) -> Option<&[f64]> {
        self.series
            .get(&(id.to_string(), member))
            .map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, &[f64])> + '_ {
        self.series
            .iter()
            .map(|((id, member), values)| (id.as_str(), *member, values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.series.clear();
    }
}

/// Writes the diagnostic channels of one goal for one member.
///
/// `values` holds the raw function values per step and component, `epsilon` the achieved epsilon
/// per step for goals with targets. Point goals are broadcast over the `steps`-long time grid.
/// A step's violation reads NaN when every component lies more than `interior_distance` (scaled)
/// inside its finite targets.
#[allow(clippy::too_many_arguments)]
pub(crate) fn record_goal(
    channels: &mut DiagnosticChannels,
    goal: &Goal,
    arrays: &TargetArrays,
    member: usize,
    steps: usize,
    values: &[f64],
    epsilon: Option<&[f64]>,
    options: &GoalProgrammingOptions,
) {
    let size = arrays.size;
    let broadcast = |series: Vec<f64>| -> Vec<f64> {
        if arrays.steps == 1 && steps != 1 {
            vec![series.first().copied().unwrap_or(f64::NAN); steps]
        } else {
            series
        }
    };

    if let Some(id) = goal.function_value_timeseries_id() {
        for c in 0..size {
            let series = (0..arrays.steps).map(|t| values[t * size + c]).collect();
            channels.set_timeseries(channel_id(id, c, size), member, broadcast(series));
        }
    }

    let (Some(id), Some(epsilon)) = (goal.violation_timeseries_id(), epsilon) else {
        return;
    };
    let nominal = goal.nominal();
    let d = options.interior_distance;
    let series = (0..arrays.steps)
        .map(|t| {
            let inactive = (0..size).all(|c| {
                let k = t * size + c;
                let f = values[k] / nominal;
                let (m, big_m) = (arrays.min[k], arrays.max[k]);
                (!goal.has_target_min() || !m.is_finite() || f > m / nominal + d)
                    && (!goal.has_target_max() || !big_m.is_finite() || f < big_m / nominal - d)
            });
            let eps = epsilon.get(t).copied().unwrap_or(f64::NAN);
            if inactive {
                f64::NAN
            } else {
                eps
            }
        })
        .collect();
    channels.set_timeseries(id, member, broadcast(series));
}

fn channel_id(id: &str, component: usize, size: usize) -> String {
    if size == 1 {
        id.to_string()
    } else {
        format!("{id}_{component}")
    }
}
