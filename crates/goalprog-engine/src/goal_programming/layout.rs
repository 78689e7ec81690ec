use goalprog_model::VarId;
use indexmap::IndexMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExtraKind {
    /// One value per ensemble member.
    Scalar,
    /// One value per ensemble member and time step.
    Path,
}

/// Decision variables appended after the model's own: epsilons and their linear aliases.
///
/// Each extra occupies a contiguous block, member-major.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct VariableLayout {
    model_len: usize,
    ensemble_size: usize,
    steps: usize,
    extras: IndexMap<String, (ExtraKind, usize)>,
    len: usize,
}

impl VariableLayout {
    pub fn new(model_len: usize, ensemble_size: usize, steps: usize) -> Self {
        Self {
            model_len,
            ensemble_size,
            steps,
            extras: IndexMap::new(),
            len: model_len,
        }
    }

    /// Registers `name` unless it already exists.
    pub fn declare(&mut self, name: impl Into<String>, kind: ExtraKind) {
        let name = name.into();
        if self.extras.contains_key(&name) {
            return;
        }
        let width = match kind {
            ExtraKind::Scalar => self.ensemble_size,
            ExtraKind::Path => self.ensemble_size * self.steps,
        };
        self.extras.insert(name, (kind, self.len));
        self.len += width;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn model_len(&self) -> usize {
        self.model_len
    }

    pub fn extras(&self) -> impl Iterator<Item = (&str, ExtraKind)> + '_ {
        self.extras.iter().map(|(name, (kind, _))| (name.as_str(), *kind))
    }

    pub fn scalar(&self, name: &str, member: usize) -> Option<VarId> {
        match self.extras.get(name) {
            Some((ExtraKind::Scalar, offset)) if member < self.ensemble_size => {
                Some(VarId(offset + member))
            }
            _ => None,
        }
    }

    pub fn path(&self, name: &str, member: usize, step: usize) -> Option<VarId> {
        match self.extras.get(name) {
            Some((ExtraKind::Path, offset)) if member < self.ensemble_size && step < self.steps => {
                Some(VarId(offset + member * self.steps + step))
            }
            _ => None,
        }
    }

    /// All ids of `name` for one member: one for scalars, one per step for paths.
    pub fn ids(&self, name: &str, member: usize) -> Vec<VarId> {
        match self.extras.get(name) {
            Some((ExtraKind::Scalar, _)) => self.scalar(name, member).into_iter().collect(),
            Some((ExtraKind::Path, _)) => (0..self.steps)
                .filter_map(|step| self.path(name, member, step))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// `eps_{subproblem}_{slot}` or `path_eps_{subproblem}_{slot}`.
pub(crate) fn epsilon_name(path: bool, subproblem: usize, slot: usize) -> String {
    let prefix = if path { "path_eps" } else { "eps" };
    format!("{prefix}_{subproblem}_{slot}")
}

/// `eps_alias_{subproblem}_{slot}` or `path_eps_alias_{subproblem}_{slot}`.
pub(crate) fn alias_name(path: bool, subproblem: usize, slot: usize) -> String {
    let prefix = if path { "path_eps_alias" } else { "eps_alias" };
    format!("{prefix}_{subproblem}_{slot}")
}
