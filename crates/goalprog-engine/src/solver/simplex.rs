use super::VarSpec;

#[derive(Clone, Copy, Debug)]
pub struct SimplexOptions {
    /// Maximum number of pivot operations per simplex run (phase I + phase II combined).
    pub max_pivots: usize,
    /// Reduced costs and pivot elements at or below this magnitude count as zero.
    pub pivot_tolerance: f64,
    /// Phase I residual (relative to the largest right-hand side) accepted as feasible.
    pub feasibility_tolerance: f64,
    /// Consecutive degenerate pivots after which pricing switches from Dantzig's rule to Bland's
    /// rule.
    pub bland_after: usize,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            max_pivots: 50_000,
            pivot_tolerance: 1e-10,
            feasibility_tolerance: 1e-9,
            bland_after: 50,
        }
    }
}

/// `lower <= Σ coeffs <= upper` over LP columns.
#[derive(Clone, Debug)]
pub(crate) struct LpRow {
    pub coeffs: Vec<(usize, f64)>,
    pub lower: f64,
    pub upper: f64,
}

/// Minimize `objective^T x` over bounded columns subject to range rows.
#[derive(Clone, Debug, Default)]
pub(crate) struct LinearProgram {
    pub columns: Vec<VarSpec>,
    pub objective: Vec<f64>,
    pub rows: Vec<LpRow>,
}

impl LinearProgram {
    pub fn add_column(&mut self, spec: VarSpec, cost: f64) -> usize {
        self.columns.push(spec);
        self.objective.push(cost);
        self.columns.len() - 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
}

#[derive(Clone, Debug)]
pub(crate) struct LpSolution {
    pub status: LpStatus,
    pub x: Vec<f64>,
    pub objective: f64,
}

impl LpSolution {
    fn infeasible() -> Self {
        Self {
            status: LpStatus::Infeasible,
            x: Vec::new(),
            objective: f64::NAN,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Relation {
    LessEqual,
    GreaterEqual,
    Equal,
}

#[derive(Clone, Debug)]
struct StandardRow {
    coeffs: Vec<(usize, f64)>,
    relation: Relation,
    rhs: f64,
}

/// How an LP column maps onto non-negative standard-form columns.
#[derive(Clone, Copy, Debug)]
enum ColumnMap {
    Fixed(f64),
    /// `x = lower + y`
    Shifted { col: usize, lower: f64 },
    /// `x = upper - y`
    Mirrored { col: usize, upper: f64 },
    /// `x = pos - neg`
    Split { pos: usize, neg: usize },
}

impl ColumnMap {
    /// Adds `coefficient · x` to `coeffs` and returns the constant part.
    fn substitute(self, coefficient: f64, coeffs: &mut Vec<(usize, f64)>) -> f64 {
        match self {
            ColumnMap::Fixed(v) => coefficient * v,
            ColumnMap::Shifted { col, lower } => {
                coeffs.push((col, coefficient));
                coefficient * lower
            }
            ColumnMap::Mirrored { col, upper } => {
                coeffs.push((col, -coefficient));
                coefficient * upper
            }
            ColumnMap::Split { pos, neg } => {
                coeffs.push((pos, coefficient));
                coeffs.push((neg, -coefficient));
                0.0
            }
        }
    }

    fn recover(self, y: &[f64]) -> f64 {
        match self {
            ColumnMap::Fixed(v) => v,
            ColumnMap::Shifted { col, lower } => lower + y[col],
            ColumnMap::Mirrored { col, upper } => upper - y[col],
            ColumnMap::Split { pos, neg } => y[pos] - y[neg],
        }
    }
}

pub(crate) fn solve_lp(lp: &LinearProgram, options: &SimplexOptions) -> LpSolution {
    // Map every column onto y >= 0.
    let mut maps = Vec::with_capacity(lp.columns.len());
    let mut n = 0usize;
    let mut bound_rows: Vec<StandardRow> = Vec::new();
    for spec in &lp.columns {
        let (lower, upper) = (spec.lower, spec.upper);
        if !(lower <= upper) {
            return LpSolution::infeasible();
        }
        let map = if lower == upper {
            ColumnMap::Fixed(lower)
        } else if lower.is_finite() {
            let col = n;
            n += 1;
            if upper.is_finite() {
                bound_rows.push(StandardRow {
                    coeffs: vec![(col, 1.0)],
                    relation: Relation::LessEqual,
                    rhs: upper - lower,
                });
            }
            ColumnMap::Shifted { col, lower }
        } else if upper.is_finite() {
            let col = n;
            n += 1;
            ColumnMap::Mirrored { col, upper }
        } else {
            let (pos, neg) = (n, n + 1);
            n += 2;
            ColumnMap::Split { pos, neg }
        };
        maps.push(map);
    }

    let mut constraints: Vec<StandardRow> = Vec::with_capacity(lp.rows.len() + bound_rows.len());
    for row in &lp.rows {
        let mut coeffs = Vec::with_capacity(row.coeffs.len());
        let mut constant = 0.0;
        for &(j, a) in &row.coeffs {
            constant += maps[j].substitute(a, &mut coeffs);
        }
        let (lower, upper) = (row.lower - constant, row.upper - constant);
        if coeffs.is_empty() {
            let tol = options.feasibility_tolerance * (1.0 + constant.abs());
            if lower > tol || upper < -tol {
                return LpSolution::infeasible();
            }
            continue;
        }
        if lower == upper {
            constraints.push(StandardRow {
                coeffs,
                relation: Relation::Equal,
                rhs: lower,
            });
            continue;
        }
        if lower.is_finite() {
            constraints.push(StandardRow {
                coeffs: coeffs.clone(),
                relation: Relation::GreaterEqual,
                rhs: lower,
            });
        }
        if upper.is_finite() {
            constraints.push(StandardRow {
                coeffs,
                relation: Relation::LessEqual,
                rhs: upper,
            });
        }
    }
    constraints.extend(bound_rows);

    let mut cost = vec![0.0; n];
    let mut cost_constant = 0.0;
    for (j, &c) in lp.objective.iter().enumerate() {
        if c == 0.0 {
            continue;
        }
        let mut coeffs = Vec::with_capacity(2);
        cost_constant += maps[j].substitute(c, &mut coeffs);
        for (col, v) in coeffs {
            cost[col] += v;
        }
    }

    let solution = solve_standard(n, &cost, constraints, options);
    if solution.status == LpStatus::Infeasible {
        return solution;
    }
    let x = maps.iter().map(|m| m.recover(&solution.x)).collect();
    LpSolution {
        status: solution.status,
        x,
        objective: solution.objective + cost_constant,
    }
}

/// Minimizes `cost^T y` over `y >= 0` with a two-phase tableau simplex.
fn solve_standard(
    n: usize,
    cost: &[f64],
    mut constraints: Vec<StandardRow>,
    options: &SimplexOptions,
) -> LpSolution {
    // Ensure RHS >= 0 for tableau construction.
    for c in &mut constraints {
        if c.rhs < 0.0 {
            c.rhs = -c.rhs;
            for (_, v) in &mut c.coeffs {
                *v = -*v;
            }
            c.relation = match c.relation {
                Relation::LessEqual => Relation::GreaterEqual,
                Relation::GreaterEqual => Relation::LessEqual,
                Relation::Equal => Relation::Equal,
            };
        }
    }

    let slack_count = constraints
        .iter()
        .filter(|c| c.relation == Relation::LessEqual)
        .count();
    let surplus_count = constraints
        .iter()
        .filter(|c| c.relation == Relation::GreaterEqual)
        .count();
    let artificial_count = constraints
        .iter()
        .filter(|c| matches!(c.relation, Relation::GreaterEqual | Relation::Equal))
        .count();

    let total_vars = n + slack_count + surplus_count + artificial_count;
    let m = constraints.len();

    let mut tableau = vec![vec![0.0; total_vars + 1]; m + 1];
    let mut basis = vec![0usize; m];

    let slack_offset = n;
    let surplus_offset = slack_offset + slack_count;
    let artificial_offset = surplus_offset + surplus_count;

    let mut slack_idx = 0usize;
    let mut surplus_idx = 0usize;
    let mut artificial_idx = 0usize;

    let mut max_rhs = 0.0_f64;
    for (row, c) in constraints.iter().enumerate() {
        for &(j, v) in &c.coeffs {
            tableau[row][j] += v;
        }
        tableau[row][total_vars] = c.rhs;
        max_rhs = max_rhs.max(c.rhs);

        match c.relation {
            Relation::LessEqual => {
                let col = slack_offset + slack_idx;
                slack_idx += 1;
                tableau[row][col] = 1.0;
                basis[row] = col;
            }
            Relation::GreaterEqual => {
                let surplus_col = surplus_offset + surplus_idx;
                surplus_idx += 1;
                tableau[row][surplus_col] = -1.0;

                let artificial_col = artificial_offset + artificial_idx;
                artificial_idx += 1;
                tableau[row][artificial_col] = 1.0;
                basis[row] = artificial_col;
            }
            Relation::Equal => {
                let artificial_col = artificial_offset + artificial_idx;
                artificial_idx += 1;
                tableau[row][artificial_col] = 1.0;
                basis[row] = artificial_col;
            }
        }
    }

    // Phase I objective: maximize -sum(artificial). The objective row holds reduced costs and,
    // in its last column, the negated objective value.
    for col in artificial_offset..total_vars {
        tableau[m][col] = -1.0;
    }
    for row in 0..m {
        if basis[row] >= artificial_offset {
            for col in 0..=total_vars {
                tableau[m][col] += tableau[row][col];
            }
        }
    }

    let mut pivots_used = 0usize;
    match simplex_iterate(&mut tableau, &mut basis, options, &mut pivots_used, |col| {
        col < total_vars
    }) {
        LpStatus::Optimal => {}
        status => {
            return LpSolution {
                status,
                x: vec![0.0; n],
                objective: f64::NAN,
            };
        }
    }

    // Remaining artificial mass.
    let residual = tableau[m][total_vars];
    if residual > options.feasibility_tolerance * (1.0 + max_rhs) {
        return LpSolution::infeasible();
    }

    // Drive zero-level artificials out of the basis so phase II cannot move them. Rows with no
    // structural entry left are redundant and stay as they are.
    for row in 0..m {
        if basis[row] < artificial_offset {
            continue;
        }
        let candidate = (0..artificial_offset)
            .filter(|&col| tableau[row][col].abs() > options.pivot_tolerance)
            .max_by(|&a, &b| tableau[row][a].abs().total_cmp(&tableau[row][b].abs()));
        if let Some(col) = candidate {
            pivot(&mut tableau, &mut basis, row, col);
        }
    }

    // Phase II: maximize -cost^T y.
    for col in 0..total_vars {
        tableau[m][col] = if col < n { -cost[col] } else { 0.0 };
    }
    tableau[m][total_vars] = 0.0;

    // Canonicalize w.r.t current basis.
    for row in 0..m {
        let basic = basis[row];
        if basic < n {
            let factor = tableau[m][basic];
            if factor.abs() > 1e-12 {
                for col in 0..=total_vars {
                    tableau[m][col] -= factor * tableau[row][col];
                }
            }
        }
    }

    let phase2_status = simplex_iterate(
        &mut tableau,
        &mut basis,
        options,
        &mut pivots_used,
        |col| col < artificial_offset, // do not allow artificial vars to enter
    );

    let mut y = vec![0.0; n];
    for row in 0..m {
        let basic = basis[row];
        if basic < n {
            y[basic] = tableau[row][total_vars].max(0.0);
        }
    }
    let objective = y.iter().zip(cost.iter()).map(|(a, b)| a * b).sum();

    LpSolution {
        status: phase2_status,
        x: y,
        objective,
    }
}

fn simplex_iterate<F: Fn(usize) -> bool>(
    tableau: &mut [Vec<f64>],
    basis: &mut [usize],
    options: &SimplexOptions,
    pivots_used: &mut usize,
    allow_entering: F,
) -> LpStatus {
    let m = basis.len();
    let total_vars = tableau[0].len() - 1;
    let rhs_col = total_vars;

    let eps = options.pivot_tolerance;
    let mut degenerate_run = 0usize;

    while *pivots_used < options.max_pivots {
        // Dantzig's rule; Bland's rule once pivots stop making progress.
        let bland = degenerate_run >= options.bland_after;
        let mut entering: Option<usize> = None;
        let mut best_cost = eps;
        for col in 0..total_vars {
            if !allow_entering(col) {
                continue;
            }
            let reduced = tableau[m][col];
            if reduced > eps {
                if bland {
                    entering = Some(col);
                    break;
                }
                if reduced > best_cost {
                    best_cost = reduced;
                    entering = Some(col);
                }
            }
        }

        let Some(entering) = entering else {
            return LpStatus::Optimal;
        };

        // Leaving variable via minimum ratio test.
        let mut leaving_row: Option<usize> = None;
        let mut best_ratio = f64::INFINITY;
        for row in 0..m {
            let a = tableau[row][entering];
            if a > eps {
                let ratio = tableau[row][rhs_col] / a;
                if ratio < best_ratio - 1e-12
                    || ((ratio - best_ratio).abs() <= 1e-12
                        && basis[row] < basis[leaving_row.unwrap_or(row)])
                {
                    best_ratio = ratio;
                    leaving_row = Some(row);
                }
            }
        }

        let Some(leaving_row) = leaving_row else {
            return LpStatus::Unbounded;
        };

        if best_ratio <= 1e-12 {
            degenerate_run += 1;
        } else {
            degenerate_run = 0;
        }

        pivot(tableau, basis, leaving_row, entering);
        *pivots_used += 1;
    }

    LpStatus::IterationLimit
}

fn pivot(tableau: &mut [Vec<f64>], basis: &mut [usize], leaving_row: usize, entering: usize) {
    let m = basis.len();
    let total_vars = tableau[0].len() - 1;
    let pivot_val = tableau[leaving_row][entering];

    // Normalize leaving row, remembering its non-zero pattern.
    let mut pattern: Vec<(usize, f64)> = Vec::new();
    for col in 0..=total_vars {
        let v = tableau[leaving_row][col] / pivot_val;
        tableau[leaving_row][col] = v;
        if v != 0.0 {
            pattern.push((col, v));
        }
    }

    // Eliminate pivot column from all other rows including objective.
    for row in 0..=m {
        if row == leaving_row {
            continue;
        }
        let factor = tableau[row][entering];
        if factor.abs() < 1e-12 {
            continue;
        }
        let target = &mut tableau[row];
        for &(col, v) in &pattern {
            target[col] -= factor * v;
        }
        target[entering] = 0.0;
    }

    basis[leaving_row] = entering;
}
