use munkres::{solve_assignment, Position, WeightMatrix};
use tracing::{debug, trace};

use crate::cost::{CostMatrices, MotionLut, DELETION_COST};
use crate::error::Error;
use crate::stixel::Stixel;

/// Pairs with a polar closeness at or below this are not matched.
const MIN_POLAR_CLOSENESS: f32 = 1.0;

/// `correspondence[current] = Some(previous)`, `None` for a stixel without a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correspondence(Vec<Option<usize>>);

impl Correspondence {
    pub fn unmatched(len: usize) -> Self {
        Self(vec![None; len])
    }

    #[inline]
    pub fn get(&self, current: usize) -> Option<usize> {
        self.0.get(current).copied().flatten()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.0
    }

    /// `(current, previous)` of every matched stixel.
    pub fn matched(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(curr, prev)| prev.map(|prev| (curr, prev)))
    }

    /// No previous stixel is claimed twice.
    pub fn is_one_to_one(&self) -> bool {
        let mut seen = std::collections::HashSet::new();

        self.matched().all(|(_, prev)| seen.insert(prev))
    }
}

impl From<Vec<Option<usize>>> for Correspondence {
    fn from(v: Vec<Option<usize>>) -> Self {
        Self(v)
    }
}

pub struct AssignmentContext<'a> {
    pub previous: &'a [Stixel],
    pub current: &'a [Stixel],
    pub costs: &'a CostMatrices,
    pub lut: &'a MotionLut,
}

impl<'a> AssignmentContext<'a> {
    fn check(&self) -> Result<(), Error> {
        if self.costs.cols() != self.current.len() {
            return Err(Error::Assignment(format!(
                "cost matrices have {} columns for {} current stixels",
                self.costs.cols(),
                self.current.len()
            )));
        }

        Ok(())
    }

    /// Cost matrix row of the pair if it was evaluated.
    #[inline]
    fn feasible_row(&self, prev: usize, curr: usize) -> Option<usize> {
        let shift = self.previous[prev].x - self.current[curr].x;
        let row = self.costs.row_for_shift(shift)?;

        if self.costs.is_feasible(row, curr) {
            Some(row)
        } else {
            None
        }
    }
}

pub trait AssignmentSolver {
    fn solve(&self, ctx: &AssignmentContext<'_>) -> Result<Correspondence, Error>;
}

/// Maximum weight bipartite matching between previous and current stixels.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphMatchingSolver;

impl GraphMatchingSolver {
    fn edges(&self, ctx: &AssignmentContext<'_>) -> Vec<(usize, usize, f32)> {
        let max_cost = ctx.costs.max_cost();
        let mut edges = Vec::new();

        for (p, prev) in ctx.previous.iter().enumerate() {
            for (c, curr) in ctx.current.iter().enumerate() {
                let max_motion = ctx.lut.max_motion_for(curr);
                if (prev.x - curr.x).unsigned_abs() > max_motion
                    || (prev.bottom_y - curr.bottom_y).unsigned_abs() > max_motion
                {
                    continue;
                }

                let row = match ctx.feasible_row(p, c) {
                    Some(row) => row,
                    None => continue,
                };

                if ctx.costs.polar_closeness(row, c) <= MIN_POLAR_CLOSENESS {
                    continue;
                }

                edges.push((p, c, max_cost - ctx.costs.cost(row, c)));
            }
        }

        edges
    }
}

impl AssignmentSolver for GraphMatchingSolver {
    fn solve(&self, ctx: &AssignmentContext<'_>) -> Result<Correspondence, Error> {
        ctx.check()?;

        let mut corresp = Correspondence::unmatched(ctx.current.len());
        if ctx.previous.is_empty() || ctx.current.is_empty() {
            return Ok(corresp);
        }

        let edges = self.edges(ctx);
        if edges.is_empty() {
            debug!("no candidate pairs, nothing matched");
            return Ok(corresp);
        }

        let n = ctx.previous.len().max(ctx.current.len());
        let mut weights = vec![None; n * n];
        for &(p, c, w) in &edges {
            weights[p * n + c] = Some(w);
        }

        let max_weight = edges.iter().map(|e| e.2).fold(0.0f32, f32::max);

        // maximum weight matching as a min cost perfect assignment, non edges weigh nothing
        let mut mat = WeightMatrix::from_fn(n, |(r, c)| match weights[r * n + c] {
            Some(w) => max_weight - w,
            None => max_weight,
        });

        let positions = solve_assignment(&mut mat)
            .map_err(|err| Error::Assignment(format!("{:?}", err)))?;

        for Position { row, column } in positions {
            if weights[row * n + column].is_some() {
                corresp.0[column] = Some(row);
            }
        }

        trace!(
            edges = edges.len(),
            matched = corresp.matched().count(),
            "graph matching solved"
        );

        Ok(corresp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Match,
    SkipCurrent,
    SkipPrevious,
}

/// Order preserving alignment of the previous and current stixel sequences.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicProgrammingSolver;

impl AssignmentSolver for DynamicProgrammingSolver {
    fn solve(&self, ctx: &AssignmentContext<'_>) -> Result<Correspondence, Error> {
        ctx.check()?;

        let (np, nc) = (ctx.previous.len(), ctx.current.len());
        let mut corresp = Correspondence::unmatched(nc);
        if np == 0 || nc == 0 {
            return Ok(corresp);
        }

        let width = nc + 1;
        let mut acc = vec![0.0f32; (np + 1) * width];
        let mut steps = vec![Step::Match; (np + 1) * width];

        for i in 0..=np {
            for j in 0..=nc {
                if i == 0 && j == 0 {
                    continue;
                }

                let mut best: Option<(f32, Step)> = None;
                let mut consider = |cost: f32, step: Step| {
                    if best.map_or(true, |(b, _)| cost < b) {
                        best = Some((cost, step));
                    }
                };

                if i > 0 && j > 0 {
                    if let Some(row) = ctx.feasible_row(i - 1, j - 1) {
                        consider(acc[(i - 1) * width + j - 1] + ctx.costs.cost(row, j - 1), Step::Match);
                    }
                }

                if j > 0 {
                    consider(
                        acc[i * width + j - 1] + ctx.costs.deletion_cost(j - 1),
                        Step::SkipCurrent,
                    );
                }

                if i > 0 {
                    consider(acc[(i - 1) * width + j] + DELETION_COST, Step::SkipPrevious);
                }

                if let Some((cost, step)) = best {
                    acc[i * width + j] = cost;
                    steps[i * width + j] = step;
                }
            }
        }

        let (mut i, mut j) = (np, nc);
        while i > 0 || j > 0 {
            match steps[i * width + j] {
                Step::Match => {
                    corresp.0[j - 1] = Some(i - 1);
                    i -= 1;
                    j -= 1;
                }
                Step::SkipCurrent => j -= 1,
                Step::SkipPrevious => i -= 1,
            }
        }

        trace!(
            total = acc[np * width + nc],
            matched = corresp.matched().count(),
            "sequence alignment solved"
        );

        Ok(corresp)
    }
}
