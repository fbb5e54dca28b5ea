//! Constrained minimum-volume cross-section search.
//!
//! Minimizes `length · height · width` over (height, width) subject to the
//! deflection limit `span / 240`. The search runs an ordered list of solver
//! strategies (a penalized Nelder–Mead simplex, then a projected gradient
//! descent) from four starting points each, accepting the first candidate
//! that both converges and satisfies the raw constraint with strictly
//! positive margin. When no solver converges a fixed grid of scale factors
//! is evaluated for feasibility; when even that fails the optimizer reports
//! a structured failure rather than an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::deflection::{allowable_deflection, deflect, DesignStatus, LoadType};
use crate::history::{DesignLedger, LedgerEntry};
use crate::materials::{Material, SectionTable};
use crate::spec::BeamSpecification;

/// Inputs for one optimization run.
///
/// User-supplied starting dimensions are optional; when present they seed the
/// search bounds and starting points and enable the before/after
/// classification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OptimizationRequest {
    /// Beam material.
    pub material: Material,
    /// Span length in mm.
    pub length_mm: f64,
    /// Applied load in N.
    pub load_n: f64,
    /// User's own cross-section height, when one was specified.
    pub user_height_mm: Option<f64>,
    /// User's own cross-section width, when one was specified.
    pub user_width_mm: Option<f64>,
}

impl From<&BeamSpecification> for OptimizationRequest {
    fn from(spec: &BeamSpecification) -> Self {
        Self {
            material: spec.material,
            length_mm: spec.length_mm,
            load_n: spec.load_n,
            user_height_mm: Some(spec.height_mm),
            user_width_mm: Some(spec.width_mm),
        }
    }
}

/// Relationship between the user's design and the computed optimum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationCategory {
    /// Original design safe; optimum uses less material.
    OptimizationSuccess,
    /// Original design safe; optimum is not smaller — keep the original.
    DesignFeasible,
    /// Original design unsafe; the safe optimum still uses less material.
    SafetyUpgradeEfficient,
    /// Original design unsafe; the safe minimum needs more material.
    SafetyUpgrade,
    /// No user design to compare against; minimum feasible design reported.
    MinimumFeasible,
}

/// Assessment of the user's own design, present when one was supplied.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OriginalAssessment {
    /// Volume of the user's design in mm³.
    pub volume_mm3: f64,
    /// Deflection of the user's design in mm.
    pub deflection_mm: f64,
    /// Whether the user's design satisfies the deflection limit.
    pub is_safe: bool,
}

/// Standard steel profile that beats the computed optimum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardAlternative {
    /// Profile designation, e.g. `IPE240`.
    pub profile: String,
    /// Profile height in mm.
    pub height_mm: f64,
    /// Profile flange width in mm.
    pub width_mm: f64,
    /// Profile volume (`area · length`) in mm³.
    pub volume_mm3: f64,
    /// Profile deflection under the requested load in mm.
    pub deflection_mm: f64,
    /// Volume saving relative to the computed optimum, in percent.
    pub efficiency_gain_percent: f64,
}

/// Numeric result of a successful optimization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    /// Optimal cross-section height in mm.
    pub height_mm: f64,
    /// Optimal cross-section width in mm.
    pub width_mm: f64,
    /// Optimal volume in mm³.
    pub volume_mm3: f64,
    /// Deflection of the optimum in mm.
    pub deflection_mm: f64,
    /// Allowable deflection in mm.
    pub allowable_mm: f64,
    /// Classification against the user's design.
    pub category: OptimizationCategory,
    /// Signed volume change relative to the user's design, in percent.
    pub volume_change_percent: Option<f64>,
    /// The user's design, assessed, when one was supplied.
    pub original: Option<OriginalAssessment>,
    /// Cheaper standard profile, when one exists (steel only).
    pub standard_alternative: Option<StandardAlternative>,
    /// One-line human-readable summary for the presentation adapter.
    pub assessment: String,
}

/// Terminal outcome of an optimization attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OptimizationOutcome {
    /// A feasible minimum-volume design was found and recorded.
    Optimized(OptimizationSummary),
    /// No feasible design was found; the session continues.
    Failed {
        /// Why the search failed.
        reason: String,
    },
}

/// A (height, width) candidate in mm.
type Candidate = [f64; 2];

/// Scale factor sets evaluated by the grid feasibility fallback.
const GRID_SCALES: [[f64; 5]; 3] = [
    [1.0, 1.5, 2.0, 2.5, 3.0],
    [0.8, 1.0, 1.2, 1.4, 1.6],
    [0.5, 0.7, 0.9, 1.1, 1.3],
];

/// Weight applied to squared constraint violation in the penalized objective.
const PENALTY_WEIGHT: f64 = 1.0e9;

/// Rectangular search region for (height, width).
#[derive(Clone, Copy, Debug)]
struct SearchBounds {
    /// Inclusive height range in mm.
    height: (f64, f64),
    /// Inclusive width range in mm.
    width: (f64, f64),
}

impl SearchBounds {
    /// Derive bounds from user dimensions or from the span.
    fn for_request(request: &OptimizationRequest) -> Self {
        match (request.user_height_mm, request.user_width_mm) {
            (Some(height), Some(width)) => Self {
                height: (f64::max(10.0, height / 10.0), height * 10.0),
                width: (f64::max(10.0, width / 10.0), width * 10.0),
            },
            _ => {
                let length = request.length_mm;
                Self {
                    height: (f64::max(20.0, length / 100.0), length / 3.0),
                    width: (f64::max(10.0, length / 200.0), length / 5.0),
                }
            }
        }
    }

    /// Clamp a candidate into the region.
    fn clamp(&self, candidate: Candidate) -> Candidate {
        [
            candidate[0].clamp(self.height.0, self.height.1),
            candidate[1].clamp(self.width.0, self.width.1),
        ]
    }
}

/// The constrained problem shared by every strategy.
struct Problem<'a> {
    /// Optimization inputs.
    request: &'a OptimizationRequest,
    /// Steel section table used by the deflection model.
    table: &'a SectionTable,
}

impl Problem<'_> {
    /// Volume objective in mm³.
    fn volume(&self, candidate: Candidate) -> f64 {
        self.request.length_mm * candidate[0] * candidate[1]
    }

    /// Constraint margin `allowable − deflection`; feasible when positive.
    fn margin(&self, candidate: Candidate) -> f64 {
        let [height, width] = candidate;
        if height <= 0.0 || width <= 0.0 {
            return f64::NEG_INFINITY;
        }
        let deflection = deflect(
            self.request.load_n,
            self.request.material,
            self.request.length_mm,
            width,
            height,
            LoadType::Point,
            self.table,
        );
        allowable_deflection(self.request.length_mm) - deflection
    }

    /// Volume plus quadratic penalty for constraint violation.
    fn penalized(&self, candidate: Candidate) -> f64 {
        let margin = self.margin(candidate);
        let penalty = if margin < 0.0 {
            PENALTY_WEIGHT * margin * margin
        } else {
            0.0
        };
        self.volume(candidate) + penalty
    }
}

/// A constrained nonlinear solver attempt.
///
/// Strategies are tried in a fixed order; each returns its best candidate
/// only when its own convergence test passed. Feasibility is re-checked by
/// the caller, never trusted from the strategy.
trait SolverStrategy {
    /// Strategy name for logging.
    fn name(&self) -> &'static str;

    /// Run the solver from one starting point.
    fn solve(&self, problem: &Problem<'_>, bounds: SearchBounds, start: Candidate)
        -> Option<Candidate>;
}

/// Nelder–Mead simplex on the penalized objective, bound-clamped.
struct NelderMead;

impl SolverStrategy for NelderMead {
    fn name(&self) -> &'static str {
        "nelder-mead"
    }

    fn solve(
        &self,
        problem: &Problem<'_>,
        bounds: SearchBounds,
        start: Candidate,
    ) -> Option<Candidate> {
        let f = |p: Candidate| problem.penalized(bounds.clamp(p));

        // Initial simplex: the start plus 5% perturbations along each axis.
        let mut simplex: Vec<(Candidate, f64)> = vec![
            start,
            [start[0] * 1.05 + 1.0, start[1]],
            [start[0], start[1] * 1.05 + 1.0],
        ]
        .into_iter()
        .map(|p| (bounds.clamp(p), f(p)))
        .collect();

        let mut converged = false;
        for _ in 0..250 {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            let best = simplex[0].1;
            let worst = simplex[2].1;
            if (worst - best).abs() <= 1.0e-8 * (1.0 + best.abs()) {
                converged = true;
                break;
            }

            let centroid = [
                (simplex[0].0[0] + simplex[1].0[0]) / 2.0,
                (simplex[0].0[1] + simplex[1].0[1]) / 2.0,
            ];
            let reflect = |alpha: f64| {
                bounds.clamp([
                    centroid[0] + alpha * (centroid[0] - simplex[2].0[0]),
                    centroid[1] + alpha * (centroid[1] - simplex[2].0[1]),
                ])
            };

            let reflected = reflect(1.0);
            let reflected_value = f(reflected);
            if reflected_value < simplex[0].1 {
                // Try to expand further along the same direction.
                let expanded = reflect(2.0);
                let expanded_value = f(expanded);
                simplex[2] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
            } else if reflected_value < simplex[1].1 {
                simplex[2] = (reflected, reflected_value);
            } else {
                let contracted = reflect(-0.5);
                let contracted_value = f(contracted);
                if contracted_value < simplex[2].1 {
                    simplex[2] = (contracted, contracted_value);
                } else {
                    // Shrink toward the best vertex.
                    for index in 1..3 {
                        let shrunk = bounds.clamp([
                            simplex[0].0[0] + 0.5 * (simplex[index].0[0] - simplex[0].0[0]),
                            simplex[0].0[1] + 0.5 * (simplex[index].0[1] - simplex[0].0[1]),
                        ]);
                        simplex[index] = (shrunk, f(shrunk));
                    }
                }
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        converged.then_some(simplex[0].0)
    }
}

/// Projected gradient descent with central finite differences.
struct ProjectedGradient;

impl SolverStrategy for ProjectedGradient {
    fn name(&self) -> &'static str {
        "projected-gradient"
    }

    fn solve(
        &self,
        problem: &Problem<'_>,
        bounds: SearchBounds,
        start: Candidate,
    ) -> Option<Candidate> {
        let f = |p: Candidate| problem.penalized(p);
        let mut point = bounds.clamp(start);
        let mut value = f(point);
        let mut converged = false;

        for _ in 0..300 {
            // Central-difference gradient scaled per axis.
            let eps = [
                1.0e-5 * (1.0 + point[0].abs()),
                1.0e-5 * (1.0 + point[1].abs()),
            ];
            let gradient = [
                (f(bounds.clamp([point[0] + eps[0], point[1]]))
                    - f(bounds.clamp([point[0] - eps[0], point[1]])))
                    / (2.0 * eps[0]),
                (f(bounds.clamp([point[0], point[1] + eps[1]]))
                    - f(bounds.clamp([point[0], point[1] - eps[1]])))
                    / (2.0 * eps[1]),
            ];
            let norm = (gradient[0] * gradient[0] + gradient[1] * gradient[1]).sqrt();
            if !norm.is_finite() {
                return None;
            }

            // Backtracking line search on the projected step.
            let mut step = 0.1 * f64::max(point[0].abs(), point[1].abs()) / (1.0 + norm);
            let mut advanced = false;
            while step > 1.0e-9 {
                let next = bounds.clamp([
                    point[0] - step * gradient[0],
                    point[1] - step * gradient[1],
                ]);
                let next_value = f(next);
                if next_value < value {
                    let moved = (next[0] - point[0]).abs() + (next[1] - point[1]).abs();
                    point = next;
                    value = next_value;
                    advanced = true;
                    if moved <= 1.0e-7 * (1.0 + point[0].abs() + point[1].abs()) {
                        converged = true;
                    }
                    break;
                }
                step *= 0.5;
            }
            if !advanced {
                // No descent step left; the projected point is stationary.
                converged = true;
                break;
            }
            if converged {
                break;
            }
        }

        converged.then_some(point)
    }
}

/// Starting points for one strategy: the base guess and three variations.
fn starting_points(request: &OptimizationRequest, bounds: SearchBounds) -> [Candidate; 4] {
    let base = match (request.user_height_mm, request.user_width_mm) {
        (Some(height), Some(width)) => [height, width],
        _ => [request.length_mm / 15.0, request.length_mm / 20.0],
    };
    [
        bounds.clamp(base),
        bounds.clamp([base[0] * 1.5, base[1] * 1.5]),
        bounds.clamp([base[0] * 0.7, base[1] * 1.3]),
        bounds.clamp([
            f64::max(bounds.height.0 + 10.0, base[0] * 0.5),
            f64::max(bounds.width.0 + 5.0, base[1] * 0.8),
        ]),
    ]
}

/// Grid feasibility fallback: scale a span-derived default section and keep
/// the cheapest feasible candidate.
fn grid_search(problem: &Problem<'_>) -> Option<Candidate> {
    let base = [problem.request.length_mm / 10.0, problem.request.length_mm / 15.0];
    let mut best: Option<(Candidate, f64)> = None;
    for scales in GRID_SCALES {
        for scale in scales {
            let candidate = [base[0] * scale, base[1] * scale];
            if candidate[0] < 20.0 || candidate[1] < 10.0 {
                continue;
            }
            if problem.margin(candidate) > 0.0 {
                let volume = problem.volume(candidate);
                if best.map_or(true, |(_, v)| volume < v) {
                    best = Some((candidate, volume));
                }
            }
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Run the full multi-strategy search. Returns the accepted candidate, or
/// `None` when neither the solvers nor the grid find a feasible design.
fn search(problem: &Problem<'_>, bounds: SearchBounds) -> Option<Candidate> {
    let strategies: [&dyn SolverStrategy; 2] = [&NelderMead, &ProjectedGradient];
    let starts = starting_points(problem.request, bounds);

    let mut accepted: Option<Candidate> = None;
    for strategy in strategies {
        for (attempt, start) in starts.iter().enumerate() {
            let Some(candidate) = strategy.solve(problem, bounds, *start) else {
                debug!(strategy = strategy.name(), attempt, "solver did not converge");
                continue;
            };
            // Never trust solver status alone: re-check the raw constraint.
            let margin = problem.margin(candidate);
            if margin > 0.0 {
                debug!(
                    strategy = strategy.name(),
                    attempt,
                    height = candidate[0],
                    width = candidate[1],
                    margin,
                    "solver produced feasible candidate"
                );
                accepted = Some(candidate);
                break;
            }
            debug!(strategy = strategy.name(), attempt, margin, "candidate infeasible, rejected");
        }
        if accepted.is_some() {
            break;
        }
    }

    accepted.or_else(|| {
        debug!("all solvers exhausted, running grid feasibility search");
        grid_search(problem)
    })
}

/// Optimize a beam and record the result in the historical ledger.
///
/// Runs synchronously to one of its terminal outcomes. Every successful run
/// appends exactly one OPT record; a ledger append failure is logged and does
/// not invalidate the optimization itself.
#[must_use]
pub fn optimize(
    request: &OptimizationRequest,
    table: &SectionTable,
    ledger: &DesignLedger,
) -> OptimizationOutcome {
    if request.length_mm <= 0.0 || request.load_n <= 0.0 {
        return OptimizationOutcome::Failed {
            reason: format!(
                "invalid parameters: length={} mm, load={} N",
                request.length_mm, request.load_n
            ),
        };
    }
    if request.user_height_mm.is_some_and(|h| h <= 0.0)
        || request.user_width_mm.is_some_and(|w| w <= 0.0)
    {
        return OptimizationOutcome::Failed {
            reason: "invalid parameters: user dimensions must be positive".to_owned(),
        };
    }

    let problem = Problem { request, table };
    let bounds = SearchBounds::for_request(request);
    let Some(candidate) = search(&problem, bounds) else {
        info!("no feasible cross-section found within constraints");
        return OptimizationOutcome::Failed {
            reason: "no feasible design found within constraints".to_owned(),
        };
    };

    let [height, width] = candidate;
    let volume = problem.volume(candidate);
    let allowable = allowable_deflection(request.length_mm);
    let deflection = allowable - problem.margin(candidate);
    let mut summary = classify(request, table, height, width, volume, deflection, allowable);

    if request.material == Material::Steel
        && matches!(
            summary.category,
            OptimizationCategory::SafetyUpgrade | OptimizationCategory::MinimumFeasible
        )
    {
        summary.standard_alternative = standard_alternative(request, table, volume);
        if let Some(ref alternative) = summary.standard_alternative {
            summary.assessment = format!(
                "{} Consider {} profile: {:.1}% more efficient.",
                summary.assessment, alternative.profile, alternative.efficiency_gain_percent
            );
        }
    }

    info!(
        height,
        width,
        volume,
        category = ?summary.category,
        "optimization finished"
    );

    let entry = LedgerEntry {
        material: request.material,
        length_mm: request.length_mm,
        height_mm: height,
        width_mm: width,
        load_n: request.load_n,
        volume_mm3: volume,
        deflection_mm: deflection,
        allowable_mm: allowable,
        status: DesignStatus::Opt,
    };
    if let Err(error) = ledger.append(&entry) {
        warn!(%error, "could not record optimized design in the ledger");
    }

    OptimizationOutcome::Optimized(summary)
}

/// Classify the optimum against the user's own design, when one exists.
#[allow(clippy::too_many_arguments)]
fn classify(
    request: &OptimizationRequest,
    table: &SectionTable,
    height: f64,
    width: f64,
    volume: f64,
    deflection: f64,
    allowable: f64,
) -> OptimizationSummary {
    let mut summary = OptimizationSummary {
        height_mm: height,
        width_mm: width,
        volume_mm3: volume,
        deflection_mm: deflection,
        allowable_mm: allowable,
        category: OptimizationCategory::MinimumFeasible,
        volume_change_percent: None,
        original: None,
        standard_alternative: None,
        assessment: "Minimum feasible design found".to_owned(),
    };

    let (Some(user_height), Some(user_width)) = (request.user_height_mm, request.user_width_mm)
    else {
        return summary;
    };

    let original_deflection = deflect(
        request.load_n,
        request.material,
        request.length_mm,
        user_width,
        user_height,
        LoadType::Point,
        table,
    );
    let original_volume = request.length_mm * user_height * user_width;
    let change_percent = ((volume - original_volume) / original_volume) * 100.0;
    let is_improvement = volume < original_volume;
    let is_safe = original_deflection <= allowable;

    summary.original = Some(OriginalAssessment {
        volume_mm3: original_volume,
        deflection_mm: original_deflection,
        is_safe,
    });
    summary.volume_change_percent = Some(change_percent);
    summary.category = match (is_safe, is_improvement) {
        (true, true) => OptimizationCategory::OptimizationSuccess,
        (true, false) => OptimizationCategory::DesignFeasible,
        (false, true) => OptimizationCategory::SafetyUpgradeEfficient,
        (false, false) => OptimizationCategory::SafetyUpgrade,
    };
    summary.assessment = match summary.category {
        OptimizationCategory::OptimizationSuccess => format!(
            "Material reduction achieved: {:.1}% less volume",
            change_percent.abs()
        ),
        OptimizationCategory::DesignFeasible => {
            "Original design is adequate. Alternative design uses more material.".to_owned()
        }
        OptimizationCategory::SafetyUpgradeEfficient => format!(
            "Safety improved with {:.1}% less material",
            change_percent.abs()
        ),
        OptimizationCategory::SafetyUpgrade => format!(
            "Original design unsafe. Minimum safe design requires {change_percent:.1}% more material for structural safety"
        ),
        OptimizationCategory::MinimumFeasible => "Minimum feasible design found".to_owned(),
    };
    summary
}

/// Search the section table for a standard profile cheaper than the optimum
/// that still satisfies the deflection limit.
fn standard_alternative(
    request: &OptimizationRequest,
    table: &SectionTable,
    target_volume: f64,
) -> Option<StandardAlternative> {
    let allowable = allowable_deflection(request.length_mm);
    let mut best: Option<StandardAlternative> = None;
    for row in table.rows() {
        let profile_volume = row.area_mm2 * request.length_mm;
        if profile_volume >= target_volume {
            continue;
        }
        let deflection = deflect(
            request.load_n,
            request.material,
            request.length_mm,
            row.width_mm,
            row.height_mm,
            LoadType::Point,
            table,
        );
        if deflection > allowable {
            continue;
        }
        if best
            .as_ref()
            .map_or(true, |current| profile_volume < current.volume_mm3)
        {
            best = Some(StandardAlternative {
                profile: row.name.to_owned(),
                height_mm: row.height_mm,
                width_mm: row.width_mm,
                volume_mm3: profile_volume,
                deflection_mm: deflection,
                efficiency_gain_percent: ((target_volume - profile_volume) / target_volume)
                    * 100.0,
            });
        }
    }
    best
}
