//! Reference scenarios for the bucket search index
//!
//! Each scenario drives a [`PointCloud`] through many steps of incremental
//! updates (moves, removals, insertions) and then validates the index
//! against brute-force neighbour searches.


use bucket_search::{Domain, PointCloud, SearchConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// How particles evolve from step to step
#[derive(Debug, Clone)]
pub enum Scenario {
    /// Every particle takes a uniform random step on each axis
    RandomWalk {
        /// Maximum displacement per axis per step
        step: f64,
    },
    /// Particles drift toward the domain centre, vanish in a central sink
    /// and are replaced by fresh particles at random positions
    SinkSource {
        /// Radius of the sink around the domain centre
        sink_radius: f64,
        /// Distance moved toward the centre per step
        drift: f64,
        /// Particles injected per step
        inflow: usize,
    },
    /// Rejection sampling of non-overlapping spheres
    PackedInsertion {
        /// Sphere radius; twice this must not exceed the bucket side
        radius: f64,
        /// Insertion attempts per step
        attempts: usize,
    },
}

/// Expected result criteria for a reference test
#[derive(Debug, Clone)]
pub struct ExpectedResult {
    /// Walk every chain and compare with the particle count
    pub consistency: bool,
    /// Neighbour sets compared against brute force
    pub neighbour_agreement: Option<NeighbourCheck>,
    /// Final particle count bounds
    pub population: Option<PopulationCheck>,
    /// Minimum pairwise separation
    pub separation: Option<SeparationCheck>,
}

/// Compare radius queries with a brute-force minimum-image search
#[derive(Debug, Clone)]
pub struct NeighbourCheck {
    /// Number of query particles sampled
    pub samples: usize,
    /// Query radius as a fraction of the smallest bucket side (0.0 to 1.0)
    pub radius_fraction: f64,
}

/// Check that the final particle count stays in range
#[derive(Debug, Clone)]
pub struct PopulationCheck {
    /// Minimum allowed count
    pub min: usize,
    /// Maximum allowed count
    pub max: usize,
}

/// Check that no two particles are closer than a distance
#[derive(Debug, Clone)]
pub struct SeparationCheck {
    /// Minimum allowed distance
    pub min_distance: f64,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Number of steps executed
    pub steps: usize,
    /// Particle count at the end of the run
    pub final_particles: usize,
    /// Wall-clock time for the run (seconds)
    pub elapsed: f64,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Error message if failed
    pub message: Option<String>,
}

/// A reference test case
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Path to configuration file
    pub config_path: String,
    /// Particles placed before the first step
    pub initial_particles: usize,
    /// Number of steps to run
    pub steps: usize,
    /// Seed for the random number generator
    pub seed: u64,
    /// Particle dynamics
    pub scenario: Scenario,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, String> {
        tracing::info!("Running reference test: {}", self.name);
        let start = Instant::now();

        let config = SearchConfig::load(&self.config_path).map_err(|e| e.to_string())?;
        let domain = config.domain::<3>().map_err(|e| e.to_string())?;
        let mut cloud =
            PointCloud::with_domain(domain, config.bucket_side_length).map_err(|e| e.to_string())?;

        let side = smallest_side(&cloud);
        if let Scenario::PackedInsertion { radius, .. } = self.scenario {
            if 2.0 * radius > side {
                return Err(format!(
                    "sphere diameter {} exceeds bucket side {}",
                    2.0 * radius,
                    side
                ));
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        if !matches!(self.scenario, Scenario::PackedInsertion { .. }) {
            let initial: Vec<[f64; 3]> = (0..self.initial_particles)
                .map(|_| random_position(&mut rng, &domain))
                .collect();
            cloud.extend(initial);
        }

        tracing::info!(
            "Initialized: {} particles, {} buckets",
            cloud.len(),
            cloud.search().params().total_buckets()
        );

        let mut checks = Vec::new();
        let mut all_passed = true;
        let mut first_inconsistency: Option<String> = None;

        for step in 0..self.steps {
            match self.scenario {
                Scenario::RandomWalk { step: max_step } => {
                    random_walk(&mut cloud, &mut rng, max_step)
                }
                Scenario::SinkSource {
                    sink_radius,
                    drift,
                    inflow,
                } => sink_source(&mut cloud, &mut rng, sink_radius, drift, inflow),
                Scenario::PackedInsertion { radius, attempts } => {
                    packed_insertion(&mut cloud, &mut rng, radius, attempts)
                }
            }

            // Log progress every 10% of steps
            if (step + 1) % (self.steps / 10).max(1) == 0 {
                let progress = ((step + 1) as f32 / self.steps as f32) * 100.0;
                tracing::info!(
                    "Progress: {:.0}% ({}/{}), {} particles",
                    progress,
                    step + 1,
                    self.steps,
                    cloud.len()
                );
                if self.expected.consistency && first_inconsistency.is_none() {
                    if let Err(message) = check_consistency(&cloud) {
                        tracing::warn!("Index inconsistent after step {}: {}", step + 1, message);
                        first_inconsistency = Some(format!("after step {}: {}", step + 1, message));
                    }
                }
            }
        }
        tracing::info!("Run complete: {} steps, {} particles", self.steps, cloud.len());

        if self.expected.consistency {
            let check = match first_inconsistency.or_else(|| check_consistency(&cloud).err()) {
                None => CheckResult {
                    name: "Index Consistency".to_string(),
                    passed: true,
                    message: Some(format!("{} particles linked", cloud.len())),
                },
                Some(message) => CheckResult {
                    name: "Index Consistency".to_string(),
                    passed: false,
                    message: Some(message),
                },
            };
            all_passed &= check.passed;
            checks.push(check);
        }

        if let Some(ref agreement) = self.expected.neighbour_agreement {
            let check = validate_neighbours(&cloud, agreement, &mut rng);
            all_passed &= check.passed;
            checks.push(check);
        }

        if let Some(ref population) = self.expected.population {
            let check = validate_population(&cloud, population);
            all_passed &= check.passed;
            checks.push(check);
        }

        if let Some(ref separation) = self.expected.separation {
            let check = validate_separation(&cloud, separation);
            all_passed &= check.passed;
            checks.push(check);
        }

        Ok(TestResult {
            name: self.name.clone(),
            passed: all_passed,
            checks,
            steps: self.steps,
            final_particles: cloud.len(),
            elapsed: start.elapsed().as_secs_f64(),
        })
    }
}

fn smallest_side(cloud: &PointCloud<3>) -> f64 {
    cloud
        .search()
        .params()
        .side_length()
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

fn random_position(rng: &mut StdRng, domain: &Domain<3>) -> [f64; 3] {
    let (min, max) = (domain.min(), domain.max());
    let mut p = [0.0; 3];
    for axis in 0..3 {
        p[axis] = rng.gen_range(min[axis]..max[axis]);
    }
    p
}

/// Displacement from `a` to `b`, using the nearest image on periodic axes.
fn minimum_image(domain: &Domain<3>, a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    let extent = domain.extent();
    let periodic = domain.periodic();
    let mut dx = [0.0; 3];
    for axis in 0..3 {
        dx[axis] = b[axis] - a[axis];
        if periodic[axis] {
            dx[axis] -= extent[axis] * (dx[axis] / extent[axis]).round();
        }
    }
    dx
}

fn norm2(dx: &[f64; 3]) -> f64 {
    dx.iter().map(|c| c * c).sum()
}

fn random_walk(cloud: &mut PointCloud<3>, rng: &mut StdRng, max_step: f64) {
    let domain = *cloud.domain();
    for i in 0..cloud.len() {
        let mut p = cloud.position(i);
        for c in p.iter_mut() {
            *c += rng.gen_range(-max_step..max_step);
        }
        // Moves leaving a closed axis are rejected
        if domain.contains(&domain.normalize(p)) {
            cloud.set_position(i, p);
        }
    }
}

fn sink_source(
    cloud: &mut PointCloud<3>,
    rng: &mut StdRng,
    sink_radius: f64,
    drift: f64,
    inflow: usize,
) {
    let domain = *cloud.domain();
    let (min, max) = (domain.min(), domain.max());
    let centre = [
        0.5 * (min[0] + max[0]),
        0.5 * (min[1] + max[1]),
        0.5 * (min[2] + max[2]),
    ];

    for i in 0..cloud.len() {
        let p = cloud.position(i);
        let dx = minimum_image(&domain, &p, &centre);
        let dist = norm2(&dx).sqrt();
        if dist > drift {
            let scale = drift / dist;
            cloud.set_position(
                i,
                [p[0] + dx[0] * scale, p[1] + dx[1] * scale, p[2] + dx[2] * scale],
            );
        }
    }

    let r2 = sink_radius * sink_radius;
    let removed = cloud.retain(|p, _| norm2(&minimum_image(&domain, p, &centre)) > r2);
    tracing::debug!("sink removed {} particles", removed);

    let fresh: Vec<[f64; 3]> = (0..inflow).map(|_| random_position(rng, &domain)).collect();
    cloud.extend(fresh);
}

fn packed_insertion(cloud: &mut PointCloud<3>, rng: &mut StdRng, radius: f64, attempts: usize) {
    let domain = *cloud.domain();
    let diameter = 2.0 * radius;
    let mut accepted = 0;
    for _ in 0..attempts {
        let candidate = random_position(rng, &domain);
        let mut overlaps = false;
        cloud
            .query()
            .for_each_neighbour(candidate, diameter, |_, _| overlaps = true);
        if !overlaps {
            cloud.push(candidate);
            accepted += 1;
        }
    }
    tracing::debug!("accepted {}/{} insertions", accepted, attempts);
}

fn check_consistency(cloud: &PointCloud<3>) -> Result<(), String> {
    let search = cloud.search();
    panic::catch_unwind(AssertUnwindSafe(|| search.assert_consistent())).map_err(|payload| {
        payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "consistency check panicked".to_string())
    })?;
    if search.linked_count() != cloud.len() {
        return Err(format!(
            "{} slots linked, {} particles stored",
            search.linked_count(),
            cloud.len()
        ));
    }
    Ok(())
}

/// Validate radius queries against a brute-force search
fn validate_neighbours(
    cloud: &PointCloud<3>,
    check: &NeighbourCheck,
    rng: &mut StdRng,
) -> CheckResult {
    if cloud.is_empty() {
        return CheckResult {
            name: "Neighbour Agreement".to_string(),
            passed: false,
            message: Some("No particles".to_string()),
        };
    }

    let domain = *cloud.domain();
    let radius = check.radius_fraction * smallest_side(cloud);
    let query = cloud.query();
    let mut mismatches = 0;
    let mut total_neighbours = 0;

    for _ in 0..check.samples {
        let i = rng.gen_range(0..cloud.len());
        let centre = cloud.position(i);

        let mut found = BTreeSet::new();
        query.for_each_neighbour(centre, radius, |j, _| {
            found.insert(j);
        });

        let expected: BTreeSet<usize> = (0..cloud.len())
            .filter(|&j| {
                let dx = minimum_image(&domain, &centre, &cloud.position(j));
                norm2(&dx) <= radius * radius
            })
            .collect();

        total_neighbours += expected.len();
        if found != expected {
            mismatches += 1;
            tracing::warn!(
                "slot {}: index found {} neighbours, brute force {}",
                i,
                found.len(),
                expected.len()
            );
        }
    }

    let mean = total_neighbours as f64 / check.samples.max(1) as f64;
    if mismatches == 0 {
        CheckResult {
            name: "Neighbour Agreement".to_string(),
            passed: true,
            message: Some(format!(
                "{} queries, radius {:.3}, mean {:.1} neighbours",
                check.samples, radius, mean
            )),
        }
    } else {
        CheckResult {
            name: "Neighbour Agreement".to_string(),
            passed: false,
            message: Some(format!(
                "{} / {} queries disagree with brute force",
                mismatches, check.samples
            )),
        }
    }
}

/// Validate the final particle count
fn validate_population(cloud: &PointCloud<3>, check: &PopulationCheck) -> CheckResult {
    let n = cloud.len();
    if (check.min..=check.max).contains(&n) {
        CheckResult {
            name: "Population".to_string(),
            passed: true,
            message: Some(format!("{} particles (allowed {}..={})", n, check.min, check.max)),
        }
    } else {
        CheckResult {
            name: "Population".to_string(),
            passed: false,
            message: Some(format!(
                "{} particles outside allowed range {}..={}",
                n, check.min, check.max
            )),
        }
    }
}

/// Validate the minimum pairwise distance
fn validate_separation(cloud: &PointCloud<3>, check: &SeparationCheck) -> CheckResult {
    let domain = *cloud.domain();
    let positions = cloud.positions();
    let mut closest = f64::INFINITY;
    let mut violations = 0;

    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            let d = norm2(&minimum_image(&domain, &positions[i], &positions[j])).sqrt();
            closest = closest.min(d);
            if d < check.min_distance {
                violations += 1;
            }
        }
    }

    if violations == 0 {
        CheckResult {
            name: "Separation".to_string(),
            passed: true,
            message: Some(format!(
                "Closest pair {:.4} (limit: {:.4})",
                closest, check.min_distance
            )),
        }
    } else {
        CheckResult {
            name: "Separation".to_string(),
            passed: false,
            message: Some(format!(
                "{} pairs closer than {:.4} (closest: {:.4})",
                violations, check.min_distance, closest
            )),
        }
    }
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Steps: {}", self.steps);
        println!("Final particles: {}", self.final_particles);
        println!("Elapsed: {:.3} s", self.elapsed);
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}
