//! Reference test binary entry point
//!
//! Runs every reference scenario and exits non-zero if any check fails.

use reference_tests::{
    ExpectedResult, NeighbourCheck, PopulationCheck, ReferenceTest, Scenario, SeparationCheck,
    TestResult,
};
use tracing_subscriber::EnvFilter;

/// Periodic random walk
///
/// Particles diffuse through a fully periodic box and cross every seam
/// many times; radius queries must still agree with brute force.
fn random_walk_test() -> ReferenceTest {
    ReferenceTest {
        name: "Periodic Random Walk".to_string(),
        config_path: "configs/random-walk-periodic.json".to_string(),
        initial_particles: 4000,
        steps: 500,
        seed: 1,
        scenario: Scenario::RandomWalk { step: 0.3 },
        expected: ExpectedResult {
            consistency: true,
            neighbour_agreement: Some(NeighbourCheck {
                samples: 500,
                radius_fraction: 1.0,
            }),
            population: Some(PopulationCheck { min: 4000, max: 4000 }),
            separation: None,
        },
    }
}

/// Sink/source churn
///
/// Particles flow into a central sink and are replaced at random, so the
/// index sees removals, relocations and appends every step.
fn sink_source_test() -> ReferenceTest {
    ReferenceTest {
        name: "Sink/Source Churn".to_string(),
        config_path: "configs/sink-source.json".to_string(),
        initial_particles: 2000,
        steps: 1000,
        seed: 2,
        scenario: Scenario::SinkSource {
            sink_radius: 1.5,
            drift: 0.05,
            inflow: 20,
        },
        expected: ExpectedResult {
            consistency: true,
            neighbour_agreement: Some(NeighbourCheck {
                samples: 300,
                radius_fraction: 0.8,
            }),
            population: Some(PopulationCheck { min: 100, max: 20_000 }),
            separation: None,
        },
    }
}

/// Packed insertion
///
/// Rejection sampling of hard spheres using radius queries; no accepted
/// pair may overlap.
fn packed_insertion_test() -> ReferenceTest {
    ReferenceTest {
        name: "Packed Insertion".to_string(),
        config_path: "configs/packed-insertion.json".to_string(),
        initial_particles: 0,
        steps: 200,
        seed: 3,
        scenario: Scenario::PackedInsertion {
            radius: 0.25,
            attempts: 100,
        },
        expected: ExpectedResult {
            consistency: true,
            neighbour_agreement: Some(NeighbourCheck {
                samples: 200,
                radius_fraction: 1.0,
            }),
            population: Some(PopulationCheck { min: 500, max: 20_000 }),
            separation: Some(SeparationCheck { min_distance: 0.5 }),
        },
    }
}

/// Get all reference tests
fn all_tests() -> Vec<ReferenceTest> {
    vec![random_walk_test(), sink_source_test(), packed_insertion_test()]
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    tracing::info!("Bucket Search Reference Suite");
    tracing::info!("=============================");

    let tests = all_tests();
    tracing::info!("Found {} reference tests", tests.len());

    let mut results: Vec<TestResult> = Vec::new();
    let mut passed_count = 0;
    let mut failed_count = 0;

    for test in tests {
        match test.run() {
            Ok(result) => {
                if result.passed {
                    passed_count += 1;
                } else {
                    failed_count += 1;
                }
                result.print_summary();
                results.push(result);
            }
            Err(e) => {
                eprintln!("\nERROR running test {}: {}", test.name, e);
                failed_count += 1;
            }
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("OVERALL SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Total tests: {}", results.len());
    println!("Passed: {}", passed_count);
    println!("Failed: {}", failed_count);
    println!("{}", "=".repeat(80));

    // Exit with error code if any tests failed
    if failed_count > 0 {
        std::process::exit(1);
    }
}
