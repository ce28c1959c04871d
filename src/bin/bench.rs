//! Benchmark for full-recalculation scoring throughput.
//!
//! Run with: cargo run --release --bin bench

use maintenance_scheduling::constraints::{calculate_score_with, ScoreContext};
use maintenance_scheduling::demo_data::{generate, DemoData};
use std::time::Instant;

fn main() {
    let mut schedule = generate(DemoData::Large);
    let n_assignments = schedule.assignments.len();
    let crew_ids: Vec<u64> = schedule.crews.iter().map(|c| c.id).collect();
    let first_grain = schedule.time_grains.first().map(|g| g.id);

    println!("Benchmark: Score Calculation");
    println!("  Jobs: {}", n_assignments);
    println!("  Crews: {}", crew_ids.len());
    println!("  Time grains: {}", schedule.time_grains.len());
    println!();

    let init_start = Instant::now();
    let ctx = ScoreContext::new(&schedule);
    let initial_score = calculate_score_with(&ctx, &schedule);
    println!("Initial score: {} ({:?})", initial_score, init_start.elapsed());
    println!();

    // Deterministic do/undo cycle for each assignment x crew combination
    let bench_start = Instant::now();
    let mut moves: u64 = 0;

    for index in 0..n_assignments {
        let old = schedule.assignments[index].delta();

        for &crew in &crew_ids {
            let assignment = &mut schedule.assignments[index];
            assignment.assigned_crew = Some(crew);
            assignment.starting_time_grain = first_grain;
            let _ = calculate_score_with(&ctx, &schedule);
            moves += 1;

            schedule.assignments[index].apply(&old);
            let _ = calculate_score_with(&ctx, &schedule);
            moves += 1;
        }
    }

    let elapsed = bench_start.elapsed();
    let moves_per_sec = moves as f64 / elapsed.as_secs_f64();

    println!("Results:");
    println!("  Moves: {}", moves);
    println!("  Time: {:.2?}", elapsed);
    println!("  Moves/sec: {:.0}", moves_per_sec);

    let final_score = calculate_score_with(&ctx, &schedule);
    assert_eq!(initial_score, final_score, "Score corrupted!");
    println!("  Final score: {} (verified)", final_score);
}
