//! Colorful console output for solver metrics.
//!
//! Everything here is a no-op unless the `console` feature is enabled.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::time::{Duration, Instant};

use crate::score::HardSoftScore;

/// Returns true when console output is compiled in.
pub const fn enabled() -> bool {
    cfg!(feature = "console")
}

/// ASCII art banner for server startup.
pub fn print_banner() {
    if !enabled() {
        return;
    }
    let banner = r#"
  ____        _                _____
 / ___|  ___ | |_   _____ _ __|  ___|__  _ __ __ _  ___
 \___ \ / _ \| \ \ / / _ \ '__| |_ / _ \| '__/ _` |/ _ \
  ___) | (_) | |\ V /  __/ |  |  _| (_) | | | (_| |  __/
 |____/ \___/|_| \_/ \___|_|  |_|  \___/|_|  \__, |\___|
                                             |___/
"#;
    println!("{}", banner.cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "Maintenance Scheduling".bright_cyan()
    );
}

/// Prints the problem size of a solve.
pub fn print_config(schedule_id: u64, crews: usize, jobs: usize, time_grains: usize) {
    if !enabled() {
        return;
    }
    println!(
        "{} {} {} Problem ({}): crews ({}), jobs ({}), time grains ({}), problem scale ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Solver]".bright_cyan(),
        schedule_id.to_string().white(),
        crews.to_formatted_string(&Locale::en).bright_yellow(),
        jobs.to_formatted_string(&Locale::en).bright_yellow(),
        time_grains.to_formatted_string(&Locale::en).bright_yellow(),
        calculate_problem_scale(jobs, crews * time_grains).bright_magenta()
    );
}

/// Prints "Solving started" message.
pub fn print_solving_started(time_spent: Duration, best_score: HardSoftScore) {
    if !enabled() {
        return;
    }
    println!(
        "{} {} {} Solving started: time spent ({}), best score ({}), random ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Solver]".bright_cyan(),
        format_duration(time_spent).yellow(),
        format_score(best_score),
        "StdRng".white()
    );
}

/// Prints a phase start message.
pub fn print_phase_start(phase_name: &str, phase_index: usize) {
    if !enabled() {
        return;
    }
    println!(
        "{} {} {} {} phase ({}) started",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[{}]", phase_name).bright_cyan(),
        phase_name.white().bold(),
        phase_index.to_string().yellow()
    );
}

/// Prints a phase end message with metrics.
pub fn print_phase_end(
    phase_name: &str,
    phase_index: usize,
    duration: Duration,
    steps_accepted: u64,
    moves_evaluated: u64,
    best_score: Option<HardSoftScore>,
) {
    if !enabled() {
        return;
    }
    let acceptance_rate = if moves_evaluated > 0 {
        (steps_accepted as f64 / moves_evaluated as f64) * 100.0
    } else {
        0.0
    };
    let best = best_score.map_or_else(|| "-".to_string(), format_score);

    println!(
        "{} {} {} {} phase ({}) ended: time spent ({}), best score ({}), move evaluation speed ({}/sec), step total ({}, {:.1}% accepted)",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[{}]", phase_name).bright_cyan(),
        phase_name.white().bold(),
        phase_index.to_string().yellow(),
        format_duration(duration).yellow(),
        best,
        moves_per_sec(moves_evaluated, duration)
            .to_formatted_string(&Locale::en)
            .bright_magenta()
            .bold(),
        steps_accepted.to_formatted_string(&Locale::en).white(),
        acceptance_rate
    );
}

/// Prints solver completion summary.
pub fn print_solving_ended(
    total_duration: Duration,
    total_moves: u64,
    phase_count: usize,
    final_score: HardSoftScore,
) {
    if !enabled() {
        return;
    }
    let speed = moves_per_sec(total_moves, total_duration);

    println!(
        "{} {} {} Solving ended: time spent ({}), best score ({}), move evaluation speed ({}/sec), phase total ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Solver]".bright_cyan(),
        format_duration(total_duration).yellow(),
        format_score(final_score),
        speed.to_formatted_string(&Locale::en).bright_magenta().bold(),
        phase_count.to_string().white()
    );

    // Summary box: 60 chars wide, 56 char content area
    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════╗".bright_cyan());

    let status_text = if final_score.is_feasible() {
        "✓ FEASIBLE SCHEDULE FOUND"
    } else {
        "✗ INFEASIBLE (hard constraints violated)"
    };
    let status_colored = if final_score.is_feasible() {
        status_text.bright_green().bold().to_string()
    } else {
        status_text.bright_red().bold().to_string()
    };
    let status_padding = 56usize.saturating_sub(status_text.chars().count());
    let left_pad = status_padding / 2;
    let right_pad = status_padding - left_pad;
    println!(
        "{}{}{}{}{}",
        "║".bright_cyan(),
        " ".repeat(left_pad),
        status_colored,
        " ".repeat(right_pad),
        "║".bright_cyan()
    );

    println!("{}", "╠══════════════════════════════════════════════════════════╣".bright_cyan());
    for (label, value) in [
        ("Final Score:", final_score.to_string()),
        ("Solving Time:", format!("{:.2}s", total_duration.as_secs_f64())),
        ("Move Speed:", format!("{}/sec", speed.to_formatted_string(&Locale::en))),
    ] {
        println!(
            "{}  {:<18}{:>36}  {}",
            "║".bright_cyan(),
            label,
            value,
            "║".bright_cyan()
        );
    }
    println!("{}", "╚══════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}

fn moves_per_sec(moves: u64, duration: Duration) -> u64 {
    if duration.as_secs_f64() > 0.0 {
        (moves as f64 / duration.as_secs_f64()) as u64
    } else {
        0
    }
}

/// Formats a duration nicely.
fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let mins = total_ms / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

/// Formats a score with colors based on feasibility.
fn format_score(score: HardSoftScore) -> String {
    let hard = format!("{}hard", score.hard());
    let hard = if score.hard() < 0 {
        hard.bright_red().to_string()
    } else {
        hard.bright_green().to_string()
    };

    let soft = format!("{}soft", score.soft());
    let soft = match score.soft() {
        s if s < 0 => soft.yellow().to_string(),
        0 => soft.white().to_string(),
        _ => soft.bright_green().to_string(),
    };

    format!("{}/{}", hard, soft)
}

/// Returns a timestamp string.
fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Approximate problem scale: `value_count ^ entity_count`.
fn calculate_problem_scale(entity_count: usize, value_count: usize) -> String {
    if entity_count == 0 || value_count == 0 {
        return "0".to_string();
    }

    let log_scale = (entity_count as f64) * (value_count as f64).log10();
    let exponent = log_scale.floor() as i32;
    let mantissa = 10f64.powf(log_scale - exponent as f64);

    format!("{:.3} × 10^{}", mantissa, exponent)
}

/// A timer for tracking phase durations and move counts.
pub struct PhaseTimer {
    start: Instant,
    phase_name: &'static str,
    phase_index: usize,
    steps_accepted: u64,
    moves_evaluated: u64,
    best_score: Option<HardSoftScore>,
}

impl PhaseTimer {
    pub fn start(phase_name: &'static str, phase_index: usize) -> Self {
        print_phase_start(phase_name, phase_index);
        Self {
            start: Instant::now(),
            phase_name,
            phase_index,
            steps_accepted: 0,
            moves_evaluated: 0,
            best_score: None,
        }
    }

    pub fn record_accepted(&mut self, best_score: HardSoftScore) {
        self.steps_accepted += 1;
        self.best_score = Some(best_score);
    }

    pub fn record_move(&mut self) {
        self.moves_evaluated += 1;
    }

    pub fn moves_evaluated(&self) -> u64 {
        self.moves_evaluated
    }

    pub fn steps_accepted(&self) -> u64 {
        self.steps_accepted
    }

    pub fn finish(self) {
        print_phase_end(
            self.phase_name,
            self.phase_index,
            self.start.elapsed(),
            self.steps_accepted,
            self.moves_evaluated,
            self.best_score,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_scale() {
        assert_eq!(calculate_problem_scale(0, 10), "0");
        assert_eq!(calculate_problem_scale(2, 10), "1.000 × 10^2");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_phase_timer_counts() {
        let mut timer = PhaseTimer::start("ConstructionHeuristic", 0);
        timer.record_move();
        timer.record_move();
        timer.record_accepted(HardSoftScore::of(0, -3));
        assert_eq!(timer.moves_evaluated(), 2);
        assert_eq!(timer.steps_accepted(), 1);
        timer.finish();
    }
}
