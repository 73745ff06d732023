//! Scenario driver for the rtsim simulator.
//!
//! Accepts a single argument: `1`..`8` runs one named scenario, `all`
//! runs every scenario in order. A missing or unrecognized argument
//! prints usage and exits 1.
use clap::Parser;

use rtsim_render::{render, RenderOptions};

mod scenarios;

use scenarios::ScenarioReport;

/// Drive one or all of the rtsim end-to-end scenarios and print an ASCII
/// report of the resulting simulation trace.
#[derive(Parser, Debug)]
#[command(name = "rtsim", version, about)]
struct Args {
    /// Scenario number (1-8) or "all".
    scenario: Option<String>,
}

fn run_all() -> Vec<ScenarioReport> {
    vec![
        scenarios::scenario_1(),
        scenarios::scenario_2(),
        scenarios::scenario_3(),
        scenarios::scenario_4(),
        scenarios::scenario_5(),
        scenarios::scenario_6(),
        scenarios::scenario_7(),
        scenarios::scenario_8(),
    ]
}

fn run_one(n: u8) -> Option<ScenarioReport> {
    Some(match n {
        1 => scenarios::scenario_1(),
        2 => scenarios::scenario_2(),
        3 => scenarios::scenario_3(),
        4 => scenarios::scenario_4(),
        5 => scenarios::scenario_5(),
        6 => scenarios::scenario_6(),
        7 => scenarios::scenario_7(),
        8 => scenarios::scenario_8(),
        _ => return None,
    })
}

fn print_report(index: usize, report: &ScenarioReport) -> bool {
    println!("=== scenario {index}: {} ===", report.name);
    print!("{}", render(&report.sched, RenderOptions::default()));
    if report.passed() {
        println!("PASS");
    } else {
        println!("FAIL");
        for failure in &report.failures {
            println!("  - {failure}");
        }
    }
    println!();
    report.passed()
}

fn print_usage() {
    eprintln!("usage: rtsim <1..8|all>");
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let reports: Vec<ScenarioReport> = match args.scenario.as_deref() {
        Some("all") => run_all(),
        Some(s) => match s.parse::<u8>().ok().and_then(run_one) {
            Some(report) => vec![report],
            None => {
                print_usage();
                std::process::exit(1);
            }
        },
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    let mut all_passed = true;
    for (i, report) in reports.iter().enumerate() {
        all_passed &= print_report(i + 1, report);
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
