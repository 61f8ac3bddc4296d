use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking all crates...".cyan().bold());
    println!();

    let total_start = Instant::now();

    // Check 1: controller on the hardware target
    println!("{}", "  Checking controller (STM32F407 target)...".cyan());
    let controller_start = Instant::now();

    let controller_output = Command::new("cargo")
        .args([
            "check",
            "-p",
            "controller",
            "--target",
            "thumbv7em-none-eabihf",
            "--features",
            "hardware",
        ])
        .output()
        .context("Failed to check controller build")?;

    if !controller_output.status.success() {
        eprintln!("{}", "  ✗ controller check failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&controller_output.stderr));
        anyhow::bail!("controller check failed");
    }

    println!(
        "{}",
        format!(
            "  ✓ controller check passed in {:.2}s",
            controller_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();

    // Check 2: peripheral on the hardware target
    println!("{}", "  Checking peripheral (STM32F407 target)...".cyan());
    let peripheral_start = Instant::now();

    let peripheral_output = Command::new("cargo")
        .args([
            "check",
            "-p",
            "peripheral",
            "--target",
            "thumbv7em-none-eabihf",
            "--features",
            "hardware",
        ])
        .output()
        .context("Failed to check peripheral build")?;

    if !peripheral_output.status.success() {
        eprintln!("{}", "  ✗ peripheral check failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&peripheral_output.stderr));
        anyhow::bail!("peripheral check failed");
    }

    println!(
        "{}",
        format!(
            "  ✓ peripheral check passed in {:.2}s",
            peripheral_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();

    // Check 3: protocol, no_std, no default features
    println!("{}", "  Checking protocol (no_std)...".cyan());
    let protocol_start = Instant::now();

    let protocol_output = Command::new("cargo")
        .args([
            "check",
            "-p",
            "protocol",
            "--target",
            "thumbv7em-none-eabihf",
            "--no-default-features",
        ])
        .output()
        .context("Failed to check protocol crate")?;

    if !protocol_output.status.success() {
        eprintln!("{}", "  ✗ protocol check failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&protocol_output.stderr));
        anyhow::bail!("protocol check failed");
    }

    println!(
        "{}",
        format!(
            "  ✓ protocol check passed in {:.2}s",
            protocol_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();

    // Check 4: sim, host target (desktop-only crate)
    println!("{}", "  Checking sim (host)...".cyan());
    let sim_start = Instant::now();

    let sim_output = Command::new("cargo")
        .args(["check", "-p", "sim"])
        .output()
        .context("Failed to check sim crate")?;

    if !sim_output.status.success() {
        eprintln!("{}", "  ✗ sim check failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&sim_output.stderr));
        anyhow::bail!("sim check failed");
    }

    println!(
        "{}",
        format!(
            "  ✓ sim check passed in {:.2}s",
            sim_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();

    // Check 5: clippy lints
    println!("{}", "  Running clippy lints...".cyan());
    let clippy_start = Instant::now();

    let clippy_output = Command::new("cargo")
        .args([
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ])
        .output()
        .context("Failed to run clippy")?;

    if !clippy_output.status.success() {
        eprintln!("{}", "  ✗ Clippy warnings found".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&clippy_output.stderr));
        anyhow::bail!("Clippy check failed");
    } else {
        println!(
            "{}",
            format!(
                "  ✓ Clippy passed in {:.2}s",
                clippy_start.elapsed().as_secs_f64()
            )
            .green()
        );
    }
    println!();

    // Check 6: format check
    println!("{}", "  Checking code formatting...".cyan());

    let fmt_output = Command::new("cargo")
        .args(["fmt", "--all", "--check"])
        .output()
        .context("Failed to run cargo fmt")?;

    if !fmt_output.status.success() {
        eprintln!("{}", "  ✗ Formatting issues found".red().bold());
        eprintln!("     Run 'cargo fmt --all' to fix");
        anyhow::bail!("Format check failed");
    } else {
        println!("{}", "  ✓ Formatting check passed".green());
    }
    println!();

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
