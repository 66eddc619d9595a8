//! Environment health checks with remediation hints.

use anyhow::Result;
use colored::Colorize;
use provision::process::command_exists;

use crate::commands::build_run_context;
use crate::{Context, paths, ui};

struct Issue {
    category: &'static str,
    summary: String,
    fix: Option<String>,
}

pub fn run(_ctx: &Context) -> Result<()> {
    ui::header("Environment Health Check");

    let mut issues: Vec<Issue> = Vec::new();

    check_commands(&mut issues);
    check_catalog(&mut issues);
    check_state_dir(&mut issues);
    check_network(&mut issues);

    println!();
    if issues.is_empty() {
        ui::success("Ready to provision");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}  {} {}",
            format!("{}.", i + 1).bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        println!();
    }
}

fn check_commands(issues: &mut Vec<Issue>) {
    ui::section("External Collaborators");

    let commands = [
        ("apt-get", "Package manager", true),
        ("dpkg-query", "Package state queries", true),
        ("sudo", "Privilege elevation", true),
        ("tmux", "Workspace session setup", false),
    ];

    for (cmd, desc, required) in commands {
        if command_exists(cmd) {
            println!("  {} {} - {}", "✓".green(), cmd, desc.dimmed());
        } else if required {
            println!("  {} {} - {} {}", "✗".red(), cmd, desc, "(missing)".red());
            issues.push(Issue {
                category: "Commands",
                summary: format!("{cmd} is not installed"),
                fix: Some(format!("sudo apt-get install {cmd}")),
            });
        } else {
            println!(
                "  {} {} - {} {}",
                "⚠".yellow(),
                cmd,
                desc,
                "(missing, session steps will fail)".yellow()
            );
        }
    }
}

fn check_catalog(issues: &mut Vec<Issue>) {
    ui::section("Catalog");

    let path = match paths::catalog_path(None) {
        Ok(path) => path,
        Err(e) => {
            issues.push(Issue {
                category: "Catalog",
                summary: format!("cannot resolve catalog path: {e}"),
                fix: None,
            });
            return;
        }
    };

    if !path.exists() {
        println!("  {} {}", "✗".red(), path.display());
        issues.push(Issue {
            category: "Catalog",
            summary: format!("no catalog at {}", path.display()),
            fix: Some("create one, or point OUTFITTER_CATALOG at it".to_string()),
        });
        return;
    }

    match provision::catalog::load(&path) {
        Ok(steps) => {
            println!(
                "  {} {} {}",
                "✓".green(),
                path.display(),
                format!("({} steps)", steps.len()).dimmed()
            );
        }
        Err(e) => {
            println!("  {} {}", "✗".red(), path.display());
            issues.push(Issue {
                category: "Catalog",
                summary: format!("catalog does not validate: {e}"),
                fix: Some("fix the catalog file; no steps will run until it parses".to_string()),
            });
        }
    }
}

fn check_state_dir(issues: &mut Vec<Issue>) {
    ui::section("State");

    match build_run_context() {
        Ok(run_ctx) => {
            println!(
                "  {} account {} on {}",
                "✓".green(),
                run_ctx.account.bold(),
                run_ctx.arch.dimmed()
            );
        }
        Err(e) => issues.push(Issue {
            category: "State",
            summary: format!("cannot build run context: {e}"),
            fix: None,
        }),
    }

    let dir = match paths::state_dir() {
        Ok(dir) => dir,
        Err(e) => {
            issues.push(Issue {
                category: "State",
                summary: format!("cannot resolve state dir: {e}"),
                fix: None,
            });
            return;
        }
    };

    let probe = dir.join(".doctor-probe");
    let writable = std::fs::create_dir_all(&dir).is_ok()
        && std::fs::write(&probe, b"ok").is_ok();
    let _ = std::fs::remove_file(&probe);

    if writable {
        println!("  {} {} {}", "✓".green(), dir.display(), "writable".dimmed());
    } else {
        println!("  {} {}", "✗".red(), dir.display());
        issues.push(Issue {
            category: "State",
            summary: format!("state dir {} is not writable", dir.display()),
            fix: Some("check ownership, or set OUTFITTER_STATE_DIR".to_string()),
        });
    }
}

fn check_network(issues: &mut Vec<Issue>) {
    ui::section("Network");

    match ureq::get("https://github.com").call() {
        Ok(_) => println!("  {} https reachable", "✓".green()),
        Err(e) => {
            println!("  {} https unreachable", "✗".red());
            issues.push(Issue {
                category: "Network",
                summary: format!("cannot reach https endpoints: {e}"),
                fix: Some("fetch steps will fail until connectivity returns".to_string()),
            });
        }
    }
}
