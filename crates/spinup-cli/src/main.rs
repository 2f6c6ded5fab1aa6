mod config;
mod discover;
mod render;

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use spinup_supervisor::{
    candidate_version, installed_version, launch_command, probe_holder, LaunchMode, Launched,
    ServerLayout, Supervisor,
};

use crate::config::LauncherConfig;
use crate::render::{current_output_style, render_section_header, render_status_line, OutputStyle};

#[derive(Parser, Debug)]
#[command(name = "spinup")]
#[command(about = "Launcher for versioned server payloads", long_about = None)]
struct Cli {
    /// Print the command that would be used to run the server, then exit.
    #[arg(long, short = 'n')]
    dry_run: bool,
    /// Stay attached to the terminal instead of detaching the server.
    #[arg(long, short = 'f')]
    foreground: bool,
    /// Configuration file.
    #[arg(long, short = 'c', default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

fn main() -> Result<()> {
    run_cli(Cli::parse())
}

fn run_cli(cli: Cli) -> Result<()> {
    let style = current_output_style();
    let config = LauncherConfig::load(&cli.config)?;
    config.ensure_parent_dirs()?;

    let discovered = discover::discover_payload(&config.extract_dir, config.payload.as_deref())?;
    let layout = ServerLayout::new(&config.extract_dir, &discovered.name);
    let spec = config.launch_spec();

    if let Some(line) = render_section_header(style, &discovered.name) {
        println!("{line}");
    }
    if let Some(pid) = probe_holder(&config.pidfile)? {
        println!(
            "{}",
            render_status_line(style, "step", &format!("existing instance is running (pid {pid})"))
        );
    }
    if let Some(version) = installed_version(&layout.payload_root())? {
        println!(
            "{}",
            render_status_line(style, "step", &format!("installed payload version: {version}"))
        );
    }
    if let Some(candidate) = &discovered.archive {
        // Failures here are surfaced by the supervisor with the proper
        // context; reporting stays best-effort.
        if let Ok(version) = candidate_version(candidate) {
            println!(
                "{}",
                render_status_line(style, "step", &format!("candidate archive version: {version}"))
            );
        }
    }

    if cli.dry_run {
        let argv = launch_command(&layout.server_bin_path(&config.server_bin), &spec);
        println!("{}", format_command_line(&argv));
        return Ok(());
    }

    let supervisor = Supervisor {
        layout,
        pidfile: config.pidfile.clone(),
        server_bin: config.server_bin.clone(),
        shutdown_timeout: config.shutdown_timeout(),
        mode: if cli.foreground {
            LaunchMode::Foreground
        } else {
            LaunchMode::Detached
        },
    };

    let launched = match &discovered.archive {
        Some(candidate) => supervisor.run(&spec, candidate)?,
        None => supervisor.launch_installed(&spec)?,
    };

    for line in format_launch_lines(&launched, style) {
        println!("{line}");
    }
    Ok(())
}

fn format_command_line(argv: &[OsString]) -> String {
    argv.iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_launch_lines(launched: &Launched, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    if launched.reinstalled {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("installed payload {}", launched.version),
        ));
    } else {
        lines.push(render_status_line(
            style,
            "step",
            &format!("payload {} unchanged", launched.version),
        ));
    }

    match &launched.exit {
        None => lines.push(render_status_line(
            style,
            "ok",
            &format!("server started (pid {})", launched.pid),
        )),
        Some(status) if status.success() => lines.push(render_status_line(
            style,
            "ok",
            &format!("server (pid {}) exited cleanly", launched.pid),
        )),
        Some(status) => lines.push(render_status_line(
            style,
            "warn",
            &format!("server (pid {}) exited with {}", launched.pid, status),
        )),
    }
    lines
}
