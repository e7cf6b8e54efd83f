use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pgconverge::config::{DatabaseAction, ExtensionAction, RoleAction, CONFIG_ENV};
use pgconverge::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Converge PostgreSQL databases, roles and extensions")]
struct Cli {
    /// Manifest describing the desired state.
    #[arg(long, short, env = CONFIG_ENV, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply every action in the manifest.
    Converge {
        /// Print the commands that would run instead of running them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the existence checks and print their results.
    Check,
    /// Print the derived server paths for the manifest's platform.
    Paths,
    /// Print a freshly generated password.
    Password,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load(path: Option<&Path>) -> Result<Manifest> {
    let path = path.ok_or_else(|| Error::Config(format!("no manifest given (use --config or {})", CONFIG_ENV)))?;
    Manifest::load(path)
}

fn provisioner(m: &Manifest) -> Provisioner<StdExecutor, OsFilesystem> {
    Provisioner::new(m.platform.clone(), CommandBuilder::new(m.tools.clone()), StdExecutor, OsFilesystem)
        .data_directory(m.data_dir())
}

fn report(what: &str, outcome: Outcome) {
    match outcome {
        Outcome::Applied => println!("{}: applied", what),
        Outcome::Skipped(reason) => println!("{}: skipped ({})", what, reason),
        Outcome::Planned(lines) => {
            println!("{}: would run", what);
            for l in lines { println!("  {}", l); }
        }
    }
}

fn converge(m: &Manifest, dry_run: bool) -> Result<()> {
    let p = provisioner(m).dry_run(dry_run);
    for entry in &m.databases {
        let db = &entry.target;
        for action in entry.action.to_vec() {
            let outcome = match action {
                DatabaseAction::Create => p.create_database(db)?,
                DatabaseAction::Drop => p.drop_database(db)?,
            };
            report(&format!("database {} ({:?})", db.name, action), outcome);
        }
    }
    for entry in &m.roles {
        let role = &entry.target;
        for action in entry.action.to_vec() {
            let outcome = match action {
                RoleAction::Create => p.create_role(role)?,
                RoleAction::Update => p.update_role(role)?,
                RoleAction::Drop => p.drop_role(role)?,
                RoleAction::Grant => p.grant_role(role)?,
            };
            report(&format!("role {} ({:?})", role.name, action), outcome);
        }
    }
    for entry in &m.extensions {
        let ext = &entry.target;
        for action in entry.action.to_vec() {
            let outcome = match action {
                ExtensionAction::Create => p.create_extension(ext)?,
                ExtensionAction::Drop => p.drop_extension(ext)?,
            };
            report(&format!("extension {} ({:?})", ext.name, action), outcome);
        }
    }
    if let Some(server) = &m.server {
        let pending = p.check_restart(server)?;
        println!("server restart pending: {}", pending);
    }
    Ok(())
}

fn check(m: &Manifest) -> Result<()> {
    let p = provisioner(m);
    let probe = p.probe();
    for entry in &m.databases {
        println!("database {}: exists={}", entry.target.name, probe.database_exists(&entry.target.resolved())?);
    }
    for entry in &m.roles {
        println!("role {}: exists={}", entry.target.name, probe.user_exists(&entry.target.resolved())?);
    }
    for entry in &m.extensions {
        let ext = entry.target.resolved();
        println!("extension {} in {}: installed={}", ext.name, ext.database, probe.extension_installed(&ext)?);
    }
    println!("replica: {}", p.is_replica());
    if let Some(server) = &m.server {
        println!("restart pending: {}", probe.needs_restart(&server.conn.effective(), server.database.as_deref())?);
    }
    Ok(())
}

fn paths(m: &Manifest) {
    let ctx = &m.platform;
    println!("platform: {} {}", ctx.family, ctx.version);
    println!("data_dir: {}", ctx.data_dir());
    println!("conf_dir: {}", ctx.conf_dir());
    println!("service: {}", ctx.service_name());
    if let Some(server) = &m.server {
        let s = server.resolve(ctx);
        println!("data_directory: {}", s.data_directory);
        println!("hba_file: {}", s.hba_file);
        println!("ident_file: {}", s.ident_file);
        println!("external_pid_file: {}", s.external_pid_file);
        println!("stats_temp_directory: {}", s.stats_temp_directory);
        println!("port: {}", s.port);
        for (k, v) in &s.custom { println!("{}: {}", k, v); }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Password => {
            println!("{}", generate_password());
            Ok(())
        }
        Command::Paths => {
            paths(&load(cli.config.as_deref())?);
            Ok(())
        }
        Command::Check => check(&load(cli.config.as_deref())?),
        Command::Converge { dry_run } => converge(&load(cli.config.as_deref())?, dry_run),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
