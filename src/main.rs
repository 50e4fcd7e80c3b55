use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use std::process::ExitCode;

use chart_defaults::db::{deactivate_membership, find_business};
use chart_defaults::logging::init_tracing;
use chart_defaults::{
    add_membership, create_business, import_csv, open_database, Config, DefaultsError,
    DefaultsService, Role,
};

const USAGE: &str = "\
Usage: chart-defaults <command>

  init                                 create the database
  add-business <user> <name>           create a business owned by <user>
  select-business <user> <business>    act for another business <user> belongs to
  leave-business <user> <business>     end <user>'s membership in <business>
  seed <user>                          add missing default categories
  rebuild <user> --confirm REBUILD     replace the chart (no transactions only)
  status <user>                        show defaults status
  chart <user>                         print the chart of accounts
  import <user> <csv> [--dry-run]      import ledger transactions

Flags may appear anywhere after the command.";

const EXIT_FAILURE: u8 = 1;
/// Refusals the user can act on: blocked rebuild, missing confirmation, no access.
const EXIT_REFUSED: u8 = 2;

fn main() -> ExitCode {
    let config = Config::from_env();
    init_tracing(&config.log_filter);

    let args: Vec<String> = env::args().skip(1).collect();

    match run(&config, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(report(&err)),
    }
}

fn run(config: &Config, args: &[String]) -> Result<()> {
    let command = args.first().map(String::as_str).unwrap_or("help");
    let rest = CliArgs::parse(args.get(1..).unwrap_or_default());

    match command {
        "init" => run_init(config),
        "add-business" => run_add_business(config, &rest),
        "select-business" => run_select_business(config, &rest),
        "leave-business" => run_leave_business(config, &rest),
        "seed" => run_seed(config, &rest),
        "rebuild" => run_rebuild(config, &rest),
        "status" => run_status(config, &rest),
        "chart" => run_chart(config, &rest),
        "import" => run_import(config, &rest),
        _ => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}

/// Print the failure and pick the exit status. Runs after every open
/// connection has been dropped.
fn report(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<DefaultsError>() {
        Some(DefaultsError::GuardViolation { .. }) => {
            eprintln!("❌ Rebuild blocked");
            eprintln!("   {}", err);
            EXIT_REFUSED
        }
        Some(DefaultsError::ConfirmationRequired) => {
            eprintln!("❌ Rebuild deletes every category of the business.");
            eprintln!("   Re-run with: --confirm REBUILD");
            EXIT_REFUSED
        }
        Some(e) if e.is_user_facing() => {
            eprintln!("❌ {}", e);
            EXIT_REFUSED
        }
        _ => {
            eprintln!("❌ {:#}", err);
            EXIT_FAILURE
        }
    }
}

// ============================================================================
// Argument parsing
// ============================================================================

/// Command arguments with flags pulled out, wherever they were given.
#[derive(Debug, Default, PartialEq)]
struct CliArgs<'a> {
    positional: Vec<&'a str>,
    confirm: Option<&'a str>,
    dry_run: bool,
}

impl<'a> CliArgs<'a> {
    fn parse(args: &'a [String]) -> Self {
        let mut parsed = CliArgs::default();
        let mut iter = args.iter().map(String::as_str);

        while let Some(arg) = iter.next() {
            match arg {
                "--dry-run" => parsed.dry_run = true,
                "--confirm" => parsed.confirm = Some(iter.next().unwrap_or("")),
                _ => match arg.strip_prefix("--confirm=") {
                    Some(value) => parsed.confirm = Some(value),
                    None => parsed.positional.push(arg),
                },
            }
        }

        parsed
    }

    fn arg(&self, index: usize, name: &str) -> Result<&'a str> {
        match self.positional.get(index) {
            Some(value) => Ok(*value),
            None => bail!("missing <{}> argument", name),
        }
    }

    fn id(&self, index: usize, name: &str) -> Result<i64> {
        let raw = self.arg(index, name)?;
        raw.parse()
            .with_context(|| format!("invalid {} id '{}'", name, raw))
    }

    fn user(&self) -> Result<i64> {
        self.id(0, "user")
    }
}

// ============================================================================
// Commands
// ============================================================================

fn open(config: &Config) -> Result<rusqlite::Connection> {
    open_database(config)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))
}

fn run_init(config: &Config) -> Result<()> {
    println!("🔧 Setting up database...");
    open(config)?;
    println!("✓ Database ready: {}", config.database_path.display());
    Ok(())
}

fn run_add_business(config: &Config, args: &CliArgs) -> Result<()> {
    let user_id = args.user()?;
    let name = args.positional.get(1..).unwrap_or_default().join(" ");
    if name.trim().is_empty() {
        bail!("missing <name> argument");
    }

    let conn = open(config)?;
    let business = create_business(&conn, name.trim())?;
    add_membership(&conn, business.id, user_id, Role::Owner)?;

    println!("✓ Created business #{} '{}' ({})", business.id, business.name, business.slug);
    println!("  Owner: user {}", user_id);
    Ok(())
}

fn run_select_business(config: &Config, args: &CliArgs) -> Result<()> {
    let user_id = args.user()?;
    let business_id = args.id(1, "business")?;

    let mut conn = open(config)?;
    let business = DefaultsService::new(&mut conn).select_business(user_id, business_id)?;

    println!("✓ User {} now acts for business #{} '{}'", user_id, business.id, business.name);
    Ok(())
}

fn run_leave_business(config: &Config, args: &CliArgs) -> Result<()> {
    let user_id = args.user()?;
    let business_id = args.id(1, "business")?;

    let conn = open(config)?;
    let business = find_business(&conn, business_id)?
        .with_context(|| format!("business #{} not found", business_id))?;
    if !deactivate_membership(&conn, business.id, user_id)? {
        bail!("user {} is not a member of business #{}", user_id, business.id);
    }

    println!("✓ User {} left business #{} '{}'", user_id, business.id, business.name);
    Ok(())
}

fn run_seed(config: &Config, args: &CliArgs) -> Result<()> {
    let user_id = args.user()?;
    let mut conn = open(config)?;
    let mut service = DefaultsService::new(&mut conn);

    println!("🌱 Seeding default chart of accounts...");
    let outcome = service.seed_defaults(user_id)?;

    if outcome.already_seeded {
        println!("✓ Re-seeded (missing items filled in)");
    } else {
        println!("✓ Seeded");
    }
    println!("  Categories created:     {}", outcome.result.categories_created);
    println!("  Sub-categories created: {}", outcome.result.subcategories_created);
    println!("  Catalog version:        {}", outcome.result.catalog_version);
    Ok(())
}

fn run_rebuild(config: &Config, args: &CliArgs) -> Result<()> {
    let user_id = args.user()?;
    let mut conn = open(config)?;
    let mut service = DefaultsService::new(&mut conn);

    println!("♻️  Rebuilding chart of accounts...");
    let result = service.rebuild_defaults(user_id, args.confirm.unwrap_or(""))?;

    println!("✓ Rebuild complete");
    println!(
        "  Deleted: {} categories, {} sub-categories",
        result.categories_deleted, result.subcategories_deleted
    );
    println!(
        "  Created: {} categories, {} sub-categories",
        result.categories_created, result.subcategories_created
    );
    Ok(())
}

fn run_status(config: &Config, args: &CliArgs) -> Result<()> {
    let user_id = args.user()?;
    let mut conn = open(config)?;
    let service = DefaultsService::new(&mut conn);
    let status = service.defaults_status(user_id)?;

    println!("📊 Defaults status for business #{}", status.business_id);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Seeded:          {}", yes_no(status.has_seeded));
    println!("  Can rebuild:     {}", yes_no(status.can_rebuild));
    println!("  Categories:      {}", status.category_count);
    println!("  Sub-categories:  {}", status.subcategory_count);
    println!("  Transactions:    {}", status.transaction_count);
    match status.applied_catalog_version {
        Some(version) => println!(
            "  Catalog:         v{} (current v{})",
            version, status.current_catalog_version
        ),
        None => println!("  Catalog:         never applied (current v{})", status.current_catalog_version),
    }

    if !status.pending_additions.is_empty() {
        println!("\n⚠️  {} catalog additions not applied yet:", status.pending_additions.len());
        for addition in &status.pending_additions {
            match addition.subcategory {
                Some(sub) => println!("  + {} → {}", addition.category, sub),
                None => println!("  + {}", addition.category),
            }
        }
        println!("  Run `chart-defaults seed {}` to add them.", user_id);
    }
    Ok(())
}

fn run_chart(config: &Config, args: &CliArgs) -> Result<()> {
    let user_id = args.user()?;
    let mut conn = open(config)?;
    let chart = DefaultsService::new(&mut conn).chart(user_id)?;

    if chart.is_empty() {
        println!("No categories yet. Run `chart-defaults seed {}`.", user_id);
        return Ok(());
    }

    for entry in &chart {
        let line = match entry.category.schedule_c() {
            Some(line) => format!("{} {}", line.part(), line.code()),
            None => "-".to_string(),
        };
        println!("{:<45} [{}] {}", entry.category.name, line, entry.category.category_type.as_str());
        for sub in &entry.subcategories {
            let sub_line = entry.effective_schedule_c_line(sub).unwrap_or("-");
            println!("   └─ {:<40} [{}]", sub.name, sub_line);
        }
    }
    Ok(())
}

fn run_import(config: &Config, args: &CliArgs) -> Result<()> {
    let user_id = args.user()?;
    let csv_path = args.arg(1, "csv")?;
    let dry_run = args.dry_run;

    let mut conn = open(config)?;
    let business = DefaultsService::new(&mut conn).resolve_business(user_id)?;

    println!("📂 Importing {}{}", csv_path, if dry_run { " (dry run)" } else { "" });
    let report = import_csv(&mut conn, &business, Path::new(csv_path), dry_run)
        .with_context(|| format!("Failed to import {}", csv_path))?;

    println!("✓ Rows read: {}", report.rows_read);
    println!("✓ {}: {}", if dry_run { "Valid" } else { "Imported" }, report.imported);
    if !report.is_clean() {
        println!("⚠️  {} rows skipped:", report.errors.len());
        for row in &report.errors {
            println!("   line {}: {}", row.line, row.message);
        }
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_flags_anywhere() {
        let before = strings(&["1", "--dry-run", "ledger.csv"]);
        let after = strings(&["1", "ledger.csv", "--dry-run"]);

        for args in [&before, &after] {
            let parsed = CliArgs::parse(args);
            assert!(parsed.dry_run);
            assert_eq!(parsed.positional, vec!["1", "ledger.csv"]);
            assert_eq!(parsed.arg(1, "csv").unwrap(), "ledger.csv");
        }
    }

    #[test]
    fn test_confirm_value_is_not_positional() {
        let leading = strings(&["--confirm", "REBUILD", "7"]);
        let inline = strings(&["7", "--confirm=REBUILD"]);

        for args in [&leading, &inline] {
            let parsed = CliArgs::parse(args);
            assert_eq!(parsed.confirm, Some("REBUILD"));
            assert_eq!(parsed.user().unwrap(), 7);
        }

        let dangling = strings(&["7", "--confirm"]);
        assert_eq!(CliArgs::parse(&dangling).confirm, Some(""));
    }

    #[test]
    fn test_missing_and_invalid_ids() {
        let empty: Vec<String> = Vec::new();
        assert!(CliArgs::parse(&empty).user().is_err());

        let bad = strings(&["seven"]);
        let err = CliArgs::parse(&bad).user().unwrap_err();
        assert!(err.to_string().contains("invalid user id"));
    }

    #[test]
    fn test_refusals_map_to_refused_status() {
        let blocked = anyhow::Error::new(DefaultsError::GuardViolation { transactions: 2 });
        let unconfirmed = anyhow::Error::new(DefaultsError::ConfirmationRequired);
        let no_access =
            anyhow::Error::new(DefaultsError::Authorization { user_id: 9 }).context("seed failed");
        let fault = anyhow::anyhow!("disk on fire");

        assert_eq!(report(&blocked), EXIT_REFUSED);
        assert_eq!(report(&unconfirmed), EXIT_REFUSED);
        assert_eq!(report(&no_access), EXIT_REFUSED);
        assert_eq!(report(&fault), EXIT_FAILURE);
    }
}
