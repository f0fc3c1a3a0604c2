//! `synth` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server.
//! - `migrate`  — run pending database migrations.
//! - `validate` — validate a workflow JSON file for activation.
//! - `plans`    — print the plan table.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use entitlements::{entitlement_value, Entitlement, EntitlementPolicy, EntitlementValue, PlanId};

#[derive(Parser)]
#[command(
    name = "synth",
    about = "Natural-language workflow automation backend",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "SYNTH_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        #[arg(long, env = "SYNTH_MAX_CONNECTIONS", default_value_t = 10)]
        max_connections: u32,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: std::path::PathBuf,
        /// Name the workflow would be activated under.
        #[arg(long, default_value = "untitled")]
        name: String,
    },
    /// Print every plan's entitlements.
    Plans,
}

/// Entitlement policy switches.
#[derive(Args, Debug)]
struct PolicyArgs {
    /// Plan granted while a trial is running, or `none` to bill trials as
    /// their stored plan.
    #[arg(long, env = "SYNTH_TRIAL_PLAN", default_value = "agency")]
    trial_plan: String,
    /// Keep paid access while a payment is past due.
    #[arg(long, env = "SYNTH_PAST_DUE_GRACE", default_value_t = false)]
    past_due_grace: bool,
}

impl PolicyArgs {
    fn into_policy(self) -> anyhow::Result<EntitlementPolicy> {
        let trial_plan = match self.trial_plan.as_str() {
            "none" | "" => None,
            name => Some(name.parse::<PlanId>()?),
        };
        Ok(EntitlementPolicy {
            trial_plan,
            past_due_grants_access: self.past_due_grace,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, database_url, max_connections, policy } => {
            let policy = policy.into_policy()?;
            info!(?policy, "starting API server on {bind}");
            let pool = db::pool::create_pool(&database_url, max_connections)
                .await
                .context("failed to connect to database")?;
            api::serve(&bind, api::AppState::new(pool, policy)).await?;
        }
        Command::Migrate { database_url } => {
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("migrations applied successfully");
        }
        Command::Validate { path, name } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content).context("invalid JSON")?;
            let definition = workflows::WorkflowDefinition::from_value(&value)?;

            match workflows::validate_for_activation(&name, &definition) {
                Ok(order) => {
                    println!("✅ Workflow is valid. Execution order: {order:?}");
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Plans => print_plans(),
    }

    Ok(())
}

fn print_plans() {
    print!("{:<24}", "entitlement");
    for plan in PlanId::ALL {
        print!("{:>12}", plan.as_str());
    }
    println!();

    for entitlement in Entitlement::ALL {
        print!("{:<24}", entitlement.as_str());
        for plan in PlanId::ALL {
            let cell = match entitlement_value(plan, entitlement) {
                EntitlementValue::Flag(true) => "yes".to_owned(),
                EntitlementValue::Flag(false) => "no".to_owned(),
                EntitlementValue::Ceiling(Some(n)) => n.to_string(),
                EntitlementValue::Ceiling(None) => "unlimited".to_owned(),
            };
            print!("{cell:>12}");
        }
        println!();
    }
}
