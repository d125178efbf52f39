mod output;
mod prompt;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use crash::{BranchDirectory, BranchId, CrashDuration, CrashError, CrashIntensity};
use crash_core::{
    BranchWorkflow, Clock, Collaborators, ConsoleConfig, CrashBroadcast, DismissReason,
    HttpBackend, NoopBackground, SystemClock, TokioScheduler, WorkflowSettings,
};
use log::{debug, info};
use output::ConsoleNotifier;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "crash-console")]
#[command(about = "Operator console for branch market crashes")]
struct Cli {
    /// Path to a TOML config file (defaults to ./crash-console.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every branch with its crash status
    Branches,
    /// Show whether any branch is crashing right now
    Status,
    /// Follow a branch's crash countdown until it ends
    Watch {
        /// Branch ID
        #[arg(short, long)]
        branch: String,
    },
    /// Trigger a market crash on a branch
    Trigger {
        /// Branch ID
        #[arg(short, long)]
        branch: String,
        /// Percent toward floor price (20, 35, 50, 75 or 90)
        #[arg(short, long)]
        intensity: Option<u32>,
        /// Minutes (5, 10, 15, 30 or 60)
        #[arg(short, long)]
        duration: Option<u32>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// End the market crash running on a branch
    End {
        /// Branch ID
        #[arg(short, long)]
        branch: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

struct Console {
    backend: Arc<HttpBackend>,
    broadcast: CrashBroadcast,
    notifier: Arc<ConsoleNotifier>,
    workflow: BranchWorkflow,
}

impl Console {
    fn new(config: &ConsoleConfig) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(config).context("Failed to set up backend client")?);
        info!("Using pricing backend at {}", backend.base_url());

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let broadcast = CrashBroadcast::new(backend.clone(), clock.clone(), config.poll_interval());
        let notifier = Arc::new(ConsoleNotifier::default());
        let workflow = BranchWorkflow::new(
            Collaborators {
                directory: backend.clone(),
                pricing: backend.clone(),
                notifier: notifier.clone(),
                clock,
                scheduler: Arc::new(TokioScheduler),
                background: Arc::new(NoopBackground),
            },
            broadcast.clone(),
            WorkflowSettings::from(config),
        );

        Ok(Self {
            backend,
            broadcast,
            notifier,
            workflow,
        })
    }

    fn exit_code(&self) -> ExitCode {
        if self.notifier.errors() == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    async fn branches(&self) -> Result<ExitCode> {
        let branches = self
            .backend
            .list_branches()
            .await
            .context("Failed to list branches")?;
        output::print_branches(&branches, SystemClock.now());
        Ok(ExitCode::SUCCESS)
    }

    async fn status(&self) -> Result<ExitCode> {
        let snapshot = self
            .broadcast
            .refresh()
            .await
            .context("Failed to refresh crash status")?;
        output::print_snapshot(&snapshot);
        Ok(ExitCode::SUCCESS)
    }

    async fn select(&self, branch: String) -> Result<bool> {
        match self.workflow.select_branch(BranchId::new(branch)).await {
            Ok(Some(state)) => {
                debug!("Loaded branch {}", state.branch_id());
                Ok(true)
            }
            Ok(None) => Err(anyhow!("Branch selection was superseded")),
            // Already reported by the workflow.
            Err(_) => Ok(false),
        }
    }

    /// Runs one gated mutation: open the gate, ask, then confirm or dismiss.
    async fn mutate<F>(&self, branch: String, yes: bool, request: F) -> Result<ExitCode>
    where
        F: FnOnce(&BranchWorkflow) -> Result<(), CrashError>,
    {
        if !self.select(branch).await? || request(&self.workflow).is_err() {
            return Ok(self.exit_code());
        }

        let intent = self
            .workflow
            .gate()
            .pending()
            .ok_or_else(|| anyhow!("Confirmation gate did not open"))?;
        let confirmed = yes || prompt::ask(intent.prompt()).await?;

        if confirmed {
            self.workflow.confirm().await;
        } else {
            self.workflow.dismiss(DismissReason::Escape);
            println!("Cancelled, nothing was changed");
        }

        if let Some(view) = self.workflow.view() {
            output::print_view(&view);
        }
        self.workflow.close();
        Ok(self.exit_code())
    }

    async fn watch(&self, branch: String) -> Result<ExitCode> {
        self.broadcast.init();
        let mut global = self.broadcast.subscribe();
        if !self.select(branch).await? {
            return Ok(self.exit_code());
        }

        let mut views = self.workflow.subscribe_view();
        if let Some(view) = views.borrow_and_update().clone() {
            output::print_view(&view);
            if !view.state().active() {
                self.workflow.close();
                return Ok(ExitCode::SUCCESS);
            }
        }

        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);

        loop {
            tokio::select! {
                changed = views.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let Some(view) = views.borrow_and_update().clone() else {
                        break;
                    };
                    if view.state().active() {
                        output::print_countdown(&view);
                    } else {
                        output::print_view(&view);
                        break;
                    }
                }
                snapshot = global.changed() => match snapshot {
                    Some(snapshot) => output::print_snapshot(&snapshot),
                    None => break,
                },
                _ = &mut interrupted => {
                    info!("Interrupted, stopping watch");
                    break;
                }
            }
        }

        self.workflow.close();
        self.broadcast.dispose();
        Ok(self.exit_code())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config =
        ConsoleConfig::load(cli.config.as_deref()).context("Failed to load console configuration")?;
    let console = Console::new(&config)?;

    match cli.command {
        Commands::Branches => console.branches().await,
        Commands::Status => console.status().await,
        Commands::Watch { branch } => console.watch(branch).await,
        Commands::Trigger {
            branch,
            intensity,
            duration,
            yes,
        } => {
            let intensity = intensity.unwrap_or_else(|| CrashIntensity::default().percent());
            let duration = duration.unwrap_or_else(|| CrashDuration::default().minutes());
            console
                .mutate(branch, yes, |workflow| {
                    workflow.request_trigger(intensity, duration)
                })
                .await
        }
        Commands::End { branch, yes } => {
            console
                .mutate(branch, yes, |workflow| workflow.request_end())
                .await
        }
    }
}
