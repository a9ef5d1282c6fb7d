use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tt_core::{
    CoreConfig, FileStore, NewRecordTemplate, NewUser, RecordTemplateService, RoleDetails,
    UserService, ValidationRules,
};
use tt_uuid::DocumentId;

#[derive(Parser)]
#[command(name = "tt")]
#[command(about = "TherapistTrack operator CLI")]
struct Cli {
    /// Root of the file-backed document store [default: $TT_DATA_DIR, then tt_data]
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Fields shared by every user kind.
#[derive(Args)]
struct UserArgs {
    /// Given names
    #[arg(long)]
    names: String,
    /// Last names
    #[arg(long)]
    last_names: String,
    /// Phone number (repeatable)
    #[arg(long = "phone", required = true)]
    phones: Vec<String>,
    /// Mail address (repeatable)
    #[arg(long = "mail", required = true)]
    mails: Vec<String>,
}

impl UserArgs {
    fn into_new_user(self, details: RoleDetails) -> NewUser {
        NewUser {
            names: self.names,
            last_names: self.last_names,
            phones: self.phones,
            mails: self.mails,
            details,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a doctor
    CreateDoctor {
        #[command(flatten)]
        user: UserArgs,
        /// Collegiate number
        #[arg(long)]
        collegiate_number: String,
        /// Specialty
        #[arg(long)]
        specialty: String,
    },
    /// Provision an assistant
    CreateAssistant {
        #[command(flatten)]
        user: UserArgs,
        /// Start date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start_date: String,
        /// End date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end_date: String,
        /// 13 digit personal identification number
        #[arg(long)]
        dpi: String,
    },
    /// Provision an admin
    CreateAdmin {
        #[command(flatten)]
        user: UserArgs,
    },
    /// Deactivate a user
    DeleteUser {
        /// User id
        id: String,
    },
    /// Print a user as JSON
    ShowUser {
        /// User id
        id: String,
    },
    /// Create a record template from a JSON file
    CreateTemplate {
        /// Path to a `{doctorId, name, categories, fields}` document
        #[arg(long)]
        file: PathBuf,
    },
    /// List a doctor's record templates
    ListTemplates {
        /// Doctor id
        doctor_id: String,
    },
    /// Back-fill or remove users left half-provisioned
    ReconcileOrphans {
        /// Only touch users older than this many seconds
        #[arg(long)]
        grace_seconds: Option<i64>,
    },
}

const DEFAULT_DATA_DIR: &str = "tt_data";

/// Engine settings from the same variables the server reads, with `--grace-seconds` on top.
fn resolve_config(
    var: impl Fn(&str) -> Option<String>,
    grace_seconds: Option<i64>,
) -> anyhow::Result<CoreConfig> {
    let cfg = CoreConfig::from_env_values(var)?;
    let Some(seconds) = grace_seconds else {
        return Ok(cfg);
    };
    anyhow::ensure!(seconds >= 0, "--grace-seconds must not be negative");
    Ok(cfg.with_orphan_grace_period(chrono::Duration::seconds(seconds)))
}

/// `--data-dir`, then `TT_DATA_DIR`, then `tt_data`.
fn resolve_data_dir(flag: Option<PathBuf>, cfg: &CoreConfig) -> PathBuf {
    flag.or_else(|| cfg.data_dir().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'tt --help' for commands");
        return Ok(());
    };

    dotenvy::dotenv().ok();

    let grace_seconds = match &command {
        Commands::ReconcileOrphans { grace_seconds } => *grace_seconds,
        _ => None,
    };
    let cfg = resolve_config(|name| std::env::var(name).ok(), grace_seconds)?;
    let data_dir = resolve_data_dir(cli.data_dir, &cfg);
    let store = Arc::new(
        FileStore::open(&data_dir)
            .with_context(|| format!("failed to open {}", data_dir.display()))?,
    );
    let cfg = Arc::new(cfg);
    let rules = ValidationRules::default();
    let users = UserService::new(store.clone(), cfg.clone());
    let templates = RecordTemplateService::new(store, cfg);

    match command {
        Commands::CreateDoctor {
            user,
            collegiate_number,
            specialty,
        } => {
            let created = users.create_user(
                &user.into_new_user(RoleDetails::Doctor {
                    collegiate_number,
                    specialty,
                }),
                &rules,
            )?;
            println!(
                "Created doctor {} (role detail {})",
                created.user_id,
                created.role_id.map(|id| id.to_string()).unwrap_or_default()
            );
        }
        Commands::CreateAssistant {
            user,
            start_date,
            end_date,
            dpi,
        } => {
            let created = users.create_user(
                &user.into_new_user(RoleDetails::Assistant {
                    start_date,
                    end_date,
                    dpi,
                }),
                &rules,
            )?;
            println!(
                "Created assistant {} (role detail {})",
                created.user_id,
                created.role_id.map(|id| id.to_string()).unwrap_or_default()
            );
        }
        Commands::CreateAdmin { user } => {
            let created = users.create_user(&user.into_new_user(RoleDetails::Admin), &rules)?;
            println!("Created admin {}", created.user_id);
        }
        Commands::DeleteUser { id } => {
            let user_id = DocumentId::parse(id.trim())?;
            users.delete_user(&user_id)?;
            println!("Deactivated user {user_id}");
        }
        Commands::ShowUser { id } => {
            let user = users.get_user(&DocumentId::parse(id.trim())?)?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::CreateTemplate { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let template: NewRecordTemplate = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a valid template", file.display()))?;
            let created = templates.create_record_template(&template, &rules)?;
            println!(
                "Created template {} for doctor {}",
                created.template_id, created.doctor_id
            );
        }
        Commands::ListTemplates { doctor_id } => {
            let listed = templates.list_record_templates(&DocumentId::parse(doctor_id.trim())?)?;
            if listed.is_empty() {
                println!("No templates found.");
            }
            for template in listed {
                println!(
                    "ID: {}, Name: {}, Fields: {}, Updated: {}",
                    template.id,
                    template.document.name.as_str(),
                    template.document.fields.len(),
                    template.document.last_update
                );
            }
        }
        Commands::ReconcileOrphans { .. } => {
            let report = users.reconcile_orphans(Utc::now())?;
            for id in &report.backfilled {
                println!("Back-filled {id}");
            }
            for id in &report.removed {
                println!("Removed {id}");
            }
            println!(
                "{} back-filled, {} removed",
                report.backfilled.len(),
                report.removed.len()
            );
        }
    }

    Ok(())
}
