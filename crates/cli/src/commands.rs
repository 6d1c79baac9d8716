//! CLI commands

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use taskboard_core::{
    FileStore, NewProject, NewTask, ProjectUpdate, Session, TaskPriority, TaskStatus, TaskUpdate,
};
use taskboard_http::{ApiClient, AuthService, Navigator};
use tracing::{info, warn};

use crate::config::Settings;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and save the session
    Login {
        #[arg(long, env = "TASKBOARD_EMAIL")]
        email: String,

        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the saved session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Request a password reset email
    ForgotPassword {
        #[arg(long)]
        email: String,
    },

    /// Set a new password using a reset token
    ResetPassword {
        #[arg(long)]
        token: String,

        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Task operations
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Project operations
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List tasks, optionally for one project
    List {
        #[arg(long)]
        project: Option<String>,
    },

    /// Show one task
    Show { id: String },

    /// Create a task
    Create {
        title: String,

        #[command(flatten)]
        fields: TaskFields,

        #[arg(long)]
        project: Option<String>,
    },

    /// Update a task; omitted fields are left unchanged
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// Delete a task
    Delete { id: String },
}

#[derive(Args)]
pub struct TaskFields {
    #[arg(long)]
    description: Option<String>,

    /// todo, in-progress, done, blocked or cancelled
    #[arg(long)]
    status: Option<TaskStatus>,

    /// low, medium or high
    #[arg(long)]
    priority: Option<TaskPriority>,

    /// Due date as YYYY-MM-DD or an RFC 3339 timestamp
    #[arg(long, value_parser = parse_due_date)]
    due: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List projects
    List,

    /// Show one project
    Show { id: String },

    /// Create a project
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Hex color such as #3B82F6
        #[arg(long)]
        color: Option<String>,
    },

    /// Update a project; omitted fields are left unchanged
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a project and its tasks
    Delete { id: String },
}

/// Tells the user to sign in again once the saved session is unusable
struct LoginPrompt;

impl Navigator for LoginPrompt {
    fn navigate(&self, location: &str) {
        warn!(location, "session expired");
        eprintln!("Your session has expired. Run `taskboard login` to sign in again.");
    }
}

impl Commands {
    pub async fn execute(self, settings: &Settings) -> Result<()> {
        let auth = connect(settings)?;

        match self {
            Self::Login { email, password } => {
                let response = auth.login(email, password).await?;
                println!("Signed in as {} <{}>", response.user.name, response.user.email);
                Ok(())
            }
            Self::Signup {
                name,
                email,
                password,
            } => {
                let response = auth.signup(name, email, password).await?;
                println!("Created account for {} <{}>", response.user.name, response.user.email);
                Ok(())
            }
            Self::Logout => {
                auth.logout().await;
                println!("Signed out");
                Ok(())
            }
            Self::Whoami => match auth.current_user().await? {
                Some(user) => print_json(&user),
                None => bail!("not signed in; run `taskboard login`"),
            },
            Self::ForgotPassword { email } => {
                auth.forgot_password(&email).await?;
                println!("If an account exists for {email}, a reset link has been sent");
                Ok(())
            }
            Self::ResetPassword { token, password } => {
                auth.reset_password(&token, &password).await?;
                println!("Password updated; sign in with the new password");
                Ok(())
            }
            Self::Tasks { command } => command.execute(auth.client()).await,
            Self::Projects { command } => command.execute(auth.client()).await,
        }
    }
}

impl TaskCommands {
    pub async fn execute(self, client: &ApiClient) -> Result<()> {
        match self {
            Self::List { project } => {
                let tasks = match project {
                    Some(project) => client.list_project_tasks(&project).await?,
                    None => client.list_tasks().await?,
                };
                print_json(&tasks)
            }
            Self::Show { id } => print_json(&client.get_task(&id).await?),
            Self::Create {
                title,
                fields,
                project,
            } => {
                let task = NewTask {
                    description: fields.description,
                    status: fields.status.unwrap_or_default(),
                    priority: fields.priority,
                    due_date: fields.due,
                    project_id: project,
                    ..NewTask::new(title)
                };
                let created = client.create_task(&task).await?;
                info!(id = %created.id, "task created");
                print_json(&created)
            }
            Self::Update { id, title, fields } => {
                let update = TaskUpdate {
                    title,
                    description: fields.description,
                    status: fields.status,
                    priority: fields.priority,
                    due_date: fields.due,
                };
                if update.is_empty() {
                    bail!("nothing to update; pass at least one field");
                }
                print_json(&client.update_task(&id, &update).await?)
            }
            Self::Delete { id } => {
                client.delete_task(&id).await?;
                println!("Deleted task {id}");
                Ok(())
            }
        }
    }
}

impl ProjectCommands {
    pub async fn execute(self, client: &ApiClient) -> Result<()> {
        match self {
            Self::List => print_json(&client.list_projects().await?),
            Self::Show { id } => print_json(&client.get_project(&id).await?),
            Self::Create {
                name,
                description,
                color,
            } => {
                let mut project = NewProject::new(name);
                project.description = description;
                if let Some(color) = color {
                    project.color = color;
                }
                let created = client.create_project(&project).await?;
                info!(id = %created.id, "project created");
                print_json(&created)
            }
            Self::Update {
                id,
                name,
                description,
                color,
            } => {
                let update = ProjectUpdate {
                    name,
                    description,
                    color,
                };
                print_json(&client.update_project(&id, &update).await?)
            }
            Self::Delete { id } => {
                client.delete_project(&id).await?;
                println!("Deleted project {id}");
                Ok(())
            }
        }
    }
}

fn connect(settings: &Settings) -> Result<AuthService> {
    let store = FileStore::new(settings.session_file());
    let session = Arc::new(Session::new(Arc::new(store)));
    let client = ApiClient::from_config(&settings.client, session, Arc::new(LoginPrompt))
        .context("failed to create API client")?;
    Ok(AuthService::new(client))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_due_date(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| format!("invalid date `{value}`"));
    }
    taskboard_core::timestamp::parse(value)
        .ok_or_else(|| format!("expected YYYY-MM-DD or an RFC 3339 timestamp, got `{value}`"))
}
