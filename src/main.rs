// src/main.rs

use chrono::Local;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::debug;

use taskline_client::datetime::{format_display_datetime, to_utc_instant};
use taskline_client::models::{Id, ProfileUpdate, Task, TaskDraft, TaskStatus, UserRef};
use taskline_client::{
    create_group, validation, AppState, AuthError, ClientResult, Config, SessionState,
    SignOutReason, SignUpInfo, StatusFilter, TaskView, ValidationError,
};

/// Taskline - personal and group task management
#[derive(Parser)]
#[command(name = "taskline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with username or email
    Signin {
        identity: String,
        #[arg(long, env = "TASKLINE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account (sign in afterwards)
    Signup {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },

    /// Forget the stored session
    Signout,

    /// Show the signed-in user
    Whoami,

    /// Update profile fields
    Profile {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    /// Change password
    Password {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },

    /// Task overview with per-status counts
    Dashboard {
        /// all, todo, "in progress" or done
        #[arg(long, default_value = "all")]
        status: StatusFilter,
    },

    /// List tasks, optionally those of one group
    Tasks {
        #[arg(long)]
        group: Option<String>,
    },

    /// Create a task
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "todo")]
        status: TaskStatus,
        /// Local time, YYYY-MM-DDTHH:MM
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Edit a task
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Local time, YYYY-MM-DDTHH:MM; empty clears it
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        /// Look the task up in this group's list
        #[arg(long)]
        group: Option<String>,
    },

    /// Move a task to another status
    Status { id: String, status: TaskStatus },

    /// Delete a task
    Rm { id: String },

    /// Show a group and its members
    Group { id: String },

    /// Create a group (you become its admin)
    CreateGroup {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Print an invite link for a group you administer
    Invite { group: String },

    /// Preview a group from an invite code or link, and request to join
    Join {
        code: String,
        /// Send the join request without asking
        #[arg(long)]
        yes: bool,
    },

    /// Approve a pending join request
    Approve { group: String, user: String },

    /// Reject a pending join request
    Reject { group: String, user: String },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let state = match Config::from_env().and_then(AppState::from_config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            std::process::exit(2);
        }
    };

    let result = run(&state, cli.command).await;

    if let SessionState::SignedOut {
        reason: SignOutReason::Expired,
    } = state.session.state()
    {
        eprintln!("Your session has expired. Run `taskline signin` again.");
    }
    if let Err(e) = result {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(state: &AppState, command: Commands) -> ClientResult<()> {
    let auth = state.auth();

    match command {
        Commands::Signin { identity, password } => {
            let user = auth.sign_in(&identity, &password).await?;
            println!("Signed in as {} ({})", user.full_name, user.username);
            return Ok(());
        }
        Commands::Signup {
            full_name,
            username,
            email,
            password,
            confirm,
        } => {
            let user = auth
                .sign_up(SignUpInfo {
                    full_name,
                    username,
                    email,
                    password,
                    password_confirm: confirm,
                })
                .await?;
            println!("Account {} created. Sign in to continue.", user.username);
            return Ok(());
        }
        Commands::Signout => {
            auth.sign_out()?;
            println!("Signed out");
            return Ok(());
        }
        _ => {}
    }

    if auth.restore_session().await?.is_none() {
        return Err(AuthError::NotSignedIn.into());
    }
    let tz = Local;

    match command {
        Commands::Whoami => {
            if let Some(user) = auth.current_user() {
                println!("{} (@{})", user.full_name, user.username);
                println!("{}", user.email);
            }
        }
        Commands::Profile {
            full_name,
            username,
            email,
        } => {
            let user = auth
                .update_profile(&ProfileUpdate {
                    full_name,
                    username,
                    email,
                })
                .await?;
            println!("Profile updated: {} (@{})", user.full_name, user.username);
        }
        Commands::Password {
            current,
            new,
            confirm,
        } => {
            auth.change_password(&current, &new, &confirm).await?;
            println!("Password changed");
        }
        Commands::Dashboard { status } => {
            let dashboard = state.dashboard().await?;
            let stats = dashboard.stats();
            println!(
                "{} tasks: {} to do, {} in progress, {} done",
                stats.total, stats.todo, stats.in_progress, stats.done
            );
            for task in dashboard.tasks(status) {
                let label = dashboard
                    .group_label(&task)
                    .unwrap_or_else(|| "Personal".to_string());
                println!("{}  [{}]", task_line(&task, &tz), label);
            }
        }
        Commands::Tasks { group } => {
            let view = match group {
                Some(g) => TaskView::Group(Id::from(g)),
                None => TaskView::Mine,
            };
            for task in state.tasks.load(&view).await? {
                println!("{}", task_line(&task, &tz));
            }
        }
        Commands::Add {
            title,
            description,
            status,
            due,
            group,
            assignee,
        } => {
            let draft = TaskDraft {
                title,
                description,
                status,
                due_date: due,
                group_id: group,
                assigned_to_id: assignee.map(Id::from),
            };
            let task = state.tasks.create_task(draft, &tz).await?;
            println!("Created {}", task_line(&task, &tz));
        }
        Commands::Edit {
            id,
            title,
            description,
            due,
            assignee,
            group,
        } => {
            let id = Id::from(id);
            let view = match group {
                Some(g) => TaskView::Group(Id::from(g)),
                None => TaskView::Mine,
            };
            if view != TaskView::Mine {
                // the personal list carries full assignee references
                state.tasks.load(&TaskView::Mine).await?;
            }
            state.tasks.load(&view).await?;
            let mut task = state
                .tasks
                .find(&id)
                .ok_or_else(|| ValidationError::new("id", format!("Task {id} not found")))?;

            if let Some(title) = title {
                validation::task_title(&title)?;
                task.title = title;
            }
            if let Some(description) = description {
                task.description = Some(description).filter(|d| !d.is_empty());
            }
            if let Some(due) = due {
                task.due_date = to_utc_instant(&due, &tz)?;
            }
            if let Some(assignee) = assignee {
                task.assigned_to = Some(UserRef::with_id(Id::from(assignee)));
            }
            let saved = state.tasks.save_task(&task).await?;
            println!("Saved {}", task_line(&saved, &tz));
        }
        Commands::Status { id, status } => {
            state.tasks.change_status(&Id::from(id.clone()), status).await?;
            println!("Task {} is now {}", id, status);
        }
        Commands::Rm { id } => {
            state.tasks.delete_task(&Id::from(id.clone())).await?;
            println!("Deleted task {}", id);
        }
        Commands::Group { id } => {
            let group = state.group(&Id::from(id)).await?;
            println!("{} ({} members)", group.name(), group.roster().active_count());
            if let Some(description) = group.description() {
                println!("{}", description);
            }
            if group.can_moderate() && !group.roster().pending().is_empty() {
                println!("\nPending requests:");
                for member in group.roster().pending() {
                    println!("  {}  {}", member.user_id, member.display_name());
                }
            }
            println!("\nMembers:");
            for member in group.roster().active() {
                println!(
                    "  {}  {} ({})",
                    member.user_id,
                    member.display_name(),
                    member.role.as_str()
                );
            }
        }
        Commands::CreateGroup { name, description } => {
            let group = create_group(&state.api, &name, description.as_deref()).await?;
            println!("Created group {} ({})", group.name, group.id);
        }
        Commands::Invite { group } => {
            let group = state.group(&Id::from(group)).await?;
            let invite = group.invite_link().await?;
            println!("{}", invite.link);
            if invite.expires_days > 0 {
                println!("Expires in {} days", invite.expires_days);
            }
        }
        Commands::Join { code, yes } => {
            let mut resolver = state.invite(&code)?;
            let preview = resolver.load_preview().await?;
            println!(
                "{}: {} ({} members)",
                resolver.state().headline(),
                preview.name,
                preview.member_count
            );

            if !yes {
                println!("Run again with --yes to request to join.");
                return Ok(());
            }
            let outcome = resolver.join().await?;
            debug!("Join outcome: {:?}", outcome);
            println!("{}", outcome.message());
        }
        Commands::Approve { group, user } => {
            let mut group = state.group(&Id::from(group)).await?;
            group.approve(&Id::from(user.clone())).await?;
            println!("Approved {} in {}", user, group.name());
        }
        Commands::Reject { group, user } => {
            let mut group = state.group(&Id::from(group)).await?;
            group.reject(&Id::from(user.clone())).await?;
            println!("Rejected {} in {}", user, group.name());
        }
        Commands::Signin { .. } | Commands::Signup { .. } | Commands::Signout => {}
    }
    Ok(())
}

fn task_line(task: &Task, tz: &Local) -> String {
    let due = task
        .due_date
        .map(|d| format!("  due {}", format_display_datetime(&d, tz)))
        .unwrap_or_default();
    let assignee = task
        .assigned_to
        .as_ref()
        .map(|u| format!("  @{}", u.handle()))
        .unwrap_or_default();
    format!(
        "{:>6}  {:<12} {}{}{}",
        task.id.as_str(),
        task.status.label(),
        task.title,
        due,
        assignee
    )
}
