use super::menu::destination_table;
use caidan_core::{
    ArtifactStore, CaidanError, ConnectOutcome, IdentitySignal, Navigator, PathChange, Result,
    Role,
};
use clap::Subcommand;
use dialoguer::{Confirm, Select};

/// Page the previous invocation ended on.
pub const CURRENT_PATH_KEY: &str = "current_path";

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Connect with a wallet address or a session token
    Connect {
        /// Wallet address
        #[arg(short, long, conflicts_with = "token")]
        address: Option<String>,
        /// Session token issued by the backend
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Show the current session
    Status,
    /// Open a destination by id
    Navigate {
        /// Destination id, e.g. lottery-management
        id: String,
    },
    /// Open a route, as if typed in the address bar
    Open {
        /// Route path, e.g. /lottery-management/12
        path: String,
    },
    /// Act as another role (demo mode only)
    Role {
        /// Role name (will prompt if not provided)
        name: Option<String>,
        /// Drop the override
        #[arg(long, conflicts_with = "name")]
        clear: bool,
    },
    /// Log out and clear the stored session
    Logout {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_session_command(cmd: SessionCommands, navigator: &Navigator) -> Result<()> {
    match cmd {
        SessionCommands::Connect { address, token } => {
            let identity = match (address, token) {
                (Some(address), _) => IdentitySignal::wallet(address),
                (None, Some(token)) => IdentitySignal::token(token),
                (None, None) => {
                    return Err(CaidanError::config("Provide --address or --token"));
                }
            };

            println!("Connecting {}...", identity.describe());
            let outcome = navigator.connect(identity).await?;
            print_outcome(outcome)?;
            println!();
            println!("{}", destination_table(&navigator.visible_destinations()));
        }

        SessionCommands::Status => {
            let state = navigator.snapshot();

            println!("Session:");
            println!("  Role: {}", state.role);
            println!("  Identity: {}", navigator.identity().describe());
            println!("  Current page: {}", state.current_path);
            if !navigator.resolver().has_lookup() {
                println!("  Roles: local (default '{}')", navigator.resolver().default_role());
            }
            if let Some(role) = navigator.resolver().role_override() {
                println!("  Role override: {}", role);
            }
            println!();
            println!("{}", destination_table(&navigator.visible_destinations()));
        }

        SessionCommands::Navigate { id } => {
            let destination = navigator.navigate(&id)?;
            println!("Opened {} ({})", destination.label, destination.path);
        }

        SessionCommands::Open { path } => match navigator.path_changed(&path) {
            PathChange::Accepted(destination) => {
                println!("Opened {} ({})", destination.label, path);
            }
            PathChange::Redirected { from, to } => {
                println!("{} is not available in this session.", from);
                println!("Returned to {} ({})", to.label, to.path);
            }
        },

        SessionCommands::Role { name, clear } => {
            let role = if clear {
                None
            } else {
                match name {
                    Some(name) => Some(parse_override(&name)?),
                    None => Some(select_role()?),
                }
            };

            let outcome = navigator.set_role_override(role).await?;
            match role {
                Some(role) => println!("Acting as '{}'.", role),
                None => println!("Role override cleared."),
            }
            if navigator.snapshot().identity_present {
                print_outcome(outcome)?;
            } else {
                println!("Connect to apply it: caidan session connect --address <addr>");
            }
        }

        SessionCommands::Logout { force } => {
            if !force {
                let confirm = Confirm::new()
                    .with_prompt("Log out and clear the stored session?")
                    .default(false)
                    .interact()
                    .map_err(|e| CaidanError::dialog(e.to_string()))?;

                if !confirm {
                    println!("Logout cancelled.");
                    return Ok(());
                }
            }

            navigator.disconnect().await?;
            println!("Logged out.");
            println!("Current page: {}", navigator.snapshot().current_path);
        }
    }

    Ok(())
}

/// Remember the current page for the next invocation. Without an identity
/// there is no session to come back to, so nothing is kept.
pub async fn save_current_path(navigator: &Navigator, store: &dyn ArtifactStore) -> Result<()> {
    let state = navigator.snapshot();
    if state.identity_present {
        store.set(CURRENT_PATH_KEY, &state.current_path).await
    } else {
        store.remove(CURRENT_PATH_KEY).await
    }
}

fn print_outcome(outcome: ConnectOutcome) -> Result<()> {
    match outcome {
        ConnectOutcome::Authenticated(role) => println!("Connected as '{}'.", role),
        ConnectOutcome::Anonymous => {
            println!("Connected, but this identity has no role; only public pages are open.")
        }
        ConnectOutcome::Superseded => return Err(CaidanError::StaleResolution),
    }
    Ok(())
}

fn parse_override(name: &str) -> Result<Role> {
    let role = name.parse::<Role>()?;
    if !role.is_authenticated() {
        return Err(CaidanError::config(format!(
            "Cannot act as '{}'; log out instead",
            role
        )));
    }
    Ok(role)
}

fn select_role() -> Result<Role> {
    let roles: Vec<Role> = Role::ALL
        .into_iter()
        .filter(|r| r.is_authenticated())
        .collect();
    let selection = Select::new()
        .with_prompt("Role to act as")
        .items(&roles)
        .default(0)
        .interact()
        .map_err(|e| CaidanError::dialog(e.to_string()))?;
    Ok(roles[selection])
}
