use caidan_core::{AuthorizationTable, ClientConfig, Destination, Result, Role};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};

#[derive(Args)]
pub struct MenuArgs {
    /// Role name (user, issuer, admin); unknown names show the public menu
    #[arg(short, long)]
    role: Option<String>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn handle_menu_command(args: MenuArgs, config: &ClientConfig) -> Result<()> {
    let table = AuthorizationTable::from_config(&config.access)?;

    let Some(role) = args.role else {
        println!("{}", access_matrix(&table));
        return Ok(());
    };

    let destinations = table.visible_for_name(&role);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&destinations)?);
    } else {
        println!("Menu for '{}':", role);
        println!("{}", destination_table(&destinations));
    }

    Ok(())
}

pub fn destination_table(destinations: &[Destination]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Label", "Path"]);

    for destination in destinations {
        table.add_row(vec![
            destination.id.as_str(),
            &destination.label,
            &destination.path,
        ]);
    }

    table
}

/// Every destination against every role.
fn access_matrix(access: &AuthorizationTable) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);

    let mut header = vec!["Destination".to_string(), "Path".to_string()];
    header.extend(Role::ALL.iter().map(|r| r.to_string()));
    table.set_header(header);

    for destination in access.universe() {
        let mut row = vec![destination.label.clone(), destination.path.clone()];
        for role in Role::ALL {
            let mark = if access.is_visible(role, &destination.id) {
                "yes"
            } else {
                ""
            };
            row.push(mark.to_string());
        }
        table.add_row(row);
    }

    table
}
