pub mod countdown;
pub mod menu;
pub mod session;

pub use countdown::{handle_countdown_command, CountdownArgs};
pub use menu::{handle_menu_command, MenuArgs};
pub use session::{handle_session_command, save_current_path, SessionCommands};
