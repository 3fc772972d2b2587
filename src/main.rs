/*
 * Command-line front end of the NFT profile data layer. It wires the HTTP
 * remote, the local profile storage, the profile service and a presenter
 * together, drives the presenter with view events, pumps the main queue until
 * the presenter is idle, and renders the resulting view commands as text.
 */
mod app_logic;
mod core;
mod terminal_view;

use crate::app_logic::{ProfilePresenter, ViewEvent, ViewEventHandler};
use crate::core::profiles::ProfileError;
use crate::core::{
    AppConfig, ConfigManagerOperations, CoreConfigManager, CoreProfileStorage, HttpProfileRemote,
    LoggingConfig, MainQueue, ProfileClient, ProfileEdit, ProfileId, ProfileService, path_utils,
};
use crate::terminal_view::TerminalView;

use clap::{Parser, Subcommand};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::error::Error;
use std::fs::File;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) const APP_NAME: &str = "NftProfile";
const DEFAULT_PROFILE_ID: &str = "1";

#[derive(Parser, Debug)]
#[command(name = "nft-profile", version, about = "Load, edit and like NFTs on a marketplace profile")]
struct Cli {
    /// Configuration file to use instead of the per-user config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a profile from the server and show it
    Show {
        /// Profile id; defaults to the last one used
        id: Option<String>,
    },
    /// Like an NFT, or remove the like if it is already liked
    Like {
        nft_id: String,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Change the editable fields of a profile
    Edit {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Show the locally cached copy without contacting the server
    Cached { id: Option<String> },
}

/*
 * Sets up the global logger from the logging configuration: a terminal logger
 * and, if a file is configured, a file logger at the same level.
 */
fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn Error>> {
    let level = config.level_filter();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = &config.file {
        loggers.push(WriteLogger::new(level, Config::default(), File::create(path)?));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

// Logger for unit tests. Safe to call from every test; only the first call installs it.
#[cfg(test)]
pub(crate) fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, Config::default());
    });
}

fn resolve_profile_id(
    explicit: Option<String>,
    config_manager: &dyn ConfigManagerOperations,
) -> Result<ProfileId, Box<dyn Error>> {
    if let Some(id) = explicit {
        return Ok(ProfileId::new(id)?);
    }
    match config_manager.load_last_profile_id(APP_NAME) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Ok(ProfileId::new(DEFAULT_PROFILE_ID)?),
        Err(e) => {
            log::warn!("Main: Could not read last profile id, using default: {e}");
            Ok(ProfileId::new(DEFAULT_PROFILE_ID)?)
        }
    }
}

// Edit fields given on the command line; unset ones keep their current value.
struct EditFields {
    name: Option<String>,
    avatar: Option<String>,
    description: Option<String>,
    website: Option<String>,
}

impl EditFields {
    fn apply_to(self, mut edit: ProfileEdit) -> ProfileEdit {
        if let Some(name) = self.name {
            edit.name = name;
        }
        if let Some(avatar) = self.avatar {
            edit.avatar = avatar;
        }
        if let Some(description) = self.description {
            edit.description = description;
        }
        if let Some(website) = self.website {
            edit.website = website;
        }
        edit
    }
}

enum Action {
    Like(String),
    Edit(EditFields),
}

struct Screen {
    presenter: ProfilePresenter,
    queue: MainQueue,
    view: TerminalView<Stdout>,
}

impl Screen {
    // Sends `event` and runs the main queue until the presenter has nothing outstanding.
    async fn dispatch(&mut self, event: ViewEvent) -> io::Result<()> {
        self.presenter.handle_event(event);
        self.view.drain(&mut self.presenter)?;
        let presenter = &self.presenter;
        self.queue.run_until(|| !presenter.is_busy()).await;
        self.view.drain(&mut self.presenter)
    }

    // True if the profile loaded; any error has already been rendered.
    async fn open(&mut self) -> io::Result<bool> {
        self.dispatch(ViewEvent::ViewDidLoad).await?;
        Ok(self.view.take_error().is_none())
    }
}

async fn run(
    cli: Cli,
    config: AppConfig,
    config_manager: &dyn ConfigManagerOperations,
) -> Result<(), Box<dyn Error>> {
    let storage_root = match &config.storage.directory {
        Some(dir) => dir.clone(),
        None => path_utils::get_base_app_data_local_dir(APP_NAME)
            .ok_or(ProfileError::NoStorageDirectory)?,
    };
    log::debug!("Main: Profile storage at {storage_root:?}.");
    let storage = Arc::new(CoreProfileStorage::new(storage_root));
    let remote = Arc::new(HttpProfileRemote::new(
        &config.remote.base_url,
        config.remote.auth_header.clone(),
        config.remote.auth_token.clone(),
    )?);
    let service = Arc::new(ProfileService::new(
        remote,
        storage,
        config.remote.request_timeout(),
    ));

    let (explicit_id, action) = match cli.command {
        Command::Cached { id } => {
            let id = resolve_profile_id(id, config_manager)?;
            let mut view = TerminalView::new(io::stdout());
            match service.cached_profile(&id)? {
                Some(profile) => view.print_profile(&profile)?,
                None => view.print_line(&format!("No cached copy of profile {id}."))?,
            }
            return Ok(());
        }
        Command::Show { id } => (id, None),
        Command::Like { nft_id, profile } => (profile, Some(Action::Like(nft_id))),
        Command::Edit {
            name,
            avatar,
            description,
            website,
            profile,
        } => (
            profile,
            Some(Action::Edit(EditFields {
                name,
                avatar,
                description,
                website,
            })),
        ),
    };

    let id = resolve_profile_id(explicit_id, config_manager)?;
    let queue = MainQueue::new();
    let client = ProfileClient::new(service, queue.sender(), tokio::runtime::Handle::current());
    let mut screen = Screen {
        presenter: ProfilePresenter::new(client, id.clone()),
        queue,
        view: TerminalView::new(io::stdout()),
    };

    if !screen.open().await? {
        return Err(format!("Could not load profile {id}").into());
    }
    if let Err(e) = config_manager.save_last_profile_id(APP_NAME, &id) {
        log::warn!("Main: Could not remember profile id '{id}': {e}");
    }

    if let Some(action) = action {
        let event = match action {
            Action::Like(nft_id) => ViewEvent::LikeToggled { nft_id },
            Action::Edit(fields) => {
                let current = screen
                    .presenter
                    .screen_state()
                    .profile
                    .ok_or("Profile missing after load")?;
                ViewEvent::ProfileEdited(fields.apply_to(ProfileEdit::from_profile(&current)))
            }
        };
        screen.dispatch(event).await?;
        if let Some(message) = screen.view.take_error() {
            return Err(message.into());
        }
    }

    screen.dispatch(ViewEvent::ViewClosed).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config_manager = CoreConfigManager::new();
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => config_manager.load_config(APP_NAME)?,
    };
    init_logging(&config.logging)?;
    log::debug!("Main: Starting with {cli:?}");

    if let Err(e) = run(cli, config, &config_manager).await {
        log::error!("Main: {e}");
        return Err(e);
    }
    Ok(())
}
