/// Hand-off of a story to an external storyboard viewer.
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use std::thread;

use crate::core::persist::{write_atomic, PersistenceError};
use crate::schema::story::Story;

pub const STORYBOARD_FILE: &str = "storyboard_data.json";
pub const DEFAULT_VIEWER: &str = "custom_storyboard_viewer";

/// Where to write the storyboard data and which viewer to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub temp_dir: PathBuf,
    /// Viewer program, looked up in `working_dir`.
    pub program: String,
    /// Optional interpreter to run the program with, e.g. "python3".
    pub interpreter: Option<String>,
    pub working_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            program: DEFAULT_VIEWER.to_string(),
            interpreter: None,
            working_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerLaunch {
    Launched,
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerExport {
    pub data_path: PathBuf,
    pub viewer: ViewerLaunch,
}

/// Write the story's JSON to `<temp_dir>/storyboard_data.json` and try to
/// start the viewer. The viewer is started without arguments in
/// `working_dir` and reads the data file from its well-known location.
/// Only the write can fail; a viewer that is missing or will not start is
/// reported in `ViewerExport::viewer`.
pub fn export_for_viewer(
    story: &Story,
    config: &ViewerConfig,
) -> Result<ViewerExport, PersistenceError> {
    std::fs::create_dir_all(&config.temp_dir).map_err(|source| PersistenceError::CreateDir {
        path: config.temp_dir.clone(),
        source,
    })?;

    let data_path = config.temp_dir.join(STORYBOARD_FILE);
    let json = serde_json::to_string_pretty(story).map_err(|source| PersistenceError::Json {
        path: Some(data_path.clone()),
        source,
    })?;
    write_atomic(&data_path, json.as_bytes())?;
    info!("storyboard data written to {}", data_path.display());

    let viewer = launch_viewer(config);
    Ok(ViewerExport { data_path, viewer })
}

fn launch_viewer(config: &ViewerConfig) -> ViewerLaunch {
    let program = config.working_dir.join(&config.program);
    if !program.is_file() {
        info!("storyboard viewer not found at {}", program.display());
        return ViewerLaunch::NotFound;
    }
    let program = std::fs::canonicalize(&program).unwrap_or(program);

    let mut cmd = match &config.interpreter {
        Some(interpreter) => {
            let mut cmd = Command::new(interpreter);
            cmd.arg(&program);
            cmd
        }
        None => Command::new(&program),
    };
    cmd.current_dir(&config.working_dir);

    match cmd.spawn() {
        Ok(mut child) => {
            info!("started storyboard viewer {}", program.display());
            // The viewer outlives the prompt; reap it in the background.
            let reaper = thread::Builder::new()
                .name("viewer-reaper".to_string())
                .spawn(move || match child.wait() {
                    Ok(status) => info!("storyboard viewer exited with {}", status),
                    Err(e) => warn!("could not wait for storyboard viewer: {}", e),
                });
            if let Err(e) = reaper {
                warn!("could not watch storyboard viewer: {}", e);
            }
            ViewerLaunch::Launched
        }
        Err(e) => {
            warn!("could not start storyboard viewer {}: {}", program.display(), e);
            ViewerLaunch::Failed(e.to_string())
        }
    }
}
