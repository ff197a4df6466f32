use std::path::{Path, PathBuf};

use crossbeam::channel::Sender;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, info, warn};

use crate::engine::EngineCommand;
use crate::error::EngineError;
use crate::score::Score;

/// Reloads the score at `path` whenever it is saved and hands it to the
/// engine. A file that no longer parses or validates is reported and the
/// running score keeps playing. Dropping the watcher stops watching.
pub fn watch_score(
    path: &Path,
    command_tx: Sender<EngineCommand>,
) -> Result<RecommendedWatcher, EngineError> {
    let watched: PathBuf = path.to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if event.kind.is_modify() {
                    reload(&watched, &command_tx);
                }
            }
            Err(e) => error!(error = %e, "watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(path, RecursiveMode::NonRecursive)?;
    info!(path = %path.display(), "watching score, edit and save to update playback");

    Ok(watcher)
}

fn reload(path: &Path, command_tx: &Sender<EngineCommand>) {
    info!(path = %path.display(), "score changed, reloading");
    match Score::load(path) {
        Ok(score) => {
            if command_tx.send(EngineCommand::LoadScore(score)).is_err() {
                warn!("engine is gone, ignoring reload");
            }
        }
        Err(e) => warn!(error = %e, "keeping the running score"),
    }
}
