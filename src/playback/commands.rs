use anyhow::{anyhow, bail, Context, Result};
use std::str::FromStr;

use crate::models::SegmentId;

use super::{PlaybackState, SequenceController};

/// What a viewer user can ask for, one line at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    Play(SegmentId),
    ToggleAll,
    Stop,
    Status,
    List,
    NextCollection,
    PreviousCollection,
    Help,
    Quit,
}

impl FromStr for ViewerCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| anyhow!("empty command"))?;

        let command = match verb {
            "p" | "play" => {
                let id = words
                    .next()
                    .ok_or_else(|| anyhow!("play needs a verse number"))?;
                let id: u32 = id
                    .parse()
                    .with_context(|| format!("'{id}' is not a verse number"))?;
                ViewerCommand::Play(SegmentId(id))
            }
            "a" | "all" => ViewerCommand::ToggleAll,
            "s" | "stop" => ViewerCommand::Stop,
            "st" | "status" => ViewerCommand::Status,
            "l" | "ls" | "list" => ViewerCommand::List,
            "next" => ViewerCommand::NextCollection,
            "prev" => ViewerCommand::PreviousCollection,
            "h" | "?" | "help" => ViewerCommand::Help,
            "q" | "quit" | "exit" => ViewerCommand::Quit,
            other => bail!("unknown command '{other}'"),
        };

        if words.next().is_some() {
            bail!("too many arguments for '{verb}'");
        }
        Ok(command)
    }
}

impl ViewerCommand {
    pub const HELP: &'static str = "\
p <n>   play verse n (again to stop it)
a       play all / pause / resume
s       stop
st      status
l       list verses
next    next collection
prev    previous collection
q       quit";
}

/// Run a playback command. Returns the resulting state for commands that
/// change it.
pub async fn execute(
    controller: &SequenceController,
    command: ViewerCommand,
) -> Result<Option<PlaybackState>> {
    let state = match command {
        ViewerCommand::Play(id) => controller.play_single(id).await?,
        ViewerCommand::ToggleAll => controller.toggle_all().await,
        ViewerCommand::Stop => controller.stop().await,
        ViewerCommand::Status => controller.snapshot().await,
        ViewerCommand::List
        | ViewerCommand::NextCollection
        | ViewerCommand::PreviousCollection
        | ViewerCommand::Help
        | ViewerCommand::Quit => return Ok(None),
    };
    Ok(Some(state))
}
