use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::broadcast,
};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::{AudioEngineHandle, DirectoryClipResolver, Transport, TransportRegistry},
    catalog::{CatalogError, Collection, CollectionCatalog},
    models::TimingStatus,
    playback::{self, PlaybackMode, PlaybackState, SequenceController, ViewerCommand},
    settings::SettingsStore,
    timing::{self, EditorCommand, TimingEditor},
    utils::format_clock,
    viewport::{anchor_line, ConsoleScroller, DeviceClass},
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

type InputLines = Lines<BufReader<Stdin>>;

enum Outcome {
    Quit,
    Switch(String),
}

/// Terminal front-end: renders verses, forwards typed commands to the
/// engines and scrolls by printing the verse that comes into view.
pub struct Console {
    catalog: CollectionCatalog,
    settings: Arc<SettingsStore>,
    engine: AudioEngineHandle,
    device: DeviceClass,
}

impl Console {
    pub fn new(
        catalog: CollectionCatalog,
        settings: Arc<SettingsStore>,
        engine: AudioEngineHandle,
        device: DeviceClass,
    ) -> Self {
        Self {
            catalog,
            settings,
            engine,
            device,
        }
    }

    pub fn print_collections(&self) {
        if self.catalog.all().is_empty() {
            println!("no collections in {}", self.catalog.data_dir().display());
            return;
        }
        for info in self.catalog.all() {
            match &info.description {
                Some(description) => println!("{:<16} {} ({})", info.id, info.title, description),
                None => println!("{:<16} {}", info.id, info.title),
            }
        }
    }

    /// Listen to a collection, one verse or all of them.
    pub async fn run_viewer(&self, collection_id: &str, cancel: CancellationToken) -> Result<()> {
        let mut input = BufReader::new(tokio::io::stdin()).lines();
        let mut current = collection_id.to_string();
        loop {
            match self.viewer_session(&current, &mut input, &cancel).await? {
                Outcome::Quit => return Ok(()),
                Outcome::Switch(next) => current = next,
            }
        }
    }

    /// Capture verse timings against a collection's master recording.
    pub async fn run_editor(&self, collection_id: &str, cancel: CancellationToken) -> Result<()> {
        let mut input = BufReader::new(tokio::io::stdin()).lines();
        let Some(collection) = self.load(collection_id)? else {
            return Ok(());
        };
        let Some(master) = self.catalog.master_recording(&collection.id) else {
            println!("'{collection_id}' has no master recording");
            return Ok(());
        };

        let settings = self.settings.current()?;
        let transport: Arc<dyn Transport> = Arc::new(self.engine.transport()?);
        let scroller = Arc::new(ConsoleScroller::new(&collection.segments, self.device));
        let mut editor = TimingEditor::open(
            collection,
            &master,
            transport,
            scroller,
            settings.default_span(),
            settings.timings_dir(self.catalog.data_dir()),
        )?;
        editor.set_autoscroll(settings.autoscroll);

        print_editor_header(&editor);
        let mut events = editor.subscribe();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => editor.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                line = input.next_line() => {
                    let Some(line) = line? else { break };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let command = match line.parse::<EditorCommand>() {
                        Ok(command) => command,
                        Err(err) => {
                            println!("{err:#}");
                            continue;
                        }
                    };

                    match command {
                        EditorCommand::Quit => break,
                        EditorCommand::Help => println!("{}", EditorCommand::HELP),
                        EditorCommand::Status => print_editor_status(&editor),
                        EditorCommand::List => print_timings(&editor, self.device),
                        EditorCommand::NextCollection | EditorCommand::PreviousCollection => {
                            let forward = command == EditorCommand::NextCollection;
                            if let Err(err) = self.switch_editor(&mut editor, forward) {
                                println!("{err:#}");
                            }
                        }
                        other => {
                            if let EditorCommand::Autoscroll(_) = other {
                                let enabled = autoscroll_target(&editor, other);
                                if let Err(err) = self.settings.set_autoscroll(enabled) {
                                    println!("{err:#}");
                                }
                            }
                            match timing::commands::execute(&mut editor, other).await {
                                Ok(Some(message)) => println!("{message}"),
                                Ok(None) => {}
                                Err(err) => println!("{err:#}"),
                            }
                        }
                    }
                }
            }
        }

        editor.stop();
        log_info!("editor closed");
        Ok(())
    }

    async fn viewer_session(
        &self,
        collection_id: &str,
        input: &mut InputLines,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let Some(collection) = self.load(collection_id)? else {
            return Ok(Outcome::Quit);
        };

        let settings = self.settings.current()?;
        let resolver = self.resolver()?;
        let engine = self.engine.clone();
        let transports =
            TransportRegistry::build(&collection.id, &collection.segments, &resolver, || {
                engine
                    .transport()
                    .map(|transport| Arc::new(transport) as Arc<dyn Transport>)
            })?;

        println!(
            "{} ({} verses, {} with audio)",
            collection.title,
            collection.segments.len(),
            transports.len()
        );
        println!("type 'h' for help");

        let scroller = Arc::new(ConsoleScroller::new(&collection.segments, self.device));
        let controller = SequenceController::new(
            collection.segments.clone(),
            transports,
            scroller,
            settings.settle_delay(),
        );
        let mut states = controller.subscribe();
        let mut last = states.borrow().clone();

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Outcome::Quit,
                changed = states.changed() => {
                    if changed.is_err() {
                        break Outcome::Quit;
                    }
                    let state = states.borrow_and_update().clone();
                    if state.mode != last.mode || state.active_segment != last.active_segment {
                        print_state(&state);
                    }
                    last = state;
                }
                line = input.next_line() => {
                    let Some(line) = line? else { break Outcome::Quit };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let command = match line.parse::<ViewerCommand>() {
                        Ok(command) => command,
                        Err(err) => {
                            println!("{err:#}");
                            continue;
                        }
                    };

                    match command {
                        ViewerCommand::Quit => break Outcome::Quit,
                        ViewerCommand::Help => println!("{}", ViewerCommand::HELP),
                        ViewerCommand::List => print_verses(&collection, &controller, self.device),
                        ViewerCommand::NextCollection | ViewerCommand::PreviousCollection => {
                            let forward = command == ViewerCommand::NextCollection;
                            match self.neighbour(&collection.id, forward) {
                                Some(next) => break Outcome::Switch(next),
                                None => println!("no {} collection", direction(forward)),
                            }
                        }
                        other => match playback::commands::execute(&controller, other).await {
                            Ok(Some(state)) if other == ViewerCommand::Status => print_state(&state),
                            Ok(_) => {}
                            Err(err) => println!("{err:#}"),
                        },
                    }
                }
            }
        };

        controller.shutdown().await;
        Ok(outcome)
    }

    fn switch_editor(&self, editor: &mut TimingEditor, forward: bool) -> Result<()> {
        let Some(next) = self.neighbour(&editor.collection().id, forward) else {
            bail!("no {} collection", direction(forward));
        };
        let Some(master) = self.catalog.master_recording(&next) else {
            bail!("'{next}' has no master recording");
        };
        let Some(collection) = self.load(&next)? else {
            return Ok(());
        };

        let scroller = Arc::new(ConsoleScroller::new(&collection.segments, self.device));
        editor.load_collection(collection, &master, scroller)?;
        print_editor_header(editor);
        Ok(())
    }

    fn resolver(&self) -> Result<DirectoryClipResolver> {
        let settings = self.settings.current()?;
        Ok(DirectoryClipResolver::new(
            settings.audio_dir(self.catalog.data_dir()),
            settings.collections_with_audio,
        ))
    }

    /// A missing collection is shown as unavailable and not retried.
    fn load(&self, collection_id: &str) -> Result<Option<Collection>> {
        match self.catalog.load(collection_id, &self.resolver()?) {
            Ok(collection) => Ok(Some(collection)),
            Err(CatalogError::NotFound(_)) => {
                println!("'{collection_id}' is not available");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn neighbour(&self, collection_id: &str, forward: bool) -> Option<String> {
        let info = if forward {
            self.catalog.next(collection_id)
        } else {
            self.catalog.previous(collection_id)
        };
        info.map(|info| info.id.clone())
    }
}

fn direction(forward: bool) -> &'static str {
    if forward {
        "next"
    } else {
        "previous"
    }
}

fn autoscroll_target(editor: &TimingEditor, command: EditorCommand) -> bool {
    match command {
        EditorCommand::Autoscroll(Some(enabled)) => enabled,
        _ => !editor.autoscroll(),
    }
}

fn mode_label(mode: PlaybackMode) -> &'static str {
    match mode {
        PlaybackMode::Idle => "idle",
        PlaybackMode::PlayingAll => "playing all",
        PlaybackMode::PausedAll => "paused",
        PlaybackMode::PlayingSingle => "playing",
    }
}

fn print_state(state: &PlaybackState) {
    match state.active_segment {
        Some(id) if state.mode != PlaybackMode::Idle => println!(
            "[{}] verse {} at {}",
            mode_label(state.mode),
            id,
            format_clock(state.position)
        ),
        _ => println!(
            "[{}] next verse index {}",
            mode_label(state.mode),
            state.cursor_index
        ),
    }
}

fn print_verses(collection: &Collection, controller: &SequenceController, device: DeviceClass) {
    for segment in &collection.segments {
        let audio = if controller.transports().contains(segment.id) {
            "♪"
        } else {
            " "
        };
        println!("{audio} {}", anchor_line(segment, device));
    }
}

fn print_editor_header(editor: &TimingEditor) {
    let collection = editor.collection();
    println!(
        "{} ({} verses, {} already timed)",
        collection.title,
        collection.segments.len(),
        collection
            .segments
            .iter()
            .filter(|s| editor.recorder().timing(s.id).is_some())
            .count()
    );
    println!("type 'h' for help");
}

fn print_editor_status(editor: &TimingEditor) {
    let total = editor
        .duration()
        .map(format_clock)
        .unwrap_or_else(|| "--:--".to_string());
    let pending = editor
        .recorder()
        .pending()
        .map(|id| format!(", waiting for end of verse {id}"))
        .unwrap_or_default();
    let current = editor
        .current_segment()
        .map(|id| format!(", in verse {id}"))
        .unwrap_or_default();
    println!(
        "{} {} / {}, recording {}, autoscroll {}{}{}",
        if editor.is_playing() { "playing" } else { "paused" },
        format_clock(editor.position()),
        total,
        if editor.recorder().is_armed() { "armed" } else { "off" },
        if editor.autoscroll() { "on" } else { "off" },
        pending,
        current
    );
}

fn print_timings(editor: &TimingEditor, device: DeviceClass) {
    let recorder = editor.recorder();
    for segment in &editor.collection().segments {
        let range = match recorder.timing(segment.id) {
            Some(timing) if timing.status() != TimingStatus::NotSet => format!(
                "{}-{}",
                format_clock(timing.start),
                format_clock(timing.end)
            ),
            _ => "    -    ".to_string(),
        };
        println!(
            "{:>11} {:<8} {}",
            range,
            recorder.status(segment.id).as_str(),
            anchor_line(segment, device)
        );
    }
}
