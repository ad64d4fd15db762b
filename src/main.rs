use channel_sync::cli::{parse_input, Args, InputCommand, HELP_TEXT};
use channel_sync::config::Config;
use channel_sync::prefs::PreferenceFile;
use channel_sync::reactions::{JsonFileBackend, ReactionStore};
use channel_sync::recommendations::{RecommendationClient, RecommendationResponse};
use channel_sync::session::{HttpBackend, SessionContext, SwitchOutcome, SwitchTicket};
use channel_sync::terminal::TerminalSurface;
use channel_sync::{Channel, Message, NetworkError};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type HistoryFetch = (SwitchTicket, Result<Vec<Message>, NetworkError>);

fn start_switch(
    session: &mut SessionContext,
    channel: Channel,
    surface: &mut TerminalSurface,
    fetches: &mut JoinSet<HistoryFetch>,
) {
    surface.banner(channel);
    if let Some(ticket) = session.begin_switch(channel, surface) {
        let request = session.history_request(ticket);
        fetches.spawn(async move { (ticket, request.await) });
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("channel_sync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::resolve(&args)?;
    info!(base_url = %config.base_url, channel = %config.channel, "starting");

    let mut prefs = PreferenceFile::load(&config.state_dir);
    let reactions = ReactionStore::load(JsonFileBackend::in_dir(&config.state_dir));
    let mut session = SessionContext::builder(HttpBackend::new(&config.base_url))
        .reactions(reactions)
        .echo_window(config.echo_window())
        .author_role(config.author_role.clone())
        .build();
    let recommender = RecommendationClient::with_defaults(config.base_url.clone());
    let mut surface = TerminalSurface::stdout(prefs.sound_enabled());

    let mut fetches: JoinSet<HistoryFetch> = JoinSet::new();
    let mut lookups: JoinSet<(String, RecommendationResponse)> = JoinSet::new();

    start_switch(&mut session, config.channel, &mut surface, &mut fetches);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    InputCommand::Say(text) => {
                        if !session.send_human(&text, &mut surface) {
                            surface.notice("Messages can only be sent on #human (/switch human).");
                        }
                    }
                    InputCommand::Switch(channel) => {
                        start_switch(&mut session, channel, &mut surface, &mut fetches);
                    }
                    InputCommand::React { index, emoji } => match surface.identity_at(index).cloned() {
                        Some(id) => session.add_reaction(&id, &emoji, &mut surface),
                        None => surface.notice(&format!("No message [{index}] in this feed.")),
                    },
                    InputCommand::Sound(enabled) => {
                        prefs.set_sound_enabled(enabled);
                        surface.set_sound(enabled);
                        surface.notice(if enabled { "Sound on." } else { "Sound off." });
                    }
                    InputCommand::Recommend(profile) => {
                        let profile = profile.unwrap_or_else(|| config.profile.clone());
                        surface.notice(&format!("Fetching recommendations for {profile}…"));
                        let client = recommender.clone();
                        lookups.spawn(async move {
                            let resp = client.fetch(&profile).await;
                            (profile, resp)
                        });
                    }
                    InputCommand::Channels => surface.print_channels(session.active_channel()),
                    InputCommand::Help => surface.print_help(HELP_TEXT),
                    InputCommand::Quit => break,
                    InputCommand::Nothing => {}
                    InputCommand::Invalid(msg) => surface.notice(&msg),
                }
            }
            Some(joined) = fetches.join_next() => {
                let (ticket, result) = match joined {
                    Ok(fetch) => fetch,
                    Err(e) => {
                        warn!(error = %e, "history task failed");
                        continue;
                    }
                };
                match session.complete_switch(ticket, result, &mut surface) {
                    SwitchOutcome::Live { backlog } => {
                        info!(channel = %ticket.channel(), backlog, "channel live");
                    }
                    SwitchOutcome::Stale => {
                        debug!(channel = %ticket.channel(), "superseded switch");
                    }
                    SwitchOutcome::Failed(_) | SwitchOutcome::Placeholder => {}
                }
            }
            message = session.next_live_message(), if session.is_streaming() => {
                match message {
                    Some(message) => {
                        session.apply_live(message, &mut surface);
                    }
                    None => surface.notice("Live stream ended. /switch to the channel to reconnect."),
                }
            }
            Some(joined) = lookups.join_next() => {
                match joined {
                    Ok((profile, resp)) => surface.print_recommendations(&profile, &resp),
                    Err(e) => warn!(error = %e, "recommendation task failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.teardown();
    fetches.abort_all();
    lookups.abort_all();
    Ok(())
}
