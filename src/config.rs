//! Application-level configuration loading, including the runtime caption corpus.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the caption corpus.
const DEFAULT_CAPTIONS_PATH: &str = "config/captions.json";
/// Environment variable that overrides [`DEFAULT_CAPTIONS_PATH`].
const CAPTIONS_PATH_ENV: &str = "CAPTION_CLASH_CAPTIONS_PATH";

/// Dwell time per presented image.
const DEFAULT_PRESENT_DWELL: Duration = Duration::from_secs(5);
/// Pause between a finished round and the next one starting.
const DEFAULT_ROUND_GAP: Duration = Duration::from_secs(10);
/// How long a voting phase may stay open before it is finalized as-is.
const DEFAULT_VOTE_TIMEOUT: Duration = Duration::from_secs(60);
/// Quiescence window after which an idle session expires from the store.
const DEFAULT_GAME_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Redis endpoint; absent means single-instance in-process backends.
    pub redis_url: Option<String>,
    /// Session TTL applied by the store on every write.
    pub game_ttl: Duration,
    /// Per-image dwell during the presentation phase.
    pub present_dwell: Duration,
    /// Pause between voting completion and the next round.
    pub round_gap: Duration,
    /// Deadline after which an open vote is finalized with the votes cast.
    pub vote_timeout: Duration,
    captions: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the environment plus the caption corpus file,
    /// falling back to baked-in defaults when either is missing.
    pub fn load() -> Self {
        let port = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);

        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        Self {
            port,
            redis_url,
            game_ttl: duration_from_env_secs("GAME_TTL_SECS", DEFAULT_GAME_TTL),
            present_dwell: duration_from_env_ms("PRESENT_DWELL_MS", DEFAULT_PRESENT_DWELL),
            round_gap: duration_from_env_ms("ROUND_GAP_MS", DEFAULT_ROUND_GAP),
            vote_timeout: duration_from_env_ms("VOTE_TIMEOUT_MS", DEFAULT_VOTE_TIMEOUT),
            captions: load_captions(),
        }
    }

    /// The caption corpus rounds draw from, never empty.
    pub fn captions(&self) -> &[String] {
        &self.captions
    }

    /// Replace the phase timings, mainly to compress them in tests.
    pub fn with_timings(
        mut self,
        present_dwell: Duration,
        round_gap: Duration,
        vote_timeout: Duration,
    ) -> Self {
        self.present_dwell = present_dwell;
        self.round_gap = round_gap;
        self.vote_timeout = vote_timeout;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            redis_url: None,
            game_ttl: DEFAULT_GAME_TTL,
            present_dwell: DEFAULT_PRESENT_DWELL,
            round_gap: DEFAULT_ROUND_GAP,
            vote_timeout: DEFAULT_VOTE_TIMEOUT,
            captions: default_captions(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of one corpus entry in the captions file.
struct RawCaption {
    caption: String,
}

/// Read the caption corpus from disk, keeping the built-in set on any
/// failure so the server always has captions to deal.
fn load_captions() -> Vec<String> {
    let path = resolve_captions_path();
    match fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<Vec<RawCaption>>(&contents) {
            Ok(raw) if !raw.is_empty() => {
                info!(
                    path = %path.display(),
                    count = raw.len(),
                    "loaded caption corpus from file"
                );
                raw.into_iter().map(|entry| entry.caption).collect()
            }
            Ok(_) => {
                warn!(path = %path.display(), "caption file is empty; using built-in corpus");
                default_captions()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to parse caption file; using built-in corpus"
                );
                default_captions()
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(
                path = %path.display(),
                "caption file not found; using built-in corpus"
            );
            default_captions()
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to read caption file; using built-in corpus"
            );
            default_captions()
        }
    }
}

/// Resolve the captions path taking the environment override into account.
fn resolve_captions_path() -> PathBuf {
    env::var_os(CAPTIONS_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTIONS_PATH))
}

fn duration_from_env_ms(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn duration_from_env_secs(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Built-in caption corpus shipped with the binary.
fn default_captions() -> Vec<String> {
    [
        "When the deploy finally works on a Friday",
        "Me pretending to listen in the all-hands",
        "The moment the WiFi comes back",
        "When someone says \"quick question\"",
        "My brain at 3am remembering an old mistake",
        "Monday morning, in one picture",
        "When the group chat goes quiet after your joke",
        "Trying to look busy when the boss walks by",
        "When the food arrives at the table",
        "Me after saying \"let's circle back\"",
        "The face you make reading old code you wrote",
        "When the meeting could have been an email",
        "Walking into the weekend like",
        "When autocorrect betrays you mid-argument",
        "Me budgeting five minutes after payday",
        "When the song you queued finally plays",
        "Explaining my job to my grandparents",
        "When you wave back at someone waving behind you",
        "The last slice of pizza negotiation",
        "When the elevator closes just in time",
        "Me at the gym for the first time in months",
        "When your phone battery hits one percent",
        "Hearing your own voice in a recording",
        "When the spoiler you avoided all week appears",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}
