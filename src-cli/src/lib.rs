use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use recipe_stream_core::{
    Config, ExtractRequest, ExtractionController, HttpBackend, SessionError, SessionEvent,
    SessionMode,
};

/// Process exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CANCELLED: i32 = 130;

/// Initialize tracing/logging with the given directives
pub fn init_logging(directives: &[&str]) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in directives {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring log directive {:?}: {}", directive, e),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// What to extract and how, as given on the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub url: String,
    pub location: String,
    pub regular: bool,
    pub backend: Option<String>,
    pub config: Option<PathBuf>,
    pub quiet: bool,
}

impl RunOptions {
    /// Settings file merged with command-line overrides
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::load_or_default(),
        };
        if let Some(url) = &self.backend {
            config.backend_url = url.clone();
        }
        Ok(config)
    }

    pub fn mode(&self, config: &Config) -> SessionMode {
        if self.regular {
            SessionMode::Regular
        } else {
            config.default_mode
        }
    }
}

/// Turns session events into the lines shown on stderr.
#[derive(Debug, Default)]
pub struct Reporter {
    quiet: bool,
    last_eta: Option<u64>,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            last_eta: None,
        }
    }

    /// Line to print for `event`, if any. Terminal events are always reported.
    pub fn line(&mut self, event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::Started { mode, .. } if !self.quiet => Some(match mode {
                SessionMode::Streaming => "Extracting recipe...".to_string(),
                SessionMode::Regular => "Extracting recipe (no live progress)...".to_string(),
            }),
            SessionEvent::Progress { message } if !self.quiet => Some(format!("  {}", message)),
            SessionEvent::Phases { phases } if !self.quiet => {
                let active = phases.iter().find(|p| p.active)?;
                let done = phases.iter().filter(|p| p.completed).count();
                Some(format!(
                    "[{}/{}] {} - {}",
                    done,
                    phases.len(),
                    active.label,
                    active.description
                ))
            }
            SessionEvent::Eta { seconds_remaining } if !self.quiet => {
                if *seconds_remaining == self.last_eta {
                    return None;
                }
                self.last_eta = *seconds_remaining;
                seconds_remaining.map(|s| format!("  ~{}s remaining", s))
            }
            SessionEvent::Succeeded { recipe } => Some(match recipe.title() {
                Some(title) => format!("Extracted \"{}\"", title),
                None => "Extracted recipe".to_string(),
            }),
            SessionEvent::Failed { reason } => Some(format!("Extraction failed: {}", reason)),
            SessionEvent::Cancelled => Some("Extraction cancelled".to_string()),
            _ => None,
        }
    }
}

/// Run one extraction to completion and return the process exit code.
pub async fn run(options: RunOptions) -> Result<i32> {
    let config = options.resolve_config()?;
    let mode = options.mode(&config);
    let backend = HttpBackend::new(&config).context("Failed to create HTTP client")?;

    tracing::debug!(
        stream_url = backend.stream_url(),
        extract_url = backend.extract_url(),
        ?mode,
        "Using extraction backend"
    );

    let mut controller = ExtractionController::new(Arc::new(backend));
    let mut handle = controller.start(
        ExtractRequest::new(options.url.clone(), options.location.clone()),
        mode,
    )?;
    let mut reporter = Reporter::new(options.quiet);

    loop {
        let event = tokio::select! {
            event = handle.next_event() => event,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                match controller.cancel() {
                    Ok(()) => {}
                    Err(SessionError::NotCancellable) => {
                        eprintln!("Regular extraction cannot be cancelled, waiting for the backend");
                    }
                    Err(e) => tracing::debug!("Cancel ignored: {}", e),
                }
                continue;
            }
        };

        let Some(event) = event else {
            tracing::warn!("Session ended without a terminal event");
            return Ok(EXIT_FAILURE);
        };

        if let Some(line) = reporter.line(&event) {
            eprintln!("{}", line);
        }

        match event {
            SessionEvent::Succeeded { recipe } => {
                let json = serde_json::to_string_pretty(&recipe)?;
                println!("{}", json);
                controller.join().await;
                return Ok(EXIT_SUCCESS);
            }
            SessionEvent::Failed { .. } => {
                controller.join().await;
                return Ok(EXIT_FAILURE);
            }
            SessionEvent::Cancelled => {
                controller.join().await;
                return Ok(EXIT_CANCELLED);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_stream_core::config::BACKEND_URL_ENV;
    use recipe_stream_core::{Phase, PhaseId, RecipeData};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one HTTP request with `response`, then close.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                    let content_length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= pos + 4 + content_length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    fn options_for(base: String, dir: &tempfile::TempDir, regular: bool) -> RunOptions {
        RunOptions {
            url: "https://video.test/watch/1".to_string(),
            location: "Oslo".to_string(),
            regular,
            backend: Some(base),
            config: Some(dir.path().join("settings.json")),
            quiet: true,
        }
    }

    #[tokio::test]
    async fn test_run_streaming_success_exits_zero() {
        let base = serve_once(concat!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
            "data: {\"type\":\"progress\",\"message\":\"Starting extraction\"}\n\n",
            "data: {\"type\":\"result\",\"recipe\":{\"title\":\"Pasta\"}}\n\n",
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();

        let code = run(options_for(base, &dir, false)).await.unwrap();
        assert_eq!(code, EXIT_SUCCESS);
    }

    #[tokio::test]
    async fn test_run_streaming_error_event_exits_one() {
        let base = serve_once(concat!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
            "data: {\"type\":\"error\",\"message\":\"Processing failed\"}\n\n",
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();

        let code = run(options_for(base, &dir, false)).await.unwrap();
        assert_eq!(code, EXIT_FAILURE);
    }

    #[tokio::test]
    async fn test_run_regular_server_error_exits_one() {
        let base = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\nContent-Length: 16\r\nConnection: close\r\n\r\n{\"error\":\"boom\"}",
        )
        .await;
        let dir = tempfile::tempdir().unwrap();

        let code = run(options_for(base, &dir, true)).await.unwrap();
        assert_eq!(code, EXIT_FAILURE);
    }

    #[test]
    fn test_reporter_lines() {
        let mut reporter = Reporter::new(false);

        let mut phases: Vec<Phase> = PhaseId::ALL.iter().map(|id| Phase::new(*id)).collect();
        assert_eq!(
            reporter.line(&SessionEvent::Phases {
                phases: phases.clone()
            }),
            None
        );

        phases[0].completed = true;
        phases[1].completed = true;
        phases[1].active = true;
        let line = reporter
            .line(&SessionEvent::Phases { phases })
            .unwrap();
        assert!(line.starts_with("[2/6] "));

        assert_eq!(
            reporter.line(&SessionEvent::Progress {
                message: "Processing with AI".to_string()
            }),
            Some("  Processing with AI".to_string())
        );

        let eta = SessionEvent::Eta {
            seconds_remaining: Some(12),
        };
        assert_eq!(reporter.line(&eta), Some("  ~12s remaining".to_string()));
        // Unchanged estimate is not repeated.
        assert_eq!(reporter.line(&eta), None);
    }

    #[test]
    fn test_quiet_reports_only_outcome() {
        let mut reporter = Reporter::new(true);
        assert_eq!(
            reporter.line(&SessionEvent::Progress {
                message: "Starting extraction".to_string()
            }),
            None
        );

        let recipe: RecipeData = serde_json::from_value(json!({"title": "Pasta"})).unwrap();
        assert_eq!(
            reporter.line(&SessionEvent::Succeeded { recipe }),
            Some("Extracted \"Pasta\"".to_string())
        );
        assert_eq!(
            reporter.line(&SessionEvent::Failed {
                reason: "boom".to_string()
            }),
            Some("Extraction failed: boom".to_string())
        );
    }

    #[test]
    fn test_cli_overrides_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let saved = Config {
            backend_url: "http://file.test:3000".to_string(),
            default_mode: SessionMode::Regular,
            ..Default::default()
        };
        saved.save(&path).unwrap();

        let options = RunOptions {
            config: Some(path.clone()),
            ..Default::default()
        };
        let config = options.resolve_config().unwrap();
        assert_eq!(config.default_mode, SessionMode::Regular);
        assert_eq!(options.mode(&config), SessionMode::Regular);

        let previous = std::env::var(BACKEND_URL_ENV).ok();
        std::env::set_var(BACKEND_URL_ENV, "http://env.test:4000");

        let env_only = RunOptions {
            config: Some(path.clone()),
            ..Default::default()
        }
        .resolve_config()
        .unwrap()
        .backend_url;
        let env_and_flag = RunOptions {
            config: Some(path),
            backend: Some("http://flag.test:8080".to_string()),
            ..Default::default()
        }
        .resolve_config()
        .unwrap()
        .backend_url;

        match previous {
            Some(value) => std::env::set_var(BACKEND_URL_ENV, value),
            None => std::env::remove_var(BACKEND_URL_ENV),
        }

        assert_eq!(env_only, "http://env.test:4000");
        assert_eq!(env_and_flag, "http://flag.test:8080");
    }

    #[test]
    fn test_regular_flag_wins() {
        let options = RunOptions {
            regular: true,
            ..Default::default()
        };
        assert_eq!(options.mode(&Config::default()), SessionMode::Regular);
        assert_eq!(
            RunOptions::default().mode(&Config::default()),
            SessionMode::Streaming
        );
    }
}
