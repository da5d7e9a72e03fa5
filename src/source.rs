use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::CACHE_CONTROL;
use tracing::{debug, error, info};

use crate::domain::LexiconError;
use crate::export::expand_path;
use crate::parser::{parse, ParsedCsv};

/// Somewhere the raw lexicon CSV can be read from.
pub trait DataSource: Send {
    fn fetch(&self) -> Result<String, LexiconError>;
    fn describe(&self) -> String;
}

pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: &str) -> Result<Self, LexiconError> {
        let client = Client::builder()
            .build()
            .map_err(|e| LexiconError::Fetch(e.to_string()))?;
        Ok(HttpSource {
            client,
            url: url.to_string(),
        })
    }
}

impl DataSource for HttpSource {
    fn fetch(&self) -> Result<String, LexiconError> {
        let response = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-store")
            .send()
            .map_err(|e| LexiconError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LexiconError::FetchStatus(status.as_u16()));
        }
        response.text().map_err(|e| LexiconError::Fetch(e.to_string()))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: &str) -> Result<Self, LexiconError> {
        Ok(FileSource {
            path: expand_path(path)?,
        })
    }
}

impl DataSource for FileSource {
    fn fetch(&self) -> Result<String, LexiconError> {
        Ok(fs::read_to_string(&self.path)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub fn open_source(location: &str) -> Result<Box<dyn DataSource>, LexiconError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpSource::new(location)?))
    } else {
        Ok(Box::new(FileSource::new(location)?))
    }
}

#[derive(Debug)]
pub struct Fetched {
    pub parsed: ParsedCsv,
    pub version: u64,
    pub duration: Duration,
}

pub type FetchOutcome = Result<Fetched, LexiconError>;

pub fn fetch_and_parse(source: &dyn DataSource, version: u64) -> FetchOutcome {
    let start_time = Instant::now();
    let text = source.fetch()?;
    let parsed = parse(&text);
    let duration = start_time.elapsed();
    info!(
        "Loaded {} rows from {} in {}ms",
        parsed.rows.len(),
        source.describe(),
        duration.as_millis()
    );
    Ok(Fetched {
        parsed,
        version,
        duration,
    })
}

/// Background loader. Fetches once on start, then every `interval` and on
/// request. Only one fetch runs at a time; requests made while one is
/// pending are dropped.
pub struct Refresher {
    requests: Sender<()>,
    outcomes: Receiver<FetchOutcome>,
    in_flight: Arc<AtomicBool>,
}

impl Refresher {
    pub fn spawn(source: Box<dyn DataSource>, interval: Duration) -> Self {
        let (requests, request_rx) = mpsc::channel();
        let (outcome_tx, outcomes) = mpsc::channel();
        let in_flight = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&in_flight);

        thread::spawn(move || refresh_loop(source, interval, request_rx, outcome_tx, flag));

        Refresher {
            requests,
            outcomes,
            in_flight,
        }
    }

    /// Asks for a fetch now. Returns false if one is already pending.
    pub fn request(&self) -> bool {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Refresh already in flight, coalescing request");
            return false;
        }
        if self.requests.send(()).is_err() {
            self.in_flight.store(false, Ordering::Release);
            error!("Refresh worker is gone");
            return false;
        }
        true
    }

    pub fn try_recv(&self) -> Option<FetchOutcome> {
        self.outcomes.try_recv().ok()
    }
}

fn refresh_loop(
    source: Box<dyn DataSource>,
    interval: Duration,
    requests: Receiver<()>,
    outcomes: Sender<FetchOutcome>,
    in_flight: Arc<AtomicBool>,
) {
    let mut version = 0;
    loop {
        let outcome = fetch_and_parse(source.as_ref(), version + 1);
        match &outcome {
            Ok(fetched) => version = fetched.version,
            Err(e) => error!("Failed to refresh from {}: {}", source.describe(), e),
        }

        // Cleared before sending so a request made right after the outcome
        // arrives is not mistaken for a duplicate.
        in_flight.store(false, Ordering::Release);
        if outcomes.send(outcome).is_err() {
            break;
        }

        match requests.recv_timeout(interval) {
            Ok(()) => debug!("Refresh requested"),
            Err(RecvTimeoutError::Timeout) => {
                in_flight.store(true, Ordering::Release);
                while requests.try_recv().is_ok() {}
                debug!("Periodic refresh");
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Refresh worker stopped");
}
