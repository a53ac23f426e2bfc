//! Watch detection state machine.
//!
//! A tab that stays on a qualifying playback URL for the dwell time gets its
//! title scraped and reported once. The [`Detector`] owns every piece of
//! state; timers exist only as deadlines on the active [`WatchSession`], so
//! dropping the session cancels them.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use reelwatch_api::{Submission, WatchIngest};
use reelwatch_detect::{clean_title, ContentKind, SiteDatabase, SiteMatch};

use crate::debug_log::{shared_event_log, DetectorEvent, EventEntry, SharedEventLog, TeardownReason};
use crate::error::ReelwatchError;
use crate::host::{TabHost, TabId};

/// Dwell and tick durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorTiming {
    /// Time a tab must stay on the same playback URL before it is reported.
    pub dwell: Duration,
    /// Liveness check cadence while armed.
    pub tick: Duration,
}

impl Default for DetectorTiming {
    fn default() -> Self {
        Self {
            dwell: Duration::from_secs(300),
            tick: Duration::from_secs(5),
        }
    }
}

/// Browser tab lifecycle events fed to the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    Navigated { tab: TabId, url: String },
    Activated { tab: TabId },
    Removed { tab: TabId },
    Installed,
}

/// Observable detector state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DetectorStatus {
    Idle,
    Armed {
        tab: TabId,
        url: String,
        site: String,
        kind: ContentKind,
        remaining_secs: u64,
    },
    Reporting {
        tab: TabId,
        url: String,
    },
}

/// The one active watch.
#[derive(Debug)]
struct WatchSession {
    tab: TabId,
    url: String,
    site: SiteMatch,
    /// Countdown for logs and status only; the deadline drives completion.
    remaining: Duration,
    next_tick: Instant,
    deadline: Instant,
}

#[derive(Debug, Clone, Copy)]
enum Timer {
    Tick,
    Dwell,
}

pub struct Detector<H, I> {
    host: H,
    ingest: I,
    sites: SiteDatabase,
    timing: DetectorTiming,
    session: Option<WatchSession>,
    /// Last successfully submitted title. A single slot, not a history.
    last_sent: Option<String>,
    status: watch::Sender<DetectorStatus>,
    log: SharedEventLog,
}

impl<H: TabHost, I: WatchIngest> Detector<H, I> {
    pub fn new(host: H, ingest: I, sites: SiteDatabase, timing: DetectorTiming) -> Self {
        let (status, _) = watch::channel(DetectorStatus::Idle);
        Self {
            host,
            ingest,
            sites,
            timing,
            session: None,
            last_sent: None,
            status,
            log: shared_event_log(),
        }
    }

    pub fn status(&self) -> watch::Receiver<DetectorStatus> {
        self.status.subscribe()
    }

    pub fn event_log(&self) -> SharedEventLog {
        self.log.clone()
    }

    /// A tab's URL changed.
    pub fn on_navigate(&mut self, tab: TabId, url: &str) {
        debug!(%tab, url, "Tab updated");
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.tab == tab && s.url != url)
        {
            self.teardown(TeardownReason::UrlChanged);
        }
        self.check_url(tab, url);
    }

    /// The user switched to `tab`.
    pub async fn on_activate(&mut self, tab: TabId) {
        if self.session.as_ref().is_some_and(|s| s.tab != tab) {
            info!(%tab, "Tab switched away, clearing timer");
            self.teardown(TeardownReason::SwitchedAway);
        }

        match self.host.tab_url(tab).await {
            Ok(Some(url)) => self.check_url(tab, &url),
            Ok(None) => debug!(%tab, "Activated tab has no URL"),
            Err(e) => warn!(%tab, error = %e, "Failed to look up activated tab"),
        }
    }

    /// A tab was closed.
    pub fn on_tab_removed(&mut self, tab: TabId) {
        if self.session.as_ref().is_some_and(|s| s.tab == tab) {
            self.teardown(TeardownReason::TabClosed);
        }
    }

    /// The extension was installed or started: scan tabs that are already open.
    pub async fn on_installed(&mut self) {
        match self.host.list_tabs().await {
            Ok(tabs) => {
                info!(count = tabs.len(), "Scanning open tabs");
                for tab in tabs {
                    if let Some(url) = tab.url {
                        self.check_url(tab.tab_id, &url);
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to list open tabs"),
        }
    }

    /// Drive the detector until the event channel closes.
    ///
    /// Events win ties with timers, so an event queued before a deadline is
    /// handled before that timer fires.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<TabEvent>) {
        info!(
            dwell_secs = self.timing.dwell.as_secs(),
            tick_secs = self.timing.tick.as_secs(),
            "Watch detector started"
        );

        loop {
            let timer = self.next_timer();
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                fired = wait_for(timer) => match fired {
                    Timer::Tick => self.on_tick().await,
                    Timer::Dwell => self.on_dwell_elapsed().await,
                },
            }
        }

        self.session = None;
        self.status.send_replace(DetectorStatus::Idle);
        info!("Watch detector stopped");
    }

    async fn handle(&mut self, event: TabEvent) {
        match event {
            TabEvent::Navigated { tab, url } => self.on_navigate(tab, &url),
            TabEvent::Activated { tab } => self.on_activate(tab).await,
            TabEvent::Removed { tab } => self.on_tab_removed(tab),
            TabEvent::Installed => self.on_installed().await,
        }
    }

    fn check_url(&mut self, tab: TabId, url: &str) {
        if let Some(site) = self.sites.match_url(url) {
            self.arm(tab, url, site);
        }
    }

    fn arm(&mut self, tab: TabId, url: &str, site: SiteMatch) {
        self.teardown(TeardownReason::Superseded);

        let now = Instant::now();
        let site_name = self.sites.site_name(site.index).unwrap_or_default().to_string();
        info!(%tab, url, site = %site_name, kind = %site.kind, "Starting watch timer");

        self.session = Some(WatchSession {
            tab,
            url: url.to_string(),
            site,
            remaining: self.timing.dwell,
            next_tick: now + self.timing.tick,
            deadline: now + self.timing.dwell,
        });
        self.record(DetectorEvent::Armed {
            tab,
            url: url.to_string(),
            kind: site.kind,
        });
        self.status.send_replace(DetectorStatus::Armed {
            tab,
            url: url.to_string(),
            site: site_name,
            kind: site.kind,
            remaining_secs: self.timing.dwell.as_secs(),
        });
    }

    /// Drop the active session, if any, together with its timers.
    fn teardown(&mut self, reason: TeardownReason) {
        if let Some(session) = self.session.take() {
            info!(tab = %session.tab, %reason, "Clearing watch timer");
            self.record(DetectorEvent::TornDown {
                tab: session.tab,
                reason,
            });
        }
        self.status.send_replace(DetectorStatus::Idle);
    }

    fn next_timer(&self) -> Option<(Instant, Timer)> {
        self.session.as_ref().map(|s| {
            if s.deadline <= s.next_tick {
                (s.deadline, Timer::Dwell)
            } else {
                (s.next_tick, Timer::Tick)
            }
        })
    }

    async fn on_tick(&mut self) {
        let Some((tab, url)) = self.session.as_ref().map(|s| (s.tab, s.url.clone())) else {
            return;
        };

        if let Err(reason) = self.check_tab(tab, &url).await {
            info!(%tab, %reason, "URL changed or tab closed, stopping timer");
            self.teardown(reason);
            return;
        }

        let tick = self.timing.tick;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.remaining = session.remaining.saturating_sub(tick);
        session.next_tick += tick;
        let remaining_secs = session.remaining.as_secs();
        debug!(%tab, remaining_secs, "Time remaining");

        self.record(DetectorEvent::Tick {
            tab,
            remaining_secs,
        });
        self.status.send_modify(|status| {
            if let DetectorStatus::Armed {
                remaining_secs: r, ..
            } = status
            {
                *r = remaining_secs;
            }
        });
    }

    async fn on_dwell_elapsed(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let tab = session.tab;
        self.status.send_replace(DetectorStatus::Reporting {
            tab,
            url: session.url.clone(),
        });

        if let Err(reason) = self.check_tab(tab, &session.url).await {
            info!(%tab, %reason, "Tab closed or URL changed before timer completed");
            self.record(DetectorEvent::TornDown { tab, reason });
            self.status.send_replace(DetectorStatus::Idle);
            return;
        }

        let xpath = self
            .sites
            .title_xpath(session.site.index)
            .unwrap_or_default()
            .to_string();
        let raw_title = match self.host.extract_text(tab, &xpath).await {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => {
                info!(%tab, "No title found or extraction failed");
                self.record(DetectorEvent::ExtractionFailed { tab });
                self.status.send_replace(DetectorStatus::Idle);
                return;
            }
            Err(e) => {
                warn!(%tab, error = %e, "Title extraction failed");
                self.record(DetectorEvent::ExtractionFailed { tab });
                self.status.send_replace(DetectorStatus::Idle);
                return;
            }
        };

        let title = clean_title(&raw_title);
        info!(raw = %raw_title.trim(), %title, "Title found");
        self.record(DetectorEvent::Extracted {
            raw_title,
            title: title.clone(),
        });

        self.submit(title).await;
        self.status.send_replace(DetectorStatus::Idle);
    }

    async fn submit(&mut self, title: String) {
        if self.last_sent.as_deref() == Some(title.as_str()) {
            info!(%title, "Title already sent, skipping");
            self.record(DetectorEvent::Duplicate { title });
            return;
        }

        match self.ingest.submit(&Submission::viewed(title.as_str())).await {
            Ok(ack) => {
                info!(%title, %ack, "Successfully sent to server");
                self.record(DetectorEvent::Submitted {
                    title: title.clone(),
                });
                self.last_sent = Some(title);
            }
            Err(e) => {
                error!(%title, error = %e, "Failed to send to server");
                self.record(DetectorEvent::SubmitFailed {
                    title,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Staleness guard: the tab must still exist and still be on `url`.
    async fn check_tab(&self, tab: TabId, url: &str) -> Result<(), TeardownReason> {
        match self.host.tab_url(tab).await {
            Ok(Some(current)) if current == url => Ok(()),
            Ok(Some(_)) => Err(TeardownReason::UrlChanged),
            Ok(None) => Err(TeardownReason::TabClosed),
            Err(e) => {
                warn!(%tab, error = %e, "Tab lookup failed");
                Err(TeardownReason::HostError)
            }
        }
    }

    fn record(&self, event: DetectorEvent) {
        if let Ok(mut log) = self.log.lock() {
            log.push(event);
        }
    }
}

async fn wait_for(timer: Option<(Instant, Timer)>) -> Timer {
    match timer {
        Some((at, kind)) => {
            tokio::time::sleep_until(at).await;
            kind
        }
        None => std::future::pending().await,
    }
}

/// Sending side of a running detector.
#[derive(Clone)]
pub struct DetectorHandle {
    tx: mpsc::UnboundedSender<TabEvent>,
    status: watch::Receiver<DetectorStatus>,
    log: SharedEventLog,
}

impl DetectorHandle {
    pub fn send(&self, event: TabEvent) -> Result<(), ReelwatchError> {
        self.tx
            .send(event)
            .map_err(|_| ReelwatchError::DetectorClosed)
    }

    pub fn status(&self) -> DetectorStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectorStatus> {
        self.status.clone()
    }

    pub fn events(&self) -> Vec<EventEntry> {
        self.log
            .lock()
            .map(|log| log.snapshot())
            .unwrap_or_default()
    }
}

/// Run `detector` on a tokio task. The task ends once every handle is dropped.
pub fn spawn_detector<H, I>(detector: Detector<H, I>) -> (DetectorHandle, JoinHandle<()>)
where
    H: TabHost + 'static,
    I: WatchIngest + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = DetectorHandle {
        tx,
        status: detector.status(),
        log: detector.event_log(),
    };
    let task = tokio::spawn(detector.run(rx));
    (handle, task)
}
