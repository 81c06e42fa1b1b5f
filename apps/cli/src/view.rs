use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use shortreels_core::{
    RequestStatus, Session, SessionEvent, ViewBatch, ViewReceiver,
    events::{Notice, NoticeLevel, ProgressView},
    format_duration,
};
use tracing::warn;

use crate::signals::Foreground;

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} [{bar:30.cyan/dim}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("━╸ "),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn notice_line(notice: &Notice) -> String {
    let symbol = match notice.level {
        NoticeLevel::Info => style("i").blue().bold(),
        NoticeLevel::Success => style("✓").green().bold(),
        NoticeLevel::Warning => style("!").yellow().bold(),
        NoticeLevel::Error => style("✗").red().bold(),
    };
    format!("{} {}", symbol, notice.message)
}

/// Terminal side of the view channel.
///
/// Requests in `followed` get a progress bar each. Banners and toasts are
/// printed above the bars; a toast repeating the current banner is skipped.
pub struct Renderer {
    multi: MultiProgress,
    followed: HashSet<String>,
    bars: HashMap<String, ProgressBar>,
    banner: Option<String>,
}

impl Renderer {
    pub fn new(followed: &[String]) -> Self {
        Self {
            multi: MultiProgress::new(),
            followed: followed.iter().cloned().collect(),
            bars: HashMap::new(),
            banner: None,
        }
    }

    fn println(&self, line: impl AsRef<str>) {
        if self.multi.println(line).is_err() {
            warn!("terminal output failed");
        }
    }

    fn bar(&mut self, request_id: &str) -> &ProgressBar {
        self.bars
            .entry(request_id.to_string())
            .or_insert_with(|| self.multi.add(create_progress_bar()))
    }

    fn show_progress(&mut self, view: &ProgressView) {
        let label = if self.followed.len() > 1 {
            format!("{} ", style(&view.request_id[..8.min(view.request_id.len())]).dim())
        } else {
            String::new()
        };
        let elapsed = format_duration(view.elapsed_secs);
        let bar = self.bar(&view.request_id);
        if bar.is_finished() {
            return;
        }
        bar.set_position(u64::from(view.progress));
        bar.set_message(format!("{}{} {}", label, view.message, style(elapsed).dim()));
    }

    fn finish(&mut self, request_id: &str, status: RequestStatus) {
        let message = match status {
            RequestStatus::Completed => format!("{} Done", style("✓").green().bold()),
            RequestStatus::Failed => format!("{} Failed", style("✗").red().bold()),
            RequestStatus::Cancelled => format!("{} Cancelled", style("!").yellow().bold()),
            _ => return,
        };
        let bar = self.bar(request_id);
        if status == RequestStatus::Completed {
            bar.set_position(100);
        }
        bar.finish_with_message(message);
    }

    pub fn render(&mut self, event: &SessionEvent) {
        if let Some(id) = event.request_id()
            && !self.followed.contains(id)
        {
            return;
        }

        match event {
            SessionEvent::Progress(view) => self.show_progress(view),
            SessionEvent::StatusChanged { request_id, status } => self.finish(request_id, *status),
            SessionEvent::PreviewReady { url, .. } => self.println(format!(
                "{} Preview ready {}",
                style("✓").green().bold(),
                style(url).underlined()
            )),
            SessionEvent::PaidVideoReady { url, .. } => self.println(format!(
                "{} Full video unlocked {}",
                style("✓").green().bold(),
                style(url).underlined()
            )),
            SessionEvent::Availability {
                notice: Some(notice),
                ..
            } => self.println(format!("  {}", style(notice.message()).dim())),
            SessionEvent::Availability { .. } => {}
            SessionEvent::VideoUnavailable { request_id } => self.println(format!(
                "{} Video {} is no longer available",
                style("!").yellow().bold(),
                request_id
            )),
            SessionEvent::Banner(notice) => {
                self.banner = Some(notice.message.clone());
                self.println(notice_line(notice));
            }
            SessionEvent::BannerCleared => self.banner = None,
            SessionEvent::Toast(notice) => {
                if self.banner.as_deref() != Some(notice.message.as_str()) {
                    self.println(notice_line(notice));
                }
            }
            SessionEvent::Reset => {}
        }
    }

    pub fn render_batch(&mut self, batch: ViewBatch) {
        match batch {
            ViewBatch::Snapshots(snapshots) => {
                for envelope in snapshots {
                    self.render(&envelope.event);
                }
            }
            ViewBatch::Event(envelope) => self.render(&envelope.event),
        }
    }

    /// Render whatever is queued without waiting.
    pub fn flush(&mut self, view: &mut ViewReceiver) {
        for event in view.drain() {
            self.render(&event);
        }
    }

    fn settled(&self, session: &Session) -> bool {
        self.followed.iter().all(|id| {
            session
                .request(id)
                .is_none_or(|request| request.is_terminal())
        })
    }

    /// Follow until every followed request is finished or forgotten.
    ///
    /// The first Ctrl-C cancels what is still running, a second one stops
    /// following.
    pub async fn follow(&mut self, session: &Session, view: &mut ViewReceiver) {
        let mut foreground = Foreground::new();
        let mut cancelling = false;

        while !self.settled(session) {
            tokio::select! {
                batch = view.next() => self.render_batch(batch),
                _ = tokio::signal::ctrl_c() => {
                    if cancelling {
                        break;
                    }
                    cancelling = true;
                    self.println(format!("{} Cancelling...", style("!").yellow().bold()));
                    let running: Vec<String> = self
                        .followed
                        .iter()
                        .filter(|id| session.request(id).is_some_and(|r| !r.is_terminal()))
                        .cloned()
                        .collect();
                    for id in running {
                        if let Err(e) = session.cancel(&id).await {
                            warn!(request_id = %id, error = %e, "cancel failed");
                        }
                    }
                }
                _ = foreground.resumed() => session.on_visibility_change(true),
            }
        }

        self.flush(view);
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }
}
