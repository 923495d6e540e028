//! Counting what the handlers did.

use foldersort_config::HandlerKind;
use foldersort_handlers::Notification;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandlerStats {
    pub handled: u64,
    pub converted: u64,
    pub thumbnails: u64,
}

/// Per-handler counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    handlers: HashMap<HandlerKind, HandlerStats>,
}

impl Stats {
    pub fn record(&mut self, notification: Notification) {
        match notification {
            Notification::Handled(kind) => self.handlers.entry(kind).or_default().handled += 1,
            Notification::Converted(kind) => self.handlers.entry(kind).or_default().converted += 1,
            Notification::Thumbnail(kind) => self.handlers.entry(kind).or_default().thumbnails += 1,
        }
    }

    pub fn get(&self, kind: HandlerKind) -> HandlerStats {
        self.handlers.get(&kind).copied().unwrap_or_default()
    }

    pub fn total_handled(&self) -> u64 {
        self.handlers.values().map(|s| s.handled).sum()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for kind in HandlerKind::DEFAULT_ORDER {
            let Some(stats) = self.handlers.get(&kind) else {
                continue;
            };
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{kind}: {} handled", stats.handled)?;
            if stats.converted > 0 {
                write!(f, " / {} converted", stats.converted)?;
            }
            if stats.thumbnails > 0 {
                write!(f, " / {} thumbnails", stats.thumbnails)?;
            }
        }
        if first {
            f.write_str("nothing handled")?;
        }
        Ok(())
    }
}

/// Receiving end of the telemetry channel.
pub struct StatsCollector {
    receiver: UnboundedReceiver<Notification>,
}

impl StatsCollector {
    /// The sender goes to [`Pipeline::with_telemetry`](crate::Pipeline::with_telemetry).
    pub fn channel() -> (UnboundedSender<Notification>, Self) {
        let (sender, receiver) = unbounded_channel();
        (sender, Self { receiver })
    }

    /// Count notifications until every sender has been dropped.
    pub async fn run(mut self) -> Stats {
        let mut stats = Stats::default();
        while let Some(notification) = self.receiver.recv().await {
            tracing::trace!(?notification, "Notification received");
            stats.record(notification);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collects_until_senders_drop() {
        let (sender, collector) = StatsCollector::channel();
        let collecting = tokio::spawn(collector.run());
        for notification in [
            Notification::Thumbnail(HandlerKind::Image),
            Notification::Converted(HandlerKind::Image),
            Notification::Handled(HandlerKind::Image),
            Notification::Handled(HandlerKind::Image),
            Notification::Handled(HandlerKind::Document),
        ] {
            sender.send(notification).unwrap();
        }
        drop(sender);
        let stats = collecting.await.unwrap();
        assert_eq!(stats.get(HandlerKind::Image), HandlerStats { handled: 2, converted: 1, thumbnails: 1 });
        assert_eq!(stats.get(HandlerKind::Video), HandlerStats::default());
        assert_eq!(stats.total_handled(), 3);
        assert_eq!(
            stats.to_string(),
            "image: 2 handled / 1 converted / 1 thumbnails, document: 1 handled"
        );
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(Stats::default().to_string(), "nothing handled");
    }
}
