/* src/watch.rs */

use anyhow::Result;
use notify::{RecommendedWatcher, Watcher};
use tokio::sync::mpsc;

/// Filesystem watcher bridged into a tokio channel. The watcher must stay
/// alive for as long as events are wanted; callers register paths on it.
/// Bursts beyond the channel capacity collapse into pending events, which is
/// all the coalescing the watch tasks rely on.
pub fn channel_watcher() -> Result<(RecommendedWatcher, mpsc::Receiver<()>)> {
  let (tx, rx) = mpsc::channel(16);
  let watcher = RecommendedWatcher::new(
    move |res: std::result::Result<notify::Event, notify::Error>| {
      if res.is_ok() {
        let _ = tx.blocking_send(());
      }
    },
    notify::Config::default(),
  )?;
  Ok((watcher, rx))
}
