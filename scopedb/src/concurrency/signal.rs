//! One-way notification channels built on tokio watch channels.
//!
//! A signal carries no payload. Poll loops use it as a cancellation token and cables use it
//! to learn that they are being closed.

use tokio::sync::watch;

/// Transmitter side of a signal channel.
pub type SignalTx = watch::Sender<()>;

/// Receiver side of a signal channel.
pub type SignalRx = watch::Receiver<()>;

/// Creates a new signal channel.
///
/// Receivers created here have already seen the initial value, so [`wait_for_signal`] only
/// returns after [`SignalTx::send`] is called.
pub fn create_signal() -> (SignalTx, SignalRx) {
    watch::channel(())
}

/// Waits until the signal fires.
///
/// A dropped transmitter can never fire, so in that case this future stays pending forever.
pub async fn wait_for_signal(rx: &mut SignalRx) {
    if rx.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}
