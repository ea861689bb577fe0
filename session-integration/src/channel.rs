use derive_more::Constructor;
use std::marker::PhantomData;
use tracing::warn;

/// Abstraction over a channel transmitter, so worker code does not need to depend on a
/// concrete `tokio::sync::mpsc` type.
pub trait Tx
where
    Self: Clone + Send,
{
    type Item;
    type Error;
    fn send(&self, item: Self::Item) -> Result<(), Self::Error>;
}

/// Unbounded transmitter wrapping `tokio::sync::mpsc::UnboundedSender`.
#[derive(Debug, Clone)]
pub struct UnboundedTx<T, Error> {
    pub tx: tokio::sync::mpsc::UnboundedSender<T>,
    phantom: PhantomData<Error>,
}

impl<T, Error> UnboundedTx<T, Error> {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<T>) -> Self {
        Self {
            tx,
            phantom: PhantomData,
        }
    }
}

impl<T, Error> Tx for UnboundedTx<T, Error>
where
    T: Clone + Send,
    Error: From<tokio::sync::mpsc::error::SendError<T>> + Clone + Send,
{
    type Item = T;
    type Error = Error;

    fn send(&self, item: Self::Item) -> Result<(), Self::Error> {
        self.tx.send(item).map_err(Error::from)
    }
}

/// Unbounded receiver wrapping `tokio::sync::mpsc::UnboundedReceiver`.
#[derive(Debug, Constructor)]
pub struct UnboundedRx<T> {
    pub rx: tokio::sync::mpsc::UnboundedReceiver<T>,
}

impl<T> UnboundedRx<T> {
    /// Blocking receive for use from a plain `std::thread` worker.
    pub fn blocking_recv(&mut self) -> Option<T> {
        self.rx.blocking_recv()
    }
}

/// A [`Tx`] wrapper that can be permanently disabled, eg/ once a downstream subscriber has
/// been torn down mid-session.
#[derive(Debug, Clone)]
pub struct ChannelTxDroppable<ChannelTx> {
    state: ChannelState<ChannelTx>,
}

#[derive(Debug, Clone)]
enum ChannelState<Tx> {
    Active(Tx),
    Disabled,
}

impl<ChannelTx> ChannelTxDroppable<ChannelTx> {
    pub fn new(tx: ChannelTx) -> Self {
        Self {
            state: ChannelState::Active(tx),
        }
    }

    pub fn disable(&mut self) {
        self.state = ChannelState::Disabled;
    }
}

impl<ChannelTx> ChannelTxDroppable<ChannelTx>
where
    ChannelTx: Tx,
{
    /// Send an item, silently dropping it (with a warning) if the channel has been disabled
    /// or the receiver has disconnected.
    pub fn send(&mut self, item: ChannelTx::Item) {
        match &self.state {
            ChannelState::Active(tx) => {
                if tx.send(item).is_err() {
                    warn!("ChannelTxDroppable receiver disconnected, disabling channel");
                    self.state = ChannelState::Disabled;
                }
            }
            ChannelState::Disabled => {
                warn!("ChannelTxDroppable is disabled, dropping item");
            }
        }
    }
}
